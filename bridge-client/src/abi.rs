// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Calldata construction and log decoding for the EVM bridge contract.
//!
//! The ABI surface is fixed by the deployed contract:
//! `approveTransferWithSignatures(bytes[],(uint8,uint8,uint64,uint8,bytes))`,
//! `claimApprovedTransfer(uint8,uint64)`,
//! `transferApprovals(uint8,uint64) view returns (uint256)`, and the
//! `TokensDeposited` event.

use ethers::abi::{decode, encode, ParamType, Token};
use ethers::types::{Address as EthAddress, Bytes, Log, H256, U256};
use ethers::utils::keccak256;

use crate::encoding::{BridgeMessageEncoding, TOKEN_TRANSFER_MESSAGE_TYPE};
use crate::error::{BridgeClientError, BridgeClientResult};
use crate::types::StarcoinToEthBridgeAction;

pub const APPROVE_TRANSFER_WITH_SIGNATURES_SIG: &str =
    "approveTransferWithSignatures(bytes[],(uint8,uint8,uint64,uint8,bytes))";
pub const CLAIM_APPROVED_TRANSFER_SIG: &str = "claimApprovedTransfer(uint8,uint64)";
pub const TRANSFER_APPROVALS_SIG: &str = "transferApprovals(uint8,uint64)";
pub const BRIDGE_ETH_SIG: &str = "bridgeETH(bytes,uint8)";
pub const BRIDGE_ERC20_SIG: &str = "bridgeERC20(uint8,uint256,bytes,uint8)";
pub const PAUSED_SIG: &str = "paused()";
pub const TOKENS_DEPOSITED_EVENT_SIG: &str =
    "TokensDeposited(uint8,uint64,uint8,uint8,uint64,address,bytes)";

fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn calldata(signature: &str, tokens: &[Token]) -> Bytes {
    let mut data = selector(signature).to_vec();
    data.extend_from_slice(&encode(tokens));
    Bytes::from(data)
}

/// The message tuple passed to `approveTransferWithSignatures`.
///
/// `message_type` and `version` are fixed for token transfers; `payload`
/// carries the direction-specific address/amount layout produced by
/// [`BridgeMessageEncoding::as_payload_bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeApprovalMessage {
    pub message_type: u8,
    pub version: u8,
    pub nonce: u64,
    pub source_chain_id: u8,
    pub payload: Vec<u8>,
}

impl BridgeApprovalMessage {
    /// Build the approval message for a Starcoin-originated transfer being
    /// settled on the EVM chain.
    pub fn from_action(action: &StarcoinToEthBridgeAction) -> BridgeClientResult<Self> {
        Ok(Self {
            message_type: TOKEN_TRANSFER_MESSAGE_TYPE,
            version: crate::encoding::TOKEN_TRANSFER_MESSAGE_VERSION,
            nonce: action.starcoin_bridge_event.nonce,
            source_chain_id: action.starcoin_bridge_event.starcoin_chain_id,
            payload: action.as_payload_bytes()?,
        })
    }

    fn to_token(&self) -> Token {
        Token::Tuple(vec![
            Token::Uint(U256::from(self.message_type)),
            Token::Uint(U256::from(self.version)),
            Token::Uint(U256::from(self.nonce)),
            Token::Uint(U256::from(self.source_chain_id)),
            Token::Bytes(self.payload.clone()),
        ])
    }
}

/// Calldata for `approveTransferWithSignatures(bytes[], message)`
pub fn approve_transfer_calldata(
    signatures: &[Vec<u8>],
    message: &BridgeApprovalMessage,
) -> Bytes {
    let sig_tokens = signatures
        .iter()
        .map(|s| Token::Bytes(s.clone()))
        .collect::<Vec<_>>();
    calldata(
        APPROVE_TRANSFER_WITH_SIGNATURES_SIG,
        &[Token::Array(sig_tokens), message.to_token()],
    )
}

/// Calldata for `claimApprovedTransfer(uint8,uint64)`
pub fn claim_approved_transfer_calldata(source_chain_id: u8, nonce: u64) -> Bytes {
    calldata(
        CLAIM_APPROVED_TRANSFER_SIG,
        &[
            Token::Uint(U256::from(source_chain_id)),
            Token::Uint(U256::from(nonce)),
        ],
    )
}

/// Calldata for the `transferApprovals(uint8,uint64)` view, the on-chain
/// idempotency guard consulted before sending an approve transaction.
pub fn transfer_approvals_calldata(source_chain_id: u8, nonce: u64) -> Bytes {
    calldata(
        TRANSFER_APPROVALS_SIG,
        &[
            Token::Uint(U256::from(source_chain_id)),
            Token::Uint(U256::from(nonce)),
        ],
    )
}

/// Decode the `uint256` returned by `transferApprovals`. A non-zero value
/// means the transfer is already approved on-chain.
pub fn decode_transfer_approvals(data: &[u8]) -> BridgeClientResult<U256> {
    let tokens = decode(&[ParamType::Uint(256)], data)
        .map_err(|e| BridgeClientError::Encoding(format!("transferApprovals result: {e}")))?;
    match tokens.first() {
        Some(Token::Uint(value)) => Ok(*value),
        _ => Err(BridgeClientError::Encoding(
            "transferApprovals result: expected uint256".to_string(),
        )),
    }
}

/// Calldata for the `paused()` view on the bridge contract.
pub fn paused_calldata() -> Bytes {
    calldata(PAUSED_SIG, &[])
}

/// Decode the `bool` returned by `paused()`.
pub fn decode_paused(data: &[u8]) -> BridgeClientResult<bool> {
    let tokens = decode(&[ParamType::Bool], data)
        .map_err(|e| BridgeClientError::Encoding(format!("paused result: {e}")))?;
    match tokens.first() {
        Some(Token::Bool(value)) => Ok(*value),
        _ => Err(BridgeClientError::Encoding(
            "paused result: expected bool".to_string(),
        )),
    }
}

/// Calldata for `bridgeETH(bytes recipient, uint8 destinationChainID)`,
/// the native-ether deposit entry point.
pub fn bridge_eth_calldata(recipient: &[u8], destination_chain_id: u8) -> Bytes {
    calldata(
        BRIDGE_ETH_SIG,
        &[
            Token::Bytes(recipient.to_vec()),
            Token::Uint(U256::from(destination_chain_id)),
        ],
    )
}

/// Calldata for `bridgeERC20(uint8 tokenID, uint256 amount, bytes recipient,
/// uint8 destinationChainID)`.
pub fn bridge_erc20_calldata(
    token_id: u8,
    amount: U256,
    recipient: &[u8],
    destination_chain_id: u8,
) -> Bytes {
    calldata(
        BRIDGE_ERC20_SIG,
        &[
            Token::Uint(U256::from(token_id)),
            Token::Uint(amount),
            Token::Bytes(recipient.to_vec()),
            Token::Uint(U256::from(destination_chain_id)),
        ],
    )
}

/// Decoded `TokensDeposited` event.
///
/// Solidity: `TokensDeposited(uint8 sourceChainID, uint64 indexed nonce,
/// uint8 indexed destinationChainID, uint8 tokenID,
/// uint64 starcoinAdjustedAmount, address senderAddress,
/// bytes recipientAddress)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokensDepositedEvent {
    pub source_chain_id: u8,
    pub nonce: u64,
    pub destination_chain_id: u8,
    pub token_id: u8,
    pub adjusted_amount: u64,
    pub sender_address: EthAddress,
    pub recipient_address: Vec<u8>,
}

/// topic0 of the `TokensDeposited` event
pub fn tokens_deposited_topic() -> H256 {
    H256::from(keccak256(TOKENS_DEPOSITED_EVENT_SIG.as_bytes()))
}

/// Decode a `TokensDeposited` log. Returns an error when the log is not this
/// event or its data does not match the ABI.
pub fn decode_tokens_deposited(log: &Log) -> BridgeClientResult<TokensDepositedEvent> {
    if log.topics.len() != 3 || log.topics[0] != tokens_deposited_topic() {
        return Err(BridgeClientError::Encoding(
            "log is not a TokensDeposited event".to_string(),
        ));
    }
    let nonce = U256::from_big_endian(log.topics[1].as_bytes());
    if nonce > U256::from(u64::MAX) {
        return Err(BridgeClientError::Encoding(
            "TokensDeposited nonce exceeds u64".to_string(),
        ));
    }
    let destination_chain_id = log.topics[2].as_bytes()[31];

    let tokens = decode(
        &[
            ParamType::Uint(8),
            ParamType::Uint(8),
            ParamType::Uint(64),
            ParamType::Address,
            ParamType::Bytes,
        ],
        &log.data,
    )
    .map_err(|e| BridgeClientError::Encoding(format!("TokensDeposited data: {e}")))?;

    match tokens.as_slice() {
        [Token::Uint(source), Token::Uint(token_id), Token::Uint(amount), Token::Address(sender), Token::Bytes(recipient)] => {
            Ok(TokensDepositedEvent {
                source_chain_id: source.as_u32() as u8,
                nonce: nonce.as_u64(),
                destination_chain_id,
                token_id: token_id.as_u32() as u8,
                adjusted_amount: amount.as_u64(),
                sender_address: *sender,
                recipient_address: recipient.clone(),
            })
        }
        _ => Err(BridgeClientError::Encoding(
            "TokensDeposited data: unexpected token shape".to_string(),
        )),
    }
}

/// Reverts whose reason text indicates the transfer was already approved are
/// success for our purposes, not failure.
pub fn is_already_approved_revert(reason: &str) -> bool {
    reason.to_ascii_lowercase().contains("already approved")
}

/// Same reclassification for the claim leg.
pub fn is_already_claimed_revert(reason: &str) -> bool {
    reason.to_ascii_lowercase().contains("already claimed")
}
