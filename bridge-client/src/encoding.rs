// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Binary payload codec for Starcoin script-function calls and the bridge
//! token-transfer message.
//!
//! The byte layouts here are wire contracts with the on-chain transaction
//! decoder and the bridge contracts on both chains. Any deviation breaks
//! interoperability.

use ethers::types::Address as EthAddress;

use crate::error::{BridgeClientError, BridgeClientResult};
use crate::types::{EthToStarcoinBridgeAction, StarcoinToEthBridgeAction, STARCOIN_ADDRESS_LENGTH};

/// TransactionPayload variant tag for a script-function call
pub const SCRIPT_FUNCTION_PAYLOAD_TAG: u8 = 2;
/// Script-function module addresses are padded to this width
pub const ENCODED_ADDRESS_LENGTH: usize = 32;

pub const TOKEN_TRANSFER_MESSAGE_TYPE: u8 = 0;
pub const TOKEN_TRANSFER_MESSAGE_VERSION: u8 = 1;

/// Fixed-width single byte
pub fn encode_u8(value: u8) -> Vec<u8> {
    vec![value]
}

/// Fixed-width 8-byte little-endian
pub fn encode_u64(value: u64) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

/// Unsigned LEB128, used for length/count prefixes
pub fn encode_uleb128(mut value: u64) -> Vec<u8> {
    let mut bytes = Vec::new();
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
        if value == 0 {
            return bytes;
        }
    }
}

/// Length-prefixed byte vector
pub fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = encode_uleb128(bytes.len() as u64);
    out.extend_from_slice(bytes);
    out
}

/// Length-prefixed UTF-8 string
pub fn encode_string(s: &str) -> Vec<u8> {
    encode_bytes(s.as_bytes())
}

/// Decode hex, accepting an optional `0x` prefix. Odd length or non-hex
/// characters are an [`BridgeClientError::Encoding`].
pub fn hex_to_bytes(input: &str) -> BridgeClientResult<Vec<u8>> {
    let cleaned = input.strip_prefix("0x").unwrap_or(input);
    hex::decode(cleaned).map_err(|e| BridgeClientError::Encoding(format!("invalid hex: {e}")))
}

/// Lowercase `0x`-prefixed hex
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Left-zero-pad an address to [`ENCODED_ADDRESS_LENGTH`] bytes.
pub fn encode_address(address: &str) -> BridgeClientResult<Vec<u8>> {
    let bytes = hex_to_bytes(address)?;
    if bytes.len() > ENCODED_ADDRESS_LENGTH {
        return Err(BridgeClientError::Encoding(format!(
            "address is {} bytes, exceeds {}",
            bytes.len(),
            ENCODED_ADDRESS_LENGTH
        )));
    }
    let mut out = vec![0u8; ENCODED_ADDRESS_LENGTH - bytes.len()];
    out.extend_from_slice(&bytes);
    Ok(out)
}

/// A script-function call ready for encoding into a transaction payload.
///
/// `ty_args` are pre-encoded type tags; `args` are pre-serialized argument
/// values (each gets a length prefix when encoded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFunctionCall {
    pub module_address: String,
    pub module_name: String,
    pub function_name: String,
    pub ty_args: Vec<Vec<u8>>,
    pub args: Vec<Vec<u8>>,
}

/// Encode a script-function transaction payload:
///
/// ```text
/// tag(2) ++ address(32) ++ module ++ function
///        ++ uleb(len(ty_args)) ++ ty_args
///        ++ uleb(len(args)) ++ (uleb(len(a)) ++ a for a in args)
/// ```
pub fn encode_script_function_call(call: &ScriptFunctionCall) -> BridgeClientResult<Vec<u8>> {
    let mut out = encode_uleb128(SCRIPT_FUNCTION_PAYLOAD_TAG as u64);
    out.extend_from_slice(&encode_address(&call.module_address)?);
    out.extend_from_slice(&encode_string(&call.module_name));
    out.extend_from_slice(&encode_string(&call.function_name));
    out.extend_from_slice(&encode_uleb128(call.ty_args.len() as u64));
    for ty_arg in &call.ty_args {
        out.extend_from_slice(ty_arg);
    }
    out.extend_from_slice(&encode_uleb128(call.args.len() as u64));
    for arg in &call.args {
        out.extend_from_slice(&encode_bytes(arg));
    }
    Ok(out)
}

// Encoded bridge message consists of the following fields:
// 1. Message type (1 byte)
// 2. Message version (1 byte)
// 3. Nonce (8 bytes in big endian)
// 4. Source chain id (1 byte)
// 5. Payload (variable length)
pub trait BridgeMessageEncoding {
    /// The entire message as bytes
    fn as_bytes(&self) -> BridgeClientResult<Vec<u8>>;
    /// The payload piece as bytes
    fn as_payload_bytes(&self) -> BridgeClientResult<Vec<u8>>;
}

impl BridgeMessageEncoding for EthToStarcoinBridgeAction {
    fn as_bytes(&self) -> BridgeClientResult<Vec<u8>> {
        let mut bytes = Vec::new();
        let e = &self.eth_bridge_event;
        // Add message type
        bytes.push(TOKEN_TRANSFER_MESSAGE_TYPE);
        // Add message version
        bytes.push(TOKEN_TRANSFER_MESSAGE_VERSION);
        // Add nonce
        bytes.extend_from_slice(&e.nonce.to_be_bytes());
        // Add source chain id
        bytes.push(e.eth_chain_id);

        bytes.extend_from_slice(&self.as_payload_bytes()?);
        Ok(bytes)
    }

    fn as_payload_bytes(&self) -> BridgeClientResult<Vec<u8>> {
        let mut bytes = Vec::new();
        let e = &self.eth_bridge_event;

        // Add source address length
        bytes.push(EthAddress::len_bytes() as u8);
        // Add source address
        bytes.extend_from_slice(e.eth_address.as_bytes());
        // Add dest chain id
        bytes.push(e.starcoin_chain_id);
        // Add dest address length
        bytes.push(STARCOIN_ADDRESS_LENGTH as u8);
        // Add dest address
        bytes.extend_from_slice(e.starcoin_address.as_bytes());

        // Add token id
        bytes.push(e.token_id);

        // Add token amount
        bytes.extend_from_slice(&e.adjusted_amount.to_be_bytes());

        Ok(bytes)
    }
}

impl BridgeMessageEncoding for StarcoinToEthBridgeAction {
    fn as_bytes(&self) -> BridgeClientResult<Vec<u8>> {
        let mut bytes = Vec::new();
        let e = &self.starcoin_bridge_event;
        // Add message type
        bytes.push(TOKEN_TRANSFER_MESSAGE_TYPE);
        // Add message version
        bytes.push(TOKEN_TRANSFER_MESSAGE_VERSION);
        // Add nonce
        bytes.extend_from_slice(&e.nonce.to_be_bytes());
        // Add source chain id
        bytes.push(e.starcoin_chain_id);

        bytes.extend_from_slice(&self.as_payload_bytes()?);
        Ok(bytes)
    }

    fn as_payload_bytes(&self) -> BridgeClientResult<Vec<u8>> {
        let mut bytes = Vec::new();
        let e = &self.starcoin_bridge_event;

        // Add source address length
        bytes.push(STARCOIN_ADDRESS_LENGTH as u8);
        // Add source address
        bytes.extend_from_slice(e.starcoin_address.as_bytes());
        // Add dest chain id
        bytes.push(e.eth_chain_id);
        // Add dest address length
        bytes.push(EthAddress::len_bytes() as u8);
        // Add dest address
        bytes.extend_from_slice(e.eth_address.as_bytes());

        // Add token id
        bytes.push(e.token_id);

        // Add token amount
        bytes.extend_from_slice(&e.adjusted_amount.to_be_bytes());

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AuthSignature, BridgeChainId, EthToStarcoinTokenBridge, StarcoinAddress,
        StarcoinToEthTokenBridge,
    };
    use ethers::types::H256;
    use std::str::FromStr;

    #[test]
    fn test_encode_u64_little_endian() {
        assert_eq!(
            encode_u64(0x0102030405060708),
            vec![0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
        );
        assert_eq!(encode_u64(0), vec![0; 8]);
        assert_eq!(encode_u64(u64::MAX), vec![0xff; 8]);
    }

    #[test]
    fn test_encode_u8() {
        assert_eq!(encode_u8(0), vec![0]);
        assert_eq!(encode_u8(0xab), vec![0xab]);
    }

    #[test]
    fn test_encode_uleb128() {
        assert_eq!(encode_uleb128(0), vec![0x00]);
        assert_eq!(encode_uleb128(1), vec![0x01]);
        assert_eq!(encode_uleb128(127), vec![0x7f]);
        assert_eq!(encode_uleb128(128), vec![0x80, 0x01]);
        assert_eq!(encode_uleb128(300), vec![0xac, 0x02]);
        assert_eq!(encode_uleb128(16384), vec![0x80, 0x80, 0x01]);
    }

    #[test]
    fn test_encode_bytes_and_string() {
        assert_eq!(encode_bytes(&[]), vec![0x00]);
        assert_eq!(encode_bytes(&[0xaa, 0xbb]), vec![0x02, 0xaa, 0xbb]);
        // "Bridge" is 6 ascii bytes
        assert_eq!(
            encode_string("Bridge"),
            vec![0x06, b'B', b'r', b'i', b'd', b'g', b'e']
        );
    }

    #[test]
    fn test_hex_round_trip() {
        let bytes = vec![0x00, 0x01, 0xfe, 0xff];
        assert_eq!(hex_to_bytes(&bytes_to_hex(&bytes)).unwrap(), bytes);
        // normalization: uppercase and prefixed inputs come back lowercase
        assert_eq!(bytes_to_hex(&hex_to_bytes("0xABCD").unwrap()), "0xabcd");
        assert_eq!(bytes_to_hex(&hex_to_bytes("abcd").unwrap()), "0xabcd");
    }

    #[test]
    fn test_hex_to_bytes_rejects_malformed_input() {
        assert!(matches!(
            hex_to_bytes("0x123"),
            Err(BridgeClientError::Encoding(_))
        ));
        assert!(matches!(
            hex_to_bytes("zz"),
            Err(BridgeClientError::Encoding(_))
        ));
    }

    #[test]
    fn test_encode_address_left_pads_to_32_bytes() {
        let encoded = encode_address("0x01").unwrap();
        assert_eq!(encoded.len(), 32);
        assert_eq!(encoded[31], 0x01);
        assert!(encoded[..31].iter().all(|b| *b == 0));

        // 16-byte Starcoin module address gets 16 leading zero bytes
        let encoded = encode_address("0xf8eda27b31a0dcd9b6c06074d74a2c6c").unwrap();
        assert_eq!(encoded.len(), 32);
        assert!(encoded[..16].iter().all(|b| *b == 0));
        assert_eq!(&encoded[16..], hex::decode("f8eda27b31a0dcd9b6c06074d74a2c6c").unwrap());

        assert!(encode_address("0x123").is_err());
        assert!(encode_address("not-hex").is_err());
    }

    #[test]
    fn test_encode_script_function_call_layout() {
        let call = ScriptFunctionCall {
            module_address: "0x01".to_string(),
            module_name: "Bridge".to_string(),
            function_name: "claim_bridge_eth".to_string(),
            ty_args: vec![],
            args: vec![vec![0x02], vec![0x0a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]],
        };
        let encoded = encode_script_function_call(&call).unwrap();

        let mut expected = vec![SCRIPT_FUNCTION_PAYLOAD_TAG];
        expected.extend_from_slice(&encode_address("0x01").unwrap());
        expected.extend_from_slice(&encode_string("Bridge"));
        expected.extend_from_slice(&encode_string("claim_bridge_eth"));
        expected.push(0x00); // no type args
        expected.push(0x02); // two args
        expected.extend_from_slice(&encode_bytes(&[0x02]));
        expected.extend_from_slice(&encode_bytes(&[0x0a, 0, 0, 0, 0, 0, 0, 0]));
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_encode_script_function_call_is_deterministic() {
        let call = ScriptFunctionCall {
            module_address: "0xf8eda27b31a0dcd9b6c06074d74a2c6c".to_string(),
            module_name: "Bridge".to_string(),
            function_name: "approve_bridge_token_transfer_three".to_string(),
            ty_args: vec![],
            args: vec![vec![0x0c], vec![1, 2, 3]],
        };
        assert_eq!(
            encode_script_function_call(&call).unwrap(),
            encode_script_function_call(&call).unwrap()
        );
    }

    fn starcoin_to_eth_action() -> StarcoinToEthBridgeAction {
        StarcoinToEthBridgeAction {
            starcoin_tx_hash: "0xaa".to_string(),
            starcoin_event_index: 1,
            starcoin_bridge_event: StarcoinToEthTokenBridge {
                nonce: 10,
                starcoin_chain_id: BridgeChainId::StarcoinTestnet as u8,
                eth_chain_id: BridgeChainId::EthSepolia as u8,
                starcoin_address: StarcoinAddress::from_str("0x00000000000000000000000000000064")
                    .unwrap(),
                eth_address: EthAddress::from_str("0x00000000000000000000000000000000000000c8")
                    .unwrap(),
                token_id: 3,
                adjusted_amount: 12345,
            },
            auth_signature: AuthSignature {
                authority_pub_key: "02aa".to_string(),
                signature: "00".to_string(),
            },
        }
    }

    #[test]
    fn test_bridge_message_encoding_regression_starcoin_to_eth() {
        let encoded = starcoin_to_eth_action().as_bytes().unwrap();
        // msg_type(00) + version(01) + nonce(000000000000000a) +
        // source_chain(01) + addr_len(10=16) + starcoin_addr(16 bytes) +
        // dest_chain(0b) + addr_len(14=20) + eth_addr(20 bytes) + token_id(03) + amount(8 bytes)
        let expected_hex = "0001000000000000000a01100000000000000000000000000000006\
                            40b1400000000000000000000000000000000000000c803000000000\
                            0003039"
            .replace(char::is_whitespace, "");
        assert_eq!(hex::encode(&encoded), expected_hex);
        // fixed length: 1 + 1 + 8 + 1 + 1 + 16 + 1 + 1 + 20 + 1 + 8
        assert_eq!(encoded.len(), 59);
    }

    #[test]
    fn test_bridge_message_encoding_regression_eth_to_starcoin() {
        let action = EthToStarcoinBridgeAction {
            eth_tx_hash: H256::zero(),
            eth_event_index: 1,
            eth_bridge_event: EthToStarcoinTokenBridge {
                nonce: 10,
                eth_chain_id: BridgeChainId::EthSepolia as u8,
                starcoin_chain_id: BridgeChainId::StarcoinTestnet as u8,
                eth_address: EthAddress::from_str("0x00000000000000000000000000000000000000c8")
                    .unwrap(),
                starcoin_address: StarcoinAddress::from_str("0x00000000000000000000000000000064")
                    .unwrap(),
                token_id: 3,
                adjusted_amount: 12345,
            },
            auth_signature: AuthSignature {
                authority_pub_key: "02aa".to_string(),
                signature: "00".to_string(),
            },
        };
        let encoded = action.as_bytes().unwrap();
        // Address byte-lengths flip relative to the starcoin->eth direction:
        // source is the 20-byte eth address, dest the 16-byte starcoin address.
        let expected_hex = "0001000000000000000a0b1400000000000000000000000000000000\
                            000000c801100000000000000000000000000000006403000000000\
                            0003039"
            .replace(char::is_whitespace, "");
        assert_eq!(hex::encode(&encoded), expected_hex);
        assert_eq!(encoded.len(), 59);
    }

    #[test]
    fn test_payload_bytes_is_suffix_of_message_bytes() {
        let action = starcoin_to_eth_action();
        let message = action.as_bytes().unwrap();
        let payload = action.as_payload_bytes().unwrap();
        assert!(message.ends_with(&payload));
        // header is type + version + nonce + source chain id
        assert_eq!(message.len(), payload.len() + 11);
    }
}
