// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Command-line driver for the bridge client: track a transfer through
//! settlement, list transfers for an address, query fee estimates, and build
//! deposit payloads. Submission itself needs a connected wallet and lives in
//! the embedding application.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use ethers::types::U256;
use tracing_subscriber::EnvFilter;

use starcoin_bridge_client::abi;
use starcoin_bridge_client::client::indexer::IndexerClient;
use starcoin_bridge_client::client::TransferIndexerApi;
use starcoin_bridge_client::config::{BridgeClientConfig, Config};
use starcoin_bridge_client::encoding::{encode_script_function_call, ScriptFunctionCall};
use starcoin_bridge_client::status::{derive_phase, BridgePhase};
use starcoin_bridge_client::types::{StarcoinAddress, TransferDirection, TransferListQuery};

#[derive(Parser)]
#[clap(name = "bridge-client", rename_all = "kebab-case")]
struct Cli {
    /// Path to the bridge client config (yaml or json)
    #[clap(long, global = true, default_value = "bridge-client.yaml")]
    config: PathBuf,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[clap(rename_all = "kebab-case")]
enum Commands {
    /// Poll the indexer and print the transfer's phase until it is delivered
    Track {
        #[clap(long, value_enum)]
        direction: TransferDirection,
        #[clap(long)]
        txn_hash: String,
    },
    /// List transfers for an address
    List {
        #[clap(long)]
        address: String,
        #[clap(long, default_value_t = 1)]
        page: u32,
        #[clap(long, default_value_t = 20)]
        page_size: u32,
        #[clap(long)]
        status: Option<String>,
    },
    /// Print the indexer's current fee estimates for a direction
    EstimateFees {
        #[clap(long, value_enum)]
        direction: TransferDirection,
    },
    /// Build the deposit payload for a transfer without submitting it
    DepositPayload {
        #[clap(long, value_enum)]
        direction: TransferDirection,
        /// Token symbol from the config registry
        #[clap(long)]
        token: String,
        /// Amount in the token's smallest unit
        #[clap(long)]
        amount: u128,
        /// Recipient address on the destination chain (hex)
        #[clap(long)]
        recipient: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = BridgeClientConfig::load(&cli.config)
        .with_context(|| format!("failed to load config from {:?}", cli.config))?;
    config.validate()?;

    match cli.command {
        Commands::Track {
            direction,
            txn_hash,
        } => track(&config, direction, &txn_hash).await,
        Commands::List {
            address,
            page,
            page_size,
            status,
        } => list(&config, address, page, page_size, status).await,
        Commands::EstimateFees { direction } => estimate_fees(&config, direction).await,
        Commands::DepositPayload {
            direction,
            token,
            amount,
            recipient,
        } => deposit_payload(&config, direction, &token, amount, &recipient),
    }
}

async fn track(
    config: &BridgeClientConfig,
    direction: TransferDirection,
    txn_hash: &str,
) -> Result<()> {
    let indexer = IndexerClient::new(config.indexer.base_url.clone());
    let poll_interval = Duration::from_millis(config.indexer.poll_interval_ms);
    let mut last_phase: Option<BridgePhase> = None;

    println!("tracking {direction} transfer {txn_hash}");
    loop {
        match indexer.transfer_by_deposit(txn_hash).await {
            Ok(response) => {
                let procedure = response.as_ref().map(|r| &r.procedure);
                let phase = derive_phase(procedure);
                if last_phase != Some(phase) {
                    println!("phase: {phase}");
                    last_phase = Some(phase);
                }
                if let Some(response) = &response {
                    if response.procedure.is_complete {
                        println!("transfer delivered");
                        return Ok(());
                    }
                    if phase == BridgePhase::Claim && response.claim_delay_seconds > 0 {
                        println!(
                            "claim delay configured: {}s after approval",
                            response.claim_delay_seconds
                        );
                    }
                }
            }
            Err(e) => tracing::warn!("poll failed, retrying: {e}"),
        }
        tokio::time::sleep(poll_interval).await;
    }
}

async fn list(
    config: &BridgeClientConfig,
    address: String,
    page: u32,
    page_size: u32,
    status: Option<String>,
) -> Result<()> {
    let indexer = IndexerClient::new(config.indexer.base_url.clone());
    let response = indexer
        .list_transfers(&TransferListQuery {
            address: Some(address),
            status,
            page: Some(page),
            page_size: Some(page_size),
            ..Default::default()
        })
        .await?;

    for transfer in &response.transfers {
        let phase = derive_phase(Some(transfer));
        println!(
            "chain {} nonce {}: {} ({} -> {}) [{phase}]",
            transfer.source_chain_id,
            transfer.nonce,
            transfer.deposit.amount,
            transfer.deposit.sender_address,
            transfer.deposit.recipient_address,
        );
    }
    println!(
        "page {}/{} ({} transfers total)",
        response.pagination.page, response.pagination.total_pages, response.pagination.total_count
    );
    Ok(())
}

async fn estimate_fees(config: &BridgeClientConfig, direction: TransferDirection) -> Result<()> {
    let indexer = IndexerClient::new(config.indexer.base_url.clone());
    let estimate = indexer.estimate_fees(direction).await?;
    println!("{}", serde_json::to_string_pretty(&estimate)?);
    Ok(())
}

fn deposit_payload(
    config: &BridgeClientConfig,
    direction: TransferDirection,
    token_symbol: &str,
    amount: u128,
    recipient: &str,
) -> Result<()> {
    let token = config
        .tokens
        .get(token_symbol)
        .ok_or_else(|| anyhow!("token {token_symbol} is not in the configured registry"))?;

    match direction {
        TransferDirection::EthToStarcoin => {
            // Deposits on the EVM side land in the bridge proxy contract
            let recipient = StarcoinAddress::from_str(recipient)
                .map_err(|e| anyhow!("recipient must be a starcoin address: {e}"))?;
            let target_chain = config.starcoin.starcoin_bridge_chain_id;
            let calldata = if token_symbol == "ETH" {
                abi::bridge_eth_calldata(recipient.as_bytes(), target_chain)
            } else {
                abi::bridge_erc20_calldata(
                    token.token_id,
                    U256::from(amount),
                    recipient.as_bytes(),
                    target_chain,
                )
            };
            println!("to: {}", config.eth.eth_bridge_proxy_address);
            println!("calldata: {calldata}");
        }
        TransferDirection::StarcoinToEth => {
            let send_function = token.send_function.as_deref().ok_or_else(|| {
                anyhow!("token {token_symbol} cannot be sent from the starcoin side")
            })?;
            let recipient_bytes = hex::decode(recipient.trim_start_matches("0x"))
                .map_err(|e| anyhow!("recipient must be hex: {e}"))?;
            let call = ScriptFunctionCall {
                module_address: config.starcoin.starcoin_bridge_module_address.clone(),
                module_name: config.starcoin.starcoin_bridge_module_name.clone(),
                function_name: send_function.to_string(),
                ty_args: vec![],
                args: vec![
                    bcs::to_bytes(&config.eth.eth_bridge_chain_id)?,
                    bcs::to_bytes(&recipient_bytes)?,
                    bcs::to_bytes(&amount)?,
                ],
            };
            let payload = encode_script_function_call(&call)?;
            println!("payload: 0x{}", hex::encode(payload));
        }
    }
    Ok(())
}
