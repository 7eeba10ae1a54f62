// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Static, process-wide bridge client configuration.
//!
//! Loaded once per environment at startup and read-only thereafter. Switching
//! environments swaps the entire map; there is no runtime mutation.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_with::serde_as;
use url::Url;

use crate::error::{BridgeClientError, BridgeClientResult};
use crate::types::TransferDirection;

/// Config trait with YAML/JSON file loading, shared by everything that reads
/// configuration from disk.
pub trait Config: Serialize + DeserializeOwned {
    fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("yaml") | Some("yml")
        );
        let config: Self = if is_yaml {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        Ok(config)
    }

    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Deployment environment selecting the whole configuration map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BridgeEnvironment {
    Mainnet,
    Testnet,
    Custom,
}

/// One bridged token as the contracts know it.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct TokenConfig {
    /// Token id shared by both bridge contracts
    pub token_id: u8,
    /// Script function that claims this token on Starcoin
    pub claim_function: String,
    /// Script function that deposits this token from Starcoin, when the
    /// token can be sent from that side
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EthConfig {
    /// Rpc url for the Eth fullnode the wallet adapter talks to
    pub eth_rpc_url: String,
    /// The proxy address of the bridge contract
    pub eth_bridge_proxy_address: String,
    /// The expected BridgeChainId on the Eth side
    pub eth_bridge_chain_id: u8,
    /// The EVM network chain id (eth_chainId), used for wallet switching
    pub eth_network_id: u64,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StarcoinConfig {
    /// Rpc url for the Starcoin fullnode
    pub starcoin_rpc_url: String,
    /// The address the bridge Move module is deployed at
    pub starcoin_bridge_module_address: String,
    /// Module name holding the bridge entry functions
    #[serde(default = "default_bridge_module_name")]
    pub starcoin_bridge_module_name: String,
    /// The expected BridgeChainId on the Starcoin side
    pub starcoin_bridge_chain_id: u8,
}

fn default_bridge_module_name() -> String {
    "Bridge".to_string()
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexerConfig {
    /// Base url of the transfer indexer API
    pub base_url: String,
    /// Interval between procedure polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CommitteeConfig {
    /// One base url per validator; signatures are requested from
    /// `{url}/sign`
    pub signer_urls: Vec<String>,
    /// Overall window for collecting a signature quorum
    #[serde(default = "default_collection_timeout_ms")]
    pub collection_timeout_ms: u64,
}

fn default_collection_timeout_ms() -> u64 {
    10_000
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BridgeClientConfig {
    pub environment: BridgeEnvironment,
    pub indexer: IndexerConfig,
    pub committee: CommitteeConfig,
    pub eth: EthConfig,
    pub starcoin: StarcoinConfig,
    /// Token registry keyed by symbol
    pub tokens: BTreeMap<String, TokenConfig>,
}

impl Config for BridgeClientConfig {}

impl BridgeClientConfig {
    /// Check the config is internally consistent before anything else runs.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.indexer.base_url)
            .map_err(|e| anyhow!("invalid indexer base url {}: {e}", self.indexer.base_url))?;
        if self.committee.signer_urls.is_empty() {
            return Err(anyhow!("no committee signer urls configured"));
        }
        for url in &self.committee.signer_urls {
            Url::parse(url).map_err(|e| anyhow!("invalid signer url {url}: {e}"))?;
        }
        if self.tokens.is_empty() {
            return Err(anyhow!("token registry is empty"));
        }
        crate::types::BridgeChainId::try_from(self.eth.eth_bridge_chain_id)
            .map_err(|_| anyhow!("unknown eth bridge chain id {}", self.eth.eth_bridge_chain_id))?;
        crate::types::BridgeChainId::try_from(self.starcoin.starcoin_bridge_chain_id).map_err(
            |_| {
                anyhow!(
                    "unknown starcoin bridge chain id {}",
                    self.starcoin.starcoin_bridge_chain_id
                )
            },
        )?;
        Ok(())
    }

    /// Look up a token by its contract-level id.
    pub fn token_by_id(&self, token_id: u8) -> BridgeClientResult<(&str, &TokenConfig)> {
        self.tokens
            .iter()
            .find(|(_, t)| t.token_id == token_id)
            .map(|(symbol, t)| (symbol.as_str(), t))
            .ok_or(BridgeClientError::UnknownTokenId(token_id))
    }

    /// The bridge chain id of the chain the deposit originated on.
    pub fn source_chain_id(&self, direction: TransferDirection) -> u8 {
        match direction {
            TransferDirection::EthToStarcoin => self.eth.eth_bridge_chain_id,
            TransferDirection::StarcoinToEth => self.starcoin.starcoin_bridge_chain_id,
        }
    }

    /// The bridge chain id of the chain approve/claim are submitted on.
    pub fn destination_chain_id(&self, direction: TransferDirection) -> u8 {
        match direction {
            TransferDirection::EthToStarcoin => self.starcoin.starcoin_bridge_chain_id,
            TransferDirection::StarcoinToEth => self.eth.eth_bridge_chain_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
environment: testnet
indexer:
  base-url: "https://indexer.bridge.example.org"
committee:
  signer-urls:
    - "https://signer-0.bridge.example.org"
    - "https://signer-1.bridge.example.org"
    - "https://signer-2.bridge.example.org"
eth:
  eth-rpc-url: "https://sepolia.example.org"
  eth-bridge-proxy-address: "0x0c9bd5ff20cac3f98f4cc01d4a5f174aeb204d18"
  eth-bridge-chain-id: 11
  eth-network-id: 11155111
starcoin:
  starcoin-rpc-url: "https://barnard-seed.starcoin.org"
  starcoin-bridge-module-address: "0xf8eda27b31a0dcd9b6c06074d74a2c6c"
  starcoin-bridge-chain-id: 1
tokens:
  ETH:
    token-id: 2
    claim-function: "claim_bridge_eth"
  USDT:
    token-id: 4
    claim-function: "claim_bridge_usdt"
    send-function: "send_bridge_usdt"
    decimals: 6
"#
    }

    #[test]
    fn test_config_parses_kebab_case_yaml() {
        let config: BridgeClientConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.environment, BridgeEnvironment::Testnet);
        assert_eq!(config.indexer.poll_interval_ms, 3_000); // default applied
        assert_eq!(config.committee.signer_urls.len(), 3);
        assert_eq!(config.committee.collection_timeout_ms, 10_000);
        assert_eq!(config.starcoin.starcoin_bridge_module_name, "Bridge");
        assert_eq!(config.tokens["USDT"].decimals, Some(6));
        assert!(config.tokens["ETH"].send_function.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_token_lookup_by_id() {
        let config: BridgeClientConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        let (symbol, token) = config.token_by_id(4).unwrap();
        assert_eq!(symbol, "USDT");
        assert_eq!(token.claim_function, "claim_bridge_usdt");
        assert!(matches!(
            config.token_by_id(9),
            Err(BridgeClientError::UnknownTokenId(9))
        ));
    }

    #[test]
    fn test_direction_chain_id_selection() {
        let config: BridgeClientConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.source_chain_id(TransferDirection::EthToStarcoin), 11);
        assert_eq!(
            config.destination_chain_id(TransferDirection::EthToStarcoin),
            1
        );
        assert_eq!(
            config.source_chain_id(TransferDirection::StarcoinToEth),
            1
        );
        assert_eq!(
            config.destination_chain_id(TransferDirection::StarcoinToEth),
            11
        );
    }

    #[test]
    fn test_validate_rejects_broken_configs() {
        let mut config: BridgeClientConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        config.committee.signer_urls.clear();
        assert!(config.validate().is_err());

        let mut config: BridgeClientConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        config.indexer.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config: BridgeClientConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        config.eth.eth_bridge_chain_id = 7; // not in the chain id registry
        assert!(config.validate().is_err());
    }
}
