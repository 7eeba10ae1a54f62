// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Client-side settlement core for the Starcoin <> EVM token bridge.
//!
//! Given a deposit transaction hash and a direction, the [`settlement`]
//! driver polls the transfer indexer, collects validator signatures,
//! submits the approve transaction on the destination chain, waits out the
//! configured claim delay, and submits the claim — with idempotency guards
//! against redoing steps that already happened on-chain.

pub mod abi;
pub mod chain;
pub mod client;
pub mod config;
pub mod encoding;
pub mod error;
pub mod metrics;
pub mod settlement;
pub mod status;
pub mod ttl_cache;
pub mod types;

#[cfg(test)]
pub mod test_utils;

#[macro_export]
macro_rules! retry_with_max_elapsed_time {
    ($func:expr, $max_elapsed_time:expr) => {{
        // The following delay sequence (in secs) will be used, applied with jitter
        // 0.4, 0.8, 1.6, 3.2, 6.4, 12.8, 25.6, 30, 60, 120, 120 ...
        let backoff = backoff::ExponentialBackoff {
            initial_interval: std::time::Duration::from_millis(400),
            randomization_factor: 0.1,
            multiplier: 2.0,
            max_interval: std::time::Duration::from_secs(120),
            max_elapsed_time: Some($max_elapsed_time),
            ..Default::default()
        };
        backoff::future::retry(backoff, || {
            let fut = async {
                let result = $func.await;
                match result {
                    Ok(_) => {
                        return Ok(result);
                    }
                    Err(e) => {
                        // Every error is treated as transient so the caller
                        // retries until max_elapsed_time
                        tracing::debug!("Retrying due to error: {:?}", e);
                        return Err(backoff::Error::transient(e));
                    }
                }
            };
            std::boxed::Box::pin(fut)
        })
        .await
    }};
}
