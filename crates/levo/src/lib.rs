//! Levo - leveraged lending rebalancing orchestrator
//!
//! Runs one rebalancing cycle per session at a fixed interval: read the
//! lending position and a market signal, ask the advisory oracle for a
//! decision, and carry it out as an ordered bundle of on-chain transactions.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use levo::config::{load_config, signer_key};
//! use levo::notify::TracingSink;
//! use levo::session::SessionManager;
//! use levo::models::{Decision, SessionState};
//! ```

pub use levo_agents as agents;
pub use levo_chain as chain;
pub use levo_models as models;

pub mod config;
pub mod cycle;
pub mod error;
pub mod notify;
pub mod session;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use levo_agents::{HttpAdvisor, HttpSignalFetcher};
use levo_chain::{
    AlloyGateway, AlloyPositionReader, AssetTable, BundleBuilder, BundleExecutor,
    NonceSequencer, RouteClient,
};
use levo_models::LevoConfig;
use url::Url;

use crate::cycle::CyclePipeline;
use crate::error::ConfigError;
use crate::notify::NotificationSink;
use crate::session::SessionManager;

/// Wire every production component from configuration.
///
/// Returns the manager and the signing account; transactions are always sent
/// from that account, so sessions must be started for it.
pub fn build_session_manager(
    config: &LevoConfig,
    signer_key: &str,
    sink: Arc<dyn NotificationSink>,
) -> Result<(SessionManager, Address), ConfigError> {
    let signer = PrivateKeySigner::from_str(signer_key)
        .map_err(|e| ConfigError::Invalid(format!("Invalid signing key: {e}")))?;
    let account = signer.address();

    let rpc_url = Url::parse(&config.chain.rpc_url)
        .map_err(|e| ConfigError::Invalid(format!("chain.rpc_url: {e}")))?;
    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(rpc_url)
        .erased();

    let contracts = &config.contracts;
    let pool = contracts
        .pool
        .ok_or_else(|| ConfigError::Invalid("contracts.pool is not set".to_string()))?;
    let data_provider = contracts
        .data_provider
        .ok_or_else(|| ConfigError::Invalid("contracts.data_provider is not set".to_string()))?;

    let assets = AssetTable::new(config.assets.clone());
    let reader = AlloyPositionReader::new(
        provider.clone(),
        pool,
        data_provider,
        assets.clone(),
        config.chain.base_currency_decimals,
    );

    let router = RouteClient::new(&config.router, config.chain.chain_id)
        .map_err(|e| ConfigError::Invalid(format!("router: {e}")))?;
    let submit_timeout = Duration::from_secs(config.executor.submit_timeout_seconds);
    let gateway = AlloyGateway::new(
        provider,
        router,
        Arc::new(NonceSequencer::new(submit_timeout)),
        Duration::from_millis(config.executor.poll_interval_ms),
    );
    let executor = BundleExecutor::new(
        Arc::new(gateway),
        Duration::from_secs(config.executor.receipt_timeout_seconds),
    )
    .with_submit_timeout(submit_timeout);
    let builder = BundleBuilder::new(assets, contracts.clone(), config.strategy.clone());

    let signals = HttpSignalFetcher::new(&config.signals)
        .map_err(|e| ConfigError::Invalid(format!("signals: {e}")))?;
    let advisor = HttpAdvisor::new(&config.advisor);

    let pipeline = CyclePipeline::new(
        Arc::new(signals),
        Arc::new(reader),
        Arc::new(advisor),
        builder,
        executor,
        sink,
    );
    let manager = SessionManager::new(
        Arc::new(pipeline),
        Duration::from_secs(config.scheduler.interval_seconds),
    );
    Ok((manager, account))
}
