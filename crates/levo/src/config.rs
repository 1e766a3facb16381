use std::path::Path;

use levo_models::{DeleverageStrategy, LevoConfig, LeverageStrategy};
use url::Url;

use crate::error::ConfigError;

/// Read the TOML file, apply environment overrides and validate.
pub fn load_config(path: &Path) -> Result<LevoConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let mut config: LevoConfig = toml::from_str(&raw)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Overrides: `ARBITRUM_RPC_URL`, `EXECUTION_INTERVAL`, `API_URL`, `API_URL_STATE`,
/// `ADVISOR_URL` and `ENSO_API_KEY`. Empty values are ignored.
pub fn apply_env_overrides(
    config: &mut LevoConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("ARBITRUM_RPC_URL") {
        config.chain.rpc_url = v;
    }
    if let Some(v) = get("EXECUTION_INTERVAL") {
        config.scheduler.interval_seconds = v.trim().parse().map_err(|_| {
            ConfigError::Invalid(format!("EXECUTION_INTERVAL is not a whole number: {v:?}"))
        })?;
    }
    if let Some(v) = get("API_URL") {
        config.signals.volatility_url = v;
    }
    if let Some(v) = get("API_URL_STATE") {
        config.signals.state_url = v;
    }
    if let Some(v) = get("ADVISOR_URL") {
        config.advisor.url = v;
    }
    if let Some(v) = get("ENSO_API_KEY") {
        config.router.api_key = Some(v);
    }
    Ok(())
}

/// Fail fast on anything a cycle would otherwise trip over later.
pub fn validate(config: &LevoConfig) -> Result<(), ConfigError> {
    check_url("chain.rpc_url", &config.chain.rpc_url, &["http", "https"])?;
    check_url("signals.volatility_url", &config.signals.volatility_url, &["http", "https"])?;
    check_url("signals.state_url", &config.signals.state_url, &["http", "https"])?;
    check_url("advisor.url", &config.advisor.url, &["http", "https"])?;
    check_url("router.base_url", &config.router.base_url, &["http", "https"])?;

    let nonzero = [
        ("scheduler.interval_seconds", config.scheduler.interval_seconds),
        ("advisor.timeout_seconds", config.advisor.timeout_seconds),
        ("signals.timeout_seconds", config.signals.timeout_seconds),
        ("router.timeout_seconds", config.router.timeout_seconds),
        ("executor.submit_timeout_seconds", config.executor.submit_timeout_seconds),
        ("executor.receipt_timeout_seconds", config.executor.receipt_timeout_seconds),
        ("executor.poll_interval_ms", config.executor.poll_interval_ms),
    ];
    for (name, value) in nonzero {
        if value == 0 {
            return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
        }
    }

    if config.contracts.pool.is_none() {
        return Err(ConfigError::Invalid("contracts.pool is not set".to_string()));
    }
    if config.contracts.data_provider.is_none() {
        return Err(ConfigError::Invalid("contracts.data_provider is not set".to_string()));
    }
    if config.contracts.router.is_none() {
        return Err(ConfigError::Invalid("contracts.router is not set".to_string()));
    }

    let strategy = &config.strategy;
    for (field, symbol) in [
        ("strategy.funding_asset", &strategy.funding_asset),
        ("strategy.collateral_asset", &strategy.collateral_asset),
        ("strategy.debt_asset", &strategy.debt_asset),
        ("strategy.repay_source_asset", &strategy.repay_source_asset),
    ] {
        if !config
            .assets
            .iter()
            .any(|a| a.symbol.eq_ignore_ascii_case(symbol))
        {
            return Err(ConfigError::Invalid(format!(
                "{field} refers to {symbol}, which is not in [[assets]]"
            )));
        }
    }

    let legs = [
        match strategy.leverage {
            LeverageStrategy::SupplyOnly => {
                Some(("funding_asset", &strategy.funding_asset, &strategy.collateral_asset))
            }
            LeverageStrategy::BorrowLoop => {
                Some(("debt_asset", &strategy.debt_asset, &strategy.collateral_asset))
            }
            LeverageStrategy::Direct => None,
        },
        match strategy.deleverage {
            DeleverageStrategy::RouteAndRepay => {
                Some(("repay_source_asset", &strategy.repay_source_asset, &strategy.debt_asset))
            }
            DeleverageStrategy::WithdrawFirst => {
                Some(("collateral_asset", &strategy.collateral_asset, &strategy.debt_asset))
            }
        },
    ];
    for (field, from, to) in legs.into_iter().flatten() {
        if from.eq_ignore_ascii_case(to) {
            return Err(ConfigError::Invalid(format!(
                "strategy.{field} {from} would be routed into itself; pick a different asset or strategy"
            )));
        }
    }

    for (i, a) in config.assets.iter().enumerate() {
        if config.assets[..i].iter().any(|b| b.address == a.address) {
            return Err(ConfigError::Invalid(format!(
                "asset {} is listed twice",
                a.address
            )));
        }
    }
    Ok(())
}

/// The signing key, read from the environment variable the config names.
pub fn signer_key(
    config: &LevoConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    let name = &config.chain.signer_key_env;
    lookup(name.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnv(name.clone()))
}

fn check_url(field: &str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::Invalid(format!("{field} is not a valid URL ({value:?}): {e}")))?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::Invalid(format!(
            "{field} must use one of {schemes:?}, got {}",
            url.scheme()
        )));
    }
    Ok(())
}
