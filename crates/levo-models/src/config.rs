use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the rebalancing service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevoConfig {
    pub chain: ChainConfig,
    #[serde(default)]
    pub contracts: ContractsConfig,
    /// Asset address → decimals table. Decimals are never inferred from chain.
    #[serde(default)]
    pub assets: Vec<AssetConfig>,
    pub strategy: StrategyConfig,
    pub signals: SignalsConfig,
    pub advisor: AdvisorConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainConfig {
    /// JSON-RPC endpoint for reads and writes.
    pub rpc_url: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Name of the environment variable holding the signing key.
    #[serde(default = "default_signer_key_env")]
    pub signer_key_env: String,
    /// Decimals of the lending protocol's base currency (USD, 8 on Aave v3).
    #[serde(default = "default_base_currency_decimals")]
    pub base_currency_decimals: u8,
}

/// Contract addresses. `None` means not configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContractsConfig {
    /// Lending pool (account data, supply/borrow/repay/withdraw).
    pub pool: Option<Address>,
    /// Protocol data provider (per-reserve user data).
    pub data_provider: Option<Address>,
    /// Swap router; also the spender approved before route legs.
    pub router: Option<Address>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetConfig {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
}

/// How a `Leverage` decision is turned into steps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeverageStrategy {
    /// approve funding → route funding→collateral → deposit collateral.
    #[default]
    SupplyOnly,
    /// approve collateral for the pool → deposit collateral.
    Direct,
    /// borrow debt → approve debt → route debt→collateral → deposit collateral.
    BorrowLoop,
}

/// How a `Deleverage` decision is turned into steps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeleverageStrategy {
    /// route repay-source→debt → repay debt.
    #[default]
    RouteAndRepay,
    /// redeem collateral → route collateral→debt → repay debt.
    WithdrawFirst,
}

/// Which assets (by symbol in the asset table) each leg uses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyConfig {
    #[serde(default)]
    pub leverage: LeverageStrategy,
    #[serde(default)]
    pub deleverage: DeleverageStrategy,
    /// Wallet asset spent when leveraging.
    pub funding_asset: String,
    /// Asset supplied to the protocol as collateral.
    pub collateral_asset: String,
    /// Asset borrowed from and repaid to the protocol.
    pub debt_asset: String,
    /// Wallet asset routed into the debt asset when deleveraging.
    pub repay_source_asset: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalsConfig {
    pub volatility_url: String,
    pub state_url: String,
    #[serde(default = "default_signal_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdvisorConfig {
    /// Decision oracle message endpoint (HTTP POST).
    pub url: String,
    /// Upper bound on the POST exchange itself.
    #[serde(default = "default_advisor_timeout")]
    pub timeout_seconds: u64,
    /// Bounded settle-wait after submission before the reply is treated as final.
    #[serde(default = "default_settle_seconds")]
    pub settle_seconds: u64,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_user_name")]
    pub user_name: String,
    #[serde(default)]
    pub suggested: SuggestedAmounts,
}

/// Amounts offered to the oracle alongside each available action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SuggestedAmounts {
    pub leverage: U256,
    pub deleverage: U256,
}

impl Default for SuggestedAmounts {
    fn default() -> Self {
        Self {
            leverage: U256::from(400_000u64),
            deleverage: U256::from(10_000u64),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Routing API base URL.
    pub base_url: String,
    /// Bearer token; normally supplied via the environment.
    pub api_key: Option<String>,
    pub slippage_bps: u32,
    pub timeout_seconds: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.enso.finance".to_string(),
            api_key: None,
            slippage_bps: 300,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between the end of one cycle and the start of the next.
    pub interval_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Upper bound on encoding, nonce sync and send for one step.
    pub submit_timeout_seconds: u64,
    /// Upper bound on each receipt wait.
    pub receipt_timeout_seconds: u64,
    pub poll_interval_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            submit_timeout_seconds: 60,
            receipt_timeout_seconds: 120,
            poll_interval_ms: 2_000,
        }
    }
}

fn default_chain_id() -> u64 {
    42161
}
fn default_signer_key_env() -> String {
    "PRIVATE_KEY".to_string()
}
fn default_base_currency_decimals() -> u8 {
    8
}
fn default_signal_timeout() -> u64 {
    20
}
fn default_advisor_timeout() -> u64 {
    60
}
fn default_settle_seconds() -> u64 {
    15
}
fn default_user_id() -> String {
    "user".to_string()
}
fn default_user_name() -> String {
    "User".to_string()
}
