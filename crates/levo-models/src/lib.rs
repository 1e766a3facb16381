pub mod bundle;
pub mod config;
pub mod decision;
pub mod notification;
pub mod position;
pub mod session;
pub mod signal;

pub use bundle::{
    BundleExecutionResult, BundleStatus, FailureKind, StepAction, StepAmount, StepOutcome,
    StepReport, TransactionStep,
};
pub use config::{
    AdvisorConfig, AssetConfig, ChainConfig, ContractsConfig, DeleverageStrategy,
    ExecutorConfig, LevoConfig, LeverageStrategy, RouterConfig, SchedulerConfig, SignalsConfig,
    StrategyConfig, SuggestedAmounts,
};
pub use decision::{parse_amount, ActionKind, Advice, Decision};
pub use notification::{Channel, Notification};
pub use position::{PositionSnapshot, ReservePosition, RiskLevel, WalletBalance};
pub use session::{SessionId, SessionState};
pub use signal::MarketSignal;
