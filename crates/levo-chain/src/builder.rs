use alloy::primitives::{Address, U256};
use levo_models::bundle::protocols;
use levo_models::{
    ContractsConfig, Decision, DeleverageStrategy, LeverageStrategy, StepAction, StepAmount,
    StrategyConfig, TransactionStep,
};

use crate::assets::AssetTable;
use crate::error::BuildError;

/// Translates a decision into an ordered bundle of steps.
///
/// Every asset and contract a strategy needs is resolved before any step is
/// emitted, so configuration gaps surface here rather than mid-bundle.
#[derive(Debug, Clone)]
pub struct BundleBuilder {
    assets: AssetTable,
    contracts: ContractsConfig,
    strategy: StrategyConfig,
}

impl BundleBuilder {
    pub fn new(assets: AssetTable, contracts: ContractsConfig, strategy: StrategyConfig) -> Self {
        Self {
            assets,
            contracts,
            strategy,
        }
    }

    pub fn build(&self, decision: &Decision) -> Result<Vec<TransactionStep>, BuildError> {
        match *decision {
            Decision::Hold => Ok(Vec::new()),
            Decision::Leverage { amount } => {
                if amount.is_zero() {
                    return Err(BuildError::ZeroAmount("leverage"));
                }
                self.leverage(amount)
            }
            Decision::Deleverage { amount } => {
                if amount.is_zero() {
                    return Err(BuildError::ZeroAmount("deleverage"));
                }
                self.deleverage(amount)
            }
        }
    }

    fn leverage(&self, amount: U256) -> Result<Vec<TransactionStep>, BuildError> {
        let pool = self.pool()?;
        let strategy = &self.strategy;

        let steps = match strategy.leverage {
            LeverageStrategy::SupplyOnly => {
                let (funding, collateral) =
                    self.route_pair(&strategy.funding_asset, &strategy.collateral_asset)?;
                let router = self.router()?;
                vec![
                    approve(funding, router, StepAmount::Literal(amount)),
                    route(funding, collateral, router, StepAmount::Literal(amount)),
                    lending(StepAction::Deposit, collateral, pool, StepAmount::OutputOf(1)),
                ]
            }
            LeverageStrategy::Direct => {
                let collateral = self.asset(&strategy.collateral_asset)?;
                vec![
                    approve(collateral, pool, StepAmount::Literal(amount)),
                    lending(StepAction::Deposit, collateral, pool, StepAmount::Literal(amount)),
                ]
            }
            LeverageStrategy::BorrowLoop => {
                let (debt, collateral) =
                    self.route_pair(&strategy.debt_asset, &strategy.collateral_asset)?;
                let router = self.router()?;
                vec![
                    lending(StepAction::Borrow, debt, pool, StepAmount::Literal(amount)),
                    approve(debt, router, StepAmount::OutputOf(0)),
                    route(debt, collateral, router, StepAmount::OutputOf(0)),
                    lending(StepAction::Deposit, collateral, pool, StepAmount::OutputOf(2)),
                ]
            }
        };
        Ok(steps)
    }

    fn deleverage(&self, amount: U256) -> Result<Vec<TransactionStep>, BuildError> {
        let pool = self.pool()?;
        let router = self.router()?;
        let strategy = &self.strategy;

        let steps = match strategy.deleverage {
            DeleverageStrategy::RouteAndRepay => {
                let (source, debt) =
                    self.route_pair(&strategy.repay_source_asset, &strategy.debt_asset)?;
                vec![
                    route(source, debt, router, StepAmount::Literal(amount)),
                    lending(StepAction::Repay, debt, pool, StepAmount::OutputOf(0)),
                ]
            }
            DeleverageStrategy::WithdrawFirst => {
                let (collateral, debt) =
                    self.route_pair(&strategy.collateral_asset, &strategy.debt_asset)?;
                vec![
                    lending(StepAction::Redeem, collateral, pool, StepAmount::Literal(amount)),
                    route(collateral, debt, router, StepAmount::OutputOf(0)),
                    lending(StepAction::Repay, debt, pool, StepAmount::OutputOf(1)),
                ]
            }
        };
        Ok(steps)
    }

    /// Both ends of a route leg; they must be different assets.
    fn route_pair(&self, from: &str, to: &str) -> Result<(Address, Address), BuildError> {
        let from_address = self.asset(from)?;
        let to_address = self.asset(to)?;
        if from_address == to_address {
            return Err(BuildError::SameAssetRoute(from.to_string()));
        }
        Ok((from_address, to_address))
    }

    fn asset(&self, symbol: &str) -> Result<Address, BuildError> {
        self.assets
            .by_symbol(symbol)
            .map(|a| a.address)
            .ok_or_else(|| BuildError::MissingAsset(symbol.to_string()))
    }

    fn pool(&self) -> Result<Address, BuildError> {
        self.contracts.pool.ok_or(BuildError::MissingContract("pool"))
    }

    fn router(&self) -> Result<Address, BuildError> {
        self.contracts
            .router
            .ok_or(BuildError::MissingContract("router"))
    }
}

fn approve(token: Address, spender: Address, amount: StepAmount) -> TransactionStep {
    TransactionStep {
        protocol: protocols::ERC20.to_string(),
        action: StepAction::Approve,
        input_asset: token,
        output_asset: None,
        amount,
        target: spender,
    }
}

fn route(from: Address, to: Address, router: Address, amount: StepAmount) -> TransactionStep {
    TransactionStep {
        protocol: protocols::ROUTER.to_string(),
        action: StepAction::Route,
        input_asset: from,
        output_asset: Some(to),
        amount,
        target: router,
    }
}

fn lending(action: StepAction, asset: Address, pool: Address, amount: StepAmount) -> TransactionStep {
    TransactionStep {
        protocol: protocols::LENDING.to_string(),
        action,
        input_asset: asset,
        output_asset: None,
        amount,
        target: pool,
    }
}
