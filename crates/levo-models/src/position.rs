use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Liquidation risk bucket derived from the health factor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// HF below 1.1 is `High`, below 1.5 is `Medium`, anything else `Low`.
    pub fn from_health_factor(health_factor: Decimal) -> Self {
        if health_factor < Decimal::new(11, 1) {
            RiskLevel::High
        } else if health_factor < Decimal::new(15, 1) {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Per-reserve view of the account on the lending protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReservePosition {
    pub symbol: String,
    pub asset: Address,
    /// Current aToken balance, in whole asset units.
    pub supplied: Decimal,
    pub stable_debt: Decimal,
    pub variable_debt: Decimal,
    /// Supply rate (ray converted to a plain fraction).
    pub supply_rate: Decimal,
    pub stable_borrow_rate: Decimal,
    pub collateral_enabled: bool,
}

/// Token held directly by the account, outside the protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletBalance {
    pub symbol: String,
    pub asset: Address,
    /// Base units as reported by `balanceOf`.
    pub raw: U256,
    pub amount: Decimal,
}

/// Point-in-time state of a leveraged position. Captured once per cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionSnapshot {
    pub account: Address,
    /// Total collateral in the protocol's base currency.
    pub collateral_value: Decimal,
    /// Total debt in the protocol's base currency.
    pub debt_value: Decimal,
    pub available_borrows: Decimal,
    /// Current debt / collateral.
    pub loan_to_value: Decimal,
    /// Maximum LTV the protocol allows for this account.
    pub max_loan_to_value: Decimal,
    pub liquidation_threshold: Decimal,
    /// `Decimal::MAX` when the account carries no debt.
    pub health_factor: Decimal,
    pub risk: RiskLevel,
    pub reserves: Vec<ReservePosition>,
    pub wallet_balances: Vec<WalletBalance>,
    pub captured_at: DateTime<Utc>,
}

impl PositionSnapshot {
    pub fn has_debt(&self) -> bool {
        !self.debt_value.is_zero()
    }

    pub fn wallet_balance(&self, symbol: &str) -> Option<&WalletBalance> {
        self.wallet_balances.iter().find(|b| b.symbol == symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn risk_level_thresholds() {
        assert_eq!(RiskLevel::from_health_factor(dec!(1.05)), RiskLevel::High);
        assert_eq!(RiskLevel::from_health_factor(dec!(1.1)), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_health_factor(dec!(1.49)), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_health_factor(dec!(2.37)), RiskLevel::Low);
        assert_eq!(RiskLevel::from_health_factor(Decimal::MAX), RiskLevel::Low);
    }

    #[test]
    fn risk_level_serialization() {
        assert_eq!(serde_json::to_string(&RiskLevel::High).unwrap(), "\"HIGH\"");
    }

    #[test]
    fn wallet_balance_lookup() {
        let snapshot = PositionSnapshot {
            account: Address::ZERO,
            collateral_value: dec!(200),
            debt_value: dec!(85.63),
            available_borrows: dec!(50),
            loan_to_value: dec!(0.43),
            max_loan_to_value: dec!(0.8),
            liquidation_threshold: dec!(0.83),
            health_factor: dec!(2.37),
            risk: RiskLevel::Low,
            reserves: vec![],
            wallet_balances: vec![WalletBalance {
                symbol: "USDC".to_string(),
                asset: Address::ZERO,
                raw: U256::from(20_000_000u64),
                amount: dec!(20),
            }],
            captured_at: Utc::now(),
        };

        assert!(snapshot.has_debt());
        assert_eq!(snapshot.wallet_balance("USDC").unwrap().amount, dec!(20));
        assert!(snapshot.wallet_balance("WETH").is_none());
    }
}
