use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::try_join_all;
use levo_models::{AssetConfig, PositionSnapshot, ReservePosition, RiskLevel, WalletBalance};
use rust_decimal::Decimal;
use tracing::debug;

use crate::assets::AssetTable;
use crate::contracts::{IProtocolDataProvider, IERC20, IPool, ACCOUNT_DATA_FIELDS, RESERVE_DATA_FIELDS};
use crate::error::ChainReadError;
use crate::units::{decode_words, to_decimal, BPS_DECIMALS, RAY_DECIMALS, WAD_DECIMALS};

/// Source of position snapshots. Mocked in tests.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn read(&self, account: Address) -> Result<PositionSnapshot, ChainReadError>;
}

/// Reads account, reserve and wallet state straight from the lending contracts.
pub struct AlloyPositionReader {
    provider: DynProvider,
    pool: Address,
    data_provider: Address,
    assets: AssetTable,
    base_currency_decimals: u32,
}

impl AlloyPositionReader {
    pub fn new(
        provider: DynProvider,
        pool: Address,
        data_provider: Address,
        assets: AssetTable,
        base_currency_decimals: u8,
    ) -> Self {
        Self {
            provider,
            pool,
            data_provider,
            assets,
            base_currency_decimals: base_currency_decimals as u32,
        }
    }

    async fn call(&self, to: Address, input: Vec<u8>, what: &str) -> Result<Bytes, ChainReadError> {
        let request = TransactionRequest::default()
            .to(to)
            .input(Bytes::from(input).into());
        self.provider
            .call(request)
            .await
            .map_err(|e| ChainReadError::Rpc(format!("{what}: {e}")))
    }

    async fn read_reserve(
        &self,
        asset: &AssetConfig,
        account: Address,
    ) -> Result<ReservePosition, ChainReadError> {
        let input = IProtocolDataProvider::getUserReserveDataCall {
            asset: asset.address,
            user: account,
        }
        .abi_encode();
        let data = self.call(self.data_provider, input, "getUserReserveData").await?;
        let words = decode_words(&data, RESERVE_DATA_FIELDS, "getUserReserveData")?;
        reserve_from_words(asset, &words)
    }

    async fn read_balance(
        &self,
        asset: &AssetConfig,
        account: Address,
    ) -> Result<WalletBalance, ChainReadError> {
        let input = IERC20::balanceOfCall { account }.abi_encode();
        let data = self.call(asset.address, input, "balanceOf").await?;
        let words = decode_words(&data, 1, "balanceOf")?;
        wallet_balance_from_word(asset, words[0])
    }
}

#[async_trait]
impl PositionSource for AlloyPositionReader {
    async fn read(&self, account: Address) -> Result<PositionSnapshot, ChainReadError> {
        let input = IPool::getUserAccountDataCall { user: account }.abi_encode();
        let data = self.call(self.pool, input, "getUserAccountData").await?;
        let account_words = decode_words(&data, ACCOUNT_DATA_FIELDS, "getUserAccountData")?;

        let reserves = try_join_all(self.assets.iter().map(|a| self.read_reserve(a, account)));
        let balances = try_join_all(self.assets.iter().map(|a| self.read_balance(a, account)));
        let (reserves, wallet_balances) = futures::try_join!(reserves, balances)?;

        let snapshot = snapshot_from_words(
            account,
            &account_words,
            self.base_currency_decimals,
            reserves,
            wallet_balances,
        )?;
        debug!(
            account = %account,
            health_factor = %snapshot.health_factor,
            risk = ?snapshot.risk,
            "Position snapshot read"
        );
        Ok(snapshot)
    }
}

/// Assemble a snapshot from the six `getUserAccountData` words.
pub fn snapshot_from_words(
    account: Address,
    words: &[U256],
    base_currency_decimals: u32,
    reserves: Vec<ReservePosition>,
    wallet_balances: Vec<WalletBalance>,
) -> Result<PositionSnapshot, ChainReadError> {
    if words.len() < ACCOUNT_DATA_FIELDS {
        return Err(ChainReadError::Malformed(format!(
            "getUserAccountData: expected {ACCOUNT_DATA_FIELDS} fields, got {}",
            words.len()
        )));
    }

    let collateral_value = to_decimal(words[0], base_currency_decimals)?;
    let debt_value = to_decimal(words[1], base_currency_decimals)?;
    let available_borrows = to_decimal(words[2], base_currency_decimals)?;
    let liquidation_threshold = to_decimal(words[3], BPS_DECIMALS)?;
    let max_loan_to_value = to_decimal(words[4], BPS_DECIMALS)?;

    // The pool reports uint256 max as the health factor of a debt-free account.
    let health_factor = if words[5] == U256::MAX || debt_value.is_zero() {
        Decimal::MAX
    } else {
        to_decimal(words[5], WAD_DECIMALS)?
    };

    let loan_to_value = if collateral_value.is_zero() {
        Decimal::ZERO
    } else {
        (debt_value / collateral_value).round_dp(6)
    };

    Ok(PositionSnapshot {
        account,
        collateral_value,
        debt_value,
        available_borrows,
        loan_to_value,
        max_loan_to_value,
        liquidation_threshold,
        health_factor,
        risk: RiskLevel::from_health_factor(health_factor),
        reserves,
        wallet_balances,
        captured_at: Utc::now(),
    })
}

/// Build a reserve view from the nine `getUserReserveData` words.
pub fn reserve_from_words(
    asset: &AssetConfig,
    words: &[U256],
) -> Result<ReservePosition, ChainReadError> {
    if words.len() < RESERVE_DATA_FIELDS {
        return Err(ChainReadError::Malformed(format!(
            "getUserReserveData({}): expected {RESERVE_DATA_FIELDS} fields, got {}",
            asset.symbol,
            words.len()
        )));
    }
    let decimals = asset.decimals as u32;
    Ok(ReservePosition {
        symbol: asset.symbol.clone(),
        asset: asset.address,
        supplied: to_decimal(words[0], decimals)?,
        stable_debt: to_decimal(words[1], decimals)?,
        variable_debt: to_decimal(words[2], decimals)?,
        stable_borrow_rate: to_decimal(words[5], RAY_DECIMALS)?,
        supply_rate: to_decimal(words[6], RAY_DECIMALS)?,
        collateral_enabled: !words[8].is_zero(),
    })
}

pub fn wallet_balance_from_word(
    asset: &AssetConfig,
    raw: U256,
) -> Result<WalletBalance, ChainReadError> {
    Ok(WalletBalance {
        symbol: asset.symbol.clone(),
        asset: asset.address,
        raw,
        amount: to_decimal(raw, asset.decimals as u32)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use rust_decimal_macros::dec;

    const ACCOUNT: Address = address!("1111111111111111111111111111111111111111");

    fn usdc() -> AssetConfig {
        AssetConfig {
            symbol: "USDC".to_string(),
            address: address!("af88d065e77c8cC2239327C5EDb3A432268e5831"),
            decimals: 6,
        }
    }

    fn wad(units: u64, hundredths: u64) -> U256 {
        U256::from(units) * U256::from(10u64).pow(U256::from(18u64))
            + U256::from(hundredths) * U256::from(10u64).pow(U256::from(16u64))
    }

    fn account_words(collateral: u64, debt: u64, hf: U256) -> Vec<U256> {
        vec![
            U256::from(collateral),
            U256::from(debt),
            U256::from(5_000_000_000u64),
            U256::from(8_000u64),
            U256::from(7_500u64),
            hf,
        ]
    }

    #[test]
    fn snapshot_values_are_scaled() {
        // $1000 collateral, $600 debt, base currency 8 decimals.
        let words = account_words(100_000_000_000, 60_000_000_000, wad(1, 33));
        let snap = snapshot_from_words(ACCOUNT, &words, 8, vec![], vec![]).unwrap();

        assert_eq!(snap.collateral_value, dec!(1000));
        assert_eq!(snap.debt_value, dec!(600));
        assert_eq!(snap.available_borrows, dec!(50));
        assert_eq!(snap.liquidation_threshold, dec!(0.8));
        assert_eq!(snap.max_loan_to_value, dec!(0.75));
        assert_eq!(snap.loan_to_value, dec!(0.6));
        assert_eq!(snap.health_factor, dec!(1.33));
        assert_eq!(snap.risk, RiskLevel::Medium);
        assert!(snap.has_debt());
    }

    #[test]
    fn debt_free_account_has_max_health_factor() {
        let words = account_words(100_000_000_000, 0, U256::MAX);
        let snap = snapshot_from_words(ACCOUNT, &words, 8, vec![], vec![]).unwrap();
        assert_eq!(snap.health_factor, Decimal::MAX);
        assert_eq!(snap.risk, RiskLevel::Low);
        assert_eq!(snap.loan_to_value, Decimal::ZERO);
    }

    #[test]
    fn low_health_factor_is_high_risk() {
        let words = account_words(100_000_000_000, 90_000_000_000, wad(1, 5));
        let snap = snapshot_from_words(ACCOUNT, &words, 8, vec![], vec![]).unwrap();
        assert_eq!(snap.risk, RiskLevel::High);
    }

    #[test]
    fn short_account_data_is_malformed() {
        let words = vec![U256::ZERO; 5];
        assert!(matches!(
            snapshot_from_words(ACCOUNT, &words, 8, vec![], vec![]),
            Err(ChainReadError::Malformed(_))
        ));
    }

    #[test]
    fn reserve_fields_map_by_position() {
        let ray = U256::from(10u64).pow(U256::from(25u64));
        let words = vec![
            U256::from(20_000_000u64),
            U256::ZERO,
            U256::from(1_500_000u64),
            U256::ZERO,
            U256::ZERO,
            U256::from(5u64) * ray,
            U256::from(3u64) * ray,
            U256::from(1_700_000_000u64),
            U256::from(1u64),
        ];
        let reserve = reserve_from_words(&usdc(), &words).unwrap();
        assert_eq!(reserve.supplied, dec!(20));
        assert_eq!(reserve.variable_debt, dec!(1.5));
        assert_eq!(reserve.stable_borrow_rate, dec!(0.05));
        assert_eq!(reserve.supply_rate, dec!(0.03));
        assert!(reserve.collateral_enabled);
    }

    #[test]
    fn reserve_with_eight_fields_is_malformed() {
        let words = vec![U256::ZERO; 8];
        let err = reserve_from_words(&usdc(), &words).unwrap_err();
        assert!(err.to_string().contains("expected 9 fields, got 8"));
    }

    #[test]
    fn wallet_balance_uses_configured_decimals() {
        let balance = wallet_balance_from_word(&usdc(), U256::from(12_345_678u64)).unwrap();
        assert_eq!(balance.amount, dec!(12.345678));
        assert_eq!(balance.raw, U256::from(12_345_678u64));
    }
}
