use levo_models::{ActionKind, MarketSignal, PositionSnapshot, SuggestedAmounts};
use serde_json::{json, Map, Value};

pub const QUESTION: &str =
    "Should I increase or decrease my leverage or maintain my current position?";

/// Build the prompt object sent to the decision oracle.
///
/// Each of the three actions is offered with its suggested amount; `hold`
/// is always offered with `"0"`.
pub fn build_prompt(
    snapshot: &PositionSnapshot,
    signal: &MarketSignal,
    suggested: &SuggestedAmounts,
) -> Result<Value, serde_json::Error> {
    let mut balances = Map::new();
    for balance in &snapshot.wallet_balances {
        let mut entry = Map::new();
        entry.insert(
            format!("{}_Amount", balance.symbol.to_ascii_uppercase()),
            Value::String(balance.amount.to_string()),
        );
        balances.insert(balance.symbol.to_ascii_lowercase(), Value::Object(entry));
    }

    let available_actions: Vec<Value> = ActionKind::ALL
        .iter()
        .map(|kind| {
            let amount = match kind {
                ActionKind::Leverage => suggested.leverage.to_string(),
                ActionKind::Deleverage => suggested.deleverage.to_string(),
                ActionKind::Hold => "0".to_string(),
            };
            json!({ "action": kind.as_str(), "amount": amount })
        })
        .collect();

    Ok(json!({
        "question": QUESTION,
        "currentPosition": {
            "data": serde_json::to_value(snapshot)?,
            "EOAAvailableTokenBalances": Value::Object(balances),
        },
        "marketVolatilityPrediction": serde_json::to_value(signal)?,
        "available_actions": available_actions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use chrono::Utc;
    use levo_models::{RiskLevel, WalletBalance};
    use rust_decimal_macros::dec;

    fn snapshot() -> PositionSnapshot {
        PositionSnapshot {
            account: Address::ZERO,
            collateral_value: dec!(1000),
            debt_value: dec!(420),
            available_borrows: dec!(330),
            loan_to_value: dec!(0.42),
            max_loan_to_value: dec!(0.75),
            liquidation_threshold: dec!(0.8),
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
        }
    }

    fn signal() -> MarketSignal {
        MarketSignal {
            volatility: dec!(0.0023),
            classification: "lowvol".to_string(),
            description: "low price fluctuations".to_string(),
            predicted_at: Utc::now(),
        }
    }

    #[test]
    fn prompt_offers_all_three_actions() {
        let prompt = build_prompt(&snapshot(), &signal(), &SuggestedAmounts::default()).unwrap();
        let actions = prompt["available_actions"].as_array().unwrap();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0], json!({"action": "leverage", "amount": "400000"}));
        assert_eq!(actions[1], json!({"action": "deleverage", "amount": "10000"}));
        assert_eq!(actions[2], json!({"action": "hold", "amount": "0"}));
    }

    #[test]
    fn prompt_carries_position_and_balances() {
        let prompt = build_prompt(&snapshot(), &signal(), &SuggestedAmounts::default()).unwrap();
        assert_eq!(prompt["question"], QUESTION);
        assert_eq!(prompt["currentPosition"]["data"]["health_factor"], "2.37");
        assert_eq!(
            prompt["currentPosition"]["EOAAvailableTokenBalances"]["usdc"]["USDC_Amount"],
            "20"
        );
        assert_eq!(prompt["marketVolatilityPrediction"]["classification"], "lowvol");
    }
}
