use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Volatility prediction plus market-state classification from the prediction service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketSignal {
    pub volatility: Decimal,
    /// Short state label, e.g. `lowvol` or `highvol`.
    pub classification: String,
    pub description: String,
    pub predicted_at: DateTime<Utc>,
}

impl MarketSignal {
    pub fn is_low_volatility(&self) -> bool {
        self.classification.eq_ignore_ascii_case("lowvol")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn roundtrip_market_signal() {
        let signal = MarketSignal {
            volatility: dec!(0.00031),
            classification: "lowvol".to_string(),
            description: "ETH price in low price fluctuations enabling to take more risk."
                .to_string(),
            predicted_at: Utc::now(),
        };

        let json = serde_json::to_string(&signal).unwrap();
        let parsed: MarketSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(signal, parsed);
        assert!(parsed.is_low_volatility());
    }
}
