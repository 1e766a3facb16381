use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use levo_models::{MarketSignal, SignalsConfig};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::SignalFetchError;

/// Source of market signals. Mockable for testing.
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn fetch(&self) -> Result<MarketSignal, SignalFetchError>;
}

#[derive(Debug, Deserialize)]
struct VolatilityReading {
    #[serde(alias = "volatility_prediction", alias = "prediction")]
    volatility: Decimal,
    #[serde(default, alias = "timestamp")]
    predicted_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StateReading {
    #[serde(alias = "market_status", alias = "state")]
    classification: String,
    #[serde(
        default,
        alias = "market_status_description",
        alias = "classification_description"
    )]
    description: String,
    #[serde(default, alias = "timestamp")]
    predicted_at: Option<i64>,
}

/// Fetches the volatility prediction and the state classification
/// concurrently and merges them into one signal.
#[derive(Debug, Clone)]
pub struct HttpSignalFetcher {
    http: reqwest::Client,
    volatility_url: String,
    state_url: String,
}

impl HttpSignalFetcher {
    pub fn new(config: &SignalsConfig) -> Result<Self, SignalFetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            volatility_url: config.volatility_url.clone(),
            state_url: config.state_url.clone(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, SignalFetchError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SignalFetchError::Transport(format!("{url} returned {status}")));
        }
        let body: serde_json::Value = response.json().await?;
        decode_reading(body)
    }
}

#[async_trait]
impl SignalSource for HttpSignalFetcher {
    async fn fetch(&self) -> Result<MarketSignal, SignalFetchError> {
        let (volatility, state) = tokio::try_join!(
            self.get::<VolatilityReading>(&self.volatility_url),
            self.get::<StateReading>(&self.state_url),
        )?;
        let signal = merge(volatility, state);
        debug!(
            volatility = %signal.volatility,
            classification = %signal.classification,
            "Market signal fetched"
        );
        Ok(signal)
    }
}

/// Some deployments wrap the reading in a one-element array.
fn decode_reading<T: DeserializeOwned>(body: serde_json::Value) -> Result<T, SignalFetchError> {
    let body = match body {
        serde_json::Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    };
    serde_json::from_value(body).map_err(|e| SignalFetchError::Decode(e.to_string()))
}

fn merge(volatility: VolatilityReading, state: StateReading) -> MarketSignal {
    let predicted_at = volatility
        .predicted_at
        .or(state.predicted_at)
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(Utc::now);
    MarketSignal {
        volatility: volatility.volatility,
        classification: state.classification,
        description: state.description,
        predicted_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn decode_volatility_aliases() {
        let r: VolatilityReading =
            decode_reading(json!({"volatility": 0.0023, "timestamp": 1738320856264i64})).unwrap();
        assert_eq!(r.volatility, dec!(0.0023));
        assert_eq!(r.predicted_at, Some(1738320856264));

        let r: VolatilityReading =
            decode_reading(json!([{"volatility_prediction": "0.01"}])).unwrap();
        assert_eq!(r.volatility, dec!(0.01));
    }

    #[test]
    fn decode_state_reading() {
        let r: StateReading = decode_reading(json!({
            "predicted_at": 1738320856264i64,
            "predicted_at_utc": "2025-01-31T10:54:16.264362+00:00",
            "market_status": "lowvol",
            "market_status_description": "ETH price in low price fluctuations enabling to take more risk."
        }))
        .unwrap();
        assert_eq!(r.classification, "lowvol");
        assert!(r.description.starts_with("ETH price"));
    }

    #[test]
    fn missing_volatility_is_decode_error() {
        let r = decode_reading::<VolatilityReading>(json!({"symbol": "ETH"}));
        assert!(matches!(r, Err(SignalFetchError::Decode(_))));
    }

    #[test]
    fn merge_prefers_volatility_timestamp() {
        let signal = merge(
            VolatilityReading {
                volatility: dec!(0.002),
                predicted_at: Some(1_738_320_856_264),
            },
            StateReading {
                classification: "highvol".to_string(),
                description: String::new(),
                predicted_at: Some(0),
            },
        );
        assert_eq!(signal.predicted_at.timestamp_millis(), 1_738_320_856_264);
        assert!(!signal.is_low_volatility());
    }
}
