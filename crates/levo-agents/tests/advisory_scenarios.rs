//! HTTP-level tests for the signal fetcher and the advisor, against a local
//! mock server.

use std::time::Duration;

use alloy_primitives::U256;
use httpmock::prelude::*;
use levo_agents::test_support::sample_signal;
use levo_agents::{Advisor, AdvisoryError, HttpAdvisor, HttpSignalFetcher, SignalFetchError, SignalSource};
use levo_models::{AdvisorConfig, Decision, PositionSnapshot, RiskLevel, SignalsConfig, SuggestedAmounts};
use rust_decimal_macros::dec;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn snapshot() -> PositionSnapshot {
    PositionSnapshot {
        account: alloy_primitives::Address::ZERO,
        collateral_value: dec!(1000),
        debt_value: dec!(420),
        available_borrows: dec!(330),
        loan_to_value: dec!(0.42),
        max_loan_to_value: dec!(0.75),
        liquidation_threshold: dec!(0.8),
        health_factor: dec!(2.37),
        risk: RiskLevel::Low,
        reserves: vec![],
        wallet_balances: vec![],
        captured_at: chrono::Utc::now(),
    }
}

fn signals_config(server: &MockServer) -> SignalsConfig {
    SignalsConfig {
        volatility_url: server.url("/volatility_prediction?symbol=ETH&horizon=1min"),
        state_url: server.url("/state_recognize?symbol=ETH"),
        timeout_seconds: 5,
    }
}

fn advisor_config(server: &MockServer, timeout_seconds: u64) -> AdvisorConfig {
    AdvisorConfig {
        url: server.url("/Eliza/message"),
        timeout_seconds,
        settle_seconds: 0,
        user_id: "user".to_string(),
        user_name: "User".to_string(),
        suggested: SuggestedAmounts::default(),
    }
}

#[tokio::test]
async fn signal_merges_both_sources() {
    let server = MockServer::start_async().await;
    let vol = server
        .mock_async(|when, then| {
            when.method(GET).path("/volatility_prediction");
            then.status(200)
                .json_body(json!({"volatility": 0.0023, "timestamp": 1738320856264i64}));
        })
        .await;
    let state = server
        .mock_async(|when, then| {
            when.method(GET).path("/state_recognize");
            then.status(200).json_body(json!({
                "predicted_at": 1738320856264i64,
                "market_status": "lowvol",
                "market_status_description": "ETH price in low price fluctuations enabling to take more risk."
            }));
        })
        .await;

    let fetcher = HttpSignalFetcher::new(&signals_config(&server)).unwrap();
    let signal = fetcher.fetch().await.unwrap();

    assert_eq!(signal.volatility, dec!(0.0023));
    assert!(signal.is_low_volatility());
    assert_eq!(signal.predicted_at.timestamp_millis(), 1738320856264);
    vol.assert_async().await;
    state.assert_async().await;
}

#[tokio::test]
async fn signal_fails_when_either_source_fails() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/volatility_prediction");
            then.status(200).json_body(json!({"volatility": 0.0023}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/state_recognize");
            then.status(503).body("unavailable");
        })
        .await;

    let fetcher = HttpSignalFetcher::new(&signals_config(&server)).unwrap();
    let err = fetcher.fetch().await.unwrap_err();
    assert!(matches!(err, SignalFetchError::Transport(_)), "got {err}");
}

#[tokio::test]
async fn advisor_posts_prompt_and_parses_first_element() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/Eliza/message")
                .json_body_partial(r#"{"userId": "user", "userName": "User"}"#)
                .body_contains("available_actions")
                .body_contains("marketVolatilityPrediction");
            then.status(200).json_body(json!([
                {"user": "Eliza", "text": "Volatility is rising, trimming debt.", "action": "deleverage", "amount": "10000"},
                {"user": "Eliza", "text": "ignored"}
            ]));
        })
        .await;

    let advisor = HttpAdvisor::new(&advisor_config(&server, 10));
    let advice = advisor
        .decide(&snapshot(), &sample_signal(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        advice.decision,
        Decision::Deleverage {
            amount: U256::from(10_000u64)
        }
    );
    assert_eq!(
        advice.text.as_deref(),
        Some("Volatility is rising, trimming debt.")
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn advisor_without_action_is_invalid() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/Eliza/message");
            then.status(200)
                .json_body(json!([{"user": "Eliza", "text": "Hard to say right now."}]));
        })
        .await;

    let advisor = HttpAdvisor::new(&advisor_config(&server, 10));
    let err = advisor
        .decide(&snapshot(), &sample_signal(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AdvisoryError::InvalidResponse(_)), "got {err}");
}

#[tokio::test]
async fn advisor_server_error_is_transport() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/Eliza/message");
            then.status(500).body("agent crashed");
        })
        .await;

    let advisor = HttpAdvisor::new(&advisor_config(&server, 10));
    let err = advisor
        .decide(&snapshot(), &sample_signal(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AdvisoryError::Transport(_)), "got {err}");
}

#[tokio::test]
async fn advisor_times_out() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/Eliza/message");
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(json!([{"action": "hold", "amount": "0"}]));
        })
        .await;

    let advisor = HttpAdvisor::new(&advisor_config(&server, 1));
    let err = advisor
        .decide(&snapshot(), &sample_signal(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AdvisoryError::Timeout(1)), "got {err}");
}

#[tokio::test]
async fn advisor_stops_when_cancelled() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/Eliza/message");
            then.status(200)
                .delay(Duration::from_secs(5))
                .json_body(json!([{"action": "hold", "amount": "0"}]));
        })
        .await;

    let advisor = HttpAdvisor::new(&advisor_config(&server, 30));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = advisor
        .decide(&snapshot(), &sample_signal(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, AdvisoryError::Cancelled), "got {err}");
    assert!(started.elapsed() < Duration::from_secs(5));
}
