use std::time::Duration;

use alloy::primitives::{Address, Bytes, U256};
use levo_models::{parse_amount, RouterConfig};
use serde_json::Value;
use tracing::debug;

use crate::error::RouteError;

/// Executable route returned by the routing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteQuote {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    /// Quoted output before slippage; used when the receipt shows no transfer.
    pub amount_out: U256,
}

/// Client for the swap-routing API.
#[derive(Debug, Clone)]
pub struct RouteClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    chain_id: u64,
    slippage_bps: u32,
}

impl RouteClient {
    pub fn new(config: &RouterConfig, chain_id: u64) -> Result<Self, RouteError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            chain_id,
            slippage_bps: config.slippage_bps,
        })
    }

    pub async fn quote(
        &self,
        account: Address,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Result<RouteQuote, RouteError> {
        let url = format!("{}/api/v1/shortcuts/route", self.base_url);
        let account = account.to_string();
        let query = [
            ("chainId", self.chain_id.to_string()),
            ("fromAddress", account.clone()),
            ("receiver", account.clone()),
            ("spender", account),
            ("tokenIn", token_in.to_string()),
            ("tokenOut", token_out.to_string()),
            ("amountIn", amount_in.to_string()),
            ("slippage", self.slippage_bps.to_string()),
        ];

        let mut request = self.http.get(&url).query(&query);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RouteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        let quote = parse_route(&body)?;
        debug!(
            token_in = %token_in,
            token_out = %token_out,
            amount_in = %amount_in,
            amount_out = %quote.amount_out,
            "Route quoted"
        );
        Ok(quote)
    }
}

fn parse_route(body: &Value) -> Result<RouteQuote, RouteError> {
    let amount_out = body
        .get("amountOut")
        .and_then(parse_amount)
        .ok_or_else(|| RouteError::Invalid("missing or invalid amountOut".to_string()))?;

    let tx = body
        .get("tx")
        .ok_or_else(|| RouteError::Invalid("missing tx".to_string()))?;
    let to = tx
        .get("to")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Address>().ok())
        .ok_or_else(|| RouteError::Invalid("missing or invalid tx.to".to_string()))?;
    let data = tx
        .get("data")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Bytes>().ok())
        .ok_or_else(|| RouteError::Invalid("missing or invalid tx.data".to_string()))?;
    let value = match tx.get("value") {
        None | Some(Value::Null) => U256::ZERO,
        Some(v) => parse_amount(v)
            .ok_or_else(|| RouteError::Invalid(format!("invalid tx.value: {v}")))?,
    };

    Ok(RouteQuote {
        to,
        data,
        value,
        amount_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use httpmock::prelude::*;
    use serde_json::json;

    const ACCOUNT: Address = address!("f2873F92324E8EC98a82C47AFA0e728Bd8E41665");
    const USDC: Address = address!("af88d065e77c8cC2239327C5EDb3A432268e5831");
    const WETH: Address = address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1");

    fn client(base_url: String, api_key: Option<&str>) -> RouteClient {
        let config = RouterConfig {
            base_url,
            api_key: api_key.map(str::to_string),
            ..RouterConfig::default()
        };
        RouteClient::new(&config, 42161).unwrap()
    }

    #[test]
    fn parse_route_reads_tx_and_amount() {
        let quote = parse_route(&json!({
            "amountOut": "9950",
            "gas": "250000",
            "tx": {
                "to": "0x80EbA3855878739F4710233A8a19d89Bdd2ffB8E",
                "data": "0xb35d7e73",
                "value": "0"
            }
        }))
        .unwrap();
        assert_eq!(quote.amount_out, U256::from(9_950u64));
        assert_eq!(quote.to, address!("80EbA3855878739F4710233A8a19d89Bdd2ffB8E"));
        assert_eq!(quote.data.len(), 4);
        assert_eq!(quote.value, U256::ZERO);
    }

    #[test]
    fn parse_route_requires_amount_out() {
        let err = parse_route(&json!({"tx": {"to": "0x80EbA3855878739F4710233A8a19d89Bdd2ffB8E", "data": "0x"}}))
            .unwrap_err();
        assert!(matches!(err, RouteError::Invalid(_)));
    }

    #[tokio::test]
    async fn quote_sends_bearer_and_query() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/shortcuts/route")
                    .header("authorization", "Bearer test-key")
                    .query_param("chainId", "42161")
                    .query_param("amountIn", "10000")
                    .query_param("slippage", "300");
                then.status(200).json_body(json!({
                    "amountOut": "9950",
                    "tx": {
                        "to": "0x80EbA3855878739F4710233A8a19d89Bdd2ffB8E",
                        "data": "0xdeadbeef",
                        "value": "0"
                    }
                }));
            })
            .await;

        let quote = client(server.base_url(), Some("test-key"))
            .quote(ACCOUNT, USDC, WETH, U256::from(10_000u64))
            .await
            .unwrap();
        assert_eq!(quote.amount_out, U256::from(9_950u64));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn quote_surfaces_http_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/shortcuts/route");
                then.status(400).body("Could not find a route");
            })
            .await;

        let err = client(server.base_url(), None)
            .quote(ACCOUNT, USDC, WETH, U256::from(10_000u64))
            .await
            .unwrap_err();
        match err {
            RouteError::Status { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("route"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
