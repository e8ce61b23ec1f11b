use std::ops::Deref;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use tokio::time::Instant;
use tracing::{info, warn};

use super::serde_helpers::{field_as_string, u64_from_string_or_number};
use super::{ServiceClient, ServiceError};

const SERVICE: &str = "quote";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    #[serde(with = "field_as_string")]
    pub input_mint: Pubkey,
    #[serde(with = "field_as_string")]
    pub output_mint: Pubkey,
    pub amount: u64,
    pub slippage_bps: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotePayload {
    #[serde(with = "u64_from_string_or_number")]
    pub in_amount: u64,
    #[serde(with = "u64_from_string_or_number")]
    pub out_amount: u64,
    #[serde(default)]
    pub price_impact_pct: Option<Decimal>,
    /// 服务回显的滑点，存在时必须与请求一致。
    #[serde(default)]
    pub slippage_bps: Option<u16>,
    #[serde(default)]
    pub route_plan: Vec<Value>,
}

/// 报价结果：保留原始 JSON 以便原样转交构建服务。
#[derive(Debug, Clone)]
pub struct SwapQuote {
    pub raw: Value,
    pub payload: QuotePayload,
    pub fetched_at: Instant,
}

impl SwapQuote {
    pub fn try_from_value(raw: Value) -> Result<Self, serde_json::Error> {
        let payload = serde_json::from_value(raw.clone())?;
        Ok(Self {
            raw,
            payload,
            fetched_at: Instant::now(),
        })
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.age() > max_age
    }

    pub fn hops(&self) -> usize {
        self.payload.route_plan.len()
    }
}

impl Deref for SwapQuote {
    type Target = QuotePayload;

    fn deref(&self) -> &Self::Target {
        &self.payload
    }
}

#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(&self, request: &QuoteRequest) -> Result<SwapQuote, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct QuoteClient {
    service: ServiceClient,
    url: String,
    timeout: Duration,
    slow_warn_ms: u64,
}

impl QuoteClient {
    pub fn new(service: ServiceClient, url: String, timeout: Duration, slow_warn_ms: u64) -> Self {
        Self {
            service,
            url,
            timeout,
            slow_warn_ms,
        }
    }
}

#[async_trait]
impl QuoteSource for QuoteClient {
    async fn quote(&self, request: &QuoteRequest) -> Result<SwapQuote, ServiceError> {
        let response = self
            .service
            .get(SERVICE, &self.url, request, self.timeout)
            .await?;
        let quote = SwapQuote::try_from_value(response.data)
            .map_err(|err| ServiceError::schema(SERVICE, format!("解析报价失败: {err}")))?;

        if let Some(echoed) = quote.slippage_bps {
            if echoed != request.slippage_bps {
                return Err(ServiceError::schema(
                    SERVICE,
                    format!(
                        "报价滑点 {echoed} bps 与请求 {} bps 不一致",
                        request.slippage_bps
                    ),
                ));
            }
        }
        if quote.out_amount == 0 {
            return Err(ServiceError::Rejected {
                service: SERVICE,
                message: "报价输出数量为 0".to_string(),
            });
        }

        let elapsed_ms = response.elapsed.as_secs_f64() * 1_000.0;
        info!(
            target: "api::quote",
            input_mint = %request.input_mint,
            output_mint = %request.output_mint,
            in_amount = quote.in_amount,
            out_amount = quote.out_amount,
            price_impact_pct = ?quote.price_impact_pct,
            hops = quote.hops(),
            elapsed_ms = format_args!("{elapsed_ms:.3}"),
            "报价成功"
        );
        if elapsed_ms > self.slow_warn_ms as f64 {
            warn!(
                target: "api::quote",
                elapsed_ms = format_args!("{elapsed_ms:.3}"),
                slow_threshold_ms = self.slow_warn_ms,
                "报价耗时超过告警阈值"
            );
        }
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::api::tests::test_service_client;
    use crate::network::ApiMeter;
    use mockito::Matcher;
    use serde_json::json;

    const SOL: Pubkey = solana_sdk::pubkey!("So11111111111111111111111111111111111111112");
    const USDC: Pubkey = solana_sdk::pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");

    fn request() -> QuoteRequest {
        QuoteRequest {
            input_mint: SOL,
            output_mint: USDC,
            amount: 1_500_000_000,
            slippage_bps: 100,
        }
    }

    fn client(url: String) -> QuoteClient {
        QuoteClient::new(
            test_service_client(Arc::new(ApiMeter::unlimited())),
            url,
            Duration::from_secs(2),
            500,
        )
    }

    #[tokio::test]
    async fn sends_bps_unchanged_and_keeps_raw_route() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "success": true,
            "data": {
                "inAmount": "1500000000",
                "outAmount": 231450000,
                "priceImpactPct": "0.0012",
                "slippageBps": 100,
                "routePlan": [{"label": "pool-a"}]
            }
        });
        let mock = server
            .mock("GET", "/quote")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("inputMint".into(), SOL.to_string()),
                Matcher::UrlEncoded("outputMint".into(), USDC.to_string()),
                Matcher::UrlEncoded("amount".into(), "1500000000".into()),
                Matcher::UrlEncoded("slippageBps".into(), "100".into()),
            ]))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let quote = client(format!("{}/quote", server.url()))
            .quote(&request())
            .await
            .expect("quote");
        mock.assert_async().await;
        assert_eq!(quote.in_amount, 1_500_000_000);
        assert_eq!(quote.out_amount, 231_450_000);
        assert_eq!(quote.hops(), 1);
        assert_eq!(quote.raw["routePlan"][0]["label"], "pool-a");
        assert!(!quote.is_stale(Duration::from_secs(20)));
    }

    #[tokio::test]
    async fn success_false_is_a_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/quote")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"success":false,"error":"no route"}"#)
            .create_async()
            .await;
        let err = client(format!("{}/quote", server.url()))
            .quote(&request())
            .await
            .expect_err("rejected");
        assert!(matches!(err, ServiceError::Rejected { ref message, .. } if message == "no route"));
    }

    #[tokio::test]
    async fn mismatched_slippage_echo_is_schema_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/quote")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"success": true, "data": {"inAmount": 1, "outAmount": 2, "slippageBps": 1}})
                    .to_string(),
            )
            .create_async()
            .await;
        let err = client(format!("{}/quote", server.url()))
            .quote(&request())
            .await
            .expect_err("schema");
        assert!(matches!(err, ServiceError::Schema { .. }));
    }
}
