use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use tracing::{info, warn};

use super::serde_helpers::field_as_string;
use super::{ServiceClient, ServiceError};

const SERVICE: &str = "build";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub quote_response: Value,
    #[serde(with = "field_as_string")]
    pub user_public_key: Pubkey,
    pub wrap_and_unwrap_sol: bool,
    pub compute_unit_price_micro_lamports: u64,
    pub slippage_bps: u16,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildPayload {
    #[serde(default)]
    transactions: Vec<String>,
    #[serde(default)]
    swap_transaction: Option<String>,
}

impl BuildPayload {
    /// 单交易响应 `swapTransaction` 视为长度为 1 的序列。
    fn into_blobs(self) -> Vec<String> {
        let mut blobs = self.transactions;
        if blobs.is_empty() {
            blobs.extend(self.swap_transaction);
        }
        blobs.retain(|blob| !blob.trim().is_empty());
        blobs
    }
}

#[async_trait]
pub trait SwapBuilder: Send + Sync {
    /// 返回按执行顺序排列的 base64 未签名交易。
    async fn build(&self, request: &BuildRequest) -> Result<Vec<String>, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct BuildClient {
    service: ServiceClient,
    url: String,
    timeout: Duration,
    slow_warn_ms: u64,
}

impl BuildClient {
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
impl SwapBuilder for BuildClient {
    async fn build(&self, request: &BuildRequest) -> Result<Vec<String>, ServiceError> {
        let response = self
            .service
            .post(SERVICE, &self.url, request, self.timeout)
            .await?;
        let payload: BuildPayload = serde_json::from_value(response.data)
            .map_err(|err| ServiceError::schema(SERVICE, format!("解析构建响应失败: {err}")))?;
        let blobs = payload.into_blobs();
        if blobs.is_empty() {
            return Err(ServiceError::schema(SERVICE, "构建服务未返回任何交易"));
        }

        let elapsed_ms = response.elapsed.as_secs_f64() * 1_000.0;
        info!(
            target: "api::build",
            user = %request.user_public_key,
            legs = blobs.len(),
            wrap_and_unwrap_sol = request.wrap_and_unwrap_sol,
            compute_unit_price = request.compute_unit_price_micro_lamports,
            slippage_bps = request.slippage_bps,
            elapsed_ms = format_args!("{elapsed_ms:.3}"),
            "交易构建成功"
        );
        if elapsed_ms > self.slow_warn_ms as f64 {
            warn!(
                target: "api::build",
                elapsed_ms = format_args!("{elapsed_ms:.3}"),
                slow_threshold_ms = self.slow_warn_ms,
                "交易构建耗时超过告警阈值"
            );
        }
        Ok(blobs)
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

    fn client(url: String) -> BuildClient {
        BuildClient::new(
            test_service_client(Arc::new(ApiMeter::unlimited())),
            url,
            Duration::from_secs(2),
            1_000,
        )
    }

    fn request(user: Pubkey) -> BuildRequest {
        BuildRequest {
            quote_response: json!({"inAmount": "1", "outAmount": "2"}),
            user_public_key: user,
            wrap_and_unwrap_sol: true,
            compute_unit_price_micro_lamports: 20_000,
            slippage_bps: 100,
        }
    }

    #[tokio::test]
    async fn posts_camel_case_body_and_returns_ordered_blobs() {
        let user = Pubkey::new_unique();
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/swap")
            .match_body(Matcher::PartialJson(json!({
                "userPublicKey": user.to_string(),
                "wrapAndUnwrapSol": true,
                "computeUnitPriceMicroLamports": 20000,
                "slippageBps": 100,
                "quoteResponse": {"inAmount": "1"}
            })))
            .with_status(200)
            .with_body(r#"{"success":true,"data":{"transactions":["AQID","BAUG"]}}"#)
            .create_async()
            .await;
        let blobs = client(format!("{}/swap", server.url()))
            .build(&request(user))
            .await
            .expect("build");
        mock.assert_async().await;
        assert_eq!(blobs, vec!["AQID".to_string(), "BAUG".to_string()]);
    }

    #[tokio::test]
    async fn single_swap_transaction_field_is_accepted() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/swap")
            .with_status(200)
            .with_body(r#"{"success":true,"data":{"swapTransaction":"AQID"}}"#)
            .create_async()
            .await;
        let blobs = client(format!("{}/swap", server.url()))
            .build(&request(Pubkey::new_unique()))
            .await
            .expect("build");
        assert_eq!(blobs.len(), 1);
    }

    #[tokio::test]
    async fn empty_transaction_list_is_schema_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/swap")
            .with_status(200)
            .with_body(r#"{"success":true,"data":{"transactions":[]}}"#)
            .create_async()
            .await;
        let err = client(format!("{}/swap", server.url()))
            .build(&request(Pubkey::new_unique()))
            .await
            .expect_err("empty");
        assert!(matches!(err, ServiceError::Schema { .. }));
    }
}
