//! 外部 JSON 服务客户端：报价、优先费档位与交易构建。
//!
//! 三个服务共用同一套信封格式 `{ "success": bool, "data": ..., "error": ... }`，
//! 非 2xx 或 `success:false` 一律视为该阶段的硬失败。请求路径统一经过
//! `ServiceClient::execute`，在那里完成计量、耗时统计、指标与日志。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{Level, debug, warn};

use crate::config::LoggingProfile;
use crate::monitoring::{LatencyMetadata, guard_with_level, prometheus_enabled};
use crate::network::{ApiMeter, QuotaExceeded};

pub mod build;
pub mod fees;
pub mod quote;
pub mod serde_helpers;

pub use build::{BuildClient, BuildRequest, SwapBuilder};
pub use fees::{FeeEstimator, FeeLevel, FeeSource, PriorityFeeTiers};
pub use quote::{QuoteClient, QuotePayload, QuoteRequest, QuoteSource, SwapQuote};

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("调用 {service} 服务失败: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} 服务请求超时: {endpoint}")]
    Timeout {
        service: &'static str,
        endpoint: String,
    },
    #[error("{service} 服务 {endpoint} 返回状态 {status}: {body}")]
    ApiStatus {
        service: &'static str,
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("{service} 服务拒绝请求: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },
    #[error("{service} 服务响应格式不符合预期: {message}")]
    Schema {
        service: &'static str,
        message: String,
    },
    #[error(transparent)]
    QuotaExceeded(#[from] QuotaExceeded),
}

impl ServiceError {
    pub(crate) fn schema(service: &'static str, message: impl Into<String>) -> Self {
        Self::Schema {
            service,
            message: message.into(),
        }
    }

    /// 展开整条 source 链，供交易记录与日志使用。
    pub fn describe(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(inner) = source {
            let text = inner.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = inner.source();
        }
        message
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

fn render_envelope_error(error: Option<&Value>) -> String {
    match error {
        Some(Value::String(message)) => message.clone(),
        Some(Value::Object(map)) => {
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(map.clone()).to_string());
            match map.get("code") {
                Some(Value::String(code)) => format!("[{code}] {message}"),
                Some(code) => format!("[{code}] {message}"),
                None => message,
            }
        }
        Some(other) => other.to_string(),
        None => "success=false".to_string(),
    }
}

#[derive(Debug)]
pub(crate) struct ServiceResponse {
    pub data: Value,
    pub elapsed: Duration,
}

#[derive(Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    meter: Arc<ApiMeter>,
    api_key: Option<HeaderValue>,
    log_profile: LoggingProfile,
}

impl fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClient")
            .field("api_key_set", &self.api_key.is_some())
            .field("log_profile", &self.log_profile)
            .field("meter", &self.meter.snapshot())
            .finish()
    }
}

impl ServiceClient {
    pub fn new(
        http: reqwest::Client,
        meter: Arc<ApiMeter>,
        api_key: Option<&str>,
        log_profile: LoggingProfile,
    ) -> Self {
        let api_key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .and_then(|key| HeaderValue::from_str(key).ok())
            .map(|mut value| {
                value.set_sensitive(true);
                value
            });
        Self {
            http,
            meter,
            api_key,
            log_profile,
        }
    }

    pub fn meter(&self) -> &Arc<ApiMeter> {
        &self.meter
    }

    pub(crate) async fn get<Q>(
        &self,
        service: &'static str,
        url: &str,
        query: &Q,
        timeout: Duration,
    ) -> Result<ServiceResponse, ServiceError>
    where
        Q: Serialize + ?Sized,
    {
        let request = self.http.get(url).timeout(timeout).query(query);
        self.execute(service, url, request).await
    }

    pub(crate) async fn post<B>(
        &self,
        service: &'static str,
        url: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<ServiceResponse, ServiceError>
    where
        B: Serialize + ?Sized,
    {
        let request = self.http.post(url).timeout(timeout).json(body);
        self.execute(service, url, request).await
    }

    async fn execute(
        &self,
        service: &'static str,
        url: &str,
        mut request: RequestBuilder,
    ) -> Result<ServiceResponse, ServiceError> {
        self.meter.acquire(service)?;

        if let Some(key) = &self.api_key {
            request = request.header(HeaderName::from_static(API_KEY_HEADER), key.clone());
        }

        let latency_level = if self.log_profile.is_verbose() {
            Level::INFO
        } else {
            Level::DEBUG
        };
        let guard = guard_with_level(
            format!("api.{service}"),
            latency_level,
            LatencyMetadata::stage(service, url),
        );

        let response = request.send().await.map_err(|source| {
            record_request_metrics(service, "transport_error", None, None);
            if source.is_timeout() {
                ServiceError::Timeout {
                    service,
                    endpoint: url.to_string(),
                }
            } else {
                ServiceError::Http { service, source }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|err| format!("<body decode failed: {err}>"));
            let body = summarize_error_body(body_text);
            warn!(
                target: "api::client",
                service,
                status = status.as_u16(),
                endpoint = %url,
                body = %body,
                "服务返回非 2xx 状态"
            );
            record_request_metrics(service, "http_error", None, Some(status));
            return Err(ServiceError::ApiStatus {
                service,
                endpoint: url.to_string(),
                status,
                body,
            });
        }

        let value: Value = response.json().await.map_err(|err| {
            record_request_metrics(service, "decode_error", None, Some(status));
            if err.is_timeout() {
                ServiceError::Timeout {
                    service,
                    endpoint: url.to_string(),
                }
            } else {
                ServiceError::schema(service, format!("响应体不是合法 JSON: {err}"))
            }
        })?;

        let envelope: ApiEnvelope = serde_json::from_value(value).map_err(|err| {
            record_request_metrics(service, "schema_error", None, Some(status));
            ServiceError::schema(service, format!("响应信封解析失败: {err}"))
        })?;

        if !envelope.success {
            let message = render_envelope_error(envelope.error.as_ref());
            warn!(
                target: "api::client",
                service,
                endpoint = %url,
                message = %message,
                "服务返回 success=false"
            );
            record_request_metrics(service, "rejected", None, Some(status));
            return Err(ServiceError::Rejected { service, message });
        }

        let data = envelope.data.filter(|data| !data.is_null()).ok_or_else(|| {
            record_request_metrics(service, "schema_error", None, Some(status));
            ServiceError::schema(service, "响应缺少 data 字段")
        })?;

        let elapsed = guard.finish();
        record_request_metrics(
            service,
            "success",
            Some(elapsed.as_secs_f64() * 1_000.0),
            Some(status),
        );
        debug!(
            target: "api::client",
            service,
            endpoint = %url,
            elapsed_ms = format_args!("{:.3}", elapsed.as_secs_f64() * 1_000.0),
            "服务响应成功"
        );
        Ok(ServiceResponse { data, elapsed })
    }
}

fn record_request_metrics(
    service: &'static str,
    result: &'static str,
    elapsed_ms: Option<f64>,
    status: Option<StatusCode>,
) {
    if !prometheus_enabled() {
        return;
    }
    let status_label = status
        .map(|code| code.as_u16().to_string())
        .unwrap_or_else(|| "none".to_string());
    counter!(
        "swapflow_api_requests_total",
        "service" => service,
        "result" => result,
        "status" => status_label
    )
    .increment(1);
    if let Some(ms) = elapsed_ms {
        histogram!(
            "swapflow_api_latency_ms",
            "service" => service,
            "result" => result
        )
        .record(ms);
    }
}

pub(crate) fn summarize_error_body(body: String) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "(empty response body)".to_string();
    }
    let mut single_line = trimmed.replace(['\n', '\r'], " ");
    const MAX_LEN: usize = 512;
    if single_line.len() > MAX_LEN {
        let mut cut = MAX_LEN;
        while !single_line.is_char_boundary(cut) {
            cut -= 1;
        }
        single_line.truncate(cut);
        single_line.push('…');
    }
    single_line
}
