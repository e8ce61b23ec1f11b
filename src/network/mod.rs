mod error;
mod meter;

use std::time::Duration;

use reqwest::Proxy;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};

pub use error::{NetworkError, NetworkResult};
pub use meter::{ApiMeter, MeterSnapshot, QuotaExceeded};

const USER_AGENT: &str = concat!("swapflow/", env!("CARGO_PKG_VERSION"));

/// 所有外部 JSON 服务共用的 HTTP 客户端。
pub fn build_http_client(proxy: Option<&str>, connect_timeout: Duration) -> NetworkResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .connect_timeout(connect_timeout)
        .pool_idle_timeout(Duration::from_secs(30));

    if let Some(proxy_url) = proxy.map(str::trim).filter(|value| !value.is_empty()) {
        let proxy = Proxy::all(proxy_url).map_err(|source| NetworkError::InvalidProxy {
            proxy: proxy_url.to_string(),
            source,
        })?;
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(NetworkError::ClientBuild)
}
