//! HTTP adapters for the services the order service depends on (cart,
//! product/inventory, payment, notification), plus in-memory stand-ins.
//!
//! Every adapter shares a [`GatewayClient`], which bounds each call with a
//! timeout and folds transport and status failures into
//! [`GatewayError`]: 404 is `NotFound`, other 4xx are `Validation`, 5xx and
//! timeouts are `Unavailable`. Adapters never retry.

use std::time::Duration;

use anyhow::Context;
use checkout_types::ports::gateways::GatewayError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};

pub mod cart;
pub mod inventory;
pub mod memory;
pub mod notification;
pub mod payment;

pub use cart::HttpCartStore;
pub use inventory::HttpInventoryGateway;
pub use notification::HttpNotificationGateway;
pub use payment::HttpPaymentGateway;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct GatewayClientBuilder {
    service: &'static str,
    base: Url,
    headers: HeaderMap,
    timeout: Duration,
    client: Option<reqwest::Client>,
}

#[derive(Clone)]
pub struct GatewayClient {
    service: &'static str,
    base: Url,
    timeout: Duration,
    client: reqwest::Client,
}

impl GatewayClient {
    pub fn new(service: &'static str, base_url: &str) -> anyhow::Result<Self> {
        Self::builder(service, base_url)?.build()
    }

    pub fn builder(service: &'static str, base_url: &str) -> anyhow::Result<GatewayClientBuilder> {
        let mut base = Url::parse(base_url).context("invalid base url")?;
        // Url::join drops the last path segment unless it ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(GatewayClientBuilder {
            service,
            base,
            headers: HeaderMap::new(),
            timeout: DEFAULT_TIMEOUT,
            client: None,
        })
    }

    fn url(&self, path: &str) -> Result<Url, GatewayError> {
        self.base
            .join(path)
            .map_err(|e| GatewayError::Validation(format!("bad url {path}: {e}")))
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, GatewayError> {
        Ok(self
            .client
            .request(method, self.url(path)?)
            .timeout(self.timeout))
    }

    /// Sends the request, mapping transport failures only.
    pub(crate) async fn execute(&self, req: RequestBuilder) -> Result<Response, GatewayError> {
        req.send().await.map_err(|e| {
            tracing::warn!(service = self.service, error = %e, "downstream call failed");
            transport_error(self.service, &e)
        })
    }

    /// Sends the request and turns any non-2xx status into a `GatewayError`.
    pub(crate) async fn send(&self, req: RequestBuilder) -> Result<Response, GatewayError> {
        let res = self.execute(req).await?;
        self.check(res).await
    }

    pub(crate) async fn check(&self, res: Response) -> Result<Response, GatewayError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        tracing::warn!(service = self.service, %status, body = %body, "downstream returned error status");
        Err(classify_status(status, format!("{} responded {status}: {body}", self.service)))
    }

    pub(crate) async fn json<T: serde::de::DeserializeOwned>(
        &self,
        res: Response,
    ) -> Result<T, GatewayError> {
        res.json()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("{}: invalid response: {e}", self.service)))
    }
}

pub fn classify_status(status: StatusCode, detail: String) -> GatewayError {
    if status == StatusCode::NOT_FOUND {
        GatewayError::NotFound(detail)
    } else if status.is_client_error() {
        GatewayError::Validation(detail)
    } else {
        GatewayError::Unavailable(detail)
    }
}

fn transport_error(service: &str, e: &reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Unavailable(format!("{service}: timed out"))
    } else {
        GatewayError::Unavailable(format!("{service}: {e}"))
    }
}

impl GatewayClientBuilder {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(
        mut self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let header_name =
            HeaderName::from_bytes(key.as_ref().as_bytes()).context("invalid header name")?;
        let header_value = HeaderValue::from_str(value.as_ref()).context("invalid header value")?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    pub fn with_reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> anyhow::Result<GatewayClient> {
        if let Some(client) = self.client {
            return Ok(GatewayClient {
                service: self.service,
                base: self.base,
                timeout: self.timeout,
                client,
            });
        }

        let mut builder = reqwest::Client::builder().timeout(self.timeout);
        if !self.headers.is_empty() {
            builder = builder.default_headers(self.headers);
        }
        let client = builder.build()?;
        Ok(GatewayClient {
            service: self.service,
            base: self.base,
            timeout: self.timeout,
            client,
        })
    }
}
