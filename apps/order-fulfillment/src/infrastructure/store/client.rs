//! REST client for the order store.
//!
//! Speaks the PostgREST dialect: filters are query parameters of the form
//! `column=op.value`, and the API key is sent both as `apikey` and as a
//! bearer token.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};

use crate::application::ports::{FetchError, OrderSink, OrderSource, UpdateError};
use crate::domain::order::OrderRecord;
use crate::infrastructure::metrics;

use super::wire::{DeliveredUpdate, decode_orders};

/// Connection settings for [`StoreClient`].
#[derive(Clone)]
pub struct StoreClientConfig {
    /// Base URL, without the `/rest/v1` suffix.
    pub base_url: String,
    /// API key.
    pub api_key: String,
    /// Table holding the orders.
    pub table: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl fmt::Debug for StoreClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("table", &self.table)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// HTTP adapter implementing both [`OrderSource`] and [`OrderSink`].
#[derive(Debug, Clone)]
pub struct StoreClient {
    client: Client,
    api_key: String,
    table_url: String,
}

impl StoreClient {
    /// Build a client from config.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built, for
    /// instance when the API key is not a valid header value.
    pub fn new(config: &StoreClientConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            table_url: format!(
                "{}/rest/v1/{}",
                config.base_url.trim_end_matches('/'),
                config.table
            ),
        })
    }

    /// Endpoint for the orders table.
    #[must_use]
    pub fn table_url(&self) -> &str {
        &self.table_url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

#[async_trait]
impl OrderSource for StoreClient {
    async fn fetch(&self) -> Result<Vec<OrderRecord>, FetchError> {
        let request = self.client.get(&self.table_url).query(&[
            ("status", "eq.paid"),
            ("delivered", "eq.false"),
            ("order", "created_at.asc"),
        ]);

        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if status != StatusCode::OK {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let decoded = decode_orders(&body)?;
        if !decoded.errors.is_empty() {
            for error in &decoded.errors {
                tracing::warn!(error = %error, "Dropping malformed order record");
            }
            metrics::record_parse_errors(decoded.errors.len());
        }

        tracing::debug!(count = decoded.orders.len(), "Fetched pending orders");
        Ok(decoded.orders)
    }
}

#[async_trait]
impl OrderSink for StoreClient {
    async fn acknowledge(&self, order_id: &str) -> Result<(), UpdateError> {
        let request = self
            .client
            .patch(&self.table_url)
            .query(&[("id", format!("eq.{order_id}"))])
            .json(&DeliveredUpdate::DELIVERED);

        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| UpdateError::Transport(e.to_string()))?;

        let status = response.status();
        if matches!(status, StatusCode::OK | StatusCode::NO_CONTENT) {
            return Ok(());
        }

        Err(UpdateError::Status {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }
}
