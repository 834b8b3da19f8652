use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::ticker::{validate_json_rows, TickerEntry};

/// Columns requested from the ticker table, in wire naming.
pub const TICKER_COLUMNS: &str = "id,symbol,name,change_pct,type,updated_at";

/// Why a refresh produced nothing usable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("query failure: {0}")]
    Query(String),
    #[error("empty result")]
    Empty,
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() || err.is_status() {
            SourceError::Query(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

impl From<sqlx::Error> for SourceError {
    fn from(err: sqlx::Error) -> Self {
        let transport = matches!(
            err,
            sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
        );
        if transport {
            SourceError::Transport(err.to_string())
        } else {
            SourceError::Query(err.to_string())
        }
    }
}

/// Anything the widget can pull ticker rows from.
///
/// Implementations return every valid row ordered by id. An empty vector is
/// a successful call; the widget decides what that means.
#[async_trait]
pub trait TickerSource: Send + Sync {
    async fn fetch_tickers(&self) -> Result<Vec<TickerEntry>, SourceError>;
}

/// PostgREST-style table endpoint, as served by a hosted Postgres.
pub struct RestSource {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl RestSource {
    pub fn new(base_url: &str, api_key: &str, table: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("FreshTicker/1.0 (Ticker Strip)")
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table),
            api_key: api_key.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TickerSource for RestSource {
    async fn fetch_tickers(&self) -> Result<Vec<TickerEntry>, SourceError> {
        debug!("Fetching tickers from {}", self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("select", TICKER_COLUMNS), ("order", "id.asc")])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Query(format!("{}: {}", status, body.trim())));
        }

        let bytes = response.bytes().await?;
        let values: Vec<serde_json::Value> = serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::Query(format!("malformed response: {}", e)))?;

        Ok(validate_json_rows(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/stock_tickers"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    mod rest_source_tests {
        use super::*;

        #[test]
        fn test_endpoint_trims_trailing_slash() {
            let source = RestSource::new("https://db.example.com/", "key", "stock_tickers").unwrap();
            assert_eq!(source.endpoint(), "https://db.example.com/rest/v1/stock_tickers");
        }

        #[tokio::test]
        async fn test_fetch_sends_query_and_auth() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/rest/v1/stock_tickers"))
                .and(query_param("select", TICKER_COLUMNS))
                .and(query_param("order", "id.asc"))
                .and(header("apikey", "secret"))
                .and(header("authorization", "Bearer secret"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                    {"id": 2, "symbol": "MSFT", "name": "Microsoft", "change_pct": -0.5, "type": "stock", "updated_at": null},
                    {"id": 1, "symbol": "NVDA", "name": "NVIDIA", "change_pct": 2.5, "type": "stock", "updated_at": "2026-02-17T12:00:00+00:00"}
                ])))
                .expect(1)
                .mount(&server)
                .await;

            let source = RestSource::new(&server.uri(), "secret", "stock_tickers").unwrap();
            let entries = source.fetch_tickers().await.unwrap();

            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0].symbol, "NVDA");
            assert_eq!(entries[1].symbol, "MSFT");
        }

        #[tokio::test]
        async fn test_fetch_empty_array() {
            let server = MockServer::start().await;
            mount(&server, ResponseTemplate::new(200).set_body_json(json!([]))).await;

            let source = RestSource::new(&server.uri(), "k", "stock_tickers").unwrap();
            assert!(source.fetch_tickers().await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_fetch_server_error_is_query_failure() {
            let server = MockServer::start().await;
            mount(
                &server,
                ResponseTemplate::new(500).set_body_string("relation does not exist"),
            )
            .await;

            let source = RestSource::new(&server.uri(), "k", "stock_tickers").unwrap();
            match source.fetch_tickers().await {
                Err(SourceError::Query(msg)) => assert!(msg.contains("relation does not exist")),
                other => panic!("expected query failure, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_fetch_non_array_body_is_query_failure() {
            let server = MockServer::start().await;
            mount(
                &server,
                ResponseTemplate::new(200).set_body_json(json!({"message": "nope"})),
            )
            .await;

            let source = RestSource::new(&server.uri(), "k", "stock_tickers").unwrap();
            assert!(matches!(
                source.fetch_tickers().await,
                Err(SourceError::Query(_))
            ));
        }

        #[tokio::test]
        async fn test_fetch_skips_malformed_rows() {
            let server = MockServer::start().await;
            mount(
                &server,
                ResponseTemplate::new(200).set_body_json(json!([
                    {"id": 1, "symbol": "NVDA", "change_pct": 2.5, "type": "stock"},
                    {"id": 2, "symbol": "MSFT", "change_pct": 1.0, "type": "bond"},
                    {"id": 3, "change_pct": 1.0, "type": "stock"}
                ])),
            )
            .await;

            let source = RestSource::new(&server.uri(), "k", "stock_tickers").unwrap();
            let entries = source.fetch_tickers().await.unwrap();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].id, 1);
        }

        #[tokio::test]
        async fn test_fetch_unreachable_is_transport_failure() {
            let server = MockServer::start().await;
            let uri = server.uri();
            drop(server);

            let source = RestSource::new(&uri, "k", "stock_tickers").unwrap();
            assert!(matches!(
                source.fetch_tickers().await,
                Err(SourceError::Transport(_))
            ));
        }
    }
}
