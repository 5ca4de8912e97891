//! Preparation and submission of variant classifications to ClinVar.

use reqwest::header::HeaderMap;

use crate::common::http::{Response, RetryingClient};

pub mod accession;
pub mod conf;
pub mod prepare;
pub mod submit;

/// Client for the ClinVar submission API.
#[derive(Debug)]
pub struct ClinvarClient {
    config: conf::ClinvarConfig,
    headers: HeaderMap,
    client: RetryingClient,
}

impl ClinvarClient {
    pub fn new(config: conf::ClinvarConfig) -> Result<Self, anyhow::Error> {
        let headers = conf::make_headers(config.api_key.expose())?;
        let client = RetryingClient::new(config.retry)
            .map_err(|e| anyhow::anyhow!("could not set up ClinVar client: {}", e))?;
        Ok(Self {
            config,
            headers,
            client,
        })
    }

    pub fn config(&self) -> &conf::ClinvarConfig {
        &self.config
    }

    /// POST `body` as JSON to `url`.
    pub fn post_json<T: serde::Serialize>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<Response, anyhow::Error> {
        let body = serde_json::to_string(body)?;
        let response = self.client.send(|client| {
            client
                .post(url)
                .headers(self.headers.clone())
                .body(body.clone())
        })?;
        tracing::info!("POST {} -> {}: {}", url, response.status, &response.body);
        Ok(response)
    }

    /// GET `url`.
    pub fn get(&self, url: &str) -> Result<Response, anyhow::Error> {
        let response = self
            .client
            .send(|client| client.get(url).headers(self.headers.clone()))?;
        tracing::info!("GET {} -> {}: {}", url, response.status, &response.body);
        Ok(response)
    }
}
