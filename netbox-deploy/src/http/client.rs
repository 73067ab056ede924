//! Platform API client

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::errors::DeployerError;

/// Media type selecting version 3 of the platform API
pub const ACCEPT_V3: &str = "application/vnd.heroku+json; version=3";

/// Authenticated client for the platform REST API.
///
/// Built once per session from the access token and handed to every component
/// that talks to the platform.
pub struct PlatformClient {
    client: Client,
    base_url: String,
    token: SecretString,
}

impl PlatformClient {
    pub fn new(base_url: &str, token: SecretString) -> Result<Self, DeployerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("netbox-deploy/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        self.client
            .request(method, url)
            .header(header::ACCEPT, ACCEPT_V3)
            .bearer_auth(self.token.expose_secret())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, DeployerError> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let url = response.url().to_string();
            let body = response.text().await.unwrap_or_default();
            error!("Platform request to {} failed: {} - {}", url, status, body);
            return Err(DeployerError::HttpError { status, body });
        }

        Ok(response.json().await?)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, DeployerError> {
        self.send(self.request(Method::GET, path)).await
    }

    /// Make a GET request for a list, asking the platform to sort and page it
    /// through the `Range` header
    pub async fn get_range<T: DeserializeOwned>(
        &self,
        path: &str,
        range: &str,
    ) -> Result<Vec<T>, DeployerError> {
        let request = self.request(Method::GET, path).header(header::RANGE, range);
        self.send(request).await
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, DeployerError> {
        self.send(self.request(Method::POST, path).json(body)).await
    }
}
