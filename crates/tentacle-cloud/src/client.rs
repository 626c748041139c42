//! DigitalOcean API client
//!
//! Implements [`FleetProvider`] over the v2 droplet endpoints using a bearer
//! token read from the local token file.

use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tentacle_core::settings::read_token;
use tentacle_core::{FleetProvider, FleetResult, Machine, MachineId, MachineSpec, Settings};

use crate::droplet::{
    ApiErrorBody, CreateDropletRequest, CreateDropletResponse, Droplet, DropletPage,
};
use crate::error::CloudError;
use crate::Result;

/// Page size requested when listing droplets. 200 is the API maximum.
pub const PER_PAGE: u32 = 200;

/// DigitalOcean client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitalOceanConfig {
    /// API base URL, without trailing slash
    pub api_url: String,
    /// Personal access token
    pub token: String,
    pub per_page: u32,
}

impl DigitalOceanConfig {
    pub fn new(api_url: &str, token: &str) -> Self {
        DigitalOceanConfig {
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            per_page: PER_PAGE,
        }
    }

    /// Build from settings, reading the token file.
    pub fn from_settings(settings: &Settings) -> FleetResult<Self> {
        let token = read_token(&settings.token_file)?;
        Ok(Self::new(&settings.api_url, &token))
    }
}

/// Client for the droplet endpoints
pub struct DigitalOceanClient {
    config: DigitalOceanConfig,
    http_client: reqwest::Client,
}

impl DigitalOceanClient {
    pub fn new(config: DigitalOceanConfig) -> Result<Self> {
        if config.token.trim().is_empty() {
            return Err(CloudError::MissingToken);
        }
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("tentacle/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(DigitalOceanClient {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url, path)
    }

    async fn list_page(&self, page: u32) -> Result<DropletPage> {
        debug!(page, "fetching droplet page");
        let response = self
            .http_client
            .get(self.url("/droplets"))
            .bearer_auth(&self.config.token)
            .query(&[("page", page), ("per_page", self.config.per_page)])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// List every droplet across all pages.
    pub async fn list_droplets(&self) -> Result<Vec<Droplet>> {
        collect_pages(|page| self.list_page(page)).await
    }

    pub async fn create_droplet(&self, name: &str, spec: &MachineSpec) -> Result<Droplet> {
        info!(name, region = %spec.region, size = %spec.size, "creating droplet");
        let response = self
            .http_client
            .post(self.url("/droplets"))
            .bearer_auth(&self.config.token)
            .json(&CreateDropletRequest::new(name, spec))
            .send()
            .await?;
        let created: CreateDropletResponse = check(response).await?.json().await?;
        Ok(created.droplet)
    }

    pub async fn delete_droplet(&self, id: &str) -> Result<()> {
        info!(id, "deleting droplet");
        let response = self
            .http_client
            .delete(self.url(&format!("/droplets/{id}")))
            .bearer_auth(&self.config.token)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

/// Turn a non-2xx response into [`CloudError::Api`].
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    Err(CloudError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Fetch pages starting at 1 until a page reports no successor.
pub async fn collect_pages<F, Fut>(mut fetch: F) -> Result<Vec<Droplet>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<DropletPage>>,
{
    let mut droplets = Vec::new();
    let mut page = 1;
    loop {
        let current = fetch(page).await?;
        let has_next = current.has_next();
        droplets.extend(current.droplets);
        if !has_next {
            break;
        }
        page += 1;
    }
    Ok(droplets)
}

#[async_trait]
impl FleetProvider for DigitalOceanClient {
    async fn list(&self) -> FleetResult<Vec<Machine>> {
        let droplets = self.list_droplets().await?;
        Ok(droplets.into_iter().map(Machine::from).collect())
    }

    async fn create(&self, name: &str, spec: &MachineSpec) -> FleetResult<Machine> {
        Ok(self.create_droplet(name, spec).await?.into())
    }

    async fn delete(&self, id: &MachineId) -> FleetResult<()> {
        Ok(self.delete_droplet(&id.0).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_rejects_blank_token() {
        let result = DigitalOceanClient::new(DigitalOceanConfig::new("http://localhost", " "));
        assert!(matches!(result, Err(CloudError::MissingToken)));
    }

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = DigitalOceanConfig::new("https://api.digitalocean.com/v2/", "tok");
        assert_eq!(config.api_url, "https://api.digitalocean.com/v2");
        assert_eq!(config.per_page, PER_PAGE);

        let client = DigitalOceanClient::new(config).unwrap();
        assert_eq!(
            client.url("/droplets"),
            "https://api.digitalocean.com/v2/droplets"
        );
    }
}
