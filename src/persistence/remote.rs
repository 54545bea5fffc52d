use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;

use super::RemoteSync;
use crate::model::PersistencePayload;

/// Annotation sync endpoint: `GET` returns the payload, `POST` replaces it.
pub struct HttpRemote {
    client: reqwest::Client,
    url: String,
}

impl HttpRemote {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build remote sync client")?;

        Ok(Self {
            client,
            url: url.trim().to_string(),
        })
    }
}

#[async_trait]
impl RemoteSync for HttpRemote {
    async fn fetch(&self) -> Result<PersistencePayload> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.url))?;

        if !response.status().is_success() {
            bail!("remote returned {} for GET {}", response.status(), self.url);
        }

        response
            .json::<PersistencePayload>()
            .await
            .with_context(|| format!("failed to decode annotation state from {}", self.url))
    }

    async fn push(&self, payload: &PersistencePayload) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.url))?;

        if !response.status().is_success() {
            bail!("remote returned {} for POST {}", response.status(), self.url);
        }

        Ok(())
    }
}
