// src/services/portal.rs

//! Page source abstraction over the portal's HTTP surface.

use std::time::Duration;

use async_trait::async_trait;
use scraper::Html;

use crate::error::Result;
use crate::models::PortalConfig;
use crate::services::forms::{FormSubmission, Method};
use crate::utils::http;

/// A loaded page: final URL after redirects and raw HTML.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub body: String,
}

impl Page {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }

    /// Parse the body. The result is not `Send`; keep it out of `.await`s.
    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// Something that serves portal pages within one session.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Load a page.
    async fn get(&self, url: &str) -> Result<Page>;

    /// Submit a form and load the resulting page.
    async fn submit(&self, form: &FormSubmission) -> Result<Page>;
}

/// Live portal session over HTTP with a cookie store.
pub struct HttpPortal {
    client: reqwest::Client,
    settle_delay: Duration,
}

impl HttpPortal {
    pub fn new(config: &PortalConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_client(config)?,
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        })
    }

    async fn finish(&self, response: reqwest::Response) -> Result<Page> {
        let response = response.error_for_status()?;
        let url = response.url().to_string();
        let body = response.text().await?;

        // Some pages fill in after the first response.
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        log::debug!("Loaded {} ({} bytes)", url, body.len());
        Ok(Page { url, body })
    }
}

#[async_trait]
impl PageSource for HttpPortal {
    async fn get(&self, url: &str) -> Result<Page> {
        let response = self.client.get(url).send().await?;
        self.finish(response).await
    }

    async fn submit(&self, form: &FormSubmission) -> Result<Page> {
        let request = match form.method {
            Method::Get => self.client.get(&form.action).query(&form.fields),
            Method::Post => self.client.post(&form.action).form(&form.fields),
        };
        let response = request.send().await?;
        self.finish(response).await
    }
}
