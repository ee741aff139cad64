//! HTTP client for the eCFR versioner and admin APIs.
//!
//! All requests carry the configured timeout and retry transient failures
//! (429, 5xx, network errors) with exponential backoff up to
//! `api.max_retries`; other non-success statuses fail immediately. Payloads
//! deserialize into the typed models; unknown fields are ignored.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::models::{
    AgenciesResponse, AgencyRecord, ContentVersionRecord, TitleRecord, TitlesResponse,
    VersionsResponse,
};

pub struct EcfrClient {
    http: reqwest::Client,
    versioner_url: String,
    admin_url: String,
    max_retries: u32,
}

impl EcfrClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            versioner_url: config.versioner_url.trim_end_matches('/').to_string(),
            admin_url: config.admin_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    /// All titles known to the versioner API.
    pub async fn fetch_titles(&self) -> Result<Vec<TitleRecord>> {
        let url = format!("{}/titles.json", self.versioner_url);
        let response: TitlesResponse = self
            .get_json(&url)
            .await
            .context("fetching title list")?;
        Ok(response.titles)
    }

    /// All agencies, with their nested CFR references.
    pub async fn fetch_agencies(&self) -> Result<Vec<AgencyRecord>> {
        let url = format!("{}/agencies.json", self.admin_url);
        let response: AgenciesResponse = self
            .get_json(&url)
            .await
            .context("fetching agency list")?;
        Ok(response.agencies)
    }

    /// Structure tree for one title at a point in time.
    pub async fn fetch_title_structure(
        &self,
        title_number: i64,
        date: NaiveDate,
    ) -> Result<serde_json::Value> {
        let url = format!(
            "{}/structure/{}/title-{}.json",
            self.versioner_url, date, title_number
        );
        self.get_json(&url)
            .await
            .with_context(|| format!("fetching structure for title {}", title_number))
    }

    /// Version history for one title.
    pub async fn fetch_title_versions(
        &self,
        title_number: i64,
    ) -> Result<Vec<ContentVersionRecord>> {
        let url = format!("{}/versions/title-{}.json", self.versioner_url, title_number);
        let response: VersionsResponse = self
            .get_json(&url)
            .await
            .with_context(|| format!("fetching versions for title {}", title_number))?;
        Ok(response.content_versions)
    }

    /// Full regulatory text of one title as XML.
    pub async fn fetch_full_xml(&self, title_number: i64, date: NaiveDate) -> Result<String> {
        let url = format!(
            "{}/full/{}/title-{}.xml",
            self.versioner_url, date, title_number
        );
        let response = self.get_with_retry(&url, "application/xml").await?;
        Ok(response.text().await?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.get_with_retry(url, "application/json").await?;
        Ok(response.json().await?)
    }

    /// GET with the retry policy described in the module docs.
    async fn get_with_retry(&self, url: &str, accept: &str) -> Result<reqwest::Response> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            match self.http.get(url).header("accept", accept).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow::anyhow!("eCFR API error {} for {}", status, url));
                        continue;
                    }
                    bail!("eCFR API error {} for {}", status, url);
                }
                Err(e) => {
                    last_err = Some(anyhow::anyhow!("Request to {} failed: {}", url, e));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}
