use std::fmt;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::HnConfig;
use crate::orchestrator::{Fetcher, ItemSource};

/// A Hacker News item as returned by `/item/{id}.json`.
///
/// Text posts have no `url`, and deleted items drop most fields, so every
/// field falls back to its default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    #[serde(default)]
    pub by: String,
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

impl fmt::Display for Story {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "By:  {}", self.by)?;
        writeln!(f, "Id:  {}", self.id)?;
        writeln!(f, "Score:  {}", self.score)?;
        writeln!(f, "Title:  {}", self.title)?;
        writeln!(f, "URL:  {}", self.url)
    }
}

/// Blocking client for the public Hacker News API.
///
/// One client is shared by every fetch task; `reqwest` pools connections
/// internally.
#[derive(Debug, Clone)]
pub struct HnClient {
    client: Client,
    base_url: String,
}

impl HnClient {
    pub fn new(cfg: &HnConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Identifiers of the newest stories, newest first.
    pub fn new_story_ids(&self) -> Result<Vec<u64>> {
        self.get_json(&format!("{}/newstories.json", self.base_url))
    }

    pub fn story(&self, id: u64) -> Result<Story> {
        let story: Option<Story> = self.get_json(&format!("{}/item/{id}.json", self.base_url))?;
        story.ok_or_else(|| anyhow!("item {id} does not exist"))
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url, "GET");
        let resp = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("unable to fetch data from {url}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().unwrap_or_default();
            return Err(anyhow!(
                "unable to fetch data from {url}: status {status}: {}",
                snippet(&text, 200)
            ));
        }

        resp.json().with_context(|| format!("error parsing JSON from {url}"))
    }
}

/// First `max` characters of `text`, trimmed.
fn snippet(text: &str, max: usize) -> &str {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max) {
        Some((end, _)) => &trimmed[..end],
        None => trimmed,
    }
}

impl ItemSource for HnClient {
    type Id = u64;

    fn list(&self) -> Result<Vec<u64>> {
        self.new_story_ids()
    }
}

impl Fetcher<u64> for HnClient {
    type Item = Story;

    fn fetch(&self, id: &u64) -> Result<Story> {
        self.story(*id)
    }
}
