use crate::media::{MediaKind, MediaSearch, SearchError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const PIXABAY_VIDEOS_URL: &str = "https://pixabay.com/api/videos/";
const RESULTS_PER_PAGE: &str = "3";

/// Stock video lookup against the Pixabay videos API.
pub struct PixabayVideoSearch {
    client: Client,
    api_key: String,
    endpoint: String,
    timeout: Duration,
}

impl PixabayVideoSearch {
    pub fn new(client: Client, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: PIXABAY_VIDEOS_URL.to_string(),
            timeout,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl MediaSearch for PixabayVideoSearch {
    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    async fn first_match(&self, keyword: &str) -> Result<Option<String>, SearchError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", keyword),
                ("per_page", RESULTS_PER_PAGE),
            ])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        let raw = resp.text().await?;
        first_video_url(&raw)
    }
}

/// `hits[0].videos.medium.url`, `None` when there are no hits.
pub(crate) fn first_video_url(resp_json: &str) -> Result<Option<String>, SearchError> {
    let root: serde_json::Value =
        serde_json::from_str(resp_json).map_err(|e| SearchError::Payload(e.to_string()))?;

    let Some(first) = root
        .get("hits")
        .and_then(|v| v.as_array())
        .and_then(|hits| hits.first())
    else {
        return Ok(None);
    };

    first
        .pointer("/videos/medium/url")
        .and_then(|v| v.as_str())
        .map(|url| Some(url.to_string()))
        .ok_or_else(|| SearchError::Payload("first hit has no medium rendition".to_string()))
}
