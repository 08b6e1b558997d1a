use crate::media::{MediaKind, MediaSearch, SearchError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const FREESOUND_SEARCH_URL: &str = "https://freesound.org/apiv2/search/text/";
const PREVIEW_FIELD: &str = "preview-hq-mp3";

/// Background audio lookup against the Freesound text search.
pub struct FreesoundAudioSearch {
    client: Client,
    token: String,
    endpoint: String,
    timeout: Duration,
}

impl FreesoundAudioSearch {
    pub fn new(client: Client, token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            token: token.into(),
            endpoint: FREESOUND_SEARCH_URL.to_string(),
            timeout,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl MediaSearch for FreesoundAudioSearch {
    fn kind(&self) -> MediaKind {
        MediaKind::BackgroundAudio
    }

    async fn first_match(&self, keyword: &str) -> Result<Option<String>, SearchError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("query", keyword),
                ("token", self.token.as_str()),
                ("fields", "previews"),
            ])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        let raw = resp.text().await?;
        first_preview_url(&raw)
    }
}

pub(crate) fn first_preview_url(resp_json: &str) -> Result<Option<String>, SearchError> {
    let root: serde_json::Value =
        serde_json::from_str(resp_json).map_err(|e| SearchError::Payload(e.to_string()))?;

    let Some(first) = root
        .get("results")
        .and_then(|v| v.as_array())
        .and_then(|results| results.first())
    else {
        return Ok(None);
    };

    first
        .get("previews")
        .and_then(|p| p.get(PREVIEW_FIELD))
        .and_then(|v| v.as_str())
        .map(|url| Some(url.to_string()))
        .ok_or_else(|| SearchError::Payload(format!("first result has no {PREVIEW_FIELD} preview")))
}
