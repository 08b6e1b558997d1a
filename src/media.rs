//! Keyword → stock media resolution.
//!
//! A [`MediaResolver`] asks a video search service and a background-audio
//! search service for the same keyword at the same time. Whatever goes wrong
//! on the wire (bad status, junk payload, slow service) is folded into a
//! [`Resolution`] so the caller only ever sees "found", "not found" or
//! "timed out".

use crate::keywords::Keyword;
use crate::logw;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaKind {
    Video,
    BackgroundAudio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => f.write_str("video"),
            MediaKind::BackgroundAudio => f.write_str("background-audio"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCandidate {
    pub kind: MediaKind,
    pub url: String,
    pub keyword: Keyword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(MediaCandidate),
    NotFound,
    TimedOut,
}

impl Resolution {
    pub fn candidate(&self) -> Option<&MediaCandidate> {
        match self {
            Resolution::Found(candidate) => Some(candidate),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("request timed out")]
    Timeout,
    #[error("HTTP {0}")]
    Status(u16),
    #[error("malformed payload: {0}")]
    Payload(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SearchError::Timeout
        } else if err.is_decode() {
            SearchError::Payload(err.to_string())
        } else if let Some(status) = err.status() {
            SearchError::Status(status.as_u16())
        } else {
            SearchError::Transport(err.to_string())
        }
    }
}

/// A keyword search over one external media catalogue.
#[async_trait]
pub trait MediaSearch: Send + Sync {
    fn kind(&self) -> MediaKind;

    /// Locator of the first usable hit, or `None` when the catalogue has nothing.
    async fn first_match(&self, keyword: &str) -> Result<Option<String>, SearchError>;
}

/// Both lookups for one keyword.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub keyword: Keyword,
    pub video: Resolution,
    pub audio: Resolution,
}

#[derive(Clone)]
pub struct MediaResolver {
    video: Arc<dyn MediaSearch>,
    audio: Arc<dyn MediaSearch>,
    timeout: Duration,
}

impl MediaResolver {
    pub fn new(video: Arc<dyn MediaSearch>, audio: Arc<dyn MediaSearch>, timeout: Duration) -> Self {
        Self {
            video,
            audio,
            timeout,
        }
    }

    pub async fn resolve(&self, keyword: &Keyword) -> ResolvedMedia {
        let (video, audio) = tokio::join!(
            self.lookup(self.video.as_ref(), keyword),
            self.lookup(self.audio.as_ref(), keyword),
        );
        ResolvedMedia {
            keyword: keyword.clone(),
            video,
            audio,
        }
    }

    /// Resolves every keyword concurrently and waits for all of them.
    /// The result keeps the rank order of `keywords`.
    pub async fn resolve_all(&self, keywords: &[Keyword]) -> Vec<ResolvedMedia> {
        let handles: Vec<_> = keywords
            .iter()
            .cloned()
            .map(|keyword| {
                let resolver = self.clone();
                tokio::spawn(async move { resolver.resolve(&keyword).await })
            })
            .collect();

        let mut resolved = Vec::with_capacity(handles.len());
        for (handle, keyword) in handles.into_iter().zip(keywords) {
            match handle.await {
                Ok(media) => resolved.push(media),
                Err(err) => {
                    logw(format!("Media resolution task for '{}' aborted: {}", keyword, err));
                    resolved.push(ResolvedMedia {
                        keyword: keyword.clone(),
                        video: Resolution::NotFound,
                        audio: Resolution::NotFound,
                    });
                }
            }
        }
        resolved
    }

    async fn lookup(&self, service: &dyn MediaSearch, keyword: &Keyword) -> Resolution {
        let kind = service.kind();
        match tokio::time::timeout(self.timeout, service.first_match(keyword.as_str())).await {
            Err(_) | Ok(Err(SearchError::Timeout)) => {
                logw(format!("{} search for '{}' timed out", kind, keyword));
                Resolution::TimedOut
            }
            Ok(Err(err)) => {
                logw(format!("Error fetching {} for '{}': {}", kind, keyword, err));
                Resolution::NotFound
            }
            Ok(Ok(Some(url))) if !url.trim().is_empty() => Resolution::Found(MediaCandidate {
                kind,
                url,
                keyword: keyword.clone(),
            }),
            Ok(Ok(_)) => Resolution::NotFound,
        }
    }
}

/// Which resolved keyword supplies the media for the final video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Resolve and use only the highest-ranked keyword.
    FirstKeyword,
    /// Resolve every keyword; take the first video and the first background
    /// audio found, each in keyword rank order.
    #[default]
    FirstAvailable,
}

#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub video: Option<MediaCandidate>,
    pub audio: Option<MediaCandidate>,
}

impl SelectionPolicy {
    pub fn keywords_to_resolve<'a>(&self, keywords: &'a [Keyword]) -> &'a [Keyword] {
        match self {
            SelectionPolicy::FirstKeyword => &keywords[..keywords.len().min(1)],
            SelectionPolicy::FirstAvailable => keywords,
        }
    }

    pub fn select(&self, resolved: &[ResolvedMedia]) -> Selection {
        match self {
            SelectionPolicy::FirstKeyword => {
                let Some(first) = resolved.first() else {
                    return Selection::default();
                };
                Selection {
                    video: first.video.candidate().cloned(),
                    audio: first.audio.candidate().cloned(),
                }
            }
            SelectionPolicy::FirstAvailable => Selection {
                video: resolved.iter().find_map(|m| m.video.candidate().cloned()),
                audio: resolved.iter().find_map(|m| m.audio.candidate().cloned()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::KeywordExtractor;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    enum Reply {
        Url(&'static str),
        Nothing,
        Fail,
        Hang,
    }

    struct FakeSearch {
        kind: MediaKind,
        delay: Duration,
        replies: HashMap<&'static str, Reply>,
        calls: AtomicUsize,
    }

    impl FakeSearch {
        fn new(kind: MediaKind, delay_ms: u64, replies: Vec<(&'static str, Reply)>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                delay: Duration::from_millis(delay_ms),
                replies: replies.into_iter().collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MediaSearch for FakeSearch {
        fn kind(&self) -> MediaKind {
            self.kind
        }

        async fn first_match(&self, keyword: &str) -> Result<Option<String>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.replies.get(keyword) {
                Some(Reply::Url(url)) => Ok(Some(url.to_string())),
                Some(Reply::Fail) => Err(SearchError::Status(503)),
                Some(Reply::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(None)
                }
                Some(Reply::Nothing) | None => Ok(None),
            }
        }
    }

    fn keywords(text: &str) -> Vec<Keyword> {
        KeywordExtractor::new(10).extract(text)
    }

    #[tokio::test]
    async fn resolves_both_kinds_for_a_keyword() {
        let video = FakeSearch::new(MediaKind::Video, 0, vec![("cat", Reply::Url("https://v/cat.mp4"))]);
        let audio = FakeSearch::new(
            MediaKind::BackgroundAudio,
            0,
            vec![("cat", Reply::Url("https://a/cat.mp3"))],
        );
        let resolver = MediaResolver::new(video, audio, Duration::from_secs(1));

        let kw = keywords("cat");
        let media = resolver.resolve(&kw[0]).await;
        let video = media.video.candidate().unwrap();
        assert_eq!(video.url, "https://v/cat.mp4");
        assert_eq!(video.kind, MediaKind::Video);
        assert_eq!(video.keyword.as_str(), "cat");
        assert_eq!(media.audio.candidate().unwrap().kind, MediaKind::BackgroundAudio);
    }

    #[tokio::test]
    async fn service_errors_and_blank_urls_become_not_found() {
        let video = FakeSearch::new(MediaKind::Video, 0, vec![("cat", Reply::Fail)]);
        let audio = FakeSearch::new(MediaKind::BackgroundAudio, 0, vec![("cat", Reply::Url("  "))]);
        let resolver = MediaResolver::new(video, audio, Duration::from_secs(1));

        let media = resolver.resolve(&keywords("cat")[0]).await;
        assert_eq!(media.video, Resolution::NotFound);
        assert_eq!(media.audio, Resolution::NotFound);
    }

    #[tokio::test]
    async fn slow_service_is_cut_off_by_timeout() {
        let video = FakeSearch::new(MediaKind::Video, 0, vec![("cat", Reply::Hang)]);
        let audio = FakeSearch::new(
            MediaKind::BackgroundAudio,
            0,
            vec![("cat", Reply::Url("https://a/cat.mp3"))],
        );
        let resolver = MediaResolver::new(video, audio, Duration::from_millis(100));

        let started = Instant::now();
        let media = resolver.resolve(&keywords("cat")[0]).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(media.video, Resolution::TimedOut);
        assert!(media.audio.is_found());
    }

    #[tokio::test]
    async fn keywords_resolve_concurrently() {
        let video = FakeSearch::new(MediaKind::Video, 300, vec![]);
        let audio = FakeSearch::new(MediaKind::BackgroundAudio, 300, vec![]);
        let resolver = MediaResolver::new(video.clone(), audio.clone(), Duration::from_secs(5));

        let kw = keywords("alpha beta gamma delta epsilon");
        let started = Instant::now();
        let resolved = resolver.resolve_all(&kw).await;
        let elapsed = started.elapsed();

        assert_eq!(resolved.len(), 5);
        assert_eq!(video.calls.load(Ordering::SeqCst), 5);
        assert_eq!(audio.calls.load(Ordering::SeqCst), 5);
        // Serial execution would take 10 x 300ms.
        assert!(elapsed < Duration::from_millis(1500), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn resolve_all_keeps_rank_order() {
        let video = FakeSearch::new(MediaKind::Video, 0, vec![]);
        let audio = FakeSearch::new(MediaKind::BackgroundAudio, 0, vec![]);
        let resolver = MediaResolver::new(video, audio, Duration::from_secs(1));

        let kw = keywords("one two three four");
        let resolved = resolver.resolve_all(&kw).await;
        let order: Vec<&str> = resolved.iter().map(|m| m.keyword.as_str()).collect();
        assert_eq!(order, ["one", "two", "three", "four"]);
    }

    fn found(kind: MediaKind, url: &str, keyword: &Keyword) -> Resolution {
        Resolution::Found(MediaCandidate {
            kind,
            url: url.to_string(),
            keyword: keyword.clone(),
        })
    }

    #[test]
    fn first_available_picks_earliest_hit_per_kind() {
        let kw = keywords("cat ball grass");
        let resolved = vec![
            ResolvedMedia {
                keyword: kw[0].clone(),
                video: Resolution::NotFound,
                audio: found(MediaKind::BackgroundAudio, "a-cat", &kw[0]),
            },
            ResolvedMedia {
                keyword: kw[1].clone(),
                video: Resolution::TimedOut,
                audio: found(MediaKind::BackgroundAudio, "a-ball", &kw[1]),
            },
            ResolvedMedia {
                keyword: kw[2].clone(),
                video: found(MediaKind::Video, "v-grass", &kw[2]),
                audio: Resolution::NotFound,
            },
        ];

        let selection = SelectionPolicy::FirstAvailable.select(&resolved);
        assert_eq!(selection.video.unwrap().url, "v-grass");
        assert_eq!(selection.audio.unwrap().url, "a-cat");

        let selection = SelectionPolicy::FirstKeyword.select(&resolved);
        assert!(selection.video.is_none());
        assert_eq!(selection.audio.unwrap().url, "a-cat");
    }

    #[test]
    fn first_keyword_only_resolves_the_top_keyword() {
        let kw = keywords("cat ball grass");
        assert_eq!(SelectionPolicy::FirstKeyword.keywords_to_resolve(&kw).len(), 1);
        assert_eq!(SelectionPolicy::FirstAvailable.keywords_to_resolve(&kw).len(), 3);
        assert!(SelectionPolicy::FirstKeyword.keywords_to_resolve(&[]).is_empty());
        assert!(SelectionPolicy::FirstAvailable.select(&[]).video.is_none());
    }
}
