//! Content metadata providers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::error::QueryError;
use crate::filters::Sort;

use super::types::{MediaItem, MediaKind, Page, sort_media};

const USER_AGENT_VALUE: &str = concat!("watchdeck/", env!("CARGO_PKG_VERSION"));

/// Parameters of a catalog search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub page: u32,
    pub include_adult: bool,
    /// Applied to each page client-side; providers return relevance order.
    pub sort: Sort,
}

/// A source of movie or TV metadata.
#[async_trait]
pub trait MediaCatalog: Send + Sync {
    /// The kind of title this catalog serves.
    fn kind(&self) -> MediaKind;

    async fn search(&self, request: &SearchRequest) -> Result<Page<MediaItem>, QueryError>;

    /// This week's trending titles.
    async fn trending(&self, page: u32) -> Result<Page<MediaItem>, QueryError>;
}

/// A catalog served over a TMDB-style REST API.
///
/// Searches hit `{base_url}/search/{kind}` and trending lists
/// `{base_url}/trending/{kind}/week`.
#[derive(Debug, Clone)]
pub struct RestCatalog {
    client: reqwest::Client,
    kind: MediaKind,
    base_url: String,
    api_key: Option<String>,
}

impl RestCatalog {
    pub fn new(
        kind: MediaKind,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, QueryError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| QueryError::NetworkError(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            kind,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_page(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Page<MediaItem>, QueryError> {
        let url = format!("{}/{path}", self.base_url);
        debug!(kind = %self.kind, %url, "requesting catalog page");

        let mut request = self.client.get(&url).query(params);
        if let Some(api_key) = &self.api_key {
            request = request.query(&[("api_key", api_key)]);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::from_status(status.as_u16(), body));
        }

        let body = response.text().await?;
        parse_page(self.kind, &body)
    }
}

#[async_trait]
impl MediaCatalog for RestCatalog {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    async fn search(&self, request: &SearchRequest) -> Result<Page<MediaItem>, QueryError> {
        let path = format!("search/{}", self.kind);
        let params = [
            ("query", request.query.clone()),
            ("page", request.page.max(1).to_string()),
            ("include_adult", request.include_adult.to_string()),
        ];
        let mut page = self.get_page(&path, &params).await?;
        sort_media(&mut page.results, request.sort);
        Ok(page)
    }

    async fn trending(&self, page: u32) -> Result<Page<MediaItem>, QueryError> {
        let path = format!("trending/{}/week", self.kind);
        self.get_page(&path, &[("page", page.max(1).to_string())])
            .await
    }
}

#[derive(Deserialize)]
struct RawPage {
    #[serde(default = "first_page")]
    page: u32,
    #[serde(default)]
    total_pages: u32,
    #[serde(default)]
    total_results: u64,
    #[serde(default)]
    results: Vec<RawMedia>,
}

const fn first_page() -> u32 {
    1
}

/// A movie (`title`, `release_date`) or TV (`name`, `first_air_date`) record.
#[derive(Deserialize)]
struct RawMedia {
    id: u64,
    title: Option<String>,
    name: Option<String>,
    #[serde(default)]
    overview: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    vote_average: Option<f32>,
    poster_path: Option<String>,
}

impl RawMedia {
    fn into_item(self, kind: MediaKind) -> Option<MediaItem> {
        let title = self.title.or(self.name).filter(|t| !t.trim().is_empty())?;
        Some(MediaItem {
            id: self.id,
            kind,
            title,
            overview: self.overview.unwrap_or_default(),
            release_date: self
                .release_date
                .or(self.first_air_date)
                .filter(|d| !d.is_empty()),
            rating: self.vote_average,
            poster_path: self.poster_path,
        })
    }
}

/// Decodes a catalog response body into a page of `kind` items.
///
/// Records without a usable title are skipped.
pub fn parse_page(kind: MediaKind, body: &str) -> Result<Page<MediaItem>, QueryError> {
    let raw: RawPage = serde_json::from_str(body).map_err(|e| QueryError::Decode(e.to_string()))?;
    let total = raw.results.len();
    let results: Vec<MediaItem> = raw
        .results
        .into_iter()
        .filter_map(|media| media.into_item(kind))
        .collect();
    if results.len() < total {
        debug!(%kind, skipped = total - results.len(), "skipped untitled catalog records");
    }
    Ok(Page {
        page: raw.page,
        total_pages: raw.total_pages,
        total_results: raw.total_results,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_movie_page() {
        let body = r#"{
            "page": 1,
            "total_pages": 3,
            "total_results": 52,
            "results": [
                {"id": 603, "title": "The Matrix", "overview": "Neo", "release_date": "1999-03-30",
                 "vote_average": 8.2, "poster_path": "/matrix.jpg", "adult": false}
            ]
        }"#;
        let page = parse_page(MediaKind::Movie, body).expect("valid page");
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_results, 52);
        let item = &page.results[0];
        assert_eq!(item.id, 603);
        assert_eq!(item.kind, MediaKind::Movie);
        assert_eq!(item.title, "The Matrix");
        assert_eq!(item.release_date.as_deref(), Some("1999-03-30"));
        assert_eq!(item.rating, Some(8.2));
    }

    #[test]
    fn test_parse_tv_page() {
        let body = r#"{"page": 2, "results": [
            {"id": 1399, "name": "Game of Thrones", "first_air_date": "2011-04-17"}
        ]}"#;
        let page = parse_page(MediaKind::Tv, body).expect("valid page");
        assert_eq!(page.page, 2);
        let item = &page.results[0];
        assert_eq!(item.title, "Game of Thrones");
        assert_eq!(item.release_date.as_deref(), Some("2011-04-17"));
        assert_eq!(item.overview, "");
    }

    #[test]
    fn test_untitled_records_are_skipped() {
        let body = r#"{"results": [{"id": 1}, {"id": 2, "title": "  "}, {"id": 3, "title": "Kept"}]}"#;
        let page = parse_page(MediaKind::Movie, body).expect("valid page");
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].id, 3);
    }

    #[test]
    fn test_malformed_body_is_a_decode_error() {
        let err = parse_page(MediaKind::Movie, "<html>").expect_err("not json");
        assert!(matches!(err, QueryError::Decode(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_rest_catalog_trims_base_url() {
        let catalog = RestCatalog::new(
            MediaKind::Tv,
            "https://api.example.test/3/",
            None,
            Duration::from_secs(5),
        )
        .expect("client");
        assert_eq!(catalog.base_url(), "https://api.example.test/3");
        assert_eq!(catalog.kind(), MediaKind::Tv);
    }
}
