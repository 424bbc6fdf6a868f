//! Typed records exchanged with the backends.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::filters::{Sort, SortDirection, SortField};

/// Results per page for watchlist reads.
pub const PAGE_SIZE: usize = 20;

/// An account from the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email_verified: bool,
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    /// RFC 3339 expiry as reported by the provider.
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a title across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub id: u64,
}

/// A movie or TV show from a content metadata provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: u64,
    pub kind: MediaKind,
    pub title: String,
    #[serde(default)]
    pub overview: String,
    /// `YYYY-MM-DD`, when known.
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub poster_path: Option<String>,
}

impl MediaItem {
    #[must_use]
    pub const fn media_ref(&self) -> MediaRef {
        MediaRef {
            kind: self.kind,
            id: self.id,
        }
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub page: u32,
    pub total_pages: u32,
    pub total_results: u64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// An empty first page.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            page: 1,
            total_pages: 0,
            total_results: 0,
            results: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Slices `items` into page `page` (1-based) of `page_size` items.
    #[must_use]
    pub fn paginate(items: Vec<T>, page: u32, page_size: usize) -> Self {
        let page = page.max(1);
        let total = items.len();
        let page_size = page_size.max(1);
        let total_pages = u32::try_from(total.div_ceil(page_size)).unwrap_or(u32::MAX);
        let skip = (page as usize - 1).saturating_mul(page_size);
        let results = items.into_iter().skip(skip).take(page_size).collect();
        Self {
            page,
            total_pages,
            total_results: total as u64,
            results,
        }
    }
}

/// Orders `items` by `sort`. `AddedAt` keeps the given order, reversed when ascending.
pub fn sort_media(items: &mut [MediaItem], sort: Sort) {
    match sort.field {
        SortField::AddedAt => {
            if sort.direction == SortDirection::Ascending {
                items.reverse();
            }
            return;
        }
        SortField::Title => items.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase())),
        SortField::ReleaseDate => items.sort_by(|a, b| a.release_date.cmp(&b.release_date)),
        SortField::Rating => items.sort_by(|a, b| {
            a.rating
                .partial_cmp(&b.rating)
                .unwrap_or(Ordering::Equal)
        }),
    }
    if sort.direction == SortDirection::Descending {
        items.reverse();
    }
}
