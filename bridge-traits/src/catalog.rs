//! External Catalog Abstractions
//!
//! Read-only access to a third-party library manager's metadata store (for
//! example a Calibre library). The core only ever reads from a catalog.
//!
//! Pagination and batched tag lookup are optional. An implementation
//! advertises what it supports through [`CatalogSource::capabilities`]; calls to
//! unsupported methods return [`BridgeError::NotAvailable`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{BridgeError, Result};

/// A single book as stored in the external catalog.
///
/// Dates are kept as the raw strings the catalog reports; parsing them is the
/// consumer's job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalRecord {
    /// Stable catalog identifier
    pub id: i64,
    pub title: String,
    /// Raw author string, delimited by `,` and/or `|`
    pub authors: Option<String>,
    /// Location of the book inside the catalog's library folder
    pub path: String,
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    pub series: Option<String>,
    pub series_index: Option<f64>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    /// Publication date as reported by the catalog
    pub pubdate: Option<String>,
    pub has_cover: Option<bool>,
    /// Last modification time as reported by the catalog
    pub last_modified: Option<String>,
}

impl ExternalRecord {
    pub fn new(id: i64, title: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_authors(mut self, authors: impl Into<String>) -> Self {
        self.authors = Some(authors.into());
        self
    }

    pub fn with_pubdate(mut self, pubdate: impl Into<String>) -> Self {
        self.pubdate = Some(pubdate.into());
        self
    }
}

/// Window into the catalog for paginated fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub limit: usize,
    pub offset: usize,
}

impl PageWindow {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }
}

/// Optional capabilities a catalog implementation supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCapabilities {
    /// `get_books_count` is implemented and `get_all_books` honours a [`PageWindow`]
    pub count: bool,
    /// `get_all_book_tags` is implemented
    pub batch_tags: bool,
}

impl CatalogCapabilities {
    pub fn all() -> Self {
        Self {
            count: true,
            batch_tags: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

/// Read-only accessor over an external book catalog
///
/// # Example
///
/// ```ignore
/// use bridge_traits::catalog::{CatalogSource, PageWindow};
///
/// async fn first_page(source: &dyn CatalogSource) -> Result<usize> {
///     let books = source.get_all_books(Some(PageWindow::new(100, 0))).await?;
///     Ok(books.len())
/// }
/// ```
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Optional capabilities this source supports
    fn capabilities(&self) -> CatalogCapabilities {
        CatalogCapabilities::none()
    }

    /// Fetch books from the catalog
    ///
    /// When `window` is `None` the whole catalog is returned.
    async fn get_all_books(&self, window: Option<PageWindow>) -> Result<Vec<ExternalRecord>>;

    /// Fetch the tags of a single book
    async fn get_book_tags(&self, external_id: i64) -> Result<Vec<String>>;

    /// Fetch tags for several books in one call
    ///
    /// Books without tags may be missing from the returned map.
    async fn get_all_book_tags(&self, _external_ids: &[i64]) -> Result<HashMap<i64, Vec<String>>> {
        Err(BridgeError::NotAvailable("get_all_book_tags".to_string()))
    }

    /// Total number of books in the catalog
    async fn get_books_count(&self) -> Result<u64> {
        Err(BridgeError::NotAvailable("get_books_count".to_string()))
    }
}

/// Catalog held entirely in memory
///
/// Useful for hosts that already materialized the catalog elsewhere and for
/// tests. Capabilities are configurable so both the paginated and the
/// unpaginated code paths of a consumer can be exercised.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    records: Vec<ExternalRecord>,
    tags: HashMap<i64, Vec<String>>,
    capabilities: CatalogCapabilities,
}

impl InMemoryCatalog {
    pub fn new(records: Vec<ExternalRecord>) -> Self {
        Self {
            records,
            tags: HashMap::new(),
            capabilities: CatalogCapabilities::all(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: CatalogCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_tags(mut self, external_id: i64, tags: Vec<String>) -> Self {
        self.tags.insert(external_id, tags);
        self
    }

    pub fn records(&self) -> &[ExternalRecord] {
        &self.records
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalog {
    fn capabilities(&self) -> CatalogCapabilities {
        self.capabilities
    }

    async fn get_all_books(&self, window: Option<PageWindow>) -> Result<Vec<ExternalRecord>> {
        match window {
            Some(window) if self.capabilities.count => Ok(self
                .records
                .iter()
                .skip(window.offset)
                .take(window.limit)
                .cloned()
                .collect()),
            _ => Ok(self.records.clone()),
        }
    }

    async fn get_book_tags(&self, external_id: i64) -> Result<Vec<String>> {
        Ok(self.tags.get(&external_id).cloned().unwrap_or_default())
    }

    async fn get_all_book_tags(&self, external_ids: &[i64]) -> Result<HashMap<i64, Vec<String>>> {
        if !self.capabilities.batch_tags {
            return Err(BridgeError::NotAvailable("get_all_book_tags".to_string()));
        }

        Ok(external_ids
            .iter()
            .filter_map(|id| self.tags.get(id).map(|tags| (*id, tags.clone())))
            .collect())
    }

    async fn get_books_count(&self) -> Result<u64> {
        if !self.capabilities.count {
            return Err(BridgeError::NotAvailable("get_books_count".to_string()));
        }

        Ok(self.records.len() as u64)
    }
}
