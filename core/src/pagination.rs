//! Paginated collections and link following.
//!
//! # Design
//! The first page of a collection is requested by number; every later
//! transition uses the `href` the server put on the page. The client never
//! derives a "next page" URL from page arithmetic once a link is offered.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cancel::CancelToken;
use crate::error::ApiError;
use crate::http::{HttpMethod, RequestBody};
use crate::links::{find_exact, Link, ResourceEnvelope};
use crate::transport::{CallOptions, Transport};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// One slice of a collection plus its pagination links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<ResourceEnvelope<T>>,
    pub page_number: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u32,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl<T> Page<T> {
    pub fn next_link(&self) -> Option<&Link> {
        find_exact(&self.links, "next")
    }

    pub fn previous_link(&self) -> Option<&Link> {
        find_exact(&self.links, "previous")
    }

    pub fn navigation(&self) -> PageNavigation {
        PageNavigation::of(self)
    }
}

/// What pagination controls should offer for a page. Buttons are enabled by
/// the presence of the matching link, not by page arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNavigation {
    pub page: u32,
    pub total_pages: u32,
    pub can_previous: bool,
    pub can_next: bool,
}

impl PageNavigation {
    pub fn of<T>(page: &Page<T>) -> Self {
        Self {
            page: page.page_number,
            total_pages: page.total_pages,
            can_previous: page.previous_link().is_some(),
            can_next: page.next_link().is_some(),
        }
    }
}

/// Page selection for the first request of a collection. Unset or zero
/// values are left to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page_number: Option<u32>,
    pub page_size: Option<u32>,
}

/// First page, [`DEFAULT_PAGE_SIZE`] items.
impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

impl PageRequest {
    /// Leaves both parameters to the server.
    pub fn unset() -> Self {
        Self {
            page_number: None,
            page_size: None,
        }
    }

    pub fn new(page_number: u32, page_size: u32) -> Self {
        Self {
            page_number: Some(page_number),
            page_size: Some(page_size),
        }
    }

    /// Adds `pageNumber`/`pageSize` to `url`, replacing any existing values.
    pub fn apply(&self, url: &str) -> Result<String, ApiError> {
        let mut parsed = Url::parse(url).map_err(|e| ApiError::InvalidLink(format!("invalid URL {url}: {e}")))?;
        let params: Vec<(&str, u32)> = [("pageNumber", self.page_number), ("pageSize", self.page_size)]
            .into_iter()
            .filter_map(|(k, v)| v.filter(|v| *v > 0).map(|v| (k, v)))
            .collect();
        if params.is_empty() {
            return Ok(parsed.into());
        }

        let kept: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(k, _)| !params.iter().any(|(name, _)| &**k == *name))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        {
            let mut query = parsed.query_pairs_mut();
            query.clear();
            for (k, v) in &kept {
                query.append_pair(k, v);
            }
            for (k, v) in &params {
                query.append_pair(k, &v.to_string());
            }
        }
        Ok(parsed.into())
    }
}

/// Method declared by `link`, or `fallback` when it declares none.
pub fn link_method(link: &Link, fallback: HttpMethod) -> Result<HttpMethod, ApiError> {
    if link.method.trim().is_empty() {
        return Ok(fallback);
    }
    link.method
        .parse()
        .map_err(|m| ApiError::InvalidLink(format!("unsupported link method {m} for {}", link.href)))
}

impl Transport {
    /// Requests a page of the collection at `path`.
    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        path: &str,
        page: PageRequest,
        cancel: &CancelToken,
    ) -> Result<Page<T>, ApiError> {
        let url = page.apply(&self.resolve_url(path))?;
        self.fetch(&url, CallOptions::get(), cancel).await
    }

    /// Follows a pagination link exactly as the server wrote it.
    pub async fn follow_page<T: DeserializeOwned>(
        &self,
        link: &Link,
        cancel: &CancelToken,
    ) -> Result<Page<T>, ApiError> {
        let method = link_method(link, HttpMethod::Get)?;
        self.fetch(&link.href, CallOptions::new(method), cancel).await
    }

    /// Follows a link to a single resource.
    pub async fn follow_resource<T: DeserializeOwned>(
        &self,
        link: &Link,
        cancel: &CancelToken,
    ) -> Result<ResourceEnvelope<T>, ApiError> {
        let method = link_method(link, HttpMethod::Get)?;
        self.fetch(&link.href, CallOptions::new(method), cancel).await
    }

    /// Submits `body` to `link` using the link's method.
    pub async fn submit<T: DeserializeOwned>(
        &self,
        link: &Link,
        body: Option<RequestBody>,
        cancel: &CancelToken,
    ) -> Result<Option<T>, ApiError> {
        let method = link_method(link, HttpMethod::Get)?;
        let mut options = CallOptions::new(method);
        options.body = body;
        self.call(&link.href, options, cancel).await
    }

    /// [`Transport::submit`] with a JSON-encoded body.
    pub async fn submit_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        link: &Link,
        body: &B,
        cancel: &CancelToken,
    ) -> Result<Option<T>, ApiError> {
        self.submit(link, Some(RequestBody::json(body)?), cancel).await
    }
}
