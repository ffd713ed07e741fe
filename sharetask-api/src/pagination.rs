/// Page-number pagination for list endpoints
///
/// Clients pass `?page=N&page_size=M`. Both are optional and an empty value
/// counts as absent. `page_size` is clamped to the configured maximum and
/// falls back to the default when it is not a positive number. A `page` that
/// is not a positive number, or lies beyond the last page, is a 404 (page 1
/// always exists, even for an empty list).
///
/// # Envelope
///
/// ```json
/// {
///   "count": 23,
///   "page": 2,
///   "page_size": 10,
///   "total_pages": 3,
///   "next": "/api/tasks?search=milk&page=3",
///   "previous": "/api/tasks?search=milk&page=1",
///   "results": []
/// }
/// ```

use axum::http::Uri;
use serde::{Deserialize, Serialize};

use crate::{config::PaginationConfig, error::ApiError};

/// Raw pagination query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// A validated page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn invalid_page() -> ApiError {
    ApiError::NotFound("Invalid page.".to_string())
}

impl PageRequest {
    pub fn from_params(params: &PageParams, config: &PaginationConfig) -> Result<Self, ApiError> {
        let page = match non_empty(&params.page) {
            None => 1,
            Some("last") => u32::MAX,
            Some(raw) => raw.parse::<u32>().ok().filter(|p| *p > 0).ok_or_else(invalid_page)?,
        };

        let page_size = non_empty(&params.page_size)
            .and_then(|raw| raw.parse::<u32>().ok())
            .filter(|size| *size > 0)
            .map(|size| size.min(config.max_page_size))
            .unwrap_or(config.page_size);

        Ok(Self { page, page_size })
    }

    /// Resolves `last` and rejects pages past the end, given the total count
    pub fn resolve(self, count: i64) -> Result<Self, ApiError> {
        let last = total_pages(count, self.page_size);

        if self.page == u32::MAX {
            return Ok(Self { page: last, ..self });
        }

        if self.page > last {
            return Err(invalid_page());
        }

        Ok(self)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }
}

/// Number of pages for `count` items; never less than 1
pub fn total_pages(count: i64, page_size: u32) -> u32 {
    let size = i64::from(page_size.max(1));
    let pages = (count.max(0) + size - 1) / size;

    u32::try_from(pages).unwrap_or(u32::MAX).max(1)
}

/// One page of results
#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Wraps `results` and builds `next` / `previous` links from the request URI
    pub fn new(results: Vec<T>, count: i64, request: PageRequest, uri: &Uri) -> Self {
        let total = total_pages(count, request.page_size);

        let next = (request.page < total).then(|| page_link(uri, request.page + 1));
        let previous = (request.page > 1).then(|| page_link(uri, request.page - 1));

        Self {
            count,
            page: request.page,
            page_size: request.page_size,
            total_pages: total,
            next,
            previous,
            results,
        }
    }
}

/// Rewrites the `page` parameter of a URI, keeping every other parameter
fn page_link(uri: &Uri, page: u32) -> String {
    let page_pair = format!("page={}", page);
    let mut pairs: Vec<&str> = uri
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty() && *pair != "page" && !pair.starts_with("page="))
        .collect();
    pairs.push(&page_pair);

    format!("{}?{}", uri.path(), pairs.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, page_size: Option<&str>) -> PageParams {
        PageParams {
            page: page.map(str::to_string),
            page_size: page_size.map(str::to_string),
        }
    }

    fn request(page: Option<&str>, page_size: Option<&str>) -> Result<PageRequest, ApiError> {
        PageRequest::from_params(&params(page, page_size), &PaginationConfig::default())
    }

    #[test]
    fn test_defaults_and_empty_values() {
        let expected = PageRequest {
            page: 1,
            page_size: 10,
        };

        assert_eq!(request(None, None).unwrap(), expected);
        assert_eq!(request(Some(""), Some("")).unwrap(), expected);
    }

    #[test]
    fn test_page_size_is_clamped_or_defaulted() {
        assert_eq!(request(None, Some("25")).unwrap().page_size, 25);
        assert_eq!(request(None, Some("1000")).unwrap().page_size, 100);
        assert_eq!(request(None, Some("0")).unwrap().page_size, 10);
        assert_eq!(request(None, Some("lots")).unwrap().page_size, 10);
    }

    #[test]
    fn test_invalid_page_is_not_found() {
        for raw in ["0", "-1", "two"] {
            assert!(matches!(request(Some(raw), None), Err(ApiError::NotFound(_))), "{raw}");
        }
    }

    #[test]
    fn test_resolve_against_count() {
        let page = |n: &str| request(Some(n), None).unwrap();

        assert_eq!(page("1").resolve(0).unwrap().page, 1);
        assert_eq!(page("3").resolve(21).unwrap().page, 3);
        assert!(page("4").resolve(21).is_err());
        assert!(page("2").resolve(0).is_err());
        assert_eq!(page("last").resolve(21).unwrap().page, 3);
        assert_eq!(page("last").resolve(0).unwrap().page, 1);
    }

    #[test]
    fn test_limit_and_offset() {
        let req = PageRequest {
            page: 3,
            page_size: 20,
        };
        assert_eq!(req.limit(), 20);
        assert_eq!(req.offset(), 40);
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(100, 1), 100);
    }

    #[test]
    fn test_links_keep_other_parameters() {
        let uri: Uri = "/api/tasks?search=milk&page=2&completed=".parse().unwrap();
        let page = Page::new(
            vec![1, 2],
            25,
            PageRequest {
                page: 2,
                page_size: 10,
            },
            &uri,
        );

        assert_eq!(page.total_pages, 3);
        assert_eq!(page.next.as_deref(), Some("/api/tasks?search=milk&completed=&page=3"));
        assert_eq!(page.previous.as_deref(), Some("/api/tasks?search=milk&completed=&page=1"));
    }

    #[test]
    fn test_single_page_has_no_links() {
        let uri: Uri = "/api/categories".parse().unwrap();
        let page = Page::new(
            vec!["a"],
            1,
            PageRequest {
                page: 1,
                page_size: 10,
            },
            &uri,
        );

        assert!(page.next.is_none());
        assert!(page.previous.is_none());

        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["count"], 1);
        assert_eq!(json["results"][0], "a");
    }
}
