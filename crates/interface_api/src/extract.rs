//! Request extractors and list responses
//!
//! Wrappers around axum's extractors that reject with [`ApiError`], so a
//! malformed body, path or query string yields the usual `{"error"}` body.

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use core_kernel::{Page, PageRequest};

use crate::error::ApiError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// `page` / `per_page` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl From<PageParams> for PageRequest {
    fn from(params: PageParams) -> Self {
        PageRequest::new(params.page, params.per_page)
    }
}

/// A page rendered as a bare JSON array plus a `Link` header
///
/// `rel="first"` is always present; `rel="next"` only when more pages
/// exist. Other query parameters are carried over unchanged.
pub struct Paginated<T> {
    page: Page<T>,
    path: String,
    query: Option<String>,
}

impl<T> Paginated<T> {
    pub fn new(page: Page<T>, uri: &axum::http::Uri) -> Self {
        Self {
            page,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
        }
    }

    fn link(&self, page: u32) -> String {
        let mut params: Vec<&str> = self
            .query
            .as_deref()
            .unwrap_or_default()
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| {
                let key = pair.split('=').next().unwrap_or_default();
                key != "page" && key != "per_page"
            })
            .collect();
        let paging = format!("page={}&per_page={}", page, self.page.per_page);
        params.push(&paging);
        format!("<{}?{}>", self.path, params.join("&"))
    }

    pub fn link_header(&self) -> String {
        let mut links = Vec::with_capacity(2);
        if self.page.has_more() {
            links.push(format!("{}; rel=\"next\"", self.link(self.page.page + 1)));
        }
        links.push(format!("{}; rel=\"first\"", self.link(1)));
        links.join(", ")
    }
}

impl<T: Serialize> IntoResponse for Paginated<T> {
    fn into_response(self) -> Response {
        let link = self.link_header();
        let mut response = Json(self.page.items).into_response();
        match HeaderValue::from_str(&link) {
            Ok(value) => {
                response.headers_mut().insert(header::LINK, value);
            }
            Err(e) => tracing::warn!(error = %e, "Link header not representable"),
        }
        response
    }
}
