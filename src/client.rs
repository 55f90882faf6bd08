//! Blocking HTTP client for the chemicals API (requires the `remote` feature).
//!
//! Builds filter expressions with the [`query`](crate::query) helpers, sends
//! them as the `where` parameter and reads the match count from
//! `_meta.total`.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::Credential;
use crate::error::ClientError;
use crate::query::{range_filter, substring_filter, Filter, FilterExpr};
use crate::types::{NewChemical, CHEMICALS};

/// Default timeout for HTTP requests (10 seconds).
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_IP: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

/// URL of a resource on a server.
///
/// ```
/// use chemical_api::endpoint;
///
/// assert_eq!(endpoint("chemicals", "0.0.0.0", 5000), "http://0.0.0.0:5000/chemicals");
/// ```
pub fn endpoint(resource: &str, ip: &str, port: u16) -> String {
    format!("http://{}:{}/{}", ip, port, resource)
}

/// Comparisons restricting `band_gap` to the open interval `(min, max)`.
///
/// With no bounds at all the warning is logged and no comparisons are
/// returned, so the query falls back to matching everything.
pub fn band_gap_filters(min: Option<f64>, max: Option<f64>) -> Vec<FilterExpr> {
    range_filter("band_gap", min, max).unwrap_or_else(|warning| {
        warn!(%warning, "no bounds provided for band gap");
        Vec::new()
    })
}

/// Matches formulas containing `element`.
pub fn formula_filter(element: &str) -> FilterExpr {
    substring_filter("formula", element)
}

/// Client for one server.
#[derive(Debug, Clone)]
pub struct ChemicalClient {
    http: Client,
    base_url: String,
}

impl ChemicalClient {
    /// Client for the server at `ip:port`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` if the HTTP client can't be built.
    pub fn new(ip: &str, port: u16) -> Result<Self, ClientError> {
        Self::with_base_url(format!("http://{}:{}", ip, port))
    }

    /// Client for a server under `base_url` (e.g. `http://localhost:5000`).
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` if the HTTP client can't be built.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|source| ClientError::Transport {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self { http, base_url })
    }

    pub fn url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }

    /// Fetch the first page of chemicals matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` on network or decoding failures and
    /// `ClientError::Status` for non-2xx responses.
    pub fn list(&self, filter: &Filter) -> Result<Value, ClientError> {
        let url = self.url(CHEMICALS);
        let mut request = self.http.get(&url);
        if let Some(text) = filter.where_param() {
            debug!(%url, filter = %text, "querying");
            request = request.query(&[("where", text)]);
        }

        let response = request.send().map_err(|source| ClientError::Transport {
            url: url.clone(),
            source,
        })?;
        let response = check_status(&url, response, |status| status.is_success())?;
        response.json().map_err(|source| ClientError::Transport { url, source })
    }

    /// Number of chemicals matching `filter`, read from `_meta.total`.
    ///
    /// # Errors
    ///
    /// As [`list`](Self::list), plus `ClientError::MissingTotal` if the
    /// response carries no count.
    pub fn total(&self, filter: &Filter) -> Result<u64, ClientError> {
        let body = self.list(filter)?;
        body.pointer("/_meta/total")
            .and_then(Value::as_u64)
            .ok_or_else(|| ClientError::MissingTotal {
                url: self.url(CHEMICALS),
            })
    }

    /// Count chemicals with a band gap strictly between the bounds.
    pub fn query_by_band_gap(&self, min: Option<f64>, max: Option<f64>) -> Result<u64, ClientError> {
        self.total(&Filter::all_of(band_gap_filters(min, max)))
    }

    /// Count chemicals whose formula contains `element`.
    pub fn query_by_element(&self, element: &str) -> Result<u64, ClientError> {
        self.total(&Filter::from(formula_filter(element)))
    }

    /// Count chemicals containing `element` with a band gap between the
    /// bounds. The band gap comparisons come first in the conjunction.
    pub fn query_by_element_and_band_gap(
        &self,
        element: &str,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<u64, ClientError> {
        let mut exprs = band_gap_filters(min, max);
        exprs.push(formula_filter(element));
        self.total(&Filter::all_of(exprs))
    }

    /// Create a chemical, returning the server's response body.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Status` unless the server answers 201.
    pub fn post_chemical(
        &self,
        chemical: &NewChemical,
        credential: &Credential,
    ) -> Result<Value, ClientError> {
        let url = self.url(CHEMICALS);
        let response = self
            .http
            .post(&url)
            .basic_auth(&credential.username, Some(&credential.password))
            .json(chemical)
            .send()
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        let response = check_status(&url, response, |status| status == StatusCode::CREATED)?;
        response.json().map_err(|source| ClientError::Transport { url, source })
    }
}

fn check_status(
    url: &str,
    response: Response,
    accept: impl Fn(StatusCode) -> bool,
) -> Result<Response, ClientError> {
    let status = response.status();
    if accept(status) {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(ClientError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        body,
    })
}
