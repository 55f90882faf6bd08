//! Resource service - CRUD on the chemicals collection.
//!
//! Every operation runs the same pipeline: authorize, then decode and
//! validate the payload (writes only), then touch the store. A caller that
//! fails authorization never learns whether its payload was valid, and no
//! failure leaves a partial write behind.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::auth::{Authorizer, Credential};
use crate::config::{Pagination, Settings};
use crate::error::ApiError;
use crate::query::{self, FilterExpr};
use crate::schema::ResourceSchema;
use crate::store::ChemicalStore;
use crate::types::{Chemical, ChemicalPatch, Granularity, Method, NewChemical};
use crate::validator::{validate_record, WriteKind};

/// Requested slice of a collection read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    pub max_results: usize,
}

impl Page {
    fn skip(&self) -> usize {
        (self.number - 1).saturating_mul(self.max_results)
    }
}

/// Result of a collection read.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub items: Vec<Chemical>,
    /// Number of records matching the filter, regardless of paging.
    pub total: u64,
    pub page: Page,
}

/// CRUD operations for one resource over a [`ChemicalStore`].
#[derive(Debug, Clone)]
pub struct ResourceService {
    schema: ResourceSchema,
    authorizer: Authorizer,
    store: Arc<dyn ChemicalStore>,
    query_blacklist: Vec<String>,
    pagination: Pagination,
}

impl ResourceService {
    pub fn new(settings: &Settings, schema: ResourceSchema, store: Arc<dyn ChemicalStore>) -> Self {
        Self {
            schema,
            authorizer: Authorizer::new(settings.admin.clone(), settings.access.clone()),
            store,
            query_blacklist: settings.query_blacklist.clone(),
            pagination: settings.pagination,
        }
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }

    /// Decode the `where` parameter, applying the operator blacklist.
    pub fn parse_filter(&self, text: Option<&str>) -> Result<Option<FilterExpr>, ApiError> {
        match text.map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => Ok(Some(query::parse(text, &self.query_blacklist)?)),
        }
    }

    /// Resolve paging parameters against the configured defaults.
    ///
    /// `max_results` above the cap is clamped rather than rejected.
    pub fn page(&self, number: Option<usize>, max_results: Option<usize>) -> Result<Page, ApiError> {
        let number = number.unwrap_or(1);
        if number == 0 {
            return Err(ApiError::BadRequest {
                message: "page numbers start at 1".to_string(),
            });
        }
        let max_results = match max_results {
            None => self.pagination.default_max_results,
            Some(0) => {
                return Err(ApiError::BadRequest {
                    message: "max_results must be positive".to_string(),
                })
            }
            Some(n) => n.min(self.pagination.max_results_cap),
        };
        Ok(Page {
            number,
            max_results,
        })
    }

    fn authorize(
        &self,
        credential: Option<&Credential>,
        method: Method,
        granularity: Granularity,
    ) -> Result<(), ApiError> {
        self.authorizer
            .authorize(credential, &self.schema.name, method, granularity)
    }

    pub async fn list(
        &self,
        credential: Option<&Credential>,
        filter: Option<&FilterExpr>,
        page: Page,
    ) -> Result<Listing, ApiError> {
        self.authorize(credential, Method::Get, Granularity::Collection)?;

        let total = self.store.count(filter).await?;
        let items = self
            .store
            .find(filter, page.skip(), page.max_results)
            .await?;
        debug!(total, returned = items.len(), page = page.number, "listed {}", self.schema.name);

        Ok(Listing { items, total, page })
    }

    pub async fn get(&self, credential: Option<&Credential>, id: &str) -> Result<Chemical, ApiError> {
        self.authorize(credential, Method::Get, Granularity::Item)?;

        self.store
            .get(id)
            .await?
            .ok_or_else(|| self.not_found(id))
    }

    /// Validate and persist a new record from a JSON body.
    pub async fn create(
        &self,
        credential: Option<&Credential>,
        body: &[u8],
    ) -> Result<Chemical, ApiError> {
        self.authorize(credential, Method::Post, Granularity::Collection)?;

        let payload = decode_payload(body)?;
        validate_record(&self.schema, &payload, WriteKind::Create)?;
        let new: NewChemical = from_validated(payload)?;

        let created = self.store.insert(new).await?;
        info!(id = %created.id, formula = %created.formula, "created {}", self.schema.item_title);
        Ok(created)
    }

    /// Validate and apply a partial update from a JSON body.
    pub async fn update(
        &self,
        credential: Option<&Credential>,
        id: &str,
        body: &[u8],
    ) -> Result<Chemical, ApiError> {
        self.authorize(credential, Method::Patch, Granularity::Item)?;

        let payload = decode_payload(body)?;
        validate_record(&self.schema, &payload, WriteKind::Patch)?;
        let patch: ChemicalPatch = from_validated(payload)?;

        let updated = self
            .store
            .update(id, patch)
            .await?
            .ok_or_else(|| self.not_found(id))?;
        info!(id = %updated.id, "updated {}", self.schema.item_title);
        Ok(updated)
    }

    pub async fn delete(&self, credential: Option<&Credential>, id: &str) -> Result<(), ApiError> {
        self.authorize(credential, Method::Delete, Granularity::Item)?;

        if !self.store.delete(id).await? {
            return Err(self.not_found(id));
        }
        info!(id, "deleted {}", self.schema.item_title);
        Ok(())
    }

    /// Remove the whole collection, returning how many records went.
    pub async fn delete_all(&self, credential: Option<&Credential>) -> Result<u64, ApiError> {
        self.authorize(credential, Method::Delete, Granularity::Collection)?;

        let removed = self.store.delete_all().await?;
        info!(removed, "deleted all {}", self.schema.name);
        Ok(removed)
    }

    fn not_found(&self, id: &str) -> ApiError {
        ApiError::NotFound {
            resource: self.schema.name.clone(),
            id: id.to_string(),
        }
    }
}

fn decode_payload(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest {
            message: "empty payload".to_string(),
        });
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest {
        message: format!("invalid JSON payload: {}", e),
    })
}

fn from_validated<T: serde::de::DeserializeOwned>(payload: Value) -> Result<T, ApiError> {
    serde_json::from_value(payload).map_err(|e| ApiError::BadRequest {
        message: e.to_string(),
    })
}
