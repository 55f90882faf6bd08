//! MongoDB-backed store (requires the `mongo` feature).
//!
//! Filters are forwarded unchanged in their wire form; the database does the
//! evaluation, counting and write ordering.

use async_trait::async_trait;
use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Document};
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection};
use serde::Deserialize;
use tracing::info;

use crate::config::MongoSettings;
use crate::error::StoreError;
use crate::query::FilterExpr;
use crate::store::ChemicalStore;
use crate::types::{http_date, Chemical, ChemicalPatch, NewChemical, CHEMICALS};

/// Store backed by a MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoStore {
    collection: Collection<Document>,
}

#[derive(Debug, Deserialize)]
struct StoredChemical {
    #[serde(rename = "_id")]
    id: ObjectId,
    formula: String,
    band_gap: f64,
    color: String,
    #[serde(rename = "_created", default)]
    created: String,
    #[serde(rename = "_updated", default)]
    updated: String,
}

impl From<StoredChemical> for Chemical {
    fn from(stored: StoredChemical) -> Self {
        Chemical {
            id: stored.id.to_hex(),
            formula: stored.formula,
            band_gap: stored.band_gap,
            color: stored.color,
            created: stored.created,
            updated: stored.updated,
        }
    }
}

impl MongoStore {
    /// Connect to the configured database.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Mongo` if the connection string is rejected.
    pub async fn connect(settings: &MongoSettings) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(settings.uri())
            .await
            .map_err(|source| StoreError::Mongo { source })?;
        info!(host = %settings.host, port = settings.port, db = %settings.dbname, "connected to mongodb");
        Ok(Self::from_collection(
            client.database(&settings.dbname).collection(CHEMICALS),
        ))
    }

    pub fn from_collection(collection: Collection<Document>) -> Self {
        Self { collection }
    }
}

fn mongo_filter(filter: Option<&FilterExpr>) -> Result<Document, StoreError> {
    match filter {
        None => Ok(Document::new()),
        Some(expr) => bson::to_document(&expr.to_value()).map_err(|e| StoreError::Corrupt {
            message: format!("filter not representable as BSON: {}", e),
        }),
    }
}

fn decode(document: Document) -> Result<Chemical, StoreError> {
    bson::from_document::<StoredChemical>(document)
        .map(Chemical::from)
        .map_err(|e| StoreError::Corrupt {
            message: e.to_string(),
        })
}

/// Unparseable ids can't exist in the collection.
fn object_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

#[async_trait]
impl ChemicalStore for MongoStore {
    async fn find(
        &self,
        filter: Option<&FilterExpr>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Chemical>, StoreError> {
        let documents: Vec<Document> = self
            .collection
            .find(mongo_filter(filter)?)
            .skip(skip as u64)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(|source| StoreError::Mongo { source })?
            .try_collect()
            .await
            .map_err(|source| StoreError::Mongo { source })?;

        documents.into_iter().map(decode).collect()
    }

    async fn count(&self, filter: Option<&FilterExpr>) -> Result<u64, StoreError> {
        self.collection
            .count_documents(mongo_filter(filter)?)
            .await
            .map_err(|source| StoreError::Mongo { source })
    }

    async fn get(&self, id: &str) -> Result<Option<Chemical>, StoreError> {
        let Some(oid) = object_id(id) else {
            return Ok(None);
        };
        self.collection
            .find_one(doc! { "_id": oid })
            .await
            .map_err(|source| StoreError::Mongo { source })?
            .map(decode)
            .transpose()
    }

    async fn insert(&self, new: NewChemical) -> Result<Chemical, StoreError> {
        let now = Utc::now();
        let stamp = http_date(now);
        let document = doc! {
            "formula": new.formula.as_str(),
            "band_gap": new.band_gap,
            "color": new.color.as_str(),
            "_created": stamp.as_str(),
            "_updated": stamp.as_str(),
        };

        let result = self
            .collection
            .insert_one(document)
            .await
            .map_err(|source| StoreError::Mongo { source })?;
        let oid = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| StoreError::Corrupt {
                message: format!("unexpected inserted id {}", result.inserted_id),
            })?;

        Ok(Chemical::from_new(oid.to_hex(), new, now))
    }

    async fn update(
        &self,
        id: &str,
        patch: ChemicalPatch,
    ) -> Result<Option<Chemical>, StoreError> {
        let Some(oid) = object_id(id) else {
            return Ok(None);
        };
        let mut set = bson::to_document(&patch).map_err(|e| StoreError::Corrupt {
            message: e.to_string(),
        })?;
        set.insert("_updated", http_date(Utc::now()));

        self.collection
            .find_one_and_update(doc! { "_id": oid }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| StoreError::Mongo { source })?
            .map(decode)
            .transpose()
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let Some(oid) = object_id(id) else {
            return Ok(false);
        };
        let result = self
            .collection
            .delete_one(doc! { "_id": oid })
            .await
            .map_err(|source| StoreError::Mongo { source })?;
        Ok(result.deleted_count == 1)
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let result = self
            .collection
            .delete_many(doc! {})
            .await
            .map_err(|source| StoreError::Mongo { source })?;
        Ok(result.deleted_count)
    }
}
