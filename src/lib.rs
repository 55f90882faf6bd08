//! Chemical API
//!
//! A REST API over a collection of chemicals (formula, band gap, color).
//! Reads are public; writes need the administrator credential.
//!
//! The crate holds both sides of the query contract: the server
//! ([`router`], [`ResourceService`]) decodes `where` filters, and the client
//! helpers build them.
//!
//! # Example
//!
//! ```
//! use chemical_api::{combine, range_filter, serialize, substring_filter, FilterExpr};
//! use serde_json::json;
//!
//! let mut exprs = range_filter("band_gap", Some(0.0), Some(3.0)).unwrap();
//! exprs.push(substring_filter("formula", "Ga"));
//! let filter = combine(exprs).unwrap();
//!
//! assert_eq!(
//!     serialize(&filter),
//!     r#"{"$and":[{"band_gap":{"$gt":0.0}},{"band_gap":{"$lt":3.0}},{"formula":{"$regex":"Ga"}}]}"#
//! );
//!
//! // The in-memory store evaluates the same predicate
//! assert!(filter.matches(&json!({ "formula": "GaAs", "band_gap": 1.42 })));
//! assert!(!filter.matches(&json!({ "formula": "GaN", "band_gap": 3.4 })));
//! ```
//!
//! # Access Rules
//!
//! | Endpoint | Anonymous | Administrator |
//! |----------|-----------|---------------|
//! | `GET /chemicals`, `GET /chemicals/:id` | yes | yes |
//! | `POST /chemicals`, `DELETE /chemicals` | 401 | yes |
//! | `PATCH /chemicals/:id`, `DELETE /chemicals/:id` | 401 | yes |
//!
//! # Features
//!
//! - `remote` (default): the blocking [`ChemicalClient`].
//! - `mongo`: [`MongoStore`], backed by a MongoDB collection.

mod auth;
#[cfg(feature = "remote")]
mod client;
mod config;
mod convert;
mod error;
mod http;
#[cfg(feature = "mongo")]
mod mongo;
mod query;
mod schema;
mod service;
mod store;
mod types;
mod validator;

pub use auth::{AccessPolicy, Authorizer, Credential, Decision};
pub use config::{CacheSettings, MongoSettings, Pagination, Settings};
pub use convert::{
    convert, convert_file, load_seed, read_chemicals, row_to_chemical, CsvRow, DEFAULT_INPUT,
    DEFAULT_OUTPUT,
};
pub use error::{
    ApiError, ConvertError, EmptyFilterWarning, FieldError, FilterError, StoreError, Violation,
};
pub use http::{router, serve, AppState, ListParams};
pub use query::{
    combine, parse, range_filter, serialize, substring_filter, Filter, FilterExpr, Matcher,
    Operator,
};
pub use schema::{FieldRule, FieldType, ResourceSchema, SchemaRegistry, MAX_TEXT_LENGTH};
pub use service::{Listing, Page, ResourceService};
pub use store::{ChemicalStore, MemoryStore};
pub use types::{http_date, Chemical, ChemicalPatch, Granularity, Method, NewChemical, CHEMICALS};
pub use validator::{validate_record, WriteKind};

#[cfg(feature = "remote")]
pub use client::{
    band_gap_filters, endpoint, formula_filter, ChemicalClient, DEFAULT_IP, DEFAULT_PORT,
};
#[cfg(feature = "remote")]
pub use error::ClientError;
#[cfg(feature = "mongo")]
pub use mongo::MongoStore;
