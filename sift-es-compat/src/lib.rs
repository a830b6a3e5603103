//! Elasticsearch wire dialect for sift
//!
//! This crate holds the pieces of the Elasticsearch REST conventions that the
//! compatibility surface (`/es/...`) has to honour, independent of routing:
//!
//! - the `{"error": {...}, "status": N}` error envelope
//! - query-string normalization (`pretty`, `refresh`, `from`/`size`, `op_type`)
//! - versioned vendor media types (`compatible-with=8`)
//! - request body rules per endpoint (JSON objects, required fields, NDJSON)
//! - the informational documents (`/`, `_license`, `_xpack`)

pub mod error;
pub mod media;
pub mod params;
pub mod payload;
pub mod response;

pub use error::EsError;
pub use media::normalize_media_type;
pub use params::{normalize_params, NormalizedParams};
pub use payload::Payload;
pub use response::{xpack_info, ClusterIdentity, EsLicense, EsRootInfo};

/// Response header every Elasticsearch 7.14+ client checks for
pub const PRODUCT_HEADER: &str = "x-elastic-product";
pub const PRODUCT_NAME: &str = "Elasticsearch";
