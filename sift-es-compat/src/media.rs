//! Versioned media types sent by Elasticsearch clients
//!
//! Official clients send `application/vnd.elasticsearch+json; compatible-with=8`
//! instead of plain `application/json`.

use crate::error::EsError;

const VENDOR_PREFIX: &str = "application/vnd.elasticsearch+";
const SUPPORTED_VERSIONS: &[&str] = &["7", "8"];

/// Map a vendor media type to its plain equivalent.
///
/// Returns `Ok(None)` when the value is not a vendor media type and should be
/// left untouched.
pub fn normalize_media_type(value: &str) -> Result<Option<&'static str>, EsError> {
    let lowered = value.to_ascii_lowercase();
    let mut parts = lowered.split(';').map(str::trim);
    let essence = parts.next().unwrap_or_default();

    let Some(subtype) = essence.strip_prefix(VENDOR_PREFIX) else {
        return Ok(None);
    };

    let plain = match subtype {
        "json" => "application/json",
        "x-ndjson" => "application/x-ndjson",
        _ => {
            return Err(EsError::MediaType(format!(
                "Invalid media-type value on headers [Content-Type, Accept]: {}",
                value
            )))
        }
    };

    for param in parts {
        if let Some(version) = param.strip_prefix("compatible-with=") {
            if !SUPPORTED_VERSIONS.contains(&version) {
                return Err(EsError::MediaType(format!(
                    "Content-Type version must be either version 7 or 8, but found {}. Content-Type={}",
                    version, value
                )));
            }
        }
    }

    Ok(Some(plain))
}
