//! Query-string conventions of the Elasticsearch REST API

use crate::error::EsError;
use std::collections::BTreeMap;

/// Parameters that only change how a response is rendered
const PRESENTATION_PARAMS: &[&str] = &["pretty", "human", "error_trace", "filter_path"];

/// Query parameters after dialect normalization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedParams {
    pub params: BTreeMap<String, String>,
    pub pretty: bool,
}

/// Normalize ES query parameters into dialect-neutral form.
///
/// Presentation parameters are stripped (`pretty` is remembered for the
/// response), `refresh` collapses to `true`/`false`, and numeric paging
/// parameters are validated.
pub fn normalize_params<I>(raw: I) -> Result<NormalizedParams, EsError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut normalized = NormalizedParams::default();

    for (name, value) in raw {
        if PRESENTATION_PARAMS.contains(&name.as_str()) {
            if name == "pretty" {
                normalized.pretty = value != "false";
            }
            continue;
        }

        let value = match name.as_str() {
            "refresh" => normalize_refresh(&value)?,
            "from" | "size" => {
                parse_non_negative(&name, &value)?;
                value
            }
            "op_type" => normalize_op_type(&value)?,
            _ => value,
        };

        normalized.params.insert(name, value);
    }

    Ok(normalized)
}

fn normalize_refresh(value: &str) -> Result<String, EsError> {
    match value {
        "" | "true" | "wait_for" => Ok("true".to_string()),
        "false" => Ok("false".to_string()),
        other => Err(EsError::IllegalArgument(format!(
            "Unknown value for refresh: [{}].",
            other
        ))),
    }
}

fn normalize_op_type(value: &str) -> Result<String, EsError> {
    match value.to_ascii_lowercase().as_str() {
        "index" => Ok("index".to_string()),
        "create" => Ok("create".to_string()),
        _ => Err(EsError::IllegalArgument(format!(
            "opType must be 'create' or 'index', found: [{}]",
            value
        ))),
    }
}

fn parse_non_negative(name: &str, value: &str) -> Result<u64, EsError> {
    value.parse::<u64>().map_err(|_| {
        EsError::IllegalArgument(format!(
            "Failed to parse int parameter [{}] with value [{}]",
            name, value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_presentation_params_are_stripped() {
        let normalized = normalize_params(pairs(&[
            ("pretty", ""),
            ("filter_path", "hits.hits._id"),
            ("human", "true"),
            ("q", "title:rust"),
        ]))
        .unwrap();

        assert!(normalized.pretty);
        assert_eq!(normalized.params.len(), 1);
        assert_eq!(normalized.params["q"], "title:rust");
    }

    #[test]
    fn test_pretty_false() {
        let normalized = normalize_params(pairs(&[("pretty", "false")])).unwrap();
        assert!(!normalized.pretty);
    }

    #[test]
    fn test_refresh_values() {
        for (raw, expected) in [("", "true"), ("true", "true"), ("wait_for", "true"), ("false", "false")] {
            let normalized = normalize_params(pairs(&[("refresh", raw)])).unwrap();
            assert_eq!(normalized.params["refresh"], expected, "refresh={raw}");
        }

        let err = normalize_params(pairs(&[("refresh", "sometimes")])).unwrap_err();
        assert_eq!(err.error_type(), "illegal_argument_exception");
    }

    #[test]
    fn test_paging_must_be_numeric() {
        assert!(normalize_params(pairs(&[("from", "10"), ("size", "0")])).is_ok());

        let err = normalize_params(pairs(&[("size", "-1")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to parse int parameter [size] with value [-1]"
        );
    }

    #[test]
    fn test_op_type() {
        let normalized = normalize_params(pairs(&[("op_type", "CREATE")])).unwrap();
        assert_eq!(normalized.params["op_type"], "create");

        assert!(normalize_params(pairs(&[("op_type", "upsert")])).is_err());
    }
}
