//! Request body rules of the Elasticsearch REST API

use crate::error::EsError;
use serde_json::Value;

/// Body shape an ES endpoint expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Body is not inspected
    Ignored,
    /// Optional body; when present it must be a JSON object
    JsonObject,
    /// Body must be a JSON object
    RequiredJsonObject,
    /// Body must be a JSON object carrying the listed top-level fields
    RequiredFields(&'static [&'static str]),
    /// Newline-delimited JSON (`_bulk`, `_msearch`); carries the API name
    NdJson(&'static str),
}

impl Payload {
    pub fn validate(&self, body: &[u8]) -> Result<(), EsError> {
        match self {
            Payload::Ignored => Ok(()),
            Payload::JsonObject => {
                if is_blank(body) {
                    return Ok(());
                }
                parse_object(body).map(|_| ())
            }
            Payload::RequiredJsonObject => {
                require_body(body)?;
                parse_object(body).map(|_| ())
            }
            Payload::RequiredFields(fields) => {
                require_body(body)?;
                let object = parse_object(body)?;
                for field in fields.iter() {
                    if object.get(*field).map_or(true, Value::is_null) {
                        return Err(EsError::Validation(format!("{} is missing", field)));
                    }
                }
                Ok(())
            }
            Payload::NdJson(api) => validate_ndjson(api, body),
        }
    }
}

fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

fn require_body(body: &[u8]) -> Result<(), EsError> {
    if is_blank(body) {
        return Err(EsError::Parse("request body is required".to_string()));
    }
    Ok(())
}

fn parse_object(body: &[u8]) -> Result<serde_json::Map<String, Value>, EsError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(EsError::Parse(
            "request body must be a JSON object".to_string(),
        )),
        Err(e) => Err(EsError::Parse(format!("failed to parse request body: {}", e))),
    }
}

fn validate_ndjson(api: &str, body: &[u8]) -> Result<(), EsError> {
    require_body(body)?;

    if body.last() != Some(&b'\n') {
        return Err(EsError::IllegalArgument(format!(
            "The {} request must be terminated by a newline [\\n]",
            api
        )));
    }

    for (number, line) in body.split(|b| *b == b'\n').enumerate() {
        if is_blank(line) {
            continue;
        }
        if serde_json::from_slice::<Value>(line).is_err() {
            return Err(EsError::Parse(format!(
                "malformed {} line [{}]",
                api,
                number + 1
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_json_accepts_empty() {
        assert!(Payload::JsonObject.validate(b"").is_ok());
        assert!(Payload::JsonObject.validate(b"  \n").is_ok());
        assert!(Payload::JsonObject.validate(br#"{"query":{}}"#).is_ok());
        assert!(Payload::JsonObject.validate(b"[1,2]").is_err());
    }

    #[test]
    fn test_required_body() {
        let err = Payload::RequiredJsonObject.validate(b"").unwrap_err();
        assert_eq!(err.to_string(), "request body is required");

        let err = Payload::RequiredJsonObject.validate(b"{not json").unwrap_err();
        assert_eq!(err.error_type(), "parse_exception");
    }

    #[test]
    fn test_required_fields() {
        let rule = Payload::RequiredFields(&["query"]);
        assert!(rule.validate(br#"{"query":{"match_all":{}}}"#).is_ok());

        let err = rule.validate(br#"{"size":10}"#).unwrap_err();
        assert_eq!(err.error_type(), "action_request_validation_exception");
        assert_eq!(err.to_string(), "Validation Failed: 1: query is missing;");

        assert!(rule.validate(br#"{"query":null}"#).is_err());
    }

    #[test]
    fn test_ndjson_requires_trailing_newline() {
        let rule = Payload::NdJson("bulk");
        let body = b"{\"index\":{\"_index\":\"logs\"}}\n{\"msg\":\"hi\"}";

        let err = rule.validate(body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The bulk request must be terminated by a newline [\\n]"
        );

        let mut terminated = body.to_vec();
        terminated.push(b'\n');
        assert!(rule.validate(&terminated).is_ok());
    }

    #[test]
    fn test_ndjson_rejects_malformed_line() {
        let err = Payload::NdJson("msearch")
            .validate(b"{}\n{\"query\":\n")
            .unwrap_err();
        assert_eq!(err.to_string(), "malformed msearch line [2]");
    }

    #[test]
    fn test_ignored() {
        assert!(Payload::Ignored.validate(b"anything at all").is_ok());
    }
}
