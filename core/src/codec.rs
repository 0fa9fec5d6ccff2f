//! Process-wide JSON codec.
//!
//! `serde_json` needs no per-call setup, so the codec is a set of stateless
//! functions shared by every client style. The expected response shape is
//! the type parameter: `T` for one object, `Vec<T>` for an ordered sequence,
//! `()` for "no content".

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string(value).map_err(|e| ApiError::Encode(e.to_string()))
}

/// Decode a response body. An empty body reads as JSON `null`, which `()`
/// and `Option<T>` accept and every other shape rejects.
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))
}

pub fn decode_value<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Split a body into the raw elements of a multi-value response: the entries
/// of a JSON array, a lone object as one element, nothing for an empty body.
pub fn decode_sequence(body: &str) -> Result<Vec<Value>, ApiError> {
    match decode::<Value>(body)? {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        single => Ok(vec![single]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SampleDto;

    #[test]
    fn encode_then_decode_reproduces_value() {
        let dto = SampleDto::new(1, "userId");
        let back: SampleDto = decode(&encode(&dto).unwrap()).unwrap();
        assert_eq!(back, dto);
    }

    #[test]
    fn empty_body_is_no_content() {
        decode::<()>("").unwrap();
        decode::<()>("  \n").unwrap();
        assert_eq!(decode::<Option<SampleDto>>("").unwrap(), None);
    }

    #[test]
    fn empty_body_is_not_an_object() {
        assert!(matches!(decode::<SampleDto>(""), Err(ApiError::Decode(_))));
    }

    #[test]
    fn list_shape_keeps_order() {
        let list: Vec<SampleDto> =
            decode(r#"[{"id":2,"userId":"b"},{"id":1,"userId":"a"}]"#).unwrap();
        assert_eq!(list, vec![SampleDto::new(2, "b"), SampleDto::new(1, "a")]);
    }

    #[test]
    fn shape_mismatch_is_a_decode_error() {
        assert!(matches!(
            decode::<Vec<SampleDto>>(r#"{"id":1}"#),
            Err(ApiError::Decode(_))
        ));
        assert!(matches!(decode::<SampleDto>("not json"), Err(ApiError::Decode(_))));
    }

    #[test]
    fn sequence_accepts_array_object_and_empty() {
        assert_eq!(decode_sequence("[1,2,3]").unwrap().len(), 3);
        assert_eq!(decode_sequence(r#"{"id":1}"#).unwrap().len(), 1);
        assert!(decode_sequence("").unwrap().is_empty());
        assert!(matches!(decode_sequence("[1,"), Err(ApiError::Decode(_))));
    }
}
