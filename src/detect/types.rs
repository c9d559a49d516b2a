//! Detection wire types

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// One detected object: corner coordinates, label, and confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    /// Left edge, pixels
    pub x1: i32,
    /// Top edge, pixels
    pub y1: i32,
    /// Right edge, pixels
    pub x2: i32,
    /// Bottom edge, pixels
    pub y2: i32,
    /// Class label
    pub label: String,
    /// Confidence score in `[0, 1]`
    pub conf: f64,
}

/// Response body of the detection service
///
/// The service returns an `{"error": ...}`-only object on failure, so every
/// field defaults; an absent `success` flag parses as a failed request.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct DetectResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub results: Vec<DetectionBox>,
    #[serde(default)]
    pub time_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
}

/// Parse a raw response body into a batch of boxes
///
/// A non-success response is reported as [`EngineError::Detect`] carrying the
/// service's error message.
pub(crate) fn parse_detect_response(body: &[u8]) -> Result<Vec<DetectionBox>> {
    let resp: DetectResponse = serde_json::from_slice(body)?;
    if !resp.success {
        return Err(EngineError::detect(format!(
            "backend rejected request: {}",
            resp.error.unwrap_or_else(|| "unknown error".to_string())
        )));
    }
    log::debug!(
        "detection completed: count={} time_ms={}",
        resp.count,
        resp.time_ms
    );
    Ok(resp.results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_response() {
        let body = br#"{
            "success": true,
            "count": 1,
            "results": [{"x1": 10, "y1": 10, "x2": 50, "y2": 50, "label": "person", "conf": 0.9}],
            "time_ms": 42
        }"#;

        let boxes = parse_detect_response(body).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].label, "person");
        assert_eq!(boxes[0].x2, 50);
    }

    #[test]
    fn rejects_failure_response() {
        let body = br#"{"success": false, "error": "no model loaded"}"#;
        let err = parse_detect_response(body).unwrap_err();
        assert!(err.to_string().contains("no model loaded"));
    }

    #[test]
    fn error_only_body_parses_as_failure() {
        // the backend omits `success` entirely on internal errors
        let body = br#"{"error": "image decode failed"}"#;
        assert!(parse_detect_response(body).is_err());
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        assert!(parse_detect_response(b"not json").is_err());
    }
}
