//! Business status codes with an embedded HTTP status.
//!
//! Services report outcomes as 6-digit string codes whose leading three
//! digits carry the HTTP status to write on the wire (`400000` maps to 400,
//! `413000` to 413). The trailing three digits distinguish business outcomes
//! that share an HTTP status.

use http::StatusCode;

/// Successful request.
pub const OK: &str = "200000";

/// Request input failed validation or carried a bad argument.
pub const INVALID_INPUT: &str = "400000";

/// Request body exceeded the configured limit.
pub const PAYLOAD_TOO_LARGE: &str = "413000";

/// Unclassified server-side failure.
pub const INTERNAL_SERVER_ERROR: &str = "500000";

/// Decode the HTTP status embedded in a business status code.
///
/// The code must be exactly six digits; the embedded status is the integer
/// value divided by 1000. A missing, blank, wrongly sized, or non-numeric
/// code decodes to 400, as does a code whose quotient is not a valid HTTP
/// status.
pub fn decode_http_status(code: Option<&str>) -> StatusCode {
    let Some(code) = code else {
        return StatusCode::BAD_REQUEST;
    };

    if code.trim().is_empty() || code.len() != 6 {
        return StatusCode::BAD_REQUEST;
    }

    let Ok(numeric) = code.parse::<u32>() else {
        return StatusCode::BAD_REQUEST;
    };

    StatusCode::from_u16((numeric / 1000) as u16).unwrap_or(StatusCode::BAD_REQUEST)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_codes() {
        assert_eq!(decode_http_status(Some(OK)), StatusCode::OK);
        assert_eq!(decode_http_status(Some(INVALID_INPUT)), StatusCode::BAD_REQUEST);
        assert_eq!(
            decode_http_status(Some(PAYLOAD_TOO_LARGE)),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            decode_http_status(Some(INTERNAL_SERVER_ERROR)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_decode_arbitrary_six_digit_code() {
        assert_eq!(
            decode_http_status(Some("404123")),
            StatusCode::NOT_FOUND,
            "trailing digits must not affect the decoded status"
        );
    }

    #[test]
    fn test_decode_missing_code() {
        assert_eq!(decode_http_status(None), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_decode_blank_code() {
        assert_eq!(decode_http_status(Some("")), StatusCode::BAD_REQUEST);
        assert_eq!(decode_http_status(Some("      ")), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_decode_wrong_length() {
        assert_eq!(decode_http_status(Some("400")), StatusCode::BAD_REQUEST);
        assert_eq!(decode_http_status(Some("4000000")), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_decode_non_numeric() {
        assert_eq!(decode_http_status(Some("40000x")), StatusCode::BAD_REQUEST);
        assert_eq!(decode_http_status(Some("abcdef")), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_decode_invalid_http_status() {
        // 42000 / 1000 = 42, which is not a representable HTTP status.
        assert_eq!(decode_http_status(Some("042000")), StatusCode::BAD_REQUEST);
        assert_eq!(decode_http_status(Some("099999")), StatusCode::BAD_REQUEST);
    }
}
