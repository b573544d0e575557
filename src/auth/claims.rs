//! Best-effort decoding of self-describing token claims
//!
//! MendHub access credentials are JWTs whose payload carries an `exp` claim
//! in seconds since the Unix epoch. This module splits and base64-decodes
//! the payload segment **without any signature verification** -- the result
//! is an [`UntrustedClaims`] value that is purely a local scheduling hint
//! used to decide when to renew. It is never a trust boundary; the server
//! remains the only authority on whether a credential is accepted.
//!
//! Decoding never fails with an error. Any malformed, truncated, or
//! non-JWT input (some renewal credentials are opaque random strings)
//! yields `None`, which callers treat as "no claim found".

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

/// Claims decoded from a token payload without signature verification.
///
/// The name is deliberate: nothing in here has been authenticated. The
/// values are safe to use for scheduling renewals and nothing else.
///
/// # Examples
///
/// ```
/// use mendhub_session::auth::claims::decode_claims;
///
/// // Opaque strings decode to no claims rather than an error.
/// assert!(decode_claims("not-a-jwt").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UntrustedClaims {
    /// Expiry in seconds since the Unix epoch, when the payload carried a
    /// numeric `exp` claim
    pub expires_at: Option<i64>,

    /// The `sub` claim, when present
    pub subject: Option<String>,
}

/// Decodes the payload segment of a token into [`UntrustedClaims`].
///
/// Returns `None` when the token does not look like a JWT (fewer than two
/// dot-separated segments), when the payload segment is not valid
/// URL-safe base64, or when the decoded payload is not a JSON object.
///
/// # Arguments
///
/// * `token` - The raw token string
pub fn decode_claims(token: &str) -> Option<UntrustedClaims> {
    let mut segments = token.split('.');
    let _header = segments.next()?;
    let payload = segments.next()?;

    let decoded = URL_SAFE_NO_PAD.decode(payload.as_bytes()).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    let object = value.as_object()?;

    Some(UntrustedClaims {
        expires_at: object.get("exp").and_then(serde_json::Value::as_i64),
        subject: object
            .get("sub")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
    })
}

/// Extracts the expiry claim from a token, if one is embedded.
///
/// Convenience wrapper over [`decode_claims`] for the common case where
/// only the expiry matters.
///
/// # Examples
///
/// ```
/// use base64::engine::general_purpose::URL_SAFE_NO_PAD;
/// use base64::Engine as _;
/// use mendhub_session::auth::claims::decode_expiry;
///
/// let payload = URL_SAFE_NO_PAD.encode(br#"{"exp":1900000000}"#);
/// let token = format!("eyJhbGciOiJub25lIn0.{}.sig", payload);
/// assert_eq!(decode_expiry(&token), Some(1_900_000_000));
///
/// assert_eq!(decode_expiry("an-opaque-renewal-credential"), None);
/// ```
pub fn decode_expiry(token: &str) -> Option<i64> {
    decode_claims(token).and_then(|claims| claims.expires_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_payload(json: &str) -> String {
        format!(
            "eyJhbGciOiJub25lIn0.{}.signature",
            URL_SAFE_NO_PAD.encode(json.as_bytes())
        )
    }

    // -----------------------------------------------------------------------
    // Well-formed tokens
    // -----------------------------------------------------------------------

    #[test]
    fn test_decode_expiry_from_valid_token() {
        let token = encode_payload(r#"{"exp":1900000000,"sub":"user-7"}"#);
        assert_eq!(decode_expiry(&token), Some(1_900_000_000));
    }

    #[test]
    fn test_decode_claims_extracts_subject() {
        let token = encode_payload(r#"{"exp":1900000000,"sub":"user-7"}"#);
        let claims = decode_claims(&token).expect("claims");
        assert_eq!(claims.subject.as_deref(), Some("user-7"));
    }

    #[test]
    fn test_decode_token_without_signature_segment() {
        // Two segments only: header.payload. Still decodable.
        let payload = URL_SAFE_NO_PAD.encode(br#"{"exp":123}"#);
        let token = format!("eyJhbGciOiJub25lIn0.{}", payload);
        assert_eq!(decode_expiry(&token), Some(123));
    }

    #[test]
    fn test_decode_payload_with_extra_fields() {
        let token = encode_payload(r#"{"iat":1,"exp":99,"aud":"mendhub","roles":["tech"]}"#);
        assert_eq!(decode_expiry(&token), Some(99));
    }

    // -----------------------------------------------------------------------
    // Degenerate input never errors
    // -----------------------------------------------------------------------

    #[test]
    fn test_opaque_string_yields_none() {
        assert!(decode_claims("c29tZS1vcGFxdWUtcmVuZXdhbC1jcmVkZW50aWFs").is_none());
    }

    #[test]
    fn test_empty_string_yields_none() {
        assert!(decode_claims("").is_none());
    }

    #[test]
    fn test_invalid_base64_payload_yields_none() {
        assert!(decode_claims("header.!!!not-base64!!!.sig").is_none());
    }

    #[test]
    fn test_payload_not_json_yields_none() {
        let payload = URL_SAFE_NO_PAD.encode(b"plain text, not json");
        let token = format!("header.{}.sig", payload);
        assert!(decode_claims(&token).is_none());
    }

    #[test]
    fn test_payload_json_array_yields_none() {
        let payload = URL_SAFE_NO_PAD.encode(b"[1,2,3]");
        let token = format!("header.{}.sig", payload);
        assert!(decode_claims(&token).is_none());
    }

    #[test]
    fn test_missing_exp_claim_yields_claims_without_expiry() {
        let token = encode_payload(r#"{"sub":"user-7"}"#);
        let claims = decode_claims(&token).expect("claims");
        assert!(claims.expires_at.is_none());
        assert_eq!(decode_expiry(&token), None);
    }

    #[test]
    fn test_non_numeric_exp_claim_treated_as_absent() {
        let token = encode_payload(r#"{"exp":"tomorrow"}"#);
        assert_eq!(decode_expiry(&token), None);
    }

    #[test]
    fn test_padded_base64_payload_yields_none() {
        // Standard base64 with padding is not valid URL_SAFE_NO_PAD input.
        let token = "header.eyJleHAiOjF9==.sig";
        assert!(decode_claims(token).is_none());
    }
}
