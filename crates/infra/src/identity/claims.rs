//! Token claim decoding
//!
//! Reads the payload segment of an identity JWT. The signature is not
//! checked here; the backend verifies tokens it receives.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use homechef_core::IdentityError;
use homechef_domain::TokenClaims;

/// Decode the claims of a compact JWT (`header.payload.signature`)
///
/// # Errors
/// `IdentityError::Provider` if the token is not a well-formed JWT.
pub fn decode_claims(token: &str) -> Result<TokenClaims, IdentityError> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(IdentityError::Provider("token is not a JWT".to_string())),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|err| IdentityError::Provider(format!("token payload is not base64url: {err}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|err| IdentityError::Provider(format!("token payload is not valid claims: {err}")))
}

#[cfg(test)]
pub(crate) fn encode_test_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

#[cfg(test)]
mod tests {
    use homechef_domain::Role;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decodes_role_and_standard_claims() {
        let token = encode_test_token(&json!({
            "sub": "uid-1",
            "email": "chef@x.com",
            "role": "chef",
            "exp": 1_900_000_000,
            "auth_time": 1_700_000_000
        }));

        let claims = decode_claims(&token).unwrap();

        assert_eq!(claims.subject.as_deref(), Some("uid-1"));
        assert_eq!(claims.role(), Role::Chef);
        assert_eq!(claims.expires_at, Some(1_900_000_000));
        assert!(claims.extra.contains_key("auth_time"));
    }

    #[test]
    fn test_missing_role_defaults_to_user() {
        let token = encode_test_token(&json!({"sub": "uid-2"}));
        assert_eq!(decode_claims(&token).unwrap().role(), Role::User);
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        assert!(matches!(decode_claims("opaque"), Err(IdentityError::Provider(_))));
        assert!(matches!(decode_claims("a.!!!.c"), Err(IdentityError::Provider(_))));
    }
}
