//! Session token generation and cookie handling

use axum::http::HeaderMap;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Session cookie name
pub const SESSION_COOKIE: &str = "policylens_session";

/// Generate a new opaque session token (256 bits, hex-encoded)
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Digest of a token as stored in the sessions table
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Build the Set-Cookie value for a fresh session
pub fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    )
}

/// Build the Set-Cookie value that clears the session cookie
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Extract the session token from the request's Cookie header
pub fn cookie_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;

    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(generate_token(), generate_token());
        assert_eq!(generate_token().len(), 64);
    }

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(token_digest("abc"), token_digest("abc"));
        assert_ne!(token_digest("abc"), token_digest("abd"));
    }

    #[test]
    fn test_cookie_round_trip() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            format!("other=1; {}=tok123; theme=dark", SESSION_COOKIE)
                .parse()
                .unwrap(),
        );
        assert_eq!(cookie_token(&headers), Some("tok123".to_string()));
    }

    #[test]
    fn test_missing_cookie() {
        let headers = HeaderMap::new();
        assert_eq!(cookie_token(&headers), None);
    }

    #[test]
    fn test_clear_cookie_expires() {
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}
