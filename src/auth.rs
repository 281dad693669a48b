use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::WarikanError;

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, PartialEq)]
pub enum AuthorizationLevel {
    /// No key configured, every caller is let through.
    Open,
    Client,
}

/// Shared secret clients present in the `X-API-Key` header.
#[derive(Clone)]
pub struct ApiKey {
    signing_key: Option<Vec<u8>>,
    expected_tag: Option<Vec<u8>>,
}

impl ApiKey {
    pub fn new(key: Option<&str>) -> Self {
        match key.filter(|k| !k.is_empty()) {
            Some(key) => {
                let signing_key = Sha256::digest(key.as_bytes()).to_vec();
                let expected_tag = compute_tag(&signing_key, key);
                Self {
                    signing_key: Some(signing_key),
                    expected_tag: Some(expected_tag),
                }
            }
            None => Self::disabled(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            signing_key: None,
            expected_tag: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.expected_tag.is_some()
    }

    /// Keys are compared through their HMAC tags so the comparison runs in
    /// constant time.
    pub fn check(&self, presented: Option<&str>) -> Option<AuthorizationLevel> {
        let (Some(signing_key), Some(expected_tag)) = (&self.signing_key, &self.expected_tag)
        else {
            return Some(AuthorizationLevel::Open);
        };
        let presented = presented?;
        let mut hmac_hasher = HmacSha256::new_from_slice(signing_key).ok()?;
        hmac_hasher.update(presented.as_bytes());
        hmac_hasher
            .verify_slice(expected_tag)
            .ok()
            .map(|_| AuthorizationLevel::Client)
    }
}

fn compute_tag(signing_key: &[u8], key: &str) -> Vec<u8> {
    let mut hmac_hasher =
        HmacSha256::new_from_slice(signing_key).expect("HMAC accepts keys of any length");
    hmac_hasher.update(key.as_bytes());
    hmac_hasher.finalize().into_bytes().to_vec()
}

pub fn check_authorization_level(request: &HttpRequest) -> Option<AuthorizationLevel> {
    let Some(api_key) = request.app_data::<web::Data<ApiKey>>() else {
        return Some(AuthorizationLevel::Open);
    };
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    api_key.check(presented)
}

/// Extractor that rejects requests without a valid API key.
pub struct Authorized(pub AuthorizationLevel);

impl FromRequest for Authorized {
    type Error = WarikanError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            check_authorization_level(req)
                .map(Authorized)
                .ok_or(WarikanError::Unauthorized),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_disabled_key_lets_everyone_in() {
        let key = ApiKey::new(None);
        assert!(!key.is_enabled());
        assert_eq!(key.check(None), Some(AuthorizationLevel::Open));
        assert_eq!(ApiKey::new(Some("")).check(None), Some(AuthorizationLevel::Open));
    }

    #[test]
    fn test_key_must_match() {
        let key = ApiKey::new(Some("s3cret"));
        assert_eq!(key.check(Some("s3cret")), Some(AuthorizationLevel::Client));
        assert_eq!(key.check(Some("s3cre")), None);
        assert_eq!(key.check(Some("")), None);
        assert_eq!(key.check(None), None);
    }

    #[test]
    fn test_header_lookup() {
        let req = TestRequest::default()
            .app_data(web::Data::new(ApiKey::new(Some("s3cret"))))
            .insert_header((API_KEY_HEADER, "s3cret"))
            .to_http_request();
        assert_eq!(check_authorization_level(&req), Some(AuthorizationLevel::Client));

        let req = TestRequest::default()
            .app_data(web::Data::new(ApiKey::new(Some("s3cret"))))
            .to_http_request();
        assert_eq!(check_authorization_level(&req), None);
    }

    #[test]
    fn test_without_app_data_requests_are_open() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(check_authorization_level(&req), Some(AuthorizationLevel::Open));
    }
}
