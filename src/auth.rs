use std::{
    future::{ready, Ready},
    time::Duration,
};

use actix_web::{
    http::header::{HeaderMap, AUTHORIZATION},
    web, FromRequest, HttpRequest,
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{config::Configuration, error::Error, error_code::ErrorCode};

const ISSUER: &str = "tubely-access";

#[derive(Debug, thiserror::Error)]
pub(crate) enum AuthError {
    #[error("Authorization header is missing")]
    MissingToken,

    #[error("Authorization header is not a bearer token")]
    MalformedHeader,

    #[error("Token failed validation")]
    Validate(#[source] jsonwebtoken::errors::Error),

    #[error("Token subject is not a user id")]
    Subject(#[source] uuid::Error),

    #[error("Failed to sign token")]
    Sign(#[source] jsonwebtoken::errors::Error),
}

impl AuthError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingToken | Self::MalformedHeader => ErrorCode::MISSING_TOKEN,
            Self::Validate(_) | Self::Subject(_) | Self::Sign(_) => ErrorCode::INVALID_TOKEN,
        }
    }
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
struct Claims {
    iss: String,
    sub: String,
    iat: i64,
    exp: i64,
}

/// Pull the credential out of an `Authorization: Bearer <token>` header
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MalformedHeader)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    Ok(token)
}

/// Check signature, issuer and expiry, returning the user the token was issued to
pub(crate) fn validate_token(token: &str, secret: &str) -> Result<Uuid, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);
    validation.leeway = 0;

    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(AuthError::Validate)?;

    Uuid::parse_str(&data.claims.sub).map_err(AuthError::Subject)
}

pub(crate) fn issue_token(
    user_id: Uuid,
    secret: &str,
    expires_in: Duration,
) -> Result<String, AuthError> {
    let now = OffsetDateTime::now_utc().unix_timestamp();

    let claims = Claims {
        iss: String::from(ISSUER),
        sub: user_id.to_string(),
        iat: now,
        exp: now.saturating_add(i64::try_from(expires_in.as_secs()).unwrap_or(i64::MAX)),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(AuthError::Sign)
}

pub(crate) fn authenticate(req: &HttpRequest) -> Result<Uuid, AuthError> {
    let config = req
        .app_data::<web::Data<Configuration>>()
        .ok_or(AuthError::MissingToken)?;

    let token = bearer_token(req.headers())?;

    validate_token(token, &config.server.jwt_secret)
}

/// The user a request's bearer token was issued to
#[derive(Clone, Copy, Debug)]
pub(crate) struct Authenticated(pub(crate) Uuid);

impl FromRequest for Authenticated {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(authenticate(req).map(Authenticated).map_err(Error::from))
    }
}

#[cfg(test)]
mod tests {
    use super::{bearer_token, issue_token, validate_token, AuthError};
    use actix_web::http::header::{HeaderMap, HeaderValue, AUTHORIZATION};
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn issued_token_validates() {
        let user_id = Uuid::new_v4();

        let token = issue_token(user_id, "secret", Duration::from_secs(60)).expect("signed");

        assert_eq!(validate_token(&token, "secret").expect("valid"), user_id);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token(Uuid::new_v4(), "secret", Duration::from_secs(60)).expect("signed");

        assert!(matches!(
            validate_token(&token, "other secret"),
            Err(AuthError::Validate(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token(Uuid::new_v4(), "secret", Duration::ZERO).expect("signed");

        std::thread::sleep(Duration::from_millis(1100));

        assert!(matches!(
            validate_token(&token, "secret"),
            Err(AuthError::Validate(_))
        ));
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let claims = serde_json::json!({
            "iss": "someone-else",
            "sub": Uuid::new_v4().to_string(),
            "iat": now,
            "exp": now + 60,
        });

        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(b"secret"),
        )
        .expect("signed");

        assert!(matches!(
            validate_token(&token, "secret"),
            Err(AuthError::Validate(_))
        ));
    }

    #[test]
    fn bearer_header_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::MissingToken)
        ));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::MalformedHeader)
        ));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).expect("token"), "abc.def.ghi");
    }
}
