//! Caller identity for request handlers.
//!
//! Sessions and login live upstream; by the time a request reaches this service the
//! authenticated user id travels in a trusted header. Handlers take a [`CurrentUser`]
//! and never see requests without one.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::InvalidHeaderName, request::Parts, HeaderMap, HeaderName},
};
use bookshelf_http::error::AppError;
use bookshelf_kernel::settings::AuthSettings;

/// Where to find the authenticated user id on incoming requests.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    header: HeaderName,
}

impl UserIdentity {
    pub fn new(header: &str) -> Result<Self, InvalidHeaderName> {
        Ok(Self {
            header: HeaderName::try_from(header)?,
        })
    }

    pub fn from_settings(settings: &AuthSettings) -> Result<Self, InvalidHeaderName> {
        Self::new(&settings.user_header)
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// The non-blank user id carried by `headers`, if any.
    pub fn resolve(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get(&self.header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

/// Authenticated caller. Rejects with 403 `not_logged_in` when no identity is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    UserIdentity: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = UserIdentity::from_ref(state);
        match identity.resolve(&parts.headers) {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                tracing::warn!(
                    target: "bookshelf-authz",
                    header = %identity.header(),
                    path = %parts.uri.path(),
                    "request without user identity"
                );
                Err(AppError::forbidden("user not logged in").with_code("not_logged_in"))
            }
        }
    }
}
