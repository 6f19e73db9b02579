use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::{Rejection, Reply, reject};

pub async fn recover_error(err: Rejection) -> Result<impl Reply, Infallible> {
    let failure = if let Some(failure) = err.find::<ApiFailure>() {
        failure.clone()
    } else if err.is_not_found() {
        ApiFailure::new(ApiErrorCode::NotFound, "no such route")
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        ApiFailure::new(ApiErrorCode::ValidationError, e.to_string())
    } else if let Some(e) = err.find::<reject::InvalidQuery>() {
        ApiFailure::new(ApiErrorCode::ValidationError, e.to_string())
    } else if let Some(e) = err.find::<reject::UnsupportedMediaType>() {
        ApiFailure::new(ApiErrorCode::ValidationError, e.to_string())
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        ApiFailure::new(ApiErrorCode::MethodNotAllowed, "method not allowed")
    } else {
        error!("unhandled rejection: {:?}", err);
        ApiFailure::new(ApiErrorCode::InternalError, "internal error")
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(&failure));
    let reply = warp::reply::with_status(json, failure.status);
    let mut response = reply.into_response();
    if let Some(secs) = failure.retry_after_secs {
        response
            .headers_mut()
            .insert(warp::http::header::RETRY_AFTER, secs.into());
    }
    Ok(response)
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub status: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("No Spotify account is linked to this session")]
    NoUpstreamToken,
    #[error("Spotify refused to refresh the access token, log in again")]
    UpstreamRefreshFailed,
    #[error("Invalid request")]
    ValidationError,
    #[error("Upstream request failed")]
    UpstreamHttpError,
    #[error("Rate limited by upstream")]
    RateLimited,
    #[error("Upstream unreachable")]
    UpstreamUnreachable,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ApiErrorCode::NotAuthenticated
            | ApiErrorCode::NoUpstreamToken
            | ApiErrorCode::UpstreamRefreshFailed => StatusCode::UNAUTHORIZED,
            ApiErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ApiErrorCode::UpstreamHttpError => StatusCode::BAD_GATEWAY,
            ApiErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::UpstreamUnreachable | ApiErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Rejection carried from a handler to `recover_error`.
#[derive(Debug, Clone)]
pub struct ApiFailure {
    pub code: ApiErrorCode,
    pub message: String,
    pub status: StatusCode,
    pub retry_after_secs: Option<u64>,
}

impl ApiFailure {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiFailure {
            code,
            message: message.into(),
            status: code.status(),
            retry_after_secs: None,
        }
    }

    /// Forwards an upstream status; nonsense codes fall back to the default.
    fn with_upstream_status(mut self, status: u16) -> Self {
        if let Ok(status) = StatusCode::from_u16(status) {
            self.status = status;
        }
        self
    }

    pub fn internal<E: std::fmt::Display>(error: E) -> Self {
        warn!("Internal error: {}", error);
        ApiFailure::new(ApiErrorCode::InternalError, ApiErrorCode::InternalError.to_string())
    }

    pub fn not_authenticated() -> Self {
        ApiFailure::new(
            ApiErrorCode::NotAuthenticated,
            ApiErrorCode::NotAuthenticated.to_string(),
        )
    }
}

impl reject::Reject for ApiFailure {}

impl From<AuthError> for ApiFailure {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::NotAuthenticated
            | AuthError::TokenInvalid
            | AuthError::TokenExpired
            | AuthError::UserNotFound => ApiFailure::not_authenticated(),
            other => ApiFailure::internal(other),
        }
    }
}

impl From<TokenError> for ApiFailure {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::NoToken => ApiFailure::new(ApiErrorCode::NoUpstreamToken, error.to_string()),
            TokenError::Refresh(_) => {
                ApiFailure::new(ApiErrorCode::UpstreamRefreshFailed, error.to_string())
            }
            TokenError::RateLimited { retry_after_secs } => {
                ApiFailure::from(ProxyError::RateLimited {
                    status: 429,
                    retry_after_secs,
                })
            }
            TokenError::Unreachable(_) => {
                ApiFailure::new(ApiErrorCode::UpstreamUnreachable, error.to_string())
            }
            TokenError::Malformed(e) | TokenError::Store(e) => ApiFailure::internal(e),
        }
    }
}

impl From<ProxyError> for ApiFailure {
    fn from(error: ProxyError) -> Self {
        match error {
            ProxyError::MissingParameter { .. } | ProxyError::InvalidParameter { .. } => {
                ApiFailure::new(ApiErrorCode::ValidationError, error.to_string())
            }
            ProxyError::Token(e) => ApiFailure::from(e),
            ProxyError::UpstreamHttp { status, message } => {
                ApiFailure::new(ApiErrorCode::UpstreamHttpError, message)
                    .with_upstream_status(status)
            }
            ProxyError::RateLimited {
                status,
                retry_after_secs,
            } => ApiFailure {
                retry_after_secs,
                ..ApiFailure::new(ApiErrorCode::RateLimited, error.to_string())
                    .with_upstream_status(status)
            },
            ProxyError::Unreachable(_) => {
                warn!("{}", error);
                ApiFailure::new(ApiErrorCode::UpstreamUnreachable, error.to_string())
            }
            ProxyError::InternalError(e) => ApiFailure::internal(e),
        }
    }
}
