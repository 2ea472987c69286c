//! Request extractors

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use inkwell_common::errors::AppError;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

/// JSON body that has been deserialized and validated
///
/// Both malformed JSON and failed validation are rejected with 400 and the
/// structured error body, rather than axum's default 415/422 plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::InvalidFormat {
                message: rejection.body_text(),
            })?;

        value.validate().map_err(validation_error)?;

        Ok(Self(value))
    }
}

/// Path parameters whose parse failures use the structured error body
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::InvalidFormat {
                message: rejection.body_text(),
            })?;

        Ok(Self(value))
    }
}

/// Query string whose parse failures use the structured error body
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::InvalidFormat {
                message: rejection.body_text(),
            })?;

        Ok(Self(value))
    }
}

fn validation_error(errors: ValidationErrors) -> AppError {
    let field = errors
        .field_errors()
        .keys()
        .min()
        .map(|name| name.to_string());

    AppError::Validation {
        message: errors.to_string(),
        field,
    }
}
