//! The unified error envelope and the stable numeric error codes every
//! component error maps to. One code per failure mode, grouped into fixed
//! thousand-ranges; additions only ever take the next free number in a
//! range, they never renumber an existing one.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::domain::encode::EncodingError;
use crate::domain::enclave::EnclaveError;
use crate::domain::extract::ExtractError;
use crate::domain::oracle::OracleError;
use crate::domain::price::PriceFeedError;
use crate::domain::random::RandomError;
use crate::domain::validate::ValidationError;

/// `{errorCode, errorMessage, errorDetails?, responseStatusCode?, requestId?}`
/// — the wire shape every route returns on failure.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "errorCode")]
    pub error_code: u32,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
    #[serde(rename = "errorDetails", skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(rename = "responseStatusCode", skip_serializing_if = "Option::is_none")]
    pub response_status_code: Option<u16>,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Top-level error type C7 translates every domain error into. Carries
/// enough to fill [`ErrorResponse`] without leaking anything [`ValidationError`]
/// already masked.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Enclave(#[from] EnclaveError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    PriceFeed(#[from] PriceFeedError),
    #[error(transparent)]
    Random(#[from] RandomError),
    #[error("request body could not be parsed: {0}")]
    MalformedRequest(String),
    #[error("internal error")]
    Internal,
}

impl ApiError {
    fn code_and_message(&self) -> (u32, String) {
        match self {
            ApiError::Validation(err) => (validation_code(err), err.to_string()),
            ApiError::Extract(ExtractError::RequestBodyTooLarge) => {
                // 7001 is the request-size code; it is not shared with any
                // attestation-context error.
                (7001, ExtractError::RequestBodyTooLarge.to_string())
            }
            ApiError::Extract(err) => (extract_code(err), err.to_string()),
            ApiError::Encoding(err) => (encoding_code(err), err.to_string()),
            ApiError::Enclave(err) => (enclave_code(err), err.to_string()),
            ApiError::Oracle(err) => (oracle_code(err), err.to_string()),
            ApiError::PriceFeed(err) => (price_feed_code(err), err.to_string()),
            ApiError::Random(RandomError::InvalidMax) => (1020, RandomError::InvalidMax.to_string()),
            ApiError::Random(RandomError::Oracle(inner)) => (oracle_code(inner), inner.to_string()),
            ApiError::MalformedRequest(reason) => (7000, reason.clone()),
            ApiError::Internal => (8000, "internal error".to_string()),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Random(RandomError::InvalidMax) => StatusCode::BAD_REQUEST,
            ApiError::Extract(ExtractError::RequestBodyTooLarge) => StatusCode::BAD_REQUEST,
            ApiError::Extract(ExtractError::AttestationDataTooLarge) => StatusCode::BAD_REQUEST,
            ApiError::Extract(_) => StatusCode::BAD_GATEWAY,
            ApiError::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Enclave(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Oracle(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Random(RandomError::Oracle(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::PriceFeed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The upstream HTTP status code, when this error carries one through
    /// from an extractor fetch.
    fn upstream_status(&self) -> Option<u16> {
        match self {
            ApiError::Extract(ExtractError::Http(http_err)) => http_err.upstream_status(),
            _ => None,
        }
    }

    pub fn into_response_with_request_id(self, request_id: String) -> Response {
        let status = self.status();
        let upstream_status = self.upstream_status();
        let (error_code, error_message) = self.code_and_message();
        tracing::warn!(%request_id, error_code, %error_message, "request failed");
        let body = ErrorResponse {
            error_code,
            error_message,
            error_details: None,
            response_status_code: upstream_status,
            request_id: Some(request_id),
        };
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let upstream_status = self.upstream_status();
        let (error_code, error_message) = self.code_and_message();
        let body = ErrorResponse {
            error_code,
            error_message,
            error_details: None,
            response_status_code: upstream_status,
            request_id: None,
        };
        (status, Json(body)).into_response()
    }
}

fn validation_code(err: &ValidationError) -> u32 {
    match err {
        ValidationError::MissingField(_) => 1000,
        ValidationError::InvalidMethod => 1001,
        ValidationError::InvalidMethodFields => 1002,
        ValidationError::InvalidResponseFormat => 1003,
        ValidationError::InvalidHtmlResultType => 1004,
        ValidationError::ElementRequiresStringEncoding => 1005,
        ValidationError::InvalidEncodingValue => 1006,
        ValidationError::InvalidEncodingPrecision => 1007,
        ValidationError::InvalidTargetUrl => 1008,
        ValidationError::TargetNotWhitelisted => 1009,
        ValidationError::InvalidPriceFeedRequest => 1010,
        ValidationError::UnsafeHeader { .. } => 1011,
    }
}

fn extract_code(err: &ExtractError) -> u32 {
    match err {
        ExtractError::RequestBodyTooLarge => 7001,
        ExtractError::ResponseBodyTooLarge => 4001,
        ExtractError::SelectorNoMatch => 4002,
        ExtractError::InvalidScalar => 4003,
        ExtractError::AttestationDataTooLarge => 4004,
        ExtractError::Http(_) => 4005,
        ExtractError::PriceFeed(inner) => price_feed_code(inner),
    }
}

fn encoding_code(err: &EncodingError) -> u32 {
    match err {
        EncodingError::Overflow => 5000,
    }
}

fn enclave_code(err: &EnclaveError) -> u32 {
    match err {
        EnclaveError::TargetInfoRead(_) => 2000,
        EnclaveError::TargetInfoWrite(_) => 2001,
        EnclaveError::UserReportDataWrite(_) => 2002,
        EnclaveError::QuoteRead(_) => 2003,
        EnclaveError::QuoteTooSmall { .. } => 2004,
        EnclaveError::AttestationTypeRead(_) => 2005,
    }
}

fn oracle_code(err: &OracleError) -> u32 {
    match err {
        OracleError::Encoding(inner) => encoding_code(inner),
        OracleError::Enclave(inner) => enclave_code(inner),
    }
}

fn price_feed_code(err: &PriceFeedError) -> u32 {
    match err {
        PriceFeedError::InsufficientExchangeData => 6000,
        PriceFeedError::ParseFailed { .. } => 6001,
    }
}
