//! C3: fetch the target (or dispatch to the price aggregator), apply
//! precision truncation, and enforce the attestation-data size caps.

use super::price::{self, PriceFeedError};
use super::request::{AttestationRequest, EncodingValueKind, HtmlResultType, ResponseFormat, Target};
use crate::domain::RuntimeContext;
use crate::infra::html;
use crate::infra::http_client::HttpClientError;

const RESPONSE_BODY_CAP: usize = 1024 * 1024;
const REQUEST_BODY_CAP: usize = 10 * 1024;
const SCALAR_DATA_CAP: usize = 255;
const STRING_DATA_CAP: usize = 3072;

pub struct ExtractResult {
    pub response_body: String,
    pub attestation_data: String,
    pub status_code: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("requestBody exceeds the {REQUEST_BODY_CAP} byte cap")]
    RequestBodyTooLarge,
    #[error("upstream response exceeds the {RESPONSE_BODY_CAP} byte cap")]
    ResponseBodyTooLarge,
    #[error("selector did not match any node")]
    SelectorNoMatch,
    #[error("extracted value is not representable as the requested encoding")]
    InvalidScalar,
    #[error("attestation data exceeds its size cap for this encoding")]
    AttestationDataTooLarge,
    #[error(transparent)]
    Http(#[from] HttpClientError),
    #[error(transparent)]
    PriceFeed(#[from] PriceFeedError),
}

pub async fn extract(ctx: &RuntimeContext, req: &AttestationRequest) -> Result<ExtractResult, ExtractError> {
    if let Some(body) = &req.request_body {
        if body.len() > REQUEST_BODY_CAP {
            return Err(ExtractError::RequestBodyTooLarge);
        }
    }

    match req.target() {
        Target::PriceFeed(asset) => extract_price_feed(ctx, req, asset).await,
        Target::External => match req.response_format {
            ResponseFormat::Html => extract_html(ctx, req).await,
            ResponseFormat::Json => extract_json(ctx, req).await,
        },
    }
}

async fn extract_price_feed(
    ctx: &RuntimeContext,
    req: &AttestationRequest,
    asset: super::request::PriceFeedAsset,
) -> Result<ExtractResult, ExtractError> {
    let result = price::aggregate(ctx, asset).await?;
    let truncated = truncate_to_precision(result.volume_weighted_avg, req.encoding_options.precision);
    let response_body = serde_json::to_string(&result).unwrap_or_default();
    check_attestation_size(&truncated, EncodingValueKind::Float)?;
    Ok(ExtractResult {
        response_body,
        attestation_data: truncated,
        status_code: 200,
    })
}

async fn extract_html(ctx: &RuntimeContext, req: &AttestationRequest) -> Result<ExtractResult, ExtractError> {
    let (body, status_code) = crate::infra::http_client::fetch(&ctx.http, req, RESPONSE_BODY_CAP).await?;
    let result_type = req.html_result_type.unwrap_or(HtmlResultType::Value);
    let extracted = html::select(&body, &req.selector, result_type).ok_or(ExtractError::SelectorNoMatch)?;
    let attestation_data = post_process(&extracted, req)?;
    Ok(ExtractResult {
        response_body: body,
        attestation_data,
        status_code,
    })
}

async fn extract_json(ctx: &RuntimeContext, req: &AttestationRequest) -> Result<ExtractResult, ExtractError> {
    let (body, status_code) = crate::infra::http_client::fetch(&ctx.http, req, RESPONSE_BODY_CAP).await?;
    let value: serde_json::Value = serde_json::from_str(&body).map_err(|_| ExtractError::InvalidScalar)?;
    let leaf = json_path(&value, &req.selector).ok_or(ExtractError::SelectorNoMatch)?;
    let extracted = stringify_leaf(leaf)?;
    let attestation_data = post_process(&extracted, req)?;
    Ok(ExtractResult {
        response_body: body,
        attestation_data,
        status_code,
    })
}

/// Normalize `a[0].b` to `a.0.b` and walk the resulting dotted path.
fn json_path<'a>(value: &'a serde_json::Value, selector: &str) -> Option<&'a serde_json::Value> {
    let normalized = selector.replace('[', ".").replace(']', "");
    let mut cursor = value;
    for segment in normalized.split('.').filter(|s| !s.is_empty()) {
        cursor = if let Ok(index) = segment.parse::<usize>() {
            cursor.get(index)?
        } else {
            cursor.get(segment)?
        };
    }
    Some(cursor)
}

fn stringify_leaf(value: &serde_json::Value) -> Result<String, ExtractError> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ExtractError::InvalidScalar),
    }
}

fn post_process(raw: &str, req: &AttestationRequest) -> Result<String, ExtractError> {
    let value = match req.encoding_options.value {
        EncodingValueKind::Float => {
            let parsed = raw.parse::<f64>().map_err(|_| ExtractError::InvalidScalar)?;
            if !parsed.is_finite() {
                return Err(ExtractError::InvalidScalar);
            }
            truncate_to_precision(parsed, req.encoding_options.precision)
        }
        EncodingValueKind::Int | EncodingValueKind::String => raw.to_string(),
    };
    check_attestation_size(&value, req.encoding_options.value)?;
    Ok(value)
}

/// The prepared attestation data is a fixed-width field (255 bytes for
/// float/int, 3072 for string) that a `float` value may still grow by one
/// byte if it lacks a decimal point. The cap is therefore checked strictly
/// below the fixed width for scalars, leaving that byte of headroom
/// regardless of kind (255 raw bytes is rejected, 254 accepted).
fn check_attestation_size(value: &str, kind: EncodingValueKind) -> Result<(), ExtractError> {
    let exceeds = match kind {
        EncodingValueKind::String => value.len() > STRING_DATA_CAP,
        EncodingValueKind::Float | EncodingValueKind::Int => value.len() >= SCALAR_DATA_CAP,
    };
    if exceeds {
        return Err(ExtractError::AttestationDataTooLarge);
    }
    Ok(())
}

/// Truncate (never round) the decimal portion of `value` to `precision`
/// digits. Callers only reach this after confirming `value` is finite.
fn truncate_to_precision(value: f64, precision: u8) -> String {
    let scale = 10f64.powi(precision as i32);
    let truncated = (value * scale).trunc() / scale;
    format!("{truncated:.*}", precision as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_without_rounding() {
        assert_eq!(truncate_to_precision(1.23456789, 3), "1.234");
        assert_eq!(truncate_to_precision(1.9999, 2), "1.99");
    }

    #[test]
    fn json_path_normalizes_bracket_indexing() {
        let value: serde_json::Value = serde_json::from_str(r#"{"a":[{"b":"x"}]}"#).unwrap();
        assert_eq!(
            json_path(&value, "a[0].b").unwrap().as_str().unwrap(),
            "x"
        );
    }

    #[test]
    fn rejects_oversized_string_attestation_data() {
        let oversized = "a".repeat(STRING_DATA_CAP + 1);
        assert!(matches!(
            check_attestation_size(&oversized, EncodingValueKind::String),
            Err(ExtractError::AttestationDataTooLarge)
        ));
        let boundary = "a".repeat(STRING_DATA_CAP);
        assert!(check_attestation_size(&boundary, EncodingValueKind::String).is_ok());
    }

    #[test]
    fn scalar_attestation_data_boundary_matches_spec() {
        let at_limit = "1".repeat(SCALAR_DATA_CAP);
        assert!(matches!(
            check_attestation_size(&at_limit, EncodingValueKind::Int),
            Err(ExtractError::AttestationDataTooLarge)
        ));
        let one_under = "1".repeat(SCALAR_DATA_CAP - 1);
        assert!(check_attestation_size(&one_under, EncodingValueKind::Int).is_ok());
    }

    #[test]
    fn non_finite_float_is_rejected() {
        let mut req = AttestationRequest {
            url: "example.com".to_string(),
            request_method: crate::domain::request::RequestMethod::Get,
            response_format: ResponseFormat::Json,
            selector: "value".to_string(),
            html_result_type: None,
            request_body: None,
            request_content_type: None,
            request_headers: indexmap::IndexMap::new(),
            encoding_options: crate::domain::request::EncodingOptions {
                value: EncodingValueKind::Float,
                precision: 2,
            },
            debug_request: false,
        };
        assert!(matches!(post_process("nan", &req), Err(ExtractError::InvalidScalar)));
        assert!(matches!(post_process("inf", &req), Err(ExtractError::InvalidScalar)));
        req.encoding_options.precision = 6;
        assert!(post_process("1.5", &req).is_ok());
    }
}
