//! C2: request validation and header masking.

use indexmap::IndexSet;

use super::request::{AttestationRequest, EncodingValueKind, HtmlResultType, RequestMethod, ResponseFormat, Target};

/// Header names that pass through `mask_unaccepted_headers` unmasked.
/// Matched case-insensitively. Standard HTTP plus common proxy headers.
const ALLOWED_HEADERS: &[&str] = &[
    "accept",
    "accept-encoding",
    "accept-language",
    "authorization",
    "cache-control",
    "connection",
    "content-length",
    "content-type",
    "cookie",
    "host",
    "origin",
    "referer",
    "user-agent",
    "x-forwarded-for",
    "x-forwarded-host",
    "x-forwarded-proto",
    "x-real-ip",
    "x-request-id",
];

const MASKED_VALUE: &str = "******";

// `InvalidMethod`, `InvalidResponseFormat`, and `InvalidEncodingValue` reserve
// stable error codes for those failure modes even though they're currently
// unreachable: `RequestMethod`/`ResponseFormat`/`EncodingValueKind` are closed
// `serde` enums, so a wire value outside `{GET,POST}`/`{html,json}`/
// `{string,float,int}` fails JSON deserialization in C7 before a request ever
// reaches this validator, and is reported as the generic malformed-request
// code (7000) instead. The variants stay here, matched but never reachable
// today, as the code space's intended home should C7 ever switch to
// structurally-lenient parsing.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("unsupported request method")]
    InvalidMethod,
    #[error("requestBody/requestContentType must be present for POST and absent for GET")]
    InvalidMethodFields,
    #[error("unsupported response format")]
    InvalidResponseFormat,
    #[error("htmlResultType is required for html and forbidden for json")]
    InvalidHtmlResultType,
    #[error("encoding value=string with htmlResultType=element is not allowed")]
    ElementRequiresStringEncoding,
    #[error("unsupported encoding value kind")]
    InvalidEncodingValue,
    #[error("invalid encoding precision for the chosen value kind")]
    InvalidEncodingPrecision,
    #[error("target URL must not include a scheme")]
    InvalidTargetUrl,
    #[error("target host is not in the whitelist")]
    TargetNotWhitelisted,
    #[error("price-feed targets require GET/json/float/weightedAvgPrice")]
    InvalidPriceFeedRequest,
    #[error("header {name:?} contains a disallowed byte or an encoded CRLF sequence")]
    UnsafeHeader { name: String },
}

/// Validate `req` against a fixed whitelist of fetchable hostnames. Rules
/// are checked in order; the first failure wins.
pub fn validate(req: &AttestationRequest, whitelisted_domains: &IndexSet<String>) -> Result<(), ValidationError> {
    if req.url.is_empty() {
        return Err(ValidationError::MissingField("url"));
    }
    if req.selector.is_empty() {
        return Err(ValidationError::MissingField("selector"));
    }

    match req.request_method {
        RequestMethod::Get => {
            if req.request_body.is_some() || req.request_content_type.is_some() {
                return Err(ValidationError::InvalidMethodFields);
            }
        }
        RequestMethod::Post => {
            if req.request_body.is_none() || req.request_content_type.is_none() {
                return Err(ValidationError::InvalidMethodFields);
            }
        }
    }

    match req.response_format {
        ResponseFormat::Html => match req.html_result_type {
            None => return Err(ValidationError::InvalidHtmlResultType),
            Some(HtmlResultType::Element) => {
                if req.encoding_options.value != EncodingValueKind::String {
                    return Err(ValidationError::ElementRequiresStringEncoding);
                }
            }
            Some(HtmlResultType::Value) => {}
        },
        ResponseFormat::Json => {
            if req.html_result_type.is_some() {
                return Err(ValidationError::InvalidHtmlResultType);
            }
        }
    }

    validate_encoding_options(req)?;

    if req.url.starts_with("http://") || req.url.starts_with("https://") {
        return Err(ValidationError::InvalidTargetUrl);
    }

    let target = req.target();
    match target {
        Target::External => {
            let host = target_hostname(&req.url).ok_or(ValidationError::InvalidTargetUrl)?;
            if !whitelisted_domains.contains(&host) {
                return Err(ValidationError::TargetNotWhitelisted);
            }
        }
        Target::PriceFeed(_) => {
            if req.request_method != RequestMethod::Get
                || req.response_format != ResponseFormat::Json
                || req.encoding_options.value != EncodingValueKind::Float
                || req.selector != "weightedAvgPrice"
            {
                return Err(ValidationError::InvalidPriceFeedRequest);
            }
        }
    }

    for (name, value) in &req.request_headers {
        if !is_header_text_safe(name) || !is_header_text_safe(value) {
            return Err(ValidationError::UnsafeHeader { name: name.clone() });
        }
    }

    Ok(())
}

/// Extract the hostname from a scheme-less `url` field by injecting a
/// throwaway scheme and delegating to a real URL parser, rather than
/// hand-rolling a split on `/` — a bare host+path string isn't itself a
/// valid `url::Url`, but `https://<it>` is.
fn target_hostname(raw_url: &str) -> Option<String> {
    let url = url::Url::parse(&format!("https://{raw_url}")).ok()?;
    url.host_str().map(str::to_string)
}

fn validate_encoding_options(req: &AttestationRequest) -> Result<(), ValidationError> {
    let precision = req.encoding_options.precision;
    match req.encoding_options.value {
        EncodingValueKind::String | EncodingValueKind::Int => {
            if precision != 0 {
                return Err(ValidationError::InvalidEncodingPrecision);
            }
        }
        EncodingValueKind::Float => {
            if precision == 0 || precision > 12 {
                return Err(ValidationError::InvalidEncodingPrecision);
            }
        }
    }
    Ok(())
}

/// A single decoded form can itself be another encoding (`%250a` decodes to
/// `%0a`, which decodes again to an actual LF), so bound how many times we'll
/// re-decode before giving up rather than looping forever on pathological
/// input.
const MAX_DECODE_ROUNDS: usize = 8;

fn has_disallowed_control_byte(bytes: &[u8]) -> bool {
    bytes.iter().any(|&b| b < 0x20 && b != b'\t')
}

/// Literal (non-encoded) markers worth flagging even once fully decoded:
/// a backslash-escaped `\r`/`\n` isn't itself a control byte, but a
/// downstream consumer that unescapes string literals would turn it into
/// one.
fn contains_smuggling_marker(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    ["\\r", "\\n"].iter().any(|marker| lower.contains(marker))
}

/// Percent-decode (`%XX`, `%uXXXX`), unescape `\uXXXX`, and resolve HTML
/// numeric character references (`&#NN;`, `&#xHH;`) once. Returns `None`
/// once nothing in `input` decodes further, which is also the fixed point
/// the caller stops iterating at.
fn decode_one_layer(input: &[u8]) -> Option<Vec<u8>> {
    fn push_char(out: &mut Vec<u8>, code: u32) -> bool {
        match char::from_u32(code) {
            Some(ch) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                true
            }
            None => false,
        }
    }

    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    let mut changed = false;
    while i < input.len() {
        if input[i] == b'%' && matches!(input.get(i + 1), Some(b'u' | b'U')) {
            if let Some(code) = input
                .get(i + 2..i + 6)
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            {
                if push_char(&mut out, code) {
                    i += 6;
                    changed = true;
                    continue;
                }
            }
        }
        if input[i] == b'%' {
            if let Some(byte) = input
                .get(i + 1..i + 3)
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            {
                out.push(byte);
                i += 3;
                changed = true;
                continue;
            }
        }
        if input[i] == b'\\' && matches!(input.get(i + 1), Some(b'u' | b'U')) {
            if let Some(code) = input
                .get(i + 2..i + 6)
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            {
                if push_char(&mut out, code) {
                    i += 6;
                    changed = true;
                    continue;
                }
            }
        }
        if input[i] == b'&' && input.get(i + 1) == Some(&b'#') {
            let is_hex = matches!(input.get(i + 2), Some(b'x' | b'X'));
            let digits_start = i + 2 + usize::from(is_hex);
            let mut j = digits_start;
            while input
                .get(j)
                .map(|b| if is_hex { b.is_ascii_hexdigit() } else { b.is_ascii_digit() })
                .unwrap_or(false)
            {
                j += 1;
            }
            if j > digits_start && input.get(j) == Some(&b';') {
                if let Some(code) = std::str::from_utf8(&input[digits_start..j])
                    .ok()
                    .and_then(|digits| u32::from_str_radix(digits, if is_hex { 16 } else { 10 }).ok())
                {
                    if push_char(&mut out, code) {
                        i = j + 1;
                        changed = true;
                        continue;
                    }
                }
            }
        }
        out.push(input[i]);
        i += 1;
    }
    changed.then_some(out)
}

/// Reject CR/LF/NUL/other C0 control characters (TAB excepted), and any
/// percent-/entity-/unicode-escape-encoded CRLF smuggling attempt, decoded to
/// any nesting depth. This runs before masking: a header that fails this
/// check is a validation error, not merely a candidate for masking.
fn is_header_text_safe(value: &str) -> bool {
    let mut current = value.as_bytes().to_vec();
    for _ in 0..MAX_DECODE_ROUNDS {
        if has_disallowed_control_byte(&current) {
            return false;
        }
        if contains_smuggling_marker(&String::from_utf8_lossy(&current)) {
            return false;
        }
        match decode_one_layer(&current) {
            Some(next) => current = next,
            None => return true,
        }
    }
    !has_disallowed_control_byte(&current) && !contains_smuggling_marker(&String::from_utf8_lossy(&current))
}

/// Replace the value of any header whose name is not in [`ALLOWED_HEADERS`]
/// with a fixed mask string. Matching is case-insensitive on the name.
pub fn mask_unaccepted_headers(req: &mut AttestationRequest) {
    for (name, value) in req.request_headers.iter_mut() {
        let lower = name.to_ascii_lowercase();
        if !ALLOWED_HEADERS.contains(&lower.as_str()) {
            *value = MASKED_VALUE.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::EncodingOptions;
    use indexmap::indexmap;

    fn base_request() -> AttestationRequest {
        AttestationRequest {
            url: "example.com".to_string(),
            request_method: RequestMethod::Get,
            response_format: ResponseFormat::Json,
            selector: "body".to_string(),
            html_result_type: None,
            request_body: None,
            request_content_type: None,
            request_headers: indexmap! {},
            encoding_options: EncodingOptions {
                value: EncodingValueKind::Float,
                precision: 6,
            },
            debug_request: false,
        }
    }

    fn whitelist() -> IndexSet<String> {
        IndexSet::from(["example.com".to_string()])
    }

    #[test]
    fn rejects_scheme_prefixed_urls() {
        let mut req = base_request();
        req.url = "https://example.com".to_string();
        assert!(matches!(
            validate(&req, &whitelist()),
            Err(ValidationError::InvalidTargetUrl)
        ));
    }

    #[test]
    fn rejects_non_whitelisted_hosts() {
        let mut req = base_request();
        req.url = "not-listed.com".to_string();
        assert!(matches!(
            validate(&req, &whitelist()),
            Err(ValidationError::TargetNotWhitelisted)
        ));
    }

    #[test]
    fn whitelists_against_the_host_only_ignoring_path() {
        let mut req = base_request();
        req.url = "example.com/a/b?c=1".to_string();
        assert!(validate(&req, &whitelist()).is_ok());
    }

    #[test]
    fn float_precision_boundaries() {
        let mut req = base_request();
        req.encoding_options.precision = 0;
        assert!(matches!(
            validate(&req, &whitelist()),
            Err(ValidationError::InvalidEncodingPrecision)
        ));
        req.encoding_options.precision = 12;
        assert!(validate(&req, &whitelist()).is_ok());
        req.encoding_options.precision = 13;
        assert!(matches!(
            validate(&req, &whitelist()),
            Err(ValidationError::InvalidEncodingPrecision)
        ));
    }

    #[test]
    fn int_with_nonzero_precision_rejected() {
        let mut req = base_request();
        req.encoding_options = EncodingOptions {
            value: EncodingValueKind::Int,
            precision: 1,
        };
        assert!(matches!(
            validate(&req, &whitelist()),
            Err(ValidationError::InvalidEncodingPrecision)
        ));
    }

    #[test]
    fn price_feed_requires_exact_shape() {
        let mut req = base_request();
        req.url = "price_feed: btc".to_string();
        req.selector = "weightedAvgPrice".to_string();
        assert!(validate(&req, &whitelist()).is_ok());

        req.selector = "body".to_string();
        assert!(matches!(
            validate(&req, &whitelist()),
            Err(ValidationError::InvalidPriceFeedRequest)
        ));
    }

    #[test]
    fn masking_replaces_non_whitelisted_header_values() {
        let mut req = base_request();
        req.request_headers.insert("X-Custom".to_string(), "secret".to_string());
        req.request_headers.insert("Accept".to_string(), "application/json".to_string());
        mask_unaccepted_headers(&mut req);
        assert_eq!(req.request_headers.get("X-Custom").unwrap(), MASKED_VALUE);
        assert_eq!(req.request_headers.get("Accept").unwrap(), "application/json");
    }

    #[test]
    fn rejects_percent_encoded_crlf_smuggling() {
        let mut req = base_request();
        req.request_headers.insert("X-Evil".to_string(), "value%0d%0aSet-Cookie: x=1".to_string());
        assert!(matches!(
            validate(&req, &whitelist()),
            Err(ValidationError::UnsafeHeader { .. })
        ));
    }

    #[test]
    fn rejects_doubly_percent_encoded_crlf_smuggling() {
        let mut req = base_request();
        req.request_headers.insert("X-Evil".to_string(), "value%250a%250dSet-Cookie: x=1".to_string());
        assert!(matches!(
            validate(&req, &whitelist()),
            Err(ValidationError::UnsafeHeader { .. })
        ));
    }

    #[test]
    fn rejects_html_entity_and_unicode_escape_crlf_smuggling() {
        let mut req = base_request();
        req.request_headers
            .insert("X-Evil-1".to_string(), "value&#x0a;Set-Cookie: x=1".to_string());
        assert!(matches!(
            validate(&req, &whitelist()),
            Err(ValidationError::UnsafeHeader { .. })
        ));

        let mut req = base_request();
        req.request_headers.insert("X-Evil-2".to_string(), "value\\u000aSet-Cookie: x=1".to_string());
        assert!(matches!(
            validate(&req, &whitelist()),
            Err(ValidationError::UnsafeHeader { .. })
        ));
    }

    #[test]
    fn accepts_ordinary_header_values() {
        assert!(is_header_text_safe("application/json"));
        assert!(is_header_text_safe("Bearer abc123"));
    }
}
