//! The data model described in the notarization request: what to fetch, how
//! to interpret the response, and how to encode the result.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// HTTP method used to fetch the target. Only these two are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    Get,
    Post,
}

impl RequestMethod {
    pub fn as_encoded_bytes(&self) -> &'static [u8] {
        match self {
            RequestMethod::Get => b"GET",
            RequestMethod::Post => b"POST",
        }
    }
}

/// Shape of the upstream response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Html,
    Json,
}

/// How an HTML selector match should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HtmlResultType {
    Value,
    Element,
}

/// The scalar kind the extracted value is coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingValueKind {
    String,
    Float,
    Int,
}

impl EncodingValueKind {
    /// Byte tag written at offset 0 of the encoded `encodingOptions` field.
    pub fn tag(&self) -> u8 {
        match self {
            EncodingValueKind::String => 0x00,
            EncodingValueKind::Float => 0x01,
            EncodingValueKind::Int => 0x02,
        }
    }
}

/// `{ value, precision }`. Precision is only meaningful for `float`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingOptions {
    pub value: EncodingValueKind,
    #[serde(default)]
    pub precision: u8,
}

/// A built-in price feed asset, reached via a `price_feed: <asset>` sentinel
/// URL instead of a real target host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceFeedAsset {
    Btc,
    Eth,
    Aleo,
}

impl PriceFeedAsset {
    /// Token id written over `userDataProof[0]` once the quote body has been
    /// assembled.
    pub fn token_id(&self) -> u8 {
        match self {
            PriceFeedAsset::Aleo => 8,
            PriceFeedAsset::Eth => 11,
            PriceFeedAsset::Btc => 12,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            PriceFeedAsset::Btc => "BTC",
            PriceFeedAsset::Eth => "ETH",
            PriceFeedAsset::Aleo => "ALEO",
        }
    }
}

/// Dispatch target, resolved once from the wire-form `url` string. The wire
/// representation is preserved verbatim (it is also the bytes the encoder
/// writes into the `url` field), this is only the internal discriminant used
/// to decide whether C3 fetches a URL or calls into C4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    External,
    PriceFeed(PriceFeedAsset),
}

impl Target {
    /// Parse the sentinel form `price_feed: btc|eth|aleo`. Whitespace after
    /// the colon is optional; anything else is an external host+path.
    pub fn parse(url: &str) -> Target {
        let Some(rest) = url.strip_prefix("price_feed:") else {
            return Target::External;
        };
        match rest.trim() {
            "btc" => Target::PriceFeed(PriceFeedAsset::Btc),
            "eth" => Target::PriceFeed(PriceFeedAsset::Eth),
            "aleo" => Target::PriceFeed(PriceFeedAsset::Aleo),
            _ => Target::External,
        }
    }

    pub fn is_price_feed(&self) -> bool {
        matches!(self, Target::PriceFeed(_))
    }
}

/// Inputs describing what to notarize. Deserialized directly from the
/// `/notarize` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationRequest {
    pub url: String,
    #[serde(rename = "requestMethod")]
    pub request_method: RequestMethod,
    #[serde(rename = "responseFormat")]
    pub response_format: ResponseFormat,
    pub selector: String,
    #[serde(rename = "htmlResultType", default)]
    pub html_result_type: Option<HtmlResultType>,
    #[serde(rename = "requestBody", default)]
    pub request_body: Option<String>,
    #[serde(rename = "requestContentType", default)]
    pub request_content_type: Option<String>,
    /// Insertion order matters: it is serialized verbatim into the encoded
    /// buffer and must match the order the client sent the headers in,
    /// which is why this is an insertion-ordered map rather than a
    /// `HashMap`.
    #[serde(rename = "requestHeaders", default)]
    pub request_headers: IndexMap<String, String>,
    #[serde(rename = "encodingOptions")]
    pub encoding_options: EncodingOptions,
    #[serde(rename = "debugRequest", default)]
    pub debug_request: bool,
}

impl AttestationRequest {
    pub fn target(&self) -> Target {
        Target::parse(&self.url)
    }
}

/// `{pos, len}` in `TARGET_ALIGNMENT` (16-byte) units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub pos: u16,
    pub len: u16,
}

/// The ten encoded-field positions recorded by C1, echoed back in
/// [`crate::domain::oracle::OracleData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofPositionalInfo {
    pub data: PositionInfo,
    pub timestamp: PositionInfo,
    #[serde(rename = "statusCode")]
    pub status_code: PositionInfo,
    pub method: PositionInfo,
    #[serde(rename = "responseFormat")]
    pub response_format: PositionInfo,
    pub url: PositionInfo,
    pub selector: PositionInfo,
    #[serde(rename = "encodingOptions")]
    pub encoding_options: PositionInfo,
    #[serde(rename = "requestHeaders")]
    pub request_headers: PositionInfo,
    #[serde(rename = "optionalFields")]
    pub optional_fields: PositionInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_price_feed_sentinels() {
        assert_eq!(
            Target::parse("price_feed: btc"),
            Target::PriceFeed(PriceFeedAsset::Btc)
        );
        assert_eq!(
            Target::parse("price_feed:eth"),
            Target::PriceFeed(PriceFeedAsset::Eth)
        );
        assert_eq!(Target::parse("google.com"), Target::External);
    }

    #[test]
    fn token_ids_match_spec() {
        assert_eq!(PriceFeedAsset::Aleo.token_id(), 8);
        assert_eq!(PriceFeedAsset::Eth.token_id(), 11);
        assert_eq!(PriceFeedAsset::Btc.token_id(), 12);
    }
}
