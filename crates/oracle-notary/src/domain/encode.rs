//! C1: the canonical byte-level encoder.
//!
//! The buffer is a 32-byte meta-header followed by ten sections, each
//! padded to a multiple of `TARGET_ALIGNMENT` bytes. The meta-header records
//! the *raw* (pre-padding) byte length of every section as a little-endian
//! `u16`, in the same order the sections are written, followed by 12
//! reserved zero bytes.
//!
//! One deliberate interpretation: the literal worked examples in the
//! originating material give every post-`data` field a position length of
//! exactly one alignment unit, which only holds when the attestation data
//! itself is a handful of bytes (the price-feed sentinel case). For a
//! non-price-feed `float`/`int`/`string` payload the prepared attestation
//! data is always fixed at 255 or 3072 raw bytes per the rules below, so its
//! padded length is several units, not one; every position after `data`
//! shifts accordingly. This module follows the written byte-layout rules
//! exactly and derives positions from them, rather than the worked examples'
//! specific numbers beyond the two invariants restated independently
//! (`data.pos == 2`, total length a multiple of 16).

use indexmap::IndexMap;

use super::request::{
    AttestationRequest, EncodingValueKind, HtmlResultType, PositionInfo, ProofPositionalInfo,
    ResponseFormat,
};

pub const TARGET_ALIGNMENT: usize = 16;

const STRING_DATA_LEN: usize = 3072;
const SCALAR_DATA_LEN: usize = 255;

const OPT_TAG_HTML_RESULT_TYPE: u8 = 1;
const OPT_TAG_REQUEST_CONTENT_TYPE: u8 = 2;
const OPT_TAG_REQUEST_BODY: u8 = 3;

const IDX_DATA: usize = 0;
const IDX_TIMESTAMP: usize = 1;
const IDX_STATUS_CODE: usize = 2;
const IDX_METHOD: usize = 3;
const IDX_RESPONSE_FORMAT: usize = 4;
const IDX_URL: usize = 5;
const IDX_SELECTOR: usize = 6;
const IDX_ENCODING_OPTIONS: usize = 7;
const IDX_REQUEST_HEADERS: usize = 8;
const IDX_OPTIONAL_FIELDS: usize = 9;

#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("encoded field exceeds the maximum representable length")]
    Overflow,
}

fn round_up(raw_len: usize) -> usize {
    if raw_len == 0 {
        TARGET_ALIGNMENT
    } else {
        raw_len.div_ceil(TARGET_ALIGNMENT) * TARGET_ALIGNMENT
    }
}

struct Encoder {
    buf: Vec<u8>,
    header_raw_lens: [u16; 10],
    cursor_units: u16,
}

impl Encoder {
    fn new() -> Self {
        Self {
            buf: vec![0u8; 2 * TARGET_ALIGNMENT],
            header_raw_lens: [0; 10],
            cursor_units: 2,
        }
    }

    fn write_section(&mut self, idx: usize, raw: &[u8]) -> Result<PositionInfo, EncodingError> {
        if raw.len() > u16::MAX as usize {
            return Err(EncodingError::Overflow);
        }
        let padded = round_up(raw.len());
        let units = u16::try_from(padded / TARGET_ALIGNMENT).map_err(|_| EncodingError::Overflow)?;
        let pos = self.cursor_units;
        self.header_raw_lens[idx] = raw.len() as u16;
        self.buf.extend_from_slice(raw);
        self.buf.resize(self.buf.len() + (padded - raw.len()), 0);
        self.cursor_units = self
            .cursor_units
            .checked_add(units)
            .ok_or(EncodingError::Overflow)?;
        Ok(PositionInfo { pos, len: units })
    }

    fn finish(mut self) -> Vec<u8> {
        for (i, len) in self.header_raw_lens.iter().enumerate() {
            let offset = i * 2;
            self.buf[offset..offset + 2].copy_from_slice(&len.to_le_bytes());
        }
        self.buf
    }
}

/// Normalize the extracted value string into the fixed-size attestation data
/// region. Price-feed sources use their raw unpadded decimal instead.
fn prepare_attestation_data(
    value_kind: EncodingValueKind,
    data: &str,
    is_price_feed: bool,
) -> Result<Vec<u8>, EncodingError> {
    if is_price_feed {
        return Ok(data.as_bytes().to_vec());
    }
    match value_kind {
        EncodingValueKind::String => {
            if data.len() > STRING_DATA_LEN {
                return Err(EncodingError::Overflow);
            }
            let mut bytes = data.as_bytes().to_vec();
            bytes.resize(STRING_DATA_LEN, 0u8);
            Ok(bytes)
        }
        EncodingValueKind::Float => {
            let mut s = data.to_string();
            if !s.contains('.') {
                s.push('.');
            }
            if s.len() > SCALAR_DATA_LEN {
                return Err(EncodingError::Overflow);
            }
            let mut bytes = s.into_bytes();
            bytes.resize(SCALAR_DATA_LEN, b'0');
            Ok(bytes)
        }
        EncodingValueKind::Int => {
            if data.len() > SCALAR_DATA_LEN {
                return Err(EncodingError::Overflow);
            }
            let mut bytes = vec![b'0'; SCALAR_DATA_LEN - data.len()];
            bytes.extend_from_slice(data.as_bytes());
            Ok(bytes)
        }
    }
}

fn encode_headers(headers: &IndexMap<String, String>) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::new();
    for (name, value) in headers {
        let name_len = u8::try_from(name.len()).map_err(|_| EncodingError::Overflow)?;
        let value_len = u16::try_from(value.len()).map_err(|_| EncodingError::Overflow)?;
        out.push(name_len);
        out.extend_from_slice(name.as_bytes());
        out.push(b':');
        out.push(b' ');
        out.extend_from_slice(&value_len.to_le_bytes());
        out.extend_from_slice(value.as_bytes());
        out.push(b'\r');
        out.push(b'\n');
    }
    Ok(out)
}

fn encode_optional_field(out: &mut Vec<u8>, tag: u8, bytes: Option<&[u8]>) -> Result<(), EncodingError> {
    match bytes {
        Some(b) => {
            let len = u16::try_from(b.len()).map_err(|_| EncodingError::Overflow)?;
            out.push(tag);
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(b);
        }
        None => out.push(0x00),
    }
    Ok(())
}

fn encode_optional_fields(req: &AttestationRequest) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::new();
    let html_result_type = req.html_result_type.map(|t| match t {
        HtmlResultType::Value => b"value".to_vec(),
        HtmlResultType::Element => b"element".to_vec(),
    });
    encode_optional_field(&mut out, OPT_TAG_HTML_RESULT_TYPE, html_result_type.as_deref())?;
    encode_optional_field(
        &mut out,
        OPT_TAG_REQUEST_CONTENT_TYPE,
        req.request_content_type.as_ref().map(|s| s.as_bytes()),
    )?;
    encode_optional_field(
        &mut out,
        OPT_TAG_REQUEST_BODY,
        req.request_body.as_ref().map(|s| s.as_bytes()),
    )?;
    Ok(out)
}

/// Encode `(data, timestamp, status_code)` against `req` into the canonical
/// buffer, returning the buffer and the positions of every field within it.
pub fn encode(
    req: &AttestationRequest,
    data: &str,
    timestamp: u64,
    status_code: u64,
) -> Result<(Vec<u8>, ProofPositionalInfo), EncodingError> {
    let is_price_feed = req.target().is_price_feed();
    let mut enc = Encoder::new();

    let attestation_bytes = prepare_attestation_data(req.encoding_options.value, data, is_price_feed)?;
    let data_pos = enc.write_section(IDX_DATA, &attestation_bytes)?;
    let timestamp_pos = enc.write_section(IDX_TIMESTAMP, &timestamp.to_le_bytes())?;
    let status_code_pos = enc.write_section(IDX_STATUS_CODE, &status_code.to_le_bytes())?;
    let url_pos = enc.write_section(IDX_URL, req.url.as_bytes())?;
    let selector_pos = enc.write_section(IDX_SELECTOR, req.selector.as_bytes())?;

    let format_byte = match req.response_format {
        ResponseFormat::Json => 0x00u8,
        ResponseFormat::Html => 0x01u8,
    };
    let response_format_pos = enc.write_section(IDX_RESPONSE_FORMAT, &[format_byte])?;
    let method_pos = enc.write_section(IDX_METHOD, req.request_method.as_encoded_bytes())?;

    let mut encoding_opts_bytes = vec![0u8; TARGET_ALIGNMENT];
    encoding_opts_bytes[0] = req.encoding_options.value.tag();
    encoding_opts_bytes[1] = req.encoding_options.precision;
    let encoding_options_pos = enc.write_section(IDX_ENCODING_OPTIONS, &encoding_opts_bytes)?;

    let headers_bytes = encode_headers(&req.request_headers)?;
    let request_headers_pos = enc.write_section(IDX_REQUEST_HEADERS, &headers_bytes)?;

    let optional_bytes = encode_optional_fields(req)?;
    let optional_fields_pos = enc.write_section(IDX_OPTIONAL_FIELDS, &optional_bytes)?;

    let positions = ProofPositionalInfo {
        data: data_pos,
        timestamp: timestamp_pos,
        status_code: status_code_pos,
        method: method_pos,
        response_format: response_format_pos,
        url: url_pos,
        selector: selector_pos,
        encoding_options: encoding_options_pos,
        request_headers: request_headers_pos,
        optional_fields: optional_fields_pos,
    };

    Ok((enc.finish(), positions))
}

/// Clear the `data` and `timestamp` regions of an encoded buffer, leaving
/// everything else byte-identical.
pub fn zero_data_and_timestamp(buf: &[u8], positions: &ProofPositionalInfo) -> Vec<u8> {
    let mut out = buf.to_vec();
    let start = positions.data.pos as usize * TARGET_ALIGNMENT;
    let units = positions.data.len as usize + positions.timestamp.len as usize;
    let end = start + units * TARGET_ALIGNMENT;
    out[start..end].fill(0);
    out
}
