//! C4: concurrent volume-weighted price aggregation across configured
//! exchanges for a built-in price-feed asset.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use super::request::PriceFeedAsset;
use super::RuntimeContext;
use crate::infra::http_client::{self, HttpClientError};

const EXCHANGE_RETRIES: u32 = 1;
const LIVENESS_FLOOR: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct ExchangePrice {
    pub exchange: String,
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceFeedResult {
    pub symbol: String,
    #[serde(rename = "volumeWeightedAvg")]
    pub volume_weighted_avg: f64,
    #[serde(rename = "totalVolume")]
    pub total_volume: f64,
    #[serde(rename = "exchangeCount")]
    pub exchange_count: usize,
    pub timestamp: u64,
    #[serde(rename = "exchangePrices")]
    pub exchange_prices: Vec<ExchangePrice>,
    pub success: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum PriceFeedError {
    #[error("fewer than {LIVENESS_FLOOR} exchanges returned usable data")]
    InsufficientExchangeData,
    #[error("failed to parse {exchange} response: {reason}")]
    ParseFailed { exchange: String, reason: String },
}

/// Fan out one GET per configured exchange for `asset`'s symbol, collect
/// `(price, volume)` pairs via exchange-specific parsers, and compute the
/// volume-weighted average over entries with strictly positive price and
/// volume.
pub async fn aggregate(ctx: &RuntimeContext, asset: PriceFeedAsset) -> Result<PriceFeedResult, PriceFeedError> {
    let exchanges = ctx.config.exchanges_for(asset.symbol());
    let (tx, mut rx) = tokio::sync::mpsc::channel(exchanges.len().max(1));

    for exchange in exchanges {
        let tx = tx.clone();
        let client = ctx.http.clone();
        let base_url = ctx.config.exchange_url(&exchange, asset.symbol());
        let symbol = asset.symbol().to_string();
        tokio::spawn(async move {
            let outcome = fetch_one(&client, &exchange, &base_url, &symbol).await;
            let _ = tx.send((exchange, outcome)).await;
        });
    }
    drop(tx);

    let mut prices = Vec::new();
    while let Some((exchange, outcome)) = rx.recv().await {
        match outcome {
            Ok((price, volume)) if price > 0.0 && volume > 0.0 => {
                prices.push(ExchangePrice {
                    exchange,
                    symbol: asset.symbol().to_string(),
                    price,
                    volume,
                });
            }
            Ok(_) => {
                tracing::warn!(%exchange, "exchange returned non-positive price or volume");
                crate::infra::metrics::record_exchange_failure(&exchange);
            }
            Err(err) => {
                tracing::warn!(%exchange, error = %err, "exchange price fetch failed");
                crate::infra::metrics::record_exchange_failure(&exchange);
            }
        }
    }

    if prices.len() < LIVENESS_FLOOR {
        return Err(PriceFeedError::InsufficientExchangeData);
    }

    prices.sort_by(|a, b| a.exchange.cmp(&b.exchange));

    let total_volume: f64 = prices.iter().map(|p| p.volume).sum();
    let weighted: f64 = prices.iter().map(|p| p.price * p.volume).sum();
    let volume_weighted_avg = weighted / total_volume;

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    Ok(PriceFeedResult {
        symbol: asset.symbol().to_string(),
        volume_weighted_avg,
        total_volume,
        exchange_count: prices.len(),
        timestamp,
        exchange_prices: prices,
        success: true,
    })
}

async fn fetch_one(
    client: &reqwest::Client,
    exchange: &str,
    url: &str,
    symbol: &str,
) -> Result<(f64, f64), PriceFeedError> {
    let body = http_client::get_retrying(client, url, EXCHANGE_RETRIES)
        .await
        .map_err(|err: HttpClientError| PriceFeedError::ParseFailed {
            exchange: exchange.to_string(),
            reason: err.to_string(),
        })?;
    parse_exchange(exchange, symbol, &body)
}

/// Dispatch to the exchange-specific field paths from the price feed table.
/// `gate.io` responds with a bare top-level array; indexing `"0"` into it
/// works the same way as indexing a field named `"0"` on an object would,
/// so no separate re-wrapping step is needed here.
fn parse_exchange(exchange: &str, symbol: &str, body: &str) -> Result<(f64, f64), PriceFeedError> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(|err| PriceFeedError::ParseFailed {
        exchange: exchange.to_string(),
        reason: err.to_string(),
    })?;

    let (price_path, volume_path): (&[&str], &[&str]) = match exchange {
        "binance" | "mexc" => (&["lastPrice"], &["volume"]),
        "bybit" => (&["result", "list", "0", "lastPrice"], &["result", "list", "0", "volume24h"]),
        "coinbase" => (&["price"], &["volume"]),
        "crypto.com" => (&["result", "data", "0", "k"], &["result", "data", "0", "v"]),
        // `q` (base volume) is authoritative; the `v` field seen in older
        // XT responses is stale and ignored.
        "xt" => (&["result", "0", "c"], &["result", "0", "q"]),
        "gate.io" => (&["0", "last"], &["0", "base_volume"]),
        other => {
            return Err(PriceFeedError::ParseFailed {
                exchange: other.to_string(),
                reason: format!("no parser configured for exchange {other} (symbol {symbol})"),
            });
        }
    };

    let price = read_scalar(&value, price_path, exchange)?;
    let volume = read_scalar(&value, volume_path, exchange)?;
    Ok((price, volume))
}

fn read_scalar(value: &serde_json::Value, path: &[&str], exchange: &str) -> Result<f64, PriceFeedError> {
    let mut cursor = value;
    for segment in path {
        cursor = (if let Ok(index) = segment.parse::<usize>() {
            cursor.get(index)
        } else {
            cursor.get(*segment)
        })
        .ok_or_else(|| PriceFeedError::ParseFailed {
            exchange: exchange.to_string(),
            reason: format!("missing field {segment}"),
        })?;
    }
    match cursor {
        serde_json::Value::String(s) => s.parse::<f64>().map_err(|_| PriceFeedError::ParseFailed {
            exchange: exchange.to_string(),
            reason: format!("non-numeric string {s:?}"),
        }),
        serde_json::Value::Number(n) => n.as_f64().ok_or_else(|| PriceFeedError::ParseFailed {
            exchange: exchange.to_string(),
            reason: "number out of f64 range".to_string(),
        }),
        other => Err(PriceFeedError::ParseFailed {
            exchange: exchange.to_string(),
            reason: format!("unexpected JSON value {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binance_parses_flat_fields() {
        let body = r#"{"lastPrice":"50000.5","volume":"1000.25"}"#;
        assert_eq!(parse_exchange("binance", "BTC", body).unwrap(), (50000.5, 1000.25));
    }

    #[test]
    fn bybit_parses_nested_list() {
        let body = r#"{"result":{"list":[{"lastPrice":"50100","volume24h":"800.25"}]}}"#;
        assert_eq!(parse_exchange("bybit", "BTC", body).unwrap(), (50100.0, 800.25));
    }

    #[test]
    fn gate_io_parses_bare_array() {
        let body = r#"[{"last":"50300","base_volume":"900.3"}]"#;
        assert_eq!(parse_exchange("gate.io", "BTC", body).unwrap(), (50300.0, 900.3));
    }

    #[test]
    fn xt_uses_q_not_v() {
        let body = r#"{"result":[{"c":"50200","v":"1.0","q":"1200.75"}]}"#;
        assert_eq!(parse_exchange("xt", "BTC", body).unwrap(), (50200.0, 1200.75));
    }

    #[test]
    fn vwap_matches_manual_computation() {
        let prices = [
            ("a", 50000.0, 1000.5),
            ("b", 50100.0, 800.25),
            ("c", 50200.0, 1200.75),
            ("d", 50300.0, 900.3),
        ];
        let total_volume: f64 = prices.iter().map(|(_, _, v)| v).sum();
        let weighted: f64 = prices.iter().map(|(_, p, v)| p * v).sum();
        let vwap = weighted / total_volume;
        assert!((vwap - 50151.28017837921).abs() < 1e-6);
        assert!((total_volume - 3901.8).abs() < 1e-9);
    }
}
