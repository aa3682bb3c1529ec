use crate::error::ApiError;
use core_types::Candle;
use serde::Deserialize;

/// One kline row as returned by `/api/v3/klines`: a heterogeneous JSON array
/// where prices are encoded as strings.
#[derive(Debug, Deserialize)]
pub struct RawKline(
    pub i64,    // open time
    pub String, // open
    pub String, // high
    pub String, // low
    pub String, // close
    pub String, // volume
    pub i64,    // close time
    pub String, // quote asset volume
    pub i64,    // number of trades
    pub String, // taker buy base volume
    pub String, // taker buy quote volume
    pub String, // ignore
);

/// Error body returned by Binance alongside a non-2xx status.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub code: i64,
    pub msg: String,
}

fn parse_price(field: &str, raw: &str) -> Result<f64, ApiError> {
    let value: f64 = raw
        .parse()
        .map_err(|_| ApiError::InvalidData(format!("{field} is not a number: {raw:?}")))?;
    if !value.is_finite() {
        return Err(ApiError::InvalidData(format!("{field} is not finite: {raw:?}")));
    }
    Ok(value)
}

impl TryFrom<RawKline> for Candle {
    type Error = ApiError;

    fn try_from(raw: RawKline) -> Result<Self, Self::Error> {
        Ok(Candle {
            time: raw.0,
            open: parse_price("open", &raw.1)?,
            high: parse_price("high", &raw.2)?,
            low: parse_price("low", &raw.3)?,
            close: parse_price("close", &raw.4)?,
            volume: parse_price("volume", &raw.5)?,
        })
    }
}

/// Parses a klines response body into candles, oldest first.
pub fn parse_klines(body: &str) -> Result<Vec<Candle>, ApiError> {
    let rows: Vec<RawKline> =
        serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))?;
    rows.into_iter().map(Candle::try_from).collect()
}
