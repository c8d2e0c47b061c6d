//! Binance kline stream payloads.
//!
//! Required fields: `e`, `k.t`, `k.o`, `k.h`, `k.l`, `k.c` and `k.x`. Volume is optional
//! and defaults to zero. Prices may arrive as text or as JSON numbers.

use crate::{bar::Bar, error::FeedError};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const KLINE_EVENT: &str = "kline";

#[derive(Debug, Deserialize)]
struct KlineEvent {
    #[serde(rename = "k")]
    kline: KlinePayload,
}

#[derive(Debug, Deserialize)]
struct KlinePayload {
    #[serde(rename = "t")]
    open_time: i64,
    #[serde(rename = "o", deserialize_with = "de_numeric")]
    open: f64,
    #[serde(rename = "h", deserialize_with = "de_numeric")]
    high: f64,
    #[serde(rename = "l", deserialize_with = "de_numeric")]
    low: f64,
    #[serde(rename = "c", deserialize_with = "de_numeric")]
    close: f64,
    #[serde(rename = "v", default, deserialize_with = "de_numeric_opt")]
    volume: Option<f64>,
    #[serde(rename = "x")]
    is_closed: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Text(String),
    Number(f64),
}

impl Numeric {
    fn into_f64<E: serde::de::Error>(self) -> Result<f64, E> {
        match self {
            Numeric::Number(value) => Ok(value),
            Numeric::Text(text) => text
                .parse()
                .map_err(|_| E::custom(format!("not a number: {text}"))),
        }
    }
}

fn de_numeric<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Numeric::deserialize(deserializer)?.into_f64()
}

fn de_numeric_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Option::<Numeric>::deserialize(deserializer)?
        .map(Numeric::into_f64)
        .transpose()
}

/// Parse one stream frame.
///
/// `Ok(None)` for well-formed events that are not klines, `Err(FeedError::Payload)`
/// for frames that are not JSON or klines missing a required field. Combined-stream
/// envelopes (`{"stream": .., "data": {..}}`) are unwrapped.
pub fn parse_kline_message(text: &str) -> Result<Option<Bar>, FeedError> {
    let mut value: Value =
        serde_json::from_str(text).map_err(|error| FeedError::Payload(error.to_string()))?;

    let data = value
        .get_mut("data")
        .filter(|data| data.is_object())
        .map(Value::take);
    let value = data.unwrap_or(value);

    if value.get("e").and_then(Value::as_str) != Some(KLINE_EVENT) {
        return Ok(None);
    }

    let event: KlineEvent =
        serde_json::from_value(value).map_err(|error| FeedError::Payload(error.to_string()))?;
    let k = event.kline;

    Ok(Some(Bar::new(
        k.open_time,
        k.open,
        k.high,
        k.low,
        k.close,
        k.volume.unwrap_or_default(),
        k.is_closed,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kline_message() {
        struct TestCase {
            input: &'static str,
            expected: Result<Option<Bar>, ()>,
        }

        let tests = vec![
            TestCase {
                // TC0: full kline with numeric-as-text prices
                input: r#"{"e":"kline","E":1,"s":"BTCUSDT","k":{"t":60000,"T":119999,"s":"BTCUSDT","i":"1m","o":"1.0","c":"1.5","h":"2.0","l":"0.5","v":"12.5","x":false}}"#,
                expected: Ok(Some(Bar::new(60_000, 1.0, 2.0, 0.5, 1.5, 12.5, false))),
            },
            TestCase {
                // TC1: missing volume defaults to zero
                input: r#"{"e":"kline","k":{"t":60000,"o":"1","c":"1","h":"1","l":"1","x":true}}"#,
                expected: Ok(Some(Bar::new(60_000, 1.0, 1.0, 1.0, 1.0, 0.0, true))),
            },
            TestCase {
                // TC2: JSON numbers are accepted
                input: r#"{"e":"kline","k":{"t":1,"o":1,"c":2,"h":3,"l":0.5,"v":4,"x":true}}"#,
                expected: Ok(Some(Bar::new(1, 1.0, 3.0, 0.5, 2.0, 4.0, true))),
            },
            TestCase {
                // TC3: other event types are ignored
                input: r#"{"e":"trade","p":"1.0"}"#,
                expected: Ok(None),
            },
            TestCase {
                // TC4: kline missing the close flag is malformed
                input: r#"{"e":"kline","k":{"t":1,"o":"1","c":"1","h":"1","l":"1"}}"#,
                expected: Err(()),
            },
            TestCase {
                // TC5: non-numeric price is malformed
                input: r#"{"e":"kline","k":{"t":1,"o":"abc","c":"1","h":"1","l":"1","x":true}}"#,
                expected: Err(()),
            },
            TestCase {
                // TC6: not JSON
                input: "ping",
                expected: Err(()),
            },
            TestCase {
                // TC7: combined stream envelope
                input: r#"{"stream":"btcusdt@kline_1m","data":{"e":"kline","k":{"t":5,"o":"1","c":"1","h":"1","l":"1","x":false}}}"#,
                expected: Ok(Some(Bar::new(5, 1.0, 1.0, 1.0, 1.0, 0.0, false))),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = parse_kline_message(test.input);
            match (actual, test.expected) {
                (Ok(actual), Ok(expected)) => assert_eq!(actual, expected, "TC{} failed", index),
                (Err(FeedError::Payload(_)), Err(())) => {}
                (actual, expected) => panic!("TC{index} failed: {actual:?} vs {expected:?}"),
            }
        }
    }
}
