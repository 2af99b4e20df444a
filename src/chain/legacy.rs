//! Decoder for the provider's older bulk-snapshot quote shape: one
//! record per contract, each carrying a compact tick array whose column
//! order is declared (if at all) by `header.format`.

use serde_json::Value;

use crate::upstream::page::field_index;

use super::table::{Right, StrikeScale, num_or_null};

// Positions observed in the wild when the header declares no format.
const BID_FALLBACK_INDEX: usize = 3;
const ASK_FALLBACK_INDEX: usize = 7;

#[derive(Debug, PartialEq)]
pub struct QuoteRow {
    pub strike: f64,
    pub right: Right,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
}

/// True if the items look like per-contract tick records rather than
/// column arrays.
pub fn is_tick_shape(items: &[Value]) -> bool {
    items
        .first()
        .is_some_and(|item| item.get("contract").is_some() || item.get("ticks").is_some())
}

/// Decode tick records into quote rows. The freshest quote is the last
/// tick of each record; records whose strike or right fails to
/// normalize are skipped. Strikes arrive in minor units and are scaled
/// to dollars.
pub fn decode_quotes(items: &[Value], header: Option<&Value>, scale: &StrikeScale) -> Vec<QuoteRow> {
    let bid_idx = field_index(header, "bid", BID_FALLBACK_INDEX);
    let ask_idx = field_index(header, "ask", ASK_FALLBACK_INDEX);

    let mut rows = Vec::new();
    for item in items {
        let Some(contract) = item.get("contract") else {
            continue;
        };
        let Some(minor) = num_or_null(contract.get("strike")) else {
            continue;
        };
        let Some(right) = contract.get("right").and_then(|r| Right::parse(r)) else {
            continue;
        };

        let last_tick = item
            .get("ticks")
            .and_then(Value::as_array)
            .and_then(|ticks| ticks.last())
            .and_then(Value::as_array);

        let (bid, ask) = match last_tick {
            Some(tick) => (
                num_or_null(tick.get(bid_idx)),
                num_or_null(tick.get(ask_idx)),
            ),
            None => (None, None),
        };

        rows.push(QuoteRow {
            strike: scale.to_dollars(minor),
            right,
            bid,
            ask,
        });
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_last_tick_with_header_format() {
        let header = json!({"format": ["ms_of_day", "bid", "ask"]});
        let items = vec![json!({
            "contract": {"strike": 20000, "right": "C"},
            "ticks": [[100, 1.0, 1.2], [200, 1.1, 1.3]],
        })];
        let rows = decode_quotes(&items, Some(&header), &StrikeScale::default());
        assert_eq!(
            rows,
            vec![QuoteRow {
                strike: 200.0,
                right: Right::Call,
                bid: Some(1.1),
                ask: Some(1.3),
            }]
        );
    }

    #[test]
    fn skips_unnormalizable_contracts() {
        let items = vec![
            json!({"contract": {"strike": "junk", "right": "C"}, "ticks": []}),
            json!({"contract": {"strike": 20000, "right": "X"}, "ticks": []}),
            json!({"no_contract": true}),
            json!({"contract": {"strike": 20000, "right": "P"}}),
        ];
        let rows = decode_quotes(&items, None, &StrikeScale::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].right, Right::Put);
        assert_eq!(rows[0].bid, None);
    }

    #[test]
    fn shape_detection() {
        assert!(is_tick_shape(&[json!({"contract": {}, "ticks": []})]));
        assert!(!is_tick_shape(&[json!({"strike": [100]})]));
        assert!(!is_tick_shape(&[]));
    }
}
