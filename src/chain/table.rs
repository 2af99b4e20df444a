use std::collections::HashMap;

use serde_json::Value;

/// Option right, normalized from `C`/`CALL`/`P`/`PUT` (any case).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Right {
    Call,
    Put,
}

impl Right {
    pub fn parse(value: &Value) -> Option<Right> {
        match value.as_str()?.to_ascii_uppercase().as_str() {
            "C" | "CALL" => Some(Right::Call),
            "P" | "PUT" => Some(Right::Put),
            _ => None,
        }
    }
}

/// Coerce a JSON value to a finite f64, accepting numbers and numeric
/// strings (the provider is inconsistent about which it sends).
pub fn num_or_null(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Strike identity key: milli-dollars. Strikes carry at most three
/// decimal places, so this is exact, and it gives rows a total order.
pub fn strike_key(strike: f64) -> i64 {
    (strike * 1000.0).round() as i64
}

/// Divisor policy for converting provider minor-unit strikes to dollars.
///
/// The provider's scale is not self-describing: observed feeds use ÷100
/// (20000 → 200.00) while some use ÷1000 (180000 → 180.00). The
/// magnitude thresholds are a heuristic and deliberately injectable so
/// a deployment can pin the divisor it actually observes.
#[derive(Debug, Clone, Copy)]
pub struct StrikeScale {
    /// At or above this raw value, divide by 1000; below it, by 100.
    pub kilo_threshold: f64,
}

impl Default for StrikeScale {
    fn default() -> Self {
        Self {
            kilo_threshold: 100_000.0,
        }
    }
}

impl StrikeScale {
    pub fn to_dollars(&self, minor: f64) -> f64 {
        if minor >= self.kilo_threshold {
            minor / 1000.0
        } else {
            minor / 100.0
        }
    }
}

/// A source record as equal-conceptual-length named arrays.
///
/// Columns may be ragged (the provider occasionally truncates one), so
/// the logical row count is the maximum length among the columns and
/// every access is positional and optional.
#[derive(Debug, Default)]
pub struct ColumnTable {
    columns: HashMap<String, Vec<Value>>,
}

impl ColumnTable {
    /// Build from page items, each an object of named arrays. Multiple
    /// items (one per page) have their columns concatenated in order.
    pub fn from_items(items: &[Value]) -> ColumnTable {
        let mut table = ColumnTable::default();
        for item in items {
            let Some(obj) = item.as_object() else {
                continue;
            };
            for (name, value) in obj {
                if let Value::Array(values) = value {
                    table
                        .columns
                        .entry(name.clone())
                        .or_default()
                        .extend(values.iter().cloned());
                }
            }
        }
        table
    }

    pub fn row_count(&self) -> usize {
        self.columns.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn get(&self, column: &str, row: usize) -> Option<&Value> {
        self.columns.get(column)?.get(row)
    }

    pub fn num(&self, column: &str, row: usize) -> Option<f64> {
        num_or_null(self.get(column, row))
    }

    /// Strike (dollars) and right at a row; `None` if either fails to
    /// normalize, in which case the caller skips the row.
    pub fn contract(&self, row: usize) -> Option<(f64, Right)> {
        let strike = self.num("strike", row)?;
        let right = Right::parse(self.get("right", row)?)?;
        Some((strike, right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ragged_columns_use_max_length() {
        let table = ColumnTable::from_items(&[json!({
            "strike": [100, 105, 110],
            "bid": [1.0],
            "note": "not a column",
        })]);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.num("strike", 2), Some(110.0));
        assert_eq!(table.num("bid", 1), None);
        assert_eq!(table.num("missing", 0), None);
    }

    #[test]
    fn pages_concatenate_in_order() {
        let table = ColumnTable::from_items(&[
            json!({"strike": [100], "right": ["C"]}),
            json!({"strike": [105], "right": ["P"]}),
        ]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.contract(1), Some((105.0, Right::Put)));
    }

    #[test]
    fn right_normalization() {
        assert_eq!(Right::parse(&json!("call")), Some(Right::Call));
        assert_eq!(Right::parse(&json!("P")), Some(Right::Put));
        assert_eq!(Right::parse(&json!("x")), None);
        assert_eq!(Right::parse(&json!(1)), None);
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(num_or_null(Some(&json!("2.5"))), Some(2.5));
        assert_eq!(num_or_null(Some(&json!(3))), Some(3.0));
        assert_eq!(num_or_null(Some(&json!("abc"))), None);
        assert_eq!(num_or_null(Some(&json!(null))), None);
        assert_eq!(num_or_null(None), None);
    }

    #[test]
    fn strike_scale_heuristic() {
        let scale = StrikeScale::default();
        assert_eq!(scale.to_dollars(180_000.0), 180.0);
        assert_eq!(scale.to_dollars(20_000.0), 200.0);
        assert_eq!(scale.to_dollars(5_000.0), 50.0);
    }
}
