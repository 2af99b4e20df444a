use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::Value;

use crate::upstream::{UpstreamClient, UpstreamError};

use super::table::ColumnTable;

#[derive(Debug, Serialize, PartialEq)]
pub struct ExpirationEntry {
    /// Compact date form (`YYYYMMDD`), the form the chain endpoint accepts.
    pub date: String,
    /// Display label, e.g. `"Sep 19"` or `"Sep 12 (W)"`.
    pub label: String,
}

/// List an instrument's expirations: present/future dates only (judged
/// as a calendar date in `tz`), deduplicated, ascending, each labeled.
pub async fn get_expirations(
    upstream: &UpstreamClient,
    symbol: &str,
    tz: Tz,
) -> Result<Vec<ExpirationEntry>, UpstreamError> {
    let symbol = super::validate_symbol(symbol)?;
    let pages = upstream.list_expirations(&symbol).await?;
    let table = ColumnTable::from_items(&pages.items);

    let today = Utc::now().with_timezone(&tz).date_naive();

    let mut dates = BTreeSet::new();
    for row in 0..table.row_count() {
        let Some(raw) = table.get("expiration", row).and_then(Value::as_str) else {
            continue;
        };
        let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") else {
            continue;
        };
        if date >= today {
            dates.insert(date);
        }
    }

    Ok(dates
        .into_iter()
        .map(|date| ExpirationEntry {
            date: date.format("%Y%m%d").to_string(),
            label: label_for(date),
        })
        .collect())
}

fn label_for(date: NaiveDate) -> String {
    let base = date.format("%b %d").to_string();
    if is_standard_expiration(date) {
        base
    } else {
        format!("{base} (W)")
    }
}

/// The monthly "standard" expiration is the third Friday: a Friday whose
/// day-of-month falls in [15, 21]. This holds for any month and year, so
/// no occurrence counting is needed.
fn is_standard_expiration(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Fri && (15..=21).contains(&date.day())
}
