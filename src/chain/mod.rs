pub mod expirations;
pub mod legacy;
pub mod table;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono_tz::Tz;
use serde::Serialize;

use crate::upstream::page::PageSet;
use crate::upstream::{UpstreamClient, UpstreamError};

use expirations::ExpirationEntry;
use legacy::QuoteRow;
use table::{ColumnTable, Right, StrikeScale, strike_key};

/// How a chain request treats a failed snapshot source.
///
/// `FailFast` (the default) fails the whole request if any of the four
/// sources fails. `BestEffort` tolerates failures of the auxiliary
/// sources (open interest, volume, implied vol), leaving their fields
/// null; a quote failure always fails the request since there is nothing
/// to build rows from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PartialPolicy {
    FailFast,
    BestEffort,
}

/// One display row per distinct strike. All market fields are nullable;
/// a null from a source never clears a previously set value.
#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MergedRow {
    pub strike: f64,
    pub call_bid: Option<f64>,
    pub call_ask: Option<f64>,
    #[serde(rename = "callOI")]
    pub call_oi: Option<f64>,
    pub call_vol: Option<f64>,
    #[serde(rename = "callIV")]
    pub call_iv: Option<f64>,
    pub put_bid: Option<f64>,
    pub put_ask: Option<f64>,
    #[serde(rename = "putOI")]
    pub put_oi: Option<f64>,
    pub put_vol: Option<f64>,
    #[serde(rename = "putIV")]
    pub put_iv: Option<f64>,
}

/// Underlying price, taken from the first record of the implied-vol
/// snapshot only. Not cross-checked against the other sources.
#[derive(Debug, Serialize, PartialEq)]
pub struct Underlying {
    pub price: f64,
    pub timestamp: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainResponse {
    pub symbol: String,
    /// Compact form (`YYYYMMDD`).
    pub expiration: String,
    pub row_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underlying: Option<Underlying>,
    pub rows: Vec<MergedRow>,
}

/// Entry point for the two service operations: expirations listing and
/// per-expiration chain aggregation. Holds the upstream client (and
/// through it the TTL cache) plus the injectable policies.
pub struct ChainService {
    upstream: UpstreamClient,
    policy: PartialPolicy,
    scale: StrikeScale,
}

impl ChainService {
    pub fn new(upstream: UpstreamClient, policy: PartialPolicy, scale: StrikeScale) -> Self {
        Self {
            upstream,
            policy,
            scale,
        }
    }

    pub async fn get_expirations(
        &self,
        symbol: &str,
        tz: Tz,
    ) -> Result<Vec<ExpirationEntry>, UpstreamError> {
        expirations::get_expirations(&self.upstream, symbol, tz).await
    }

    /// Assemble the per-strike table for one (symbol, expiration).
    ///
    /// The four snapshot sources are fetched concurrently and joined
    /// before any merging starts; a failure in one does not cancel the
    /// others. Merging is a single non-concurrent pass over the quote
    /// table, row by row.
    pub async fn get_options_chain(
        &self,
        symbol: &str,
        exp: &str,
    ) -> Result<ChainResponse, UpstreamError> {
        let symbol = validate_symbol(symbol)?;
        let (exp_ymd, exp_iso) = canonical_expiration(exp)?;

        let (quote, oi, ohlc, iv) = tokio::join!(
            self.upstream.snapshot_quote(&symbol, &exp_iso),
            self.upstream.snapshot_open_interest(&symbol, &exp_iso),
            self.upstream.snapshot_ohlc(&symbol, &exp_iso),
            self.upstream.snapshot_implied_vol(&symbol, &exp_iso),
        );

        let quote = quote?;
        let (oi, ohlc, iv) = match self.policy {
            PartialPolicy::FailFast => (Some(oi?), Some(ohlc?), Some(iv?)),
            PartialPolicy::BestEffort => (
                tolerated("open_interest", oi),
                tolerated("ohlc", ohlc),
                tolerated("implied_volatility", iv),
            ),
        };

        let oi_table = oi.map(|p| ColumnTable::from_items(&p.items));
        let vol_table = ohlc.map(|p| ColumnTable::from_items(&p.items));
        let iv_table = iv.map(|p| ColumnTable::from_items(&p.items));

        // The provider names open interest inconsistently across versions.
        let oi_map = aux_map(oi_table.as_ref(), &["open_interest", "oi"]);
        let vol_map = aux_map(vol_table.as_ref(), &["volume"]);
        let iv_map = aux_map(iv_table.as_ref(), &["implied_vol"]);

        let quote_rows = self.quote_rows(&quote);
        let rows = merge_rows(&quote_rows, &oi_map, &vol_map, &iv_map);

        let underlying = iv_table.as_ref().and_then(|t| {
            Some(Underlying {
                price: t.num("underlying_price", 0)?,
                timestamp: t.num("underlying_timestamp", 0),
            })
        });

        Ok(ChainResponse {
            symbol,
            expiration: exp_ymd,
            row_count: rows.len(),
            underlying,
            rows,
        })
    }

    /// Normalize the quote snapshot to rows, whichever shape it arrived
    /// in: named column arrays, or the legacy per-contract tick records.
    fn quote_rows(&self, quote: &PageSet) -> Vec<QuoteRow> {
        if legacy::is_tick_shape(&quote.items) {
            return legacy::decode_quotes(&quote.items, quote.header.as_ref(), &self.scale);
        }
        let t = ColumnTable::from_items(&quote.items);
        (0..t.row_count())
            .filter_map(|row| {
                let (strike, right) = t.contract(row)?;
                Some(QuoteRow {
                    strike,
                    right,
                    bid: t.num("bid", row),
                    ask: t.num("ask", row),
                })
            })
            .collect()
    }
}

type AuxMap = HashMap<(i64, Right), f64>;

/// Build a `strike|right → value` lookup from an auxiliary table,
/// reading the first of `fields` present at each row. Rows that fail to
/// normalize are skipped; a later non-null value for a recurring key
/// overwrites an earlier one.
fn aux_map(table: Option<&ColumnTable>, fields: &[&str]) -> AuxMap {
    let mut map = AuxMap::new();
    let Some(table) = table else {
        return map;
    };
    for row in 0..table.row_count() {
        let Some((strike, right)) = table.contract(row) else {
            continue;
        };
        if let Some(value) = fields.iter().find_map(|f| table.num(f, row)) {
            map.insert((strike_key(strike), right), value);
        }
    }
    map
}

/// Merge quote rows and the auxiliary lookups into one row per strike,
/// ascending. Sparse last-write-wins: only non-null values are written.
fn merge_rows(
    quote_rows: &[QuoteRow],
    oi_map: &AuxMap,
    vol_map: &AuxMap,
    iv_map: &AuxMap,
) -> Vec<MergedRow> {
    let mut by_strike: BTreeMap<i64, MergedRow> = BTreeMap::new();

    for q in quote_rows {
        let key = strike_key(q.strike);
        let row = by_strike.entry(key).or_insert_with(|| MergedRow {
            strike: q.strike,
            ..MergedRow::default()
        });

        let aux = (key, q.right);
        let oi = oi_map.get(&aux).copied();
        let vol = vol_map.get(&aux).copied();
        let iv = iv_map.get(&aux).copied();

        match q.right {
            Right::Call => {
                write_sparse(&mut row.call_bid, q.bid);
                write_sparse(&mut row.call_ask, q.ask);
                write_sparse(&mut row.call_oi, oi);
                write_sparse(&mut row.call_vol, vol);
                write_sparse(&mut row.call_iv, iv);
            }
            Right::Put => {
                write_sparse(&mut row.put_bid, q.bid);
                write_sparse(&mut row.put_ask, q.ask);
                write_sparse(&mut row.put_oi, oi);
                write_sparse(&mut row.put_vol, vol);
                write_sparse(&mut row.put_iv, iv);
            }
        }
    }

    by_strike.into_values().collect()
}

fn write_sparse(slot: &mut Option<f64>, value: Option<f64>) {
    if value.is_some() {
        *slot = value;
    }
}

fn tolerated(
    source: &str,
    result: Result<Arc<PageSet>, UpstreamError>,
) -> Option<Arc<PageSet>> {
    match result {
        Ok(pages) => Some(pages),
        Err(err) => {
            tracing::warn!(source, %err, "snapshot source failed; leaving its fields null");
            None
        }
    }
}

pub(crate) fn validate_symbol(raw: &str) -> Result<String, UpstreamError> {
    let symbol = raw.trim().to_ascii_uppercase();
    let valid = !symbol.is_empty()
        && symbol.len() <= 8
        && symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c == '.' || c == '-');
    if valid {
        Ok(symbol)
    } else {
        Err(UpstreamError::Validation(format!(
            "invalid symbol `{}`",
            raw.trim()
        )))
    }
}

/// Accept an expiration in compact or hyphenated form; return both, since
/// different upstream calls expect different forms.
pub(crate) fn canonical_expiration(raw: &str) -> Result<(String, String), UpstreamError> {
    let raw = raw.trim();
    if is_compact_date(raw) {
        let iso = format!("{}-{}-{}", &raw[..4], &raw[4..6], &raw[6..8]);
        return Ok((raw.to_string(), iso));
    }
    if is_iso_date(raw) {
        return Ok((raw.replace('-', ""), raw.to_string()));
    }
    Err(UpstreamError::Validation(format!(
        "expiration must be YYYYMMDD or YYYY-MM-DD, got `{raw}`"
    )))
}

fn is_compact_date(s: &str) -> bool {
    s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_iso_date(s: &str) -> bool {
    s.len() == 10
        && s.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        })
}
