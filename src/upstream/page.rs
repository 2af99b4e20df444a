use serde_json::Value;

use super::{UpstreamError, excerpt};

/// HTTP response header carrying the next page URL.
pub const NEXT_PAGE_HEADER: &str = "Next-Page";

/// Cursor value the provider uses to signal "no more pages".
const CURSOR_END: &str = "null";

/// All pages of one paginated resource, flattened.
///
/// `header` is retained from the first page only; later pages may carry
/// their own header metadata but it is used solely for cursor resolution.
#[derive(Debug, Clone, Default)]
pub struct PageSet {
    pub items: Vec<Value>,
    pub header: Option<Value>,
}

/// One normalized response body.
#[derive(Debug, Default)]
pub struct Page {
    pub items: Vec<Value>,
    pub header: Option<Value>,
}

/// Parse a response body into items + header, tolerating both encodings
/// the provider is known to return:
///
/// 1. A single JSON envelope `{ "response": [...], "header": {...} }`,
///    or a bare JSON object that itself is the full result set (the
///    column-array snapshot shape).
/// 2. Newline-delimited JSON: lines with a `header` key update the
///    running header, lines with a `contract` key are items, anything
///    else is dropped.
///
/// Returns `None` only when the body parses under neither mode.
pub fn normalize(text: &str) -> Option<Page> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if let Value::Object(mut obj) = value {
            let header = obj.remove("header");
            return match obj.remove("response") {
                Some(Value::Array(items)) => Some(Page { items, header }),
                // Some endpoints wrap a single column-table object.
                Some(cols @ Value::Object(_)) => Some(Page {
                    items: vec![cols],
                    header,
                }),
                // No response field: the object itself is the result set.
                _ => Some(Page {
                    items: vec![Value::Object(obj)],
                    header,
                }),
            };
        }
        if let Value::Array(items) = value {
            return Some(Page {
                items,
                header: None,
            });
        }
        // Scalar body: fall through to the line-oriented path.
    }

    let mut items = Vec::new();
    let mut header = None;
    let mut parsed_any = false;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(obj) = serde_json::from_str::<Value>(line) else {
            continue; // bad line, drop it
        };
        parsed_any = true;
        if let Some(h) = obj.get("header") {
            header = Some(h.clone());
        } else if obj.get("contract").is_some() {
            items.push(obj);
        }
        // parsed but matched neither: dropped
    }

    if parsed_any || text.trim().is_empty() {
        Some(Page { items, header })
    } else {
        None
    }
}

/// Fetch every page of a paginated resource, concatenating items in
/// fetch order. Pages are requested strictly sequentially; the next URL
/// is taken from the `Next-Page` HTTP header first, then from the body's
/// `header.next_page` field. A cursor of `"null"` (literal) or absence
/// terminates the walk.
///
/// Any non-success status aborts the walk and discards pages already
/// collected. `max_pages` bounds a provider that never terminates.
pub async fn fetch_all(
    http: &reqwest::Client,
    start_url: &str,
    max_pages: usize,
) -> Result<PageSet, UpstreamError> {
    let mut url = start_url.to_string();
    let mut out = PageSet::default();

    for page_no in 0..max_pages {
        let resp = http
            .get(&url)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        let header_next = resp
            .headers()
            .get(NEXT_PAGE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp
            .text()
            .await
            .map_err(|source| UpstreamError::Transport {
                url: url.clone(),
                source,
            })?;

        if !status.is_success() {
            return Err(UpstreamError::Http {
                url,
                status: status.as_u16(),
                excerpt: excerpt(&body),
            });
        }

        let page = normalize(&body).ok_or_else(|| UpstreamError::Parse {
            url: url.clone(),
            excerpt: excerpt(&body),
        })?;

        if page_no == 0 {
            out.header = page.header.clone();
        }
        out.items.extend(page.items);

        match next_url(header_next.as_deref(), page.header.as_ref()) {
            Some(next) => url = next,
            None => return Ok(out),
        }
    }

    Err(UpstreamError::TooManyPages {
        url: start_url.to_string(),
        max: max_pages,
    })
}

/// Resolve the next-page cursor: HTTP header first, then body field.
fn next_url(header_value: Option<&str>, page_header: Option<&Value>) -> Option<String> {
    if let Some(next) = header_value {
        if !next.is_empty() && next != CURSOR_END {
            return Some(next.to_string());
        }
    }
    if let Some(next) = page_header
        .and_then(|h| h.get("next_page"))
        .and_then(Value::as_str)
    {
        if !next.is_empty() && next != CURSOR_END {
            return Some(next.to_string());
        }
    }
    None
}

/// Position of a named field in the header-declared column order, with a
/// static fallback when the header is missing or does not declare it.
/// Only the legacy tick-array quote shape needs this; the column-array
/// snapshots carry explicit named arrays.
pub fn field_index(header: Option<&Value>, name: &str, fallback: usize) -> usize {
    header
        .and_then(|h| h.get("format"))
        .and_then(Value::as_array)
        .and_then(|fmt| fmt.iter().position(|f| f.as_str() == Some(name)))
        .unwrap_or(fallback)
}
