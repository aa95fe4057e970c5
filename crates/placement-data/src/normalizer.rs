//! Trust boundary: coerces an untrusted JSON payload into typed placements.
//!
//! Element-level invalidity (not an object) drops the element; field-level
//! invalidity only ever defaults the field, so record counts survive for the
//! downstream share and KPI denominators.

use placement_core::data_processors::{PlacementDateParser, ValueCoercer};
use placement_core::models::PlacementMetricItem;
use placement_core::regions::{StateCanonicalizer, TableStateCanonicalizer, UNKNOWN_CITY};
use serde_json::Value;
use tracing::debug;

/// Keys tried, in order, for the placement date.
const DATE_KEYS: &[&str] = &["placementDate", "placement_date"];

/// Normalize `payload` with the table-backed state canonicalizer.
pub fn normalize_placements(payload: &Value) -> Vec<PlacementMetricItem> {
    normalize_with(payload, &TableStateCanonicalizer)
}

/// Normalize `payload`, delegating state names to `canonicalizer`.
///
/// Never fails: a non-array payload yields an empty vec. The result is in
/// canonical order (see [`PlacementMetricItem::canonical_cmp`]).
pub fn normalize_with<C: StateCanonicalizer + ?Sized>(
    payload: &Value,
    canonicalizer: &C,
) -> Vec<PlacementMetricItem> {
    let Some(elements) = payload.as_array() else {
        debug!("placement payload is not an array; nothing to normalize");
        return Vec::new();
    };

    let mut items: Vec<PlacementMetricItem> = elements
        .iter()
        .enumerate()
        .filter(|(_, element)| element.is_object())
        .map(|(index, record)| normalize_record(index, record, canonicalizer))
        .collect();

    let dropped = elements.len() - items.len();
    if dropped > 0 {
        debug!(dropped, "dropped non-record payload elements");
    }

    items.sort_by(PlacementMetricItem::canonical_cmp);
    items
}

fn normalize_record<C: StateCanonicalizer + ?Sized>(
    index: usize,
    record: &Value,
    canonicalizer: &C,
) -> PlacementMetricItem {
    let app_id = ValueCoercer::as_integer(record.get("app_id")).unwrap_or(index as i64);
    let city = ValueCoercer::as_trimmed_string(record.get("city"))
        .unwrap_or_else(|| UNKNOWN_CITY.to_string());
    let state = canonicalizer.canonicalize(record.get("state"));
    let placement_date_raw =
        ValueCoercer::as_trimmed_string(ValueCoercer::first_present(record, DATE_KEYS))
            .unwrap_or_default();

    let parsed = PlacementDateParser::parse(&placement_date_raw);

    PlacementMetricItem {
        app_id,
        city,
        state,
        placement_date: parsed.map(|dt| dt.date_naive()),
        placement_time: parsed.map(|dt| dt.timestamp_millis()).unwrap_or(0),
        placement_date_raw,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
