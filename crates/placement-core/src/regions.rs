//! Fixed U.S. state table, census regions and state-name canonicalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Sentinel used when a record's state cannot be canonicalized.
pub const UNKNOWN_STATE: &str = "Unknown state";

/// Sentinel used when a record carries no usable city.
pub const UNKNOWN_CITY: &str = "Unknown city";

// ── Region ────────────────────────────────────────────────────────────────────

/// One of the four census macro-regions, or `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    Northeast,
    Midwest,
    South,
    West,
    Unknown,
}

impl Region {
    /// The four real regions in reporting order.
    pub const ALL: [Region; 4] = [
        Region::Northeast,
        Region::Midwest,
        Region::South,
        Region::West,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Northeast => "Northeast",
            Region::Midwest => "Midwest",
            Region::South => "South",
            Region::West => "West",
            Region::Unknown => "Unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Region::Unknown
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── State table ───────────────────────────────────────────────────────────────

/// One row of the fixed state table.
#[derive(Debug, Clone, Copy)]
pub struct StateInfo {
    pub name: &'static str,
    pub abbreviation: &'static str,
    pub region: Region,
}

const fn state(name: &'static str, abbreviation: &'static str, region: Region) -> StateInfo {
    StateInfo {
        name,
        abbreviation,
        region,
    }
}

/// The 50 states plus the District of Columbia, alphabetical by name.
static STATES: [StateInfo; 51] = [
    state("Alabama", "AL", Region::South),
    state("Alaska", "AK", Region::West),
    state("Arizona", "AZ", Region::West),
    state("Arkansas", "AR", Region::South),
    state("California", "CA", Region::West),
    state("Colorado", "CO", Region::West),
    state("Connecticut", "CT", Region::Northeast),
    state("Delaware", "DE", Region::South),
    state("District of Columbia", "DC", Region::South),
    state("Florida", "FL", Region::South),
    state("Georgia", "GA", Region::South),
    state("Hawaii", "HI", Region::West),
    state("Idaho", "ID", Region::West),
    state("Illinois", "IL", Region::Midwest),
    state("Indiana", "IN", Region::Midwest),
    state("Iowa", "IA", Region::Midwest),
    state("Kansas", "KS", Region::Midwest),
    state("Kentucky", "KY", Region::South),
    state("Louisiana", "LA", Region::South),
    state("Maine", "ME", Region::Northeast),
    state("Maryland", "MD", Region::South),
    state("Massachusetts", "MA", Region::Northeast),
    state("Michigan", "MI", Region::Midwest),
    state("Minnesota", "MN", Region::Midwest),
    state("Mississippi", "MS", Region::South),
    state("Missouri", "MO", Region::Midwest),
    state("Montana", "MT", Region::West),
    state("Nebraska", "NE", Region::Midwest),
    state("Nevada", "NV", Region::West),
    state("New Hampshire", "NH", Region::Northeast),
    state("New Jersey", "NJ", Region::Northeast),
    state("New Mexico", "NM", Region::West),
    state("New York", "NY", Region::Northeast),
    state("North Carolina", "NC", Region::South),
    state("North Dakota", "ND", Region::Midwest),
    state("Ohio", "OH", Region::Midwest),
    state("Oklahoma", "OK", Region::South),
    state("Oregon", "OR", Region::West),
    state("Pennsylvania", "PA", Region::Northeast),
    state("Rhode Island", "RI", Region::Northeast),
    state("South Carolina", "SC", Region::South),
    state("South Dakota", "SD", Region::Midwest),
    state("Tennessee", "TN", Region::South),
    state("Texas", "TX", Region::South),
    state("Utah", "UT", Region::West),
    state("Vermont", "VT", Region::Northeast),
    state("Virginia", "VA", Region::South),
    state("Washington", "WA", Region::West),
    state("West Virginia", "WV", Region::South),
    state("Wisconsin", "WI", Region::Midwest),
    state("Wyoming", "WY", Region::West),
];

/// Every entry of the fixed state table, alphabetical by name.
pub fn all_states() -> &'static [StateInfo] {
    &STATES
}

/// Canonical state names belonging to `region`, alphabetical.
pub fn states_in_region(region: Region) -> impl Iterator<Item = &'static str> {
    STATES
        .iter()
        .filter(move |s| s.region == region)
        .map(|s| s.name)
}

/// Look up a canonical state name (exact match).
pub fn state_info(state: &str) -> Option<&'static StateInfo> {
    STATES.iter().find(|s| s.name == state)
}

/// USPS abbreviation for a canonical state name.
pub fn state_abbreviation(state: &str) -> Option<&'static str> {
    state_info(state).map(|s| s.abbreviation)
}

/// Map a canonical state name to its census region.
///
/// Total: the unknown sentinel, the empty string and anything outside the
/// table all map to [`Region::Unknown`].
///
/// ```
/// use placement_core::regions::{region_for_state, Region};
///
/// assert_eq!(region_for_state("Texas"), Region::South);
/// assert_eq!(region_for_state("Atlantis"), Region::Unknown);
/// ```
pub fn region_for_state(state: &str) -> Region {
    state_info(state)
        .map(|s| s.region)
        .unwrap_or(Region::Unknown)
}

// ── Canonicalization ──────────────────────────────────────────────────────────

/// Turns a raw `state` field into a canonical name or [`UNKNOWN_STATE`].
///
/// Implementations must be total and never return an empty string.
pub trait StateCanonicalizer {
    fn canonicalize(&self, raw: Option<&Value>) -> String;
}

impl<F> StateCanonicalizer for F
where
    F: Fn(Option<&Value>) -> String,
{
    fn canonicalize(&self, raw: Option<&Value>) -> String {
        self(raw)
    }
}

/// Default canonicalizer backed by the fixed state table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableStateCanonicalizer;

impl StateCanonicalizer for TableStateCanonicalizer {
    fn canonicalize(&self, raw: Option<&Value>) -> String {
        normalize_state(raw)
    }
}

/// Resolve a raw state value against the table.
///
/// Accepts full names (case-insensitive, whitespace collapsed, trailing
/// periods dropped), USPS abbreviations and the usual District of Columbia
/// spellings. Numbers and unmatched strings yield [`UNKNOWN_STATE`].
pub fn normalize_state(raw: Option<&Value>) -> String {
    let Some(Value::String(s)) = raw else {
        return UNKNOWN_STATE.to_string();
    };

    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = collapsed.trim_end_matches('.').to_lowercase();
    if cleaned.is_empty() {
        return UNKNOWN_STATE.to_string();
    }

    if matches!(
        cleaned.as_str(),
        "d.c" | "washington dc" | "washington d.c" | "washington, dc" | "washington, d.c"
    ) {
        return "District of Columbia".to_string();
    }

    STATES
        .iter()
        .find(|info| {
            info.name.to_lowercase() == cleaned || info.abbreviation.to_lowercase() == cleaned
        })
        .map(|info| info.name.to_string())
        .unwrap_or_else(|| UNKNOWN_STATE.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_region_for_state_known() {
        assert_eq!(region_for_state("Texas"), Region::South);
        assert_eq!(region_for_state("Maine"), Region::Northeast);
        assert_eq!(region_for_state("Ohio"), Region::Midwest);
        assert_eq!(region_for_state("Oregon"), Region::West);
        assert_eq!(region_for_state("District of Columbia"), Region::South);
    }

    #[test]
    fn test_region_for_state_unknown_inputs() {
        assert_eq!(region_for_state(""), Region::Unknown);
        assert_eq!(region_for_state("Atlantis"), Region::Unknown);
        assert_eq!(region_for_state(UNKNOWN_STATE), Region::Unknown);
        // Lookup is exact; canonicalization happens upstream.
        assert_eq!(region_for_state("texas"), Region::Unknown);
    }

    #[test]
    fn test_table_has_fifty_one_entries_split_by_region() {
        assert_eq!(all_states().len(), 51);
        assert_eq!(states_in_region(Region::Northeast).count(), 9);
        assert_eq!(states_in_region(Region::Midwest).count(), 12);
        assert_eq!(states_in_region(Region::South).count(), 17);
        assert_eq!(states_in_region(Region::West).count(), 13);
        assert_eq!(states_in_region(Region::Unknown).count(), 0);
    }

    #[test]
    fn test_state_abbreviation() {
        assert_eq!(state_abbreviation("New York"), Some("NY"));
        assert_eq!(state_abbreviation("Narnia"), None);
    }

    #[test]
    fn test_normalize_state_full_names_and_abbreviations() {
        assert_eq!(normalize_state(Some(&json!("Texas"))), "Texas");
        assert_eq!(normalize_state(Some(&json!("  new   york "))), "New York");
        assert_eq!(normalize_state(Some(&json!("tx"))), "Texas");
        assert_eq!(normalize_state(Some(&json!("Wash."))), UNKNOWN_STATE);
        assert_eq!(normalize_state(Some(&json!("Washington"))), "Washington");
    }

    #[test]
    fn test_normalize_state_district_aliases() {
        for raw in ["DC", "D.C.", "Washington DC", "washington, d.c."] {
            assert_eq!(
                normalize_state(Some(&json!(raw))),
                "District of Columbia",
                "alias {raw}"
            );
        }
    }

    #[test]
    fn test_normalize_state_rejects_non_strings_and_blanks() {
        assert_eq!(normalize_state(None), UNKNOWN_STATE);
        assert_eq!(normalize_state(Some(&json!(42))), UNKNOWN_STATE);
        assert_eq!(normalize_state(Some(&json!(null))), UNKNOWN_STATE);
        assert_eq!(normalize_state(Some(&json!("   "))), UNKNOWN_STATE);
        assert_eq!(normalize_state(Some(&json!("Atlantis"))), UNKNOWN_STATE);
    }

    #[test]
    fn test_closure_canonicalizer() {
        let always_maine = |_: Option<&Value>| "Maine".to_string();
        assert_eq!(always_maine.canonicalize(Some(&json!("TX"))), "Maine");
        assert_eq!(
            TableStateCanonicalizer.canonicalize(Some(&json!("TX"))),
            "Texas"
        );
    }

    #[test]
    fn test_region_display() {
        assert_eq!(Region::Unknown.to_string(), "Unknown");
        assert_eq!(
            serde_json::to_string(&Region::Midwest).unwrap(),
            "\"Midwest\""
        );
    }
}
