use crate::fields::{as_count, first_array, first_count, first_number, first_string};
use crate::models::{FreeformEntry, OptionTally, Tally, rounded_percent};
use log::{debug, warn};
use serde_json::{Map, Value};

const ID_ALIASES: &[&str] = &["optionId", "id", "_id"];
const COUNT_ALIASES: &[&str] = &["votes", "count"];
const PERCENT_ALIASES: &[&str] = &["percentOfVoters", "percent"];

/// Top-level keys that describe the payload rather than an option's count.
const RESERVED_KEYS: &[&str] = &[
    "totalUsers",
    "totalVoted",
    "options",
    "votes",
    "counts",
    "freeTexts",
    "free_texts",
    "freeText",
    "customs",
    "message",
];

/// A freeform list key and the aliases used to read its entries.
struct FreeformSource {
    key: &'static str,
    title: &'static [&'static str],
    detail: &'static [&'static str],
}

const FREEFORM_SOURCES: &[FreeformSource] = &[
    FreeformSource {
        key: "freeTexts",
        title: &["text", "customText", "title"],
        detail: &["detail_text", "customDetail", "detail"],
    },
    FreeformSource {
        key: "free_texts",
        title: &["text", "customText", "title"],
        detail: &["detail_text", "customDetail", "detail"],
    },
    FreeformSource {
        key: "freeText",
        title: &["text", "customText", "title"],
        detail: &["detail_text", "customDetail", "detail"],
    },
    FreeformSource {
        key: "customs",
        title: &["customText", "text", "title"],
        detail: &["customDetail", "detail_text", "detail"],
    },
];

/// One option's count as read from the payload, before percentages.
#[derive(Debug, Clone, PartialEq)]
struct RawCount {
    option_id: String,
    count: u64,
    explicit_percent: Option<f64>,
}

/// Recognizes one payload shape, or declines with `None`.
type ShapeDetector = fn(&Value) -> Option<Vec<RawCount>>;

/// Tried in order; the first detector that accepts the payload wins.
const COUNT_SHAPES: &[(&str, ShapeDetector)] = &[
    ("options array", detect_options_array),
    ("bare array", detect_bare_array),
    ("votes mapping", detect_votes_mapping),
    ("counts mapping", detect_counts_mapping),
    ("flat mapping", detect_flat_mapping),
];

/// Fold a results payload of any supported shape into a canonical tally.
///
/// Never fails: a payload no detector accepts yields an empty tally.
pub fn aggregate(raw: &Value) -> Tally {
    let raw_counts = COUNT_SHAPES.iter().find_map(|(name, detect)| {
        let counts = detect(raw)?;
        debug!("Results payload matched {} shape with {} option(s)", name, counts.len());
        Some(counts)
    });

    let raw_counts = match raw_counts {
        Some(counts) => merge_duplicates(counts),
        None => {
            if !raw.is_null() {
                warn!("Results payload matched no known shape; using empty tally");
            }
            Vec::new()
        }
    };

    let freeform_entries = collect_freeform(raw);
    let total_users = first_count(raw, &["totalUsers"]);
    let supplied_voted = first_count(raw, &["totalVoted"]);

    let counted = raw_counts.iter().fold(0u64, |sum, c| sum.saturating_add(c.count));
    let observed = counted.saturating_add(freeform_entries.len() as u64);

    let (total_voted, percent_base) = match supplied_voted {
        Some(supplied) if supplied < observed => {
            warn!(
                "Results report {} voters but {} votes were recorded; using {}",
                supplied, observed, observed
            );
            (observed, observed)
        }
        Some(supplied) => (supplied, supplied),
        None => (observed, counted),
    };

    let per_option = raw_counts
        .into_iter()
        .map(|raw| OptionTally {
            percent_of_voters: match raw.explicit_percent {
                Some(p) if p >= 0.0 => p.round() as u32,
                _ => rounded_percent(raw.count, percent_base),
            },
            option_id: raw.option_id,
            count: raw.count,
        })
        .collect();

    Tally {
        per_option,
        freeform_entries,
        total_users,
        total_voted,
    }
}

fn detect_options_array(raw: &Value) -> Option<Vec<RawCount>> {
    let records = raw.as_object()?.get("options")?.as_array()?;
    Some(read_option_records(records))
}

fn detect_bare_array(raw: &Value) -> Option<Vec<RawCount>> {
    raw.as_array().map(|records| read_option_records(records))
}

fn detect_votes_mapping(raw: &Value) -> Option<Vec<RawCount>> {
    raw.as_object()?.get("votes")?.as_object().map(read_count_mapping)
}

fn detect_counts_mapping(raw: &Value) -> Option<Vec<RawCount>> {
    raw.as_object()?.get("counts")?.as_object().map(read_count_mapping)
}

fn detect_flat_mapping(raw: &Value) -> Option<Vec<RawCount>> {
    let map = raw.as_object()?;
    let counts: Vec<RawCount> = read_count_mapping(map)
        .into_iter()
        .filter(|c| !RESERVED_KEYS.contains(&c.option_id.as_str()))
        .collect();

    if counts.is_empty() { None } else { Some(counts) }
}

fn read_option_records(records: &[Value]) -> Vec<RawCount> {
    records
        .iter()
        .filter_map(|record| {
            // Without an id the count can't be attributed to anything
            let option_id = first_string(record, ID_ALIASES).filter(|id| !id.is_empty())?;
            Some(RawCount {
                option_id,
                count: first_count(record, COUNT_ALIASES).unwrap_or(0),
                explicit_percent: first_number(record, PERCENT_ALIASES),
            })
        })
        .collect()
}

fn read_count_mapping(map: &Map<String, Value>) -> Vec<RawCount> {
    map.iter()
        .filter_map(|(key, value)| {
            let count = as_count(value).or_else(|| first_count(value, COUNT_ALIASES))?;
            Some(RawCount {
                option_id: key.clone(),
                count,
                explicit_percent: first_number(value, PERCENT_ALIASES),
            })
        })
        .collect()
}

fn merge_duplicates(counts: Vec<RawCount>) -> Vec<RawCount> {
    let mut merged: Vec<RawCount> = Vec::with_capacity(counts.len());
    for count in counts {
        match merged.iter_mut().find(|m| m.option_id == count.option_id) {
            Some(existing) => {
                debug!("Merging duplicate results entry for option {}", count.option_id);
                existing.count = existing.count.saturating_add(count.count);
                existing.explicit_percent = None;
            }
            None => merged.push(count),
        }
    }
    merged
}

fn collect_freeform(raw: &Value) -> Vec<FreeformEntry> {
    let Some(source) = FREEFORM_SOURCES
        .iter()
        .find(|source| first_array(raw, &[source.key]).is_some())
    else {
        return Vec::new();
    };

    let entries = first_array(raw, &[source.key]).map(Vec::as_slice).unwrap_or(&[]);
    entries
        .iter()
        .filter_map(|entry| {
            let (title, detail) = match entry {
                Value::String(text) => (text.clone(), String::new()),
                _ => (
                    first_string(entry, source.title).unwrap_or_default(),
                    first_string(entry, source.detail).unwrap_or_default(),
                ),
            };
            if title.trim().is_empty() {
                debug!("Dropping freeform entry without a title from {}", source.key);
                return None;
            }
            Some(FreeformEntry { title, detail })
        })
        .collect()
}
