use crate::fields::{first_present, first_string, list_items, random_id};
use crate::models::{FREEFORM_OPTION_ID, PollOption};
use crate::voting::state::coerce_truthy;
use log::debug;
use serde_json::Value;
use std::collections::HashSet;

const ID_ALIASES: &[&str] = &["optionId", "id", "_id"];
const TEXT_ALIASES: &[&str] = &["text", "title", "name", "option"];
const DETAIL_ALIASES: &[&str] = &["detail_text", "detail", "description"];
const FREEFORM_TAGS: &[&str] = &["isOther", "other"];

const DEFAULT_TEXT: &str = "Option";
pub const FREEFORM_LABEL: &str = "Other (write your own)";

/// Ordered set of choices for one page-view, always ending with exactly one
/// freeform entry.
#[derive(Debug, Clone, Default)]
pub struct OptionCatalog {
    options: Vec<PollOption>,
}

impl OptionCatalog {
    /// Build a catalog from whatever the options endpoint returned.
    ///
    /// Accepts a bare array or one wrapped under `items` / `options`.
    pub fn from_payload(payload: &Value) -> Self {
        Self::normalize(list_items(payload, &["items", "options"]))
    }

    pub fn normalize(raw_options: &[Value]) -> Self {
        let mut options: Vec<PollOption> = raw_options.iter().map(normalize_option).collect();

        let mut seen_ids = HashSet::new();
        let mut seen_freeform = false;
        for option in &mut options {
            if !seen_ids.insert(option.id.clone()) {
                debug!("Duplicate option id {}; assigning a fresh one", option.id);
                option.id = random_id();
                seen_ids.insert(option.id.clone());
            }
            // Only the first freeform-tagged record stays freeform
            if option.is_freeform && std::mem::replace(&mut seen_freeform, true) {
                debug!("Option {} is an extra freeform entry; treating it as a normal option", option.id);
                option.is_freeform = false;
            }
        }

        if !seen_freeform {
            options.push(PollOption {
                id: FREEFORM_OPTION_ID.to_string(),
                text: FREEFORM_LABEL.to_string(),
                detail_text: String::new(),
                is_freeform: true,
            });
        }

        debug!("Normalized {} raw option(s) into {} catalog entries", raw_options.len(), options.len());
        Self { options }
    }

    pub fn options(&self) -> &[PollOption] {
        &self.options
    }

    pub fn get(&self, option_id: &str) -> Option<&PollOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    pub fn contains(&self, option_id: &str) -> bool {
        self.get(option_id).is_some()
    }

    pub fn freeform(&self) -> Option<&PollOption> {
        self.options.iter().find(|o| o.is_freeform)
    }

    /// Display label for an option id, falling back to the id itself.
    pub fn label_for<'a>(&'a self, option_id: &'a str) -> &'a str {
        self.get(option_id).map(|o| o.text.as_str()).unwrap_or(option_id)
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }
}

fn normalize_option(raw: &Value) -> PollOption {
    let id = first_string(raw, ID_ALIASES)
        .filter(|id| !id.is_empty())
        .unwrap_or_else(random_id);
    let text = first_string(raw, TEXT_ALIASES).unwrap_or_else(|| DEFAULT_TEXT.to_string());
    let detail_text = first_string(raw, DETAIL_ALIASES).unwrap_or_default();
    let is_freeform = first_present(raw, FREEFORM_TAGS).is_some_and(coerce_truthy)
        || id == FREEFORM_OPTION_ID;

    PollOption {
        id,
        text,
        detail_text,
        is_freeform,
    }
}
