pub mod catalog;
pub mod state;
pub mod tally;

use crate::models::{FreeformEntry, Tally};
use catalog::OptionCatalog;
use serde::Serialize;
use std::collections::HashSet;

// Results ready for display: tally lines paired with catalog labels
#[derive(Debug, Clone, Serialize)]
pub struct Results {
    pub lines: Vec<ResultLine>,
    pub freeform_entries: Vec<FreeformEntry>,
    pub total_users: Option<u64>,
    pub total_voted: u64,
    pub turnout: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultLine {
    pub option_id: String,
    pub label: String,
    pub count: u64,
    pub percent_of_voters: u32,
}

impl Results {
    pub fn new(tally: Tally, catalog: &OptionCatalog) -> Self {
        let turnout = tally.turnout();

        // Catalog order first, then anything the catalog doesn't know about
        let mut lines: Vec<ResultLine> = catalog
            .options()
            .iter()
            .filter_map(|option| tally.get(&option.id))
            .chain(tally.per_option.iter().filter(|o| !catalog.contains(&o.option_id)))
            .map(|o| ResultLine {
                option_id: o.option_id.clone(),
                label: catalog.label_for(&o.option_id).to_string(),
                count: o.count,
                percent_of_voters: o.percent_of_voters,
            })
            .collect();
        let mut seen = HashSet::new();
        lines.retain(|line| seen.insert(line.option_id.clone()));

        Self {
            lines,
            freeform_entries: tally.freeform_entries,
            total_users: tally.total_users,
            total_voted: tally.total_voted,
            turnout,
        }
    }

    pub fn summary(&self) -> String {
        let mut summary = String::new();

        for line in &self.lines {
            summary.push_str(&format!(
                "{}: {} votes ({}%)\n",
                line.label, line.count, line.percent_of_voters
            ));
        }

        if !self.freeform_entries.is_empty() {
            summary.push_str("\nWrite-in suggestions:\n");
            for entry in &self.freeform_entries {
                if entry.detail.is_empty() {
                    summary.push_str(&format!("- {}\n", entry.title));
                } else {
                    summary.push_str(&format!("- {} ({})\n", entry.title, entry.detail));
                }
            }
        }

        summary.push_str(&format!("\n{} voters participated.", self.total_voted));
        if let Some(turnout) = self.turnout {
            summary.push_str(&format!("\nTurnout: {}%", turnout));
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_results_follow_catalog_order_and_labels() {
        let catalog = OptionCatalog::normalize(&[
            json!({"id": "a", "text": "Apples"}),
            json!({"id": "b", "text": "Bananas"}),
        ]);
        let tally = tally::aggregate(&json!({
            "totalUsers": 4,
            "options": [{"id": "ghost", "votes": 1}, {"id": "b", "votes": 2}, {"id": "a", "votes": 1}]
        }));

        let results = Results::new(tally, &catalog);
        let ids: Vec<_> = results.lines.iter().map(|l| l.option_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "ghost"]);
        assert_eq!(results.lines[1].label, "Bananas");
        assert_eq!(results.lines[2].label, "ghost");
        assert_eq!(results.turnout, Some(100));
    }

    #[test]
    fn test_summary_text() {
        let catalog = OptionCatalog::normalize(&[json!({"id": "a", "text": "Apples"})]);
        let tally = tally::aggregate(&json!({
            "totalUsers": 10,
            "options": [{"id": "a", "votes": 3}],
            "freeTexts": [{"text": "Pears", "detail_text": "ripe"}, {"text": "Plums"}]
        }));

        let summary = Results::new(tally, &catalog).summary();
        assert!(summary.starts_with("Apples: 3 votes (100%)\n"));
        assert!(summary.contains("- Pears (ripe)\n"));
        assert!(summary.contains("- Plums\n"));
        assert!(summary.contains("5 voters participated."));
        assert!(summary.ends_with("Turnout: 50%"));
    }

    #[test]
    fn test_summary_omits_unknown_turnout() {
        let summary = Results::new(Tally::default(), &OptionCatalog::default()).summary();
        assert_eq!(summary, "\n0 voters participated.");
    }
}
