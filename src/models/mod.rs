use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Id of the free-text choice, both in the catalog and on the wire.
pub const FREEFORM_OPTION_ID: &str = "other";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: String,
    pub text: String,
    pub detail_text: String,
    pub is_freeform: bool,
}

/// What the voter picked: a catalog entry or a write-in.
///
/// Serializes to the store's submission body, `{optionId}` or
/// `{customText, detailText}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Selection {
    Catalog {
        #[serde(rename = "optionId")]
        option_id: String,
    },
    Freeform {
        #[serde(rename = "customText")]
        title: String,
        #[serde(rename = "detailText")]
        detail: String,
    },
}

impl Selection {
    pub fn option(option_id: impl Into<String>) -> Self {
        Selection::Catalog {
            option_id: option_id.into(),
        }
    }

    /// Title and detail are trimmed; emptiness is checked at submission.
    pub fn freeform(title: &str, detail: Option<&str>) -> Self {
        Selection::Freeform {
            title: title.trim().to_string(),
            detail: detail.map(str::trim).unwrap_or_default().to_string(),
        }
    }

    /// Build a selection from a picked choice id, treating the freeform id as a write-in.
    pub fn from_choice(choice_id: &str, title: &str, detail: Option<&str>) -> Option<Self> {
        let choice_id = choice_id.trim();
        if choice_id.is_empty() {
            None
        } else if choice_id == FREEFORM_OPTION_ID {
            Some(Selection::freeform(title, detail))
        } else {
            Some(Selection::option(choice_id))
        }
    }
}

/// Acknowledgment of a recorded vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    pub voter_id: String,
    pub option_id: Option<String>,
    pub freeform_title: Option<String>,
    pub freeform_detail: Option<String>,
    pub cast_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn new(voter_id: &str, selection: &Selection) -> Self {
        let (option_id, freeform_title, freeform_detail) = match selection {
            Selection::Catalog { option_id } => (Some(option_id.clone()), None, None),
            Selection::Freeform { title, detail } => (
                None,
                Some(title.clone()),
                Some(detail.clone()).filter(|d| !d.is_empty()),
            ),
        };

        Self {
            voter_id: voter_id.to_string(),
            option_id,
            freeform_title,
            freeform_detail,
            cast_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    /// Anything other than `admin` is an ordinary user.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::User
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub has_voted: bool,
}

impl UserAccount {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Per-option line of a tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionTally {
    pub option_id: String,
    pub count: u64,
    pub percent_of_voters: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FreeformEntry {
    pub title: String,
    pub detail: String,
}

/// Canonical, shape-independent aggregation of a results payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub per_option: Vec<OptionTally>,
    pub freeform_entries: Vec<FreeformEntry>,
    pub total_users: Option<u64>,
    pub total_voted: u64,
}

impl Tally {
    pub fn get(&self, option_id: &str) -> Option<&OptionTally> {
        self.per_option.iter().find(|o| o.option_id == option_id)
    }

    pub fn is_empty(&self) -> bool {
        self.per_option.is_empty() && self.freeform_entries.is_empty() && self.total_voted == 0
    }

    /// Rounded share of users who voted, when the user count is known.
    pub fn turnout(&self) -> Option<u32> {
        match self.total_users {
            Some(users) if users > 0 => Some(rounded_percent(self.total_voted, users)),
            _ => None,
        }
    }
}

pub(crate) fn rounded_percent(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 * 100.0 / whole as f64).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_selection_wire_shapes() {
        assert_eq!(
            serde_json::to_value(Selection::option("a")).unwrap(),
            json!({"optionId": "a"})
        );
        assert_eq!(
            serde_json::to_value(Selection::freeform("  Pizza  ", None)).unwrap(),
            json!({"customText": "Pizza", "detailText": ""})
        );
    }

    #[test]
    fn test_from_choice() {
        assert_eq!(Selection::from_choice("", "x", None), None);
        assert_eq!(
            Selection::from_choice("b", "ignored", None),
            Some(Selection::option("b"))
        );
        assert_eq!(
            Selection::from_choice("other", " Tacos ", Some(" on fridays ")),
            Some(Selection::Freeform {
                title: "Tacos".to_string(),
                detail: "on fridays".to_string()
            })
        );
    }

    #[test]
    fn test_vote_record_freeform_has_title() {
        let record = VoteRecord::new("u1", &Selection::freeform("Tacos", None));
        assert_eq!(record.option_id, None);
        assert_eq!(record.freeform_title.as_deref(), Some("Tacos"));
        assert_eq!(record.freeform_detail, None);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("Admin"), Role::Admin);
        assert_eq!(Role::parse("moderator"), Role::User);
        assert_eq!(Role::parse(""), Role::User);
    }

    #[test]
    fn test_turnout() {
        let mut tally = Tally {
            total_voted: 7,
            ..Tally::default()
        };
        assert_eq!(tally.turnout(), None);
        tally.total_users = Some(0);
        assert_eq!(tally.turnout(), None);
        tally.total_users = Some(9);
        assert_eq!(tally.turnout(), Some(78));
    }
}
