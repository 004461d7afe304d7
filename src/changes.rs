use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

#[derive(
    AsRefStr, EnumIter, EnumString, Debug, Display, PartialEq, Eq, Hash, Copy, Clone, Serialize, Deserialize,
)]
pub enum ChangeCategory {
    #[strum(serialize = "On-Page")]
    #[serde(rename = "On-Page")]
    OnPage,
    #[strum(serialize = "Technical")]
    Technical,
    #[strum(serialize = "Schema")]
    Schema,
    #[strum(serialize = "Other")]
    Other,
}

/// One field-level difference between two snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub field: String,
    pub old: Option<String>,
    pub new: Option<String>,
    pub category: ChangeCategory,
}

impl ChangeRecord {
    const EMPTY: &str = "(empty)";

    pub fn new(
        field: impl Into<String>,
        old: Option<String>,
        new: Option<String>,
        category: ChangeCategory,
    ) -> Self {
        ChangeRecord {
            field: field.into(),
            old,
            new,
            category,
        }
    }

    /// Single-line display form:
    /// `Title: "Home" → "Welcome"`, or `Title changed` when both sides are absent.
    pub fn display_line(&self) -> String {
        if self.old.is_none() && self.new.is_none() {
            return format!("{} changed", self.field);
        }

        format!(
            "{}: \"{}\" → \"{}\"",
            self.field,
            Self::display_value(&self.old),
            Self::display_value(&self.new)
        )
    }

    fn display_value(value: &Option<String>) -> String {
        match value {
            Some(v) => escape(v),
            None => Self::EMPTY.to_owned(),
        }
    }
}

/// Escapes a value for the quoted display form. Every backslash is doubled
/// so an escaped quote stays unambiguous.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// The category with the most records. Ties go to the category seen first.
pub fn primary_category(changes: &[ChangeRecord]) -> Option<ChangeCategory> {
    let mut tally: Vec<(ChangeCategory, usize)> = Vec::new();

    for change in changes {
        match tally.iter_mut().find(|(cat, _)| *cat == change.category) {
            Some((_, count)) => *count += 1,
            None => tally.push((change.category, 1)),
        }
    }

    let mut best: Option<(ChangeCategory, usize)> = None;
    for (category, count) in tally {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((category, count)),
        }
    }

    best.map(|(category, _)| category)
}
