use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// The SEO field-set captured for one page.
///
/// Every field is optional: an absent title is a meaningful state and is
/// kept distinct from an empty one by the extractor, which never produces
/// empty strings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub h1: Option<String>,
    pub canonical: Option<String>,
    pub robots: Option<String>,
    /// A single JSON-LD value, an array of values (one per script), or None.
    pub json_ld: Option<Value>,
}

impl ExtractedFields {
    /// JSON form used for hashing and storage. Absent fields become `null`
    /// so that every field-set has the same key set.
    pub fn to_json(&self) -> Value {
        json!({
            "title": self.title,
            "metaDescription": self.meta_description,
            "h1": self.h1,
            "canonical": self.canonical,
            "robots": self.robots,
            "jsonLd": self.json_ld,
        })
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
