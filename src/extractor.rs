use log::{debug, warn, Level};
use logging_timer::timer;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::fields::ExtractedFields;

/// Minimal read-only DOM access the extractor needs. Any HTML parser that
/// can answer CSS selector queries can back it.
pub trait DomQuery {
    type Element<'a>: DomElement
    where
        Self: 'a;

    fn query_first(&self, selector: &str) -> Option<Self::Element<'_>>;
    fn query_all(&self, selector: &str) -> Vec<Self::Element<'_>>;
}

pub trait DomElement {
    fn text_content(&self) -> String;
    fn attribute(&self, name: &str) -> Option<&str>;
}

impl DomQuery for Html {
    type Element<'a> = ElementRef<'a>;

    fn query_first(&self, selector: &str) -> Option<ElementRef<'_>> {
        let selector = Selector::parse(selector).ok()?;
        self.select(&selector).next()
    }

    fn query_all(&self, selector: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(selector) {
            Ok(selector) => self.select(&selector).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl DomElement for ElementRef<'_> {
    fn text_content(&self) -> String {
        self.text().collect()
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.value().attr(name)
    }
}

/// Result of extracting one page. JSON-LD parse failures are reported here
/// rather than as errors; the rest of the field-set is still usable.
#[derive(Clone, Debug, Default)]
pub struct Extraction {
    pub fields: ExtractedFields,
    pub json_ld_failures: Vec<String>,
}

pub struct Extractor;

impl Extractor {
    const TITLE: &str = "title";
    const META_DESCRIPTION: &str = "meta[name=\"description\"]";
    const H1: &str = "h1";
    const CANONICAL: &str = "link[rel=\"canonical\"]";
    const ROBOTS: &str = "meta[name=\"robots\"]";
    const JSON_LD: &str = "script[type=\"application/ld+json\"]";

    /// Parses raw HTML and extracts the SEO field-set. Never fails: malformed
    /// markup and malformed JSON-LD degrade field by field.
    pub fn extract(html: &str) -> Extraction {
        let _tmr = timer!(Level::Trace; "Extractor.extract", "{} bytes", html.len());
        let document = Html::parse_document(html);
        Self::extract_from(&document)
    }

    pub fn extract_from<D: DomQuery>(dom: &D) -> Extraction {
        let (json_ld, json_ld_failures) = Self::json_ld(dom);

        let fields = ExtractedFields {
            title: Self::first_text(dom, Self::TITLE),
            meta_description: Self::first_attr(dom, Self::META_DESCRIPTION, "content"),
            h1: Self::first_text(dom, Self::H1),
            canonical: Self::first_attr(dom, Self::CANONICAL, "href"),
            robots: Self::first_attr(dom, Self::ROBOTS, "content"),
            json_ld,
        };

        Extraction {
            fields,
            json_ld_failures,
        }
    }

    fn first_text<D: DomQuery>(dom: &D, selector: &str) -> Option<String> {
        dom.query_first(selector)
            .and_then(|el| Self::non_empty(&el.text_content()))
    }

    fn first_attr<D: DomQuery>(dom: &D, selector: &str, attr: &str) -> Option<String> {
        dom.query_first(selector)
            .and_then(|el| el.attribute(attr).and_then(Self::non_empty))
    }

    fn non_empty(s: &str) -> Option<String> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    }

    /// Parses every JSON-LD script independently. One parsed script yields
    /// that value, several yield an array in document order, none yield None.
    fn json_ld<D: DomQuery>(dom: &D) -> (Option<Value>, Vec<String>) {
        let scripts = dom.query_all(Self::JSON_LD);
        let script_count = scripts.len();

        let mut parsed = Vec::new();
        let mut failures = Vec::new();

        for (index, script) in scripts.iter().enumerate() {
            let text = script.text_content();
            match serde_json::from_str::<Value>(text.trim()) {
                // A literal `null` carries no structured data; stored snapshots read it back as absent
                Ok(Value::Null) => debug!("Ignoring null JSON-LD script {}", index + 1),
                Ok(value) => parsed.push(value),
                Err(e) => {
                    debug!("Skipping JSON-LD script {}: {}", index + 1, e);
                    failures.push(format!("script {}: {}", index + 1, e));
                }
            }
        }

        if script_count > 0 && failures.len() == script_count {
            warn!(
                "All {} JSON-LD scripts failed to parse: {}",
                script_count,
                failures.join("; ")
            );
        }

        let json_ld = match parsed.len() {
            0 => None,
            1 => parsed.pop(),
            _ => Some(Value::Array(parsed)),
        };

        (json_ld, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const FULL_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>  Acme Widgets  </title>
  <meta name="description" content=" Widgets for every need ">
  <meta name="robots" content="index, follow">
  <link rel="canonical" href="https://acme.test/widgets">
  <script type="application/ld+json">{"@type": "Organization", "name": "Acme"}</script>
</head>
<body>
  <h1>
    Widgets
  </h1>
  <h1>Second heading</h1>
</body>
</html>"#;

    #[test]
    fn test_extracts_all_fields() {
        let extraction = Extractor::extract(FULL_PAGE);
        let fields = extraction.fields;

        assert_eq!(fields.title.as_deref(), Some("Acme Widgets"));
        assert_eq!(fields.meta_description.as_deref(), Some("Widgets for every need"));
        assert_eq!(fields.h1.as_deref(), Some("Widgets"));
        assert_eq!(fields.canonical.as_deref(), Some("https://acme.test/widgets"));
        assert_eq!(fields.robots.as_deref(), Some("index, follow"));
        assert_eq!(fields.json_ld, Some(json!({"@type": "Organization", "name": "Acme"})));
        assert!(extraction.json_ld_failures.is_empty());
    }

    #[test]
    fn test_missing_fields_are_none() {
        let extraction = Extractor::extract("<html><body><p>Nothing here</p></body></html>");
        assert_eq!(extraction.fields, ExtractedFields::default());
        assert!(extraction.json_ld_failures.is_empty());
    }

    #[test]
    fn test_empty_title_is_none() {
        let extraction = Extractor::extract("<html><head><title>   </title></head></html>");
        assert_eq!(extraction.fields.title, None);
    }

    #[test]
    fn test_multiple_json_ld_scripts_become_array_in_document_order() {
        let html = r#"<html><head>
            <script type="application/ld+json">{"@type": "Organization"}</script>
            <script type="application/ld+json">{"@type": "WebSite"}</script>
        </head></html>"#;
        let extraction = Extractor::extract(html);
        assert_eq!(
            extraction.fields.json_ld,
            Some(json!([{"@type": "Organization"}, {"@type": "WebSite"}]))
        );
    }

    #[test]
    fn test_malformed_json_ld_script_is_skipped() {
        let html = r#"<html><head>
            <script type="application/ld+json">{"@type": "Organization",}</script>
            <script type="application/ld+json">{"@type": "WebSite"}</script>
        </head></html>"#;
        let extraction = Extractor::extract(html);

        // One script survives, so the field is that single value, not an array
        assert_eq!(extraction.fields.json_ld, Some(json!({"@type": "WebSite"})));
        assert_eq!(extraction.json_ld_failures.len(), 1);
        assert!(extraction.json_ld_failures[0].starts_with("script 1:"));
    }

    #[test]
    fn test_all_json_ld_scripts_malformed() {
        let html = r#"<html><head>
            <script type="application/ld+json">not json</script>
            <script type="application/ld+json"></script>
        </head></html>"#;
        let extraction = Extractor::extract(html);
        assert_eq!(extraction.fields.json_ld, None);
        assert_eq!(extraction.json_ld_failures.len(), 2);
    }

    #[test]
    fn test_null_json_ld_script_is_absent() {
        let html = r#"<html><head>
            <script type="application/ld+json">null</script>
        </head></html>"#;
        let extraction = Extractor::extract(html);
        assert_eq!(extraction.fields.json_ld, None);
        assert!(extraction.json_ld_failures.is_empty());

        let html = r#"<html><head>
            <script type="application/ld+json">null</script>
            <script type="application/ld+json">{"@type": "WebSite"}</script>
        </head></html>"#;
        let extraction = Extractor::extract(html);
        assert_eq!(extraction.fields.json_ld, Some(json!({"@type": "WebSite"})));
    }

    #[test]
    fn test_other_script_types_ignored() {
        let html = r#"<html><head>
            <script type="application/json">{"@type": "Ignored"}</script>
            <script>var x = {"@type": "Ignored"};</script>
        </head></html>"#;
        assert_eq!(Extractor::extract(html).fields.json_ld, None);
    }

    #[test]
    fn test_malformed_markup_degrades_gracefully() {
        let html = "<html><head><title>Broken</title><body><h1>Still here</h1><p><div></span></table>";
        let fields = Extractor::extract(html).fields;
        assert_eq!(fields.title.as_deref(), Some("Broken"));
        assert_eq!(fields.h1.as_deref(), Some("Still here"));
    }

    #[test]
    fn test_hash_is_stable_across_extractions() {
        let first = Hash::content_hash(&Extractor::extract(FULL_PAGE).fields);
        let second = Hash::content_hash(&Extractor::extract(FULL_PAGE).fields);
        assert_eq!(first, second);
    }

    /// A fake DOM proves the extractor only depends on the query capability.
    struct FakeDom(Vec<(&'static str, FakeElement)>);

    #[derive(Clone)]
    struct FakeElement {
        text: &'static str,
        attrs: Vec<(&'static str, &'static str)>,
    }

    impl DomElement for FakeElement {
        fn text_content(&self) -> String {
            self.text.to_string()
        }

        fn attribute(&self, name: &str) -> Option<&str> {
            self.attrs.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
        }
    }

    impl DomQuery for FakeDom {
        type Element<'a> = FakeElement;

        fn query_first(&self, selector: &str) -> Option<FakeElement> {
            self.query_all(selector).into_iter().next()
        }

        fn query_all(&self, selector: &str) -> Vec<FakeElement> {
            self.0
                .iter()
                .filter(|(s, _)| *s == selector)
                .map(|(_, el)| el.clone())
                .collect()
        }
    }

    #[test]
    fn test_extract_from_custom_dom() {
        let dom = FakeDom(vec![
            (
                "h1",
                FakeElement {
                    text: " Fake heading ",
                    attrs: vec![],
                },
            ),
            (
                "link[rel=\"canonical\"]",
                FakeElement {
                    text: "",
                    attrs: vec![("href", "https://fake.test/")],
                },
            ),
        ]);
        let fields = Extractor::extract_from(&dom).fields;
        assert_eq!(fields.h1.as_deref(), Some("Fake heading"));
        assert_eq!(fields.canonical.as_deref(), Some("https://fake.test/"));
        assert_eq!(fields.title, None);
    }
}
