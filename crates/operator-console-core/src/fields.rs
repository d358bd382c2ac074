//! Field schema and normalized field snapshots.
//!
//! Every protocol panel declares its form fields once as a static
//! [`FieldSpec`] table. The table drives snapshot capture, override diffing,
//! secret masking and inline payload encoding, so a field's kind and
//! comparison policy only ever live in one place.

use std::collections::BTreeMap;

use serde::Serialize;

/// Normalization applied to a raw field value before it is compared or sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Hex material: trimmed, uppercased.
    Hex,
    /// Enumerated text (algorithm, CAP mode, profile): trimmed, uppercased.
    Text,
    /// Integer parameters: canonical decimal string, empty when unparseable.
    Numeric,
    /// Identifiers, URLs and JSON blobs: trimmed, case preserved.
    FreeText,
}

/// Whether a field participates in the stored-credential override diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonPolicy {
    /// Part of the credential's identity; edits count as overrides.
    Identity,
    /// Sent with the request but never compared (preview windows, OTPs,
    /// drift bounds, timestamp overrides).
    SubmissionOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub sensitive: bool,
    pub comparison: ComparisonPolicy,
}

impl FieldSpec {
    pub const fn identity(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            sensitive: false,
            comparison: ComparisonPolicy::Identity,
        }
    }

    pub const fn secret(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            sensitive: true,
            comparison: ComparisonPolicy::Identity,
        }
    }

    pub const fn submission_only(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            sensitive: false,
            comparison: ComparisonPolicy::SubmissionOnly,
        }
    }

    pub fn is_compared(&self) -> bool {
        self.comparison == ComparisonPolicy::Identity
    }

    /// Nested payload group for dotted names (`customerInputs.challenge`).
    pub fn group(&self) -> Option<&'static str> {
        self.name.split_once('.').map(|(group, _)| group)
    }

    /// Field name inside its group, or the whole name for top-level fields.
    pub fn leaf(&self) -> &'static str {
        self.name
            .split_once('.')
            .map_or(self.name, |(_, leaf)| leaf)
    }

    pub fn normalize(&self, raw: Option<&str>) -> String {
        normalize_field_value(self.kind, raw)
    }
}

pub fn normalize_field_value(kind: FieldKind, raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };
    let trimmed = raw.trim();
    match kind {
        FieldKind::Hex | FieldKind::Text => trimmed.to_ascii_uppercase(),
        FieldKind::Numeric => trimmed
            .parse::<i64>()
            .map(|value| value.to_string())
            .unwrap_or_default(),
        FieldKind::FreeText => trimmed.to_string(),
    }
}

/// Read side of a panel form. The browser shell reads DOM inputs; tests use
/// an in-memory map.
pub trait FieldSource {
    fn read_field(&self, name: &str) -> Option<String>;

    /// Anti-forgery token from the form's hidden `_csrf` input, if present.
    fn csrf_token(&self) -> Option<String> {
        None
    }
}

impl FieldSource for BTreeMap<String, String> {
    fn read_field(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }

    fn csrf_token(&self) -> Option<String> {
        self.get("_csrf")
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    }
}

/// Ordered `fieldName -> normalizedValue` mapping over one protocol schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldSnapshot {
    entries: Vec<(String, String)>,
}

impl FieldSnapshot {
    pub fn capture(fields: &[FieldSpec], source: &dyn FieldSource) -> Self {
        let entries = fields
            .iter()
            .map(|field| {
                let raw = source.read_field(field.name);
                (field.name.to_string(), field.normalize(raw.as_deref()))
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Blanks a value in place; unknown names are ignored.
    pub fn clear(&mut self, name: &str) {
        if let Some((_, value)) = self.entries.iter_mut().find(|(key, _)| key == name) {
            value.clear();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_stable_per_kind() {
        assert_eq!(normalize_field_value(FieldKind::Hex, Some(" aabb ")), "AABB");
        assert_eq!(normalize_field_value(FieldKind::Text, Some("sign")), "SIGN");
        assert_eq!(normalize_field_value(FieldKind::Numeric, Some(" 007 ")), "7");
        assert_eq!(normalize_field_value(FieldKind::Numeric, Some("seven")), "");
        assert_eq!(
            normalize_field_value(FieldKind::FreeText, Some(" https://Example.org ")),
            "https://Example.org"
        );
        assert_eq!(normalize_field_value(FieldKind::Hex, None), "");
    }

    #[test]
    fn dotted_names_split_into_group_and_leaf() {
        let grouped = FieldSpec::identity("customerInputs.challenge", FieldKind::Text);
        assert_eq!(grouped.group(), Some("customerInputs"));
        assert_eq!(grouped.leaf(), "challenge");

        let flat = FieldSpec::secret("masterKey", FieldKind::Hex);
        assert_eq!(flat.group(), None);
        assert_eq!(flat.leaf(), "masterKey");
    }

    #[test]
    fn capture_preserves_schema_order_and_fills_absent_fields() {
        let fields = [
            FieldSpec::secret("masterKey", FieldKind::Hex),
            FieldSpec::identity("atc", FieldKind::Hex),
            FieldSpec::submission_only("previewWindow.backward", FieldKind::Numeric),
        ];
        let mut form = BTreeMap::new();
        form.insert("atc".to_string(), "0a".to_string());
        form.insert("masterKey".to_string(), "aabb".to_string());

        let snapshot = FieldSnapshot::capture(&fields, &form);
        let names: Vec<&str> = snapshot.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["masterKey", "atc", "previewWindow.backward"]);
        assert_eq!(snapshot.get("atc"), Some("0A"));
        assert_eq!(snapshot.get("previewWindow.backward"), Some(""));
    }

    #[test]
    fn csrf_token_is_absent_when_blank() {
        let mut form = BTreeMap::new();
        assert_eq!(form.csrf_token(), None);
        form.insert("_csrf".to_string(), "   ".to_string());
        assert_eq!(form.csrf_token(), None);
        form.insert("_csrf".to_string(), "token-1".to_string());
        assert_eq!(form.csrf_token().as_deref(), Some("token-1"));
    }
}
