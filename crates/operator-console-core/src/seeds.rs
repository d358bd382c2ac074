//! Canonical sample-credential seeding.

use serde::Deserialize;
use serde_json::{Map, Value};

pub const SEED_FAILED: &str = "Unable to seed credentials.";

/// One canonical credential the backend can provision.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedDefinition {
    #[serde(alias = "id")]
    pub credential_id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedCatalog {
    definitions: Vec<SeedDefinition>,
}

impl SeedCatalog {
    /// Parses the embedded definitions. Malformed JSON logs a warning and
    /// yields an empty catalog.
    pub fn from_attribute(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Self::default();
        };
        match serde_json::from_str::<Vec<SeedDefinition>>(raw) {
            Ok(definitions) => Self { definitions },
            Err(error) => {
                tracing::warn!(%error, "ignoring malformed seed definitions");
                Self::default()
            }
        }
    }

    pub fn definitions(&self) -> &[SeedDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Request body for the seed endpoint.
    pub fn request_body(&self) -> Value {
        let ids: Vec<Value> = self
            .definitions
            .iter()
            .map(|definition| Value::String(definition.credential_id.clone()))
            .collect();
        if ids.is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::json!({ "credentialIds": ids })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedOutcome {
    pub added: usize,
    pub canonical: usize,
}

impl SeedOutcome {
    pub fn from_response(body: &Value, catalog: &SeedCatalog) -> Self {
        let added = body
            .get("addedCredentialIds")
            .and_then(Value::as_array)
            .map(Vec::len)
            .or_else(|| {
                body.get("addedCount")
                    .and_then(Value::as_u64)
                    .map(|count| count as usize)
            })
            .unwrap_or(0);
        let canonical = body
            .get("canonicalCount")
            .and_then(Value::as_u64)
            .map_or(catalog.len(), |count| count as usize);
        Self { added, canonical }
    }

    pub fn status_message(&self) -> String {
        if self.added == 0 {
            return "Canonical credentials already present.".to_string();
        }
        let plural = if self.added == 1 { "" } else { "s" };
        format!(
            "Seeded {} credential{plural} (canonical set: {}).",
            self.added, self.canonical
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn malformed_seed_json_yields_empty_catalog() {
        assert!(SeedCatalog::from_attribute(Some("[{\"credentialId\":")).is_empty());
        assert!(SeedCatalog::from_attribute(Some("{}")).is_empty());
        assert!(SeedCatalog::from_attribute(None).is_empty());
    }

    #[test]
    fn definitions_accept_either_id_key() {
        let catalog = SeedCatalog::from_attribute(Some(
            r#"[{"credentialId": "emv-cap-identify", "label": "Identify"}, {"id": "emv-cap-sign", "mode": "SIGN"}]"#,
        ));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.definitions()[1].credential_id, "emv-cap-sign");
        assert_eq!(catalog.definitions()[1].extra.get("mode"), Some(&json!("SIGN")));
        assert_eq!(
            catalog.request_body(),
            json!({"credentialIds": ["emv-cap-identify", "emv-cap-sign"]})
        );
    }

    #[test]
    fn outcome_prefers_added_ids_and_pluralizes() {
        let catalog = SeedCatalog::default();
        let outcome = SeedOutcome::from_response(
            &json!({"addedCredentialIds": ["a", "b"], "addedCount": 9, "canonicalCount": 3}),
            &catalog,
        );
        assert_eq!(outcome, SeedOutcome { added: 2, canonical: 3 });
        assert_eq!(outcome.status_message(), "Seeded 2 credentials (canonical set: 3).");

        let single = SeedOutcome { added: 1, canonical: 1 };
        assert_eq!(single.status_message(), "Seeded 1 credential (canonical set: 1).");

        let none = SeedOutcome::from_response(&json!({"addedCount": 0}), &catalog);
        assert_eq!(none.status_message(), "Canonical credentials already present.");
    }
}
