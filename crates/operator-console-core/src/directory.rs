//! Stored-credential directory: sanitized summaries, memoized loading and the
//! status line shown above the credential picker.

use std::cell::RefCell;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::{PanelTab, Protocol, ProtocolDescriptor};
use crate::transport::ConsoleTransport;

pub const DIRECTORY_LOAD_FAILED: &str = "Unable to load stored credentials.";

/// Sanitized server metadata for one stored credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSummary {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Non-secret parameter defaults (counters, customer inputs, windows).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub defaults: Map<String, Value>,
    /// Masked-secret descriptors and any other descriptive keys.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl CredentialSummary {
    pub fn display_label(&self) -> &str {
        self.label
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .unwrap_or(&self.id)
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str).map(str::trim)
    }

    pub fn metadata_u64(&self, key: &str) -> Option<u64> {
        match self.metadata.get(key)? {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Removes any key that carries a raw sensitive field value.
    fn strip_secrets(mut self, descriptor: &ProtocolDescriptor) -> Self {
        for field in descriptor.sensitive_fields() {
            self.metadata.remove(field.name);
            self.defaults.remove(field.name);
        }
        self
    }
}

/// Parses a directory response, dropping entries without a usable id and
/// sorting by id case-insensitively.
pub fn parse_directory(body: &Value, descriptor: &ProtocolDescriptor) -> Vec<CredentialSummary> {
    let items = match body {
        Value::Array(items) => items.as_slice(),
        Value::Object(object) => object
            .get("credentials")
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice),
        _ => &[],
    };
    let mut summaries: Vec<CredentialSummary> = items
        .iter()
        .filter_map(|item| serde_json::from_value::<CredentialSummary>(item.clone()).ok())
        .filter(|summary| !summary.id.trim().is_empty())
        .map(|summary| summary.strip_secrets(descriptor))
        .collect();
    summaries.sort_by_key(|summary| summary.id.to_lowercase());
    summaries
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryStatus {
    Ready,
    Failed,
}

#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    pub credentials: Rc<Vec<CredentialSummary>>,
    pub status: DirectoryStatus,
}

impl DirectorySnapshot {
    /// Status line for the picker on `tab`.
    pub fn status_message(&self, protocol: Protocol, tab: PanelTab) -> String {
        if self.status == DirectoryStatus::Failed {
            return DIRECTORY_LOAD_FAILED.to_string();
        }
        if self.credentials.is_empty() {
            return format!(
                "No {} credentials found. Seed or import credentials to continue.",
                protocol.label()
            );
        }
        let verb = match tab {
            PanelTab::Evaluate => "evaluate",
            PanelTab::Replay => "replay",
        };
        format!("Select a credential to {verb}.")
    }

    /// `(value, label)` pairs for the credential `<select>`.
    pub fn options(&self) -> Vec<(String, String)> {
        self.credentials
            .iter()
            .map(|summary| (summary.id.clone(), summary.display_label().to_string()))
            .collect()
    }
}

type DirectoryLoad = Shared<LocalBoxFuture<'static, DirectorySnapshot>>;

#[derive(Default)]
struct DirectoryState {
    cache: Option<Rc<Vec<CredentialSummary>>>,
    in_flight: Option<DirectoryLoad>,
}

/// Memoized, single-flight loader for one panel's credential list.
pub struct CredentialDirectory {
    descriptor: &'static ProtocolDescriptor,
    endpoint: Option<String>,
    transport: Rc<dyn ConsoleTransport>,
    state: Rc<RefCell<DirectoryState>>,
}

impl CredentialDirectory {
    pub fn new(
        descriptor: &'static ProtocolDescriptor,
        endpoint: Option<String>,
        transport: Rc<dyn ConsoleTransport>,
    ) -> Self {
        Self {
            descriptor,
            endpoint,
            transport,
            state: Rc::new(RefCell::new(DirectoryState::default())),
        }
    }

    pub fn cached(&self) -> Option<Rc<Vec<CredentialSummary>>> {
        self.state.borrow().cache.clone()
    }

    /// Returns the cached list unless it is empty or `force_refresh` is set.
    /// Callers arriving while a load is pending share that load.
    pub async fn ensure(&self, force_refresh: bool) -> DirectorySnapshot {
        let load = {
            let mut state = self.state.borrow_mut();
            if !force_refresh {
                if let Some(cache) = state.cache.as_ref().filter(|cache| !cache.is_empty()) {
                    return DirectorySnapshot {
                        credentials: Rc::clone(cache),
                        status: DirectoryStatus::Ready,
                    };
                }
            }
            match state.in_flight.as_ref() {
                Some(load) => load.clone(),
                None => {
                    let load = self.start_load();
                    state.in_flight = Some(load.clone());
                    load
                }
            }
        };
        load.await
    }

    fn start_load(&self) -> DirectoryLoad {
        let descriptor = self.descriptor;
        let endpoint = self.endpoint.clone();
        let transport = Rc::clone(&self.transport);
        let state = Rc::clone(&self.state);
        async move {
            let snapshot = match endpoint {
                None => DirectorySnapshot {
                    credentials: Rc::new(Vec::new()),
                    status: DirectoryStatus::Ready,
                },
                Some(endpoint) => match transport.get_json(&endpoint).await {
                    Ok(body) => DirectorySnapshot {
                        credentials: Rc::new(parse_directory(&body, descriptor)),
                        status: DirectoryStatus::Ready,
                    },
                    Err(error) => {
                        tracing::warn!(
                            protocol = descriptor.protocol.query_value(),
                            %error,
                            "credential directory load failed"
                        );
                        DirectorySnapshot {
                            credentials: Rc::new(Vec::new()),
                            status: DirectoryStatus::Failed,
                        }
                    }
                },
            };
            let mut state = state.borrow_mut();
            state.in_flight = None;
            if snapshot.status == DirectoryStatus::Ready {
                state.cache = Some(Rc::clone(&snapshot.credentials));
            }
            snapshot
        }
        .boxed_local()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::protocol::{EMV, HOTP};

    #[test]
    fn entries_without_id_are_dropped_and_list_is_sorted() {
        let body = json!([
            {"id": "beta", "label": "Beta"},
            {"label": "no id"},
            {"id": 7},
            {"id": "Alpha"},
            {"id": "  "}
        ]);
        let summaries = parse_directory(&body, &HOTP);
        let ids: Vec<&str> = summaries.iter().map(|summary| summary.id.as_str()).collect();
        assert_eq!(ids, vec!["Alpha", "beta"]);
        assert_eq!(summaries[0].display_label(), "Alpha");
        assert_eq!(summaries[1].display_label(), "Beta");
    }

    #[test]
    fn raw_secret_keys_never_survive_parsing() {
        let body = json!([{
            "id": "emv-1",
            "masterKey": "0123456789ABCDEF",
            "masterKeySha256": "sha256:ff",
            "defaults": {"atc": "01", "cdol1": "9F02"}
        }]);
        let summaries = parse_directory(&body, &EMV);
        assert_eq!(summaries.len(), 1);
        assert!(!summaries[0].metadata.contains_key("masterKey"));
        assert!(summaries[0].metadata.contains_key("masterKeySha256"));
        assert!(!summaries[0].defaults.contains_key("cdol1"));
        assert_eq!(summaries[0].defaults.get("atc"), Some(&json!("01")));
    }

    #[test]
    fn status_messages_follow_directory_contents() {
        let empty = DirectorySnapshot {
            credentials: Rc::new(Vec::new()),
            status: DirectoryStatus::Ready,
        };
        assert_eq!(
            empty.status_message(Protocol::Hotp, PanelTab::Evaluate),
            "No HOTP credentials found. Seed or import credentials to continue."
        );
        let failed = DirectorySnapshot {
            credentials: Rc::new(Vec::new()),
            status: DirectoryStatus::Failed,
        };
        assert_eq!(
            failed.status_message(Protocol::Hotp, PanelTab::Replay),
            DIRECTORY_LOAD_FAILED
        );
        let populated = DirectorySnapshot {
            credentials: Rc::new(parse_directory(&json!([{"id": "a"}]), &HOTP)),
            status: DirectoryStatus::Ready,
        };
        assert_eq!(
            populated.status_message(Protocol::Hotp, PanelTab::Replay),
            "Select a credential to replay."
        );
        assert_eq!(populated.options(), vec![("a".to_string(), "a".to_string())]);
    }

    #[test]
    fn object_wrapped_directory_is_accepted() {
        let body = json!({"credentials": [{"id": "wrapped"}]});
        assert_eq!(parse_directory(&body, &HOTP).len(), 1);
        assert!(parse_directory(&json!("nope"), &HOTP).is_empty());
    }
}
