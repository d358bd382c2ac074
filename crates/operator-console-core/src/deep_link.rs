//! URL query and `history.state` mirroring of a panel's tab and mode.
//!
//! The synchronizer never touches the browser itself. It reads a
//! [`LocationSnapshot`] and answers with an optional [`HistoryWrite`] that the
//! effect dispatcher performs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::{CredentialMode, PanelTab, Protocol, ProtocolDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeepLinkState {
    pub protocol: Protocol,
    pub tab: PanelTab,
    pub mode: CredentialMode,
}

/// Tag stored in `history.state` for every entry a panel writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntryState {
    pub protocol: String,
    pub tab: String,
    pub mode: String,
}

impl From<&DeepLinkState> for HistoryEntryState {
    fn from(state: &DeepLinkState) -> Self {
        Self {
            protocol: state.protocol.query_value().to_string(),
            tab: state.tab.as_str().to_string(),
            mode: state.mode.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationSnapshot {
    pub pathname: String,
    /// Raw `location.search`, including the leading `?` when non-empty.
    pub search: String,
    pub history_state: Option<Value>,
}

/// Read side of the browser location. Re-read on every use so handoffs see
/// the URL as it is now.
pub trait LocationSource {
    fn snapshot(&self) -> LocationSnapshot;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryWriteKind {
    Push,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryWrite {
    pub kind: HistoryWriteKind,
    /// `pathname + canonical search`.
    pub url: String,
    pub state: HistoryEntryState,
}

/// Partially specified panel state, as read from one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestedPanelState {
    pub tab: Option<PanelTab>,
    pub evaluate_mode: Option<CredentialMode>,
    pub replay_mode: Option<CredentialMode>,
}

impl RequestedPanelState {
    pub fn is_empty(&self) -> bool {
        self.tab.is_none() && self.evaluate_mode.is_none() && self.replay_mode.is_none()
    }

    /// Field-wise precedence: values already set here win over `fallback`.
    pub fn or(self, fallback: Self) -> Self {
        Self {
            tab: self.tab.or(fallback.tab),
            evaluate_mode: self.evaluate_mode.or(fallback.evaluate_mode),
            replay_mode: self.replay_mode.or(fallback.replay_mode),
        }
    }

    pub fn mode_for(&self, tab: PanelTab) -> Option<CredentialMode> {
        match tab {
            PanelTab::Evaluate => self.evaluate_mode,
            PanelTab::Replay => self.replay_mode,
        }
    }
}

/// How a `history.state` value relates to this panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryTag {
    Own(RequestedPanelState),
    Foreign,
    Untagged,
}

pub fn parse_query(search: &str) -> Vec<(String, String)> {
    search
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).map_or(spaced.clone(), |decoded| decoded.into_owned())
}

fn query_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(candidate, _)| candidate == key)
        .map(|(_, value)| value.as_str())
}

pub struct DeepLinkSynchronizer {
    descriptor: &'static ProtocolDescriptor,
    last_synced_generation: Option<u64>,
}

impl DeepLinkSynchronizer {
    pub fn new(descriptor: &'static ProtocolDescriptor) -> Self {
        Self {
            descriptor,
            last_synced_generation: None,
        }
    }

    /// `?protocol=..&tab=..&<mode key>=..`, always in that order.
    pub fn canonical_search(&self, state: &DeepLinkState) -> String {
        let pairs = [
            ("protocol", state.protocol.query_value()),
            ("tab", state.tab.as_str()),
            (self.descriptor.mode_key(state.tab), state.mode.as_str()),
        ];
        let encoded: Vec<String> = pairs
            .iter()
            .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
            .collect();
        format!("?{}", encoded.join("&"))
    }

    /// Plans the history write for `state`, or `None` when the URL already
    /// matches or this generation was already written.
    pub fn sync(
        &mut self,
        state: &DeepLinkState,
        generation: u64,
        location: &LocationSnapshot,
        replace: bool,
    ) -> Option<HistoryWrite> {
        if self.last_synced_generation == Some(generation) {
            return None;
        }
        let search = self.canonical_search(state);
        if location.search == search {
            self.last_synced_generation = Some(generation);
            return None;
        }
        self.last_synced_generation = Some(generation);
        let kind = if replace {
            HistoryWriteKind::Replace
        } else {
            HistoryWriteKind::Push
        };
        tracing::debug!(
            protocol = state.protocol.query_value(),
            url = %search,
            ?kind,
            generation,
            "deep link updated"
        );
        Some(HistoryWrite {
            kind,
            url: format!("{}{search}", location.pathname),
            state: HistoryEntryState::from(state),
        })
    }

    /// Reads a search string. `None` when it names another protocol.
    pub fn parse_search(&self, search: &str) -> Option<RequestedPanelState> {
        let pairs = parse_query(search);
        if let Some(protocol) = query_value(&pairs, "protocol") {
            if Protocol::from_query_value(protocol) != Some(self.descriptor.protocol) {
                return None;
            }
        }
        let tab = query_value(&pairs, "tab").and_then(PanelTab::parse);
        let mode_for = |key: &str| query_value(&pairs, key).and_then(CredentialMode::parse);
        let mut requested = RequestedPanelState {
            tab,
            ..RequestedPanelState::default()
        };
        if self.descriptor.evaluate_mode_key == self.descriptor.replay_mode_key {
            let mode = mode_for(self.descriptor.evaluate_mode_key);
            match tab.unwrap_or(self.descriptor.default_tab) {
                PanelTab::Evaluate => requested.evaluate_mode = mode,
                PanelTab::Replay => requested.replay_mode = mode,
            }
        } else {
            requested.evaluate_mode = mode_for(self.descriptor.evaluate_mode_key);
            requested.replay_mode = mode_for(self.descriptor.replay_mode_key);
            let generic = mode_for("mode");
            match tab.unwrap_or(self.descriptor.default_tab) {
                PanelTab::Evaluate => {
                    requested.evaluate_mode = requested.evaluate_mode.or(generic);
                }
                PanelTab::Replay => requested.replay_mode = requested.replay_mode.or(generic),
            }
        }
        Some(requested)
    }

    pub fn classify_history_state(&self, state: Option<&Value>) -> HistoryTag {
        let Some(protocol) = state
            .and_then(|state| state.get("protocol"))
            .and_then(Value::as_str)
        else {
            return HistoryTag::Untagged;
        };
        if Protocol::from_query_value(protocol) != Some(self.descriptor.protocol) {
            return HistoryTag::Foreign;
        }
        let field = |key: &str| {
            state
                .and_then(|state| state.get(key))
                .and_then(Value::as_str)
        };
        let tab = field("tab").and_then(PanelTab::parse);
        let mode = field("mode").and_then(CredentialMode::parse);
        let mut requested = RequestedPanelState {
            tab,
            ..RequestedPanelState::default()
        };
        match tab.unwrap_or(self.descriptor.default_tab) {
            PanelTab::Evaluate => requested.evaluate_mode = mode,
            PanelTab::Replay => requested.replay_mode = mode,
        }
        HistoryTag::Own(requested)
    }

    /// Explicit override, then `location.search` when it names this panel,
    /// then a tagged `history.state`.
    pub fn read_initial(
        &self,
        override_search: Option<&str>,
        location: &LocationSnapshot,
    ) -> Option<RequestedPanelState> {
        if let Some(requested) = override_search
            .filter(|search| !search.trim_start_matches('?').is_empty())
            .and_then(|search| self.parse_search(search))
        {
            return Some(requested);
        }
        if !location.search.trim_start_matches('?').is_empty() {
            if let Some(requested) = self.parse_search(&location.search) {
                return Some(requested);
            }
        }
        match self.classify_history_state(location.history_state.as_ref()) {
            HistoryTag::Own(requested) => Some(requested),
            HistoryTag::Foreign | HistoryTag::Untagged => None,
        }
    }

    /// State to apply for a `popstate` event, or `None` when the event belongs
    /// to another panel.
    pub fn on_popstate(
        &self,
        event_state: Option<&Value>,
        location: &LocationSnapshot,
    ) -> Option<RequestedPanelState> {
        match self.classify_history_state(event_state) {
            HistoryTag::Own(requested) => Some(requested),
            HistoryTag::Foreign => None,
            HistoryTag::Untagged => {
                let pairs = parse_query(&location.search);
                let protocol = query_value(&pairs, "protocol").and_then(Protocol::from_query_value);
                if protocol != Some(self.descriptor.protocol) {
                    return None;
                }
                self.parse_search(&location.search)
            }
        }
    }

    /// State for a cross-panel handoff, read from the URL as it is now.
    /// `None` while the URL still names the previous panel.
    pub fn on_handoff(&self, location: &LocationSnapshot) -> Option<RequestedPanelState> {
        self.parse_search(&location.search)
    }
}
