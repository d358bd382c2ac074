//! Per-panel boot configuration embedded by the server.

use serde::Deserialize;
use thiserror::Error;

use crate::deep_link::RequestedPanelState;
use crate::protocol::{CredentialMode, PanelTab};
use crate::submission::SubmissionChannel;

pub const CREDENTIAL_ID_PLACEHOLDER: &str = "{id}";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("console_config_malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Server-rendered initial tab/mode. Raw strings; garbage reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialStateAttribute {
    #[serde(default)]
    pub tab: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub replay_mode: Option<String>,
}

impl InitialStateAttribute {
    /// Standalone `data-initial-state` attribute; malformed JSON reads as absent.
    pub fn from_attribute(raw: Option<&str>) -> Option<Self> {
        let raw = raw.map(str::trim).filter(|raw| !raw.is_empty())?;
        match serde_json::from_str(raw) {
            Ok(attribute) => Some(attribute),
            Err(error) => {
                tracing::warn!(%error, "ignoring malformed initial state attribute");
                None
            }
        }
    }

    pub fn requested(&self) -> RequestedPanelState {
        RequestedPanelState {
            tab: self.tab.as_deref().and_then(PanelTab::parse),
            evaluate_mode: self.mode.as_deref().and_then(CredentialMode::parse),
            replay_mode: self.replay_mode.as_deref().and_then(CredentialMode::parse),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelBootConfig {
    #[serde(default)]
    pub credentials_endpoint: Option<String>,
    /// Hydration endpoint template containing `{id}`.
    #[serde(default)]
    pub credential_endpoint: Option<String>,
    #[serde(default)]
    pub evaluate_endpoint: Option<String>,
    #[serde(default)]
    pub evaluate_inline_endpoint: Option<String>,
    #[serde(default)]
    pub replay_endpoint: Option<String>,
    #[serde(default)]
    pub replay_inline_endpoint: Option<String>,
    #[serde(default)]
    pub seed_endpoint: Option<String>,
    #[serde(default)]
    pub initial_state: Option<InitialStateAttribute>,
}

impl PanelBootConfig {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Absent or malformed attributes yield the empty config.
    pub fn from_attribute(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Self::default();
        };
        match Self::parse(raw) {
            Ok(config) => config.normalized(),
            Err(error) => {
                tracing::warn!(%error, "ignoring malformed console config");
                Self::default()
            }
        }
    }

    fn normalized(self) -> Self {
        let clean = |value: Option<String>| {
            value
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            credentials_endpoint: clean(self.credentials_endpoint),
            credential_endpoint: clean(self.credential_endpoint),
            evaluate_endpoint: clean(self.evaluate_endpoint),
            evaluate_inline_endpoint: clean(self.evaluate_inline_endpoint),
            replay_endpoint: clean(self.replay_endpoint),
            replay_inline_endpoint: clean(self.replay_inline_endpoint),
            seed_endpoint: clean(self.seed_endpoint),
            initial_state: self.initial_state,
        }
    }

    /// An `initialState` embedded in the config wins over the standalone
    /// attribute.
    #[must_use]
    pub fn with_initial_state(mut self, attribute: Option<InitialStateAttribute>) -> Self {
        if self.initial_state.is_none() {
            self.initial_state = attribute;
        }
        self
    }

    /// Inline endpoints fall back to the shared tab endpoint.
    pub fn submit_endpoint(&self, tab: PanelTab, channel: SubmissionChannel) -> Option<&str> {
        let (stored, inline) = match tab {
            PanelTab::Evaluate => (&self.evaluate_endpoint, &self.evaluate_inline_endpoint),
            PanelTab::Replay => (&self.replay_endpoint, &self.replay_inline_endpoint),
        };
        match channel {
            SubmissionChannel::Stored => stored.as_deref(),
            SubmissionChannel::Inline => inline.as_deref().or(stored.as_deref()),
        }
    }

    pub fn hydration_url(&self, credential_id: &str) -> Option<String> {
        let template = self.credential_endpoint.as_deref()?;
        let encoded = urlencoding::encode(credential_id);
        if template.contains(CREDENTIAL_ID_PLACEHOLDER) {
            Some(template.replace(CREDENTIAL_ID_PLACEHOLDER, &encoded))
        } else {
            Some(format!("{}/{encoded}", template.trim_end_matches('/')))
        }
    }

    pub fn server_initial_state(&self) -> RequestedPanelState {
        self.initial_state
            .as_ref()
            .map(InitialStateAttribute::requested)
            .unwrap_or_default()
    }
}
