//! Side-effect intents produced by panel transitions.
//!
//! Transitions never touch the DOM, the History API or the trace widget
//! directly. They return [`PanelEffect`]s and an [`EffectSink`] performs them.

use serde::Serialize;

use crate::cap::CustomerInputGate;
use crate::deep_link::HistoryWrite;
use crate::protocol::{CredentialMode, PanelTab};
use crate::secret_fields::SecretFieldPresentation;
use crate::trace::TraceCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitAffordance {
    pub tab: PanelTab,
    pub label: &'static str,
    pub disabled: bool,
}

/// Result card content for one tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultMessage {
    pub tab: PanelTab,
    /// Badge text such as `Success`, `Invalid` or `Error`.
    pub status: String,
    pub message: Option<String>,
    pub tone: Tone,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelEffect {
    /// Mark the tab button active (`aria-selected`) and show its panel.
    ActivateTab(PanelTab),
    /// Show the stored or inline sub-section of `tab`.
    ShowModeSection {
        tab: PanelTab,
        mode: CredentialMode,
    },
    SecretField(SecretFieldPresentation),
    SubmitAffordance(SubmitAffordance),
    SubmitBusy {
        tab: PanelTab,
        busy: bool,
    },
    Trace(TraceCommand),
    History(HistoryWrite),
    ResultReset(PanelTab),
    Result(ResultMessage),
    DirectoryStatus(String),
    CredentialOptions {
        options: Vec<(String, String)>,
        selected: Option<String>,
    },
    /// Pre-fill form fields with hydrated credential defaults.
    FieldValues(Vec<(String, String)>),
    CustomerInputs(CustomerInputGate),
    SeedStatus(String),
}

pub trait EffectSink {
    fn apply(&mut self, effect: PanelEffect);

    fn dispatch(&mut self, effects: Vec<PanelEffect>) {
        for effect in effects {
            self.apply(effect);
        }
    }
}

impl EffectSink for Vec<PanelEffect> {
    fn apply(&mut self, effect: PanelEffect) {
        self.push(effect);
    }
}
