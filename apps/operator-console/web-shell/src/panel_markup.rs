use operator_console_core::deep_link::parse_query;
use operator_console_core::secret_fields::SecretFieldPresentation;
use operator_console_core::{CredentialMode, PanelSession, PanelTab, Protocol, Tone};
use serde::Serialize;

/// Panel the page opened on: the `protocol` query parameter when a panel for
/// it is mounted, otherwise the first mounted panel.
pub fn active_protocol(search: &str, mounted: &[Protocol]) -> Option<Protocol> {
    let requested = parse_query(search)
        .into_iter()
        .find(|(key, _)| key == "protocol")
        .and_then(|(_, value)| Protocol::from_query_value(&value));
    requested
        .filter(|protocol| mounted.contains(protocol))
        .or_else(|| mounted.first().copied())
}

/// Attribute plan for one secret input and its mask display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretFieldMarkup {
    pub secret_mode: &'static str,
    pub concealed: bool,
    pub mask_display: Option<&'static str>,
    pub mask_text: Option<String>,
}

impl SecretFieldMarkup {
    pub fn for_presentation(presentation: &SecretFieldPresentation) -> Self {
        Self {
            secret_mode: presentation.mode.as_str(),
            concealed: presentation.input_concealed,
            mask_display: if presentation.mask_text.is_some() {
                None
            } else {
                Some("none")
            },
            mask_text: presentation.mask_text.clone(),
        }
    }

    /// `(name, Some(value))` to set, `(name, None)` to remove.
    pub fn input_attributes(&self) -> [(&'static str, Option<&'static str>); 3] {
        if self.concealed {
            [
                ("aria-hidden", Some("true")),
                ("tabindex", Some("-1")),
                ("disabled", Some("disabled")),
            ]
        } else {
            [("aria-hidden", None), ("tabindex", None), ("disabled", None)]
        }
    }

    pub fn pointer_events(&self) -> Option<&'static str> {
        self.concealed.then_some("none")
    }
}

pub fn tone_attribute(tone: Tone) -> &'static str {
    match tone {
        Tone::Info => "info",
        Tone::Success => "success",
        Tone::Error => "error",
    }
}

pub fn field_selector(name: &str) -> String {
    format!("[data-field=\"{name}\"]")
}

pub fn secret_mask_selector(name: &str) -> String {
    format!("[data-secret-mask=\"{name}\"]")
}

pub fn tab_selector(attribute: &str, tab: PanelTab) -> String {
    format!("[{attribute}=\"{}\"]", tab.as_str())
}

pub fn mode_section_selector(tab: PanelTab, mode: CredentialMode) -> String {
    format!(
        "[data-tab-panel=\"{}\"] [data-mode-section=\"{}\"]",
        tab.as_str(),
        mode.as_str()
    )
}

/// Snapshot exported to page scripts and browser tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelDiagnostics {
    pub protocol: &'static str,
    pub tab: &'static str,
    pub mode: &'static str,
    pub replay_mode: &'static str,
    pub generation: u64,
    pub selected_credential: Option<String>,
}

impl PanelDiagnostics {
    pub fn capture(session: &PanelSession) -> Self {
        Self {
            protocol: session.protocol().query_value(),
            tab: session.tab().as_str(),
            mode: session.mode_for(PanelTab::Evaluate).as_str(),
            replay_mode: session.mode_for(PanelTab::Replay).as_str(),
            generation: session.generation(),
            selected_credential: session.selected_credential(),
        }
    }
}
