//! Protocol identities and the compiled-in panel catalog.

use serde::{Deserialize, Serialize};

use crate::cap;
use crate::fields::{FieldKind, FieldSnapshot, FieldSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Emv,
    Fido2,
    Hotp,
    Totp,
    Ocra,
    Eudiw,
}

impl Protocol {
    pub const ALL: [Self; 6] = [
        Self::Emv,
        Self::Fido2,
        Self::Hotp,
        Self::Totp,
        Self::Ocra,
        Self::Eudiw,
    ];

    /// Value written to the `protocol` query parameter.
    pub fn query_value(self) -> &'static str {
        match self {
            Self::Emv => "emv",
            Self::Fido2 => "fido2",
            Self::Hotp => "hotp",
            Self::Totp => "totp",
            Self::Ocra => "ocra",
            Self::Eudiw => "eudi-openid4vp",
        }
    }

    /// Accepts canonical values plus historical aliases, case-insensitively.
    pub fn from_query_value(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "emv" | "emv-cap" | "cap" => Some(Self::Emv),
            "fido2" | "webauthn" => Some(Self::Fido2),
            "hotp" => Some(Self::Hotp),
            "totp" => Some(Self::Totp),
            "ocra" => Some(Self::Ocra),
            "eudi-openid4vp" | "eudiw" | "eudi" => Some(Self::Eudiw),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Emv => "EMV/CAP",
            Self::Fido2 => "FIDO2",
            Self::Hotp => "HOTP",
            Self::Totp => "TOTP",
            Self::Ocra => "OCRA",
            Self::Eudiw => "EUDIW",
        }
    }

    pub fn descriptor(self) -> &'static ProtocolDescriptor {
        match self {
            Self::Emv => &EMV,
            Self::Fido2 => &FIDO2,
            Self::Hotp => &HOTP,
            Self::Totp => &TOTP,
            Self::Ocra => &OCRA,
            Self::Eudiw => &EUDIW,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelTab {
    Evaluate,
    Replay,
}

impl PanelTab {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Evaluate => "evaluate",
            Self::Replay => "replay",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "evaluate" => Some(Self::Evaluate),
            "replay" => Some(Self::Replay),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Evaluate => 0,
            Self::Replay => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialMode {
    Stored,
    Inline,
}

impl CredentialMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::Inline => "inline",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stored" => Some(Self::Stored),
            "inline" => Some(Self::Inline),
            _ => None,
        }
    }
}

/// Static description of one protocol panel: URL keys, defaults and the
/// field schema every collaborator works from.
#[derive(Debug)]
pub struct ProtocolDescriptor {
    pub protocol: Protocol,
    pub evaluate_mode_key: &'static str,
    pub replay_mode_key: &'static str,
    pub default_tab: PanelTab,
    pub default_evaluate_mode: CredentialMode,
    pub default_replay_mode: CredentialMode,
    pub fields: &'static [FieldSpec],
    /// Operation name used when a legacy trace carries none.
    pub trace_operation: &'static str,
    /// Protocol-specific pruning of the inline payload before encoding.
    pub inline_payload_gate: Option<fn(&mut FieldSnapshot)>,
}

impl ProtocolDescriptor {
    pub fn mode_key(&self, tab: PanelTab) -> &'static str {
        match tab {
            PanelTab::Evaluate => self.evaluate_mode_key,
            PanelTab::Replay => self.replay_mode_key,
        }
    }

    pub fn default_mode(&self, tab: PanelTab) -> CredentialMode {
        match tab {
            PanelTab::Evaluate => self.default_evaluate_mode,
            PanelTab::Replay => self.default_replay_mode,
        }
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn sensitive_fields(&self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields.iter().filter(|field| field.sensitive)
    }
}

const EMV_FIELDS: &[FieldSpec] = &[
    FieldSpec::identity("mode", FieldKind::Text),
    FieldSpec::secret("masterKey", FieldKind::Hex),
    FieldSpec::identity("atc", FieldKind::Hex),
    FieldSpec::identity("branchFactor", FieldKind::Numeric),
    FieldSpec::identity("height", FieldKind::Numeric),
    FieldSpec::identity("iv", FieldKind::Hex),
    FieldSpec::secret("cdol1", FieldKind::Hex),
    FieldSpec::secret("issuerProprietaryBitmap", FieldKind::Hex),
    FieldSpec::secret("iccDataTemplate", FieldKind::Hex),
    FieldSpec::secret("issuerApplicationData", FieldKind::Hex),
    FieldSpec::identity("customerInputs.challenge", FieldKind::Text),
    FieldSpec::identity("customerInputs.reference", FieldKind::Text),
    FieldSpec::identity("customerInputs.amount", FieldKind::Text),
    FieldSpec::identity("transactionData.terminal", FieldKind::Hex),
    FieldSpec::identity("transactionData.icc", FieldKind::Hex),
    FieldSpec::submission_only("otp", FieldKind::FreeText),
    FieldSpec::submission_only("previewWindow.backward", FieldKind::Numeric),
    FieldSpec::submission_only("previewWindow.forward", FieldKind::Numeric),
];

const HOTP_FIELDS: &[FieldSpec] = &[
    FieldSpec::identity("identifier", FieldKind::FreeText),
    FieldSpec::secret("sharedSecretHex", FieldKind::Hex),
    FieldSpec::identity("algorithm", FieldKind::Text),
    FieldSpec::identity("digits", FieldKind::Numeric),
    FieldSpec::identity("counter", FieldKind::Numeric),
    FieldSpec::submission_only("otp", FieldKind::FreeText),
    FieldSpec::submission_only("previewWindow.backward", FieldKind::Numeric),
    FieldSpec::submission_only("previewWindow.forward", FieldKind::Numeric),
];

const TOTP_FIELDS: &[FieldSpec] = &[
    FieldSpec::secret("sharedSecretHex", FieldKind::Hex),
    FieldSpec::identity("algorithm", FieldKind::Text),
    FieldSpec::identity("digits", FieldKind::Numeric),
    FieldSpec::identity("stepSeconds", FieldKind::Numeric),
    FieldSpec::submission_only("otp", FieldKind::FreeText),
    FieldSpec::submission_only("timestamp", FieldKind::Numeric),
    FieldSpec::submission_only("timestampOverride", FieldKind::Numeric),
    FieldSpec::submission_only("driftBackward", FieldKind::Numeric),
    FieldSpec::submission_only("driftForward", FieldKind::Numeric),
];

const OCRA_FIELDS: &[FieldSpec] = &[
    FieldSpec::identity("suite", FieldKind::Text),
    FieldSpec::secret("sharedSecretHex", FieldKind::Hex),
    FieldSpec::identity("counter", FieldKind::Numeric),
    FieldSpec::secret("pinHashHex", FieldKind::Hex),
    FieldSpec::submission_only("challenge", FieldKind::FreeText),
    FieldSpec::submission_only("clientChallenge", FieldKind::FreeText),
    FieldSpec::submission_only("serverChallenge", FieldKind::FreeText),
    FieldSpec::submission_only("sessionHex", FieldKind::Hex),
    FieldSpec::submission_only("timestampHex", FieldKind::Hex),
    FieldSpec::submission_only("otp", FieldKind::FreeText),
];

const FIDO2_FIELDS: &[FieldSpec] = &[
    FieldSpec::identity("relyingPartyId", FieldKind::FreeText),
    FieldSpec::identity("origin", FieldKind::FreeText),
    FieldSpec::identity("algorithm", FieldKind::Text),
    FieldSpec::identity("credentialIdBase64Url", FieldKind::FreeText),
    FieldSpec::secret("privateKey", FieldKind::FreeText),
    FieldSpec::identity("signatureCounter", FieldKind::Numeric),
    FieldSpec::identity("userVerificationRequired", FieldKind::FreeText),
    FieldSpec::submission_only("challenge", FieldKind::FreeText),
];

const EUDIW_FIELDS: &[FieldSpec] = &[
    FieldSpec::identity("profile", FieldKind::Text),
    FieldSpec::identity("responseMode", FieldKind::Text),
    FieldSpec::identity("credentialId", FieldKind::FreeText),
    FieldSpec::identity("format", FieldKind::FreeText),
    FieldSpec::secret("compactSdJwt", FieldKind::FreeText),
    FieldSpec::secret("keyBindingJwt", FieldKind::FreeText),
    FieldSpec::submission_only("trustedAuthorityPolicy", FieldKind::FreeText),
    FieldSpec::submission_only("inlineDcqlJson", FieldKind::FreeText),
];

pub static EMV: ProtocolDescriptor = ProtocolDescriptor {
    protocol: Protocol::Emv,
    evaluate_mode_key: "mode",
    replay_mode_key: "mode",
    default_tab: PanelTab::Evaluate,
    default_evaluate_mode: CredentialMode::Stored,
    default_replay_mode: CredentialMode::Stored,
    fields: EMV_FIELDS,
    trace_operation: "emv.cap.evaluate",
    inline_payload_gate: Some(cap::gate_customer_inputs),
};

pub static HOTP: ProtocolDescriptor = ProtocolDescriptor {
    protocol: Protocol::Hotp,
    evaluate_mode_key: "mode",
    replay_mode_key: "mode",
    default_tab: PanelTab::Evaluate,
    default_evaluate_mode: CredentialMode::Inline,
    default_replay_mode: CredentialMode::Stored,
    fields: HOTP_FIELDS,
    trace_operation: "hotp.evaluate",
    inline_payload_gate: None,
};

pub static TOTP: ProtocolDescriptor = ProtocolDescriptor {
    protocol: Protocol::Totp,
    evaluate_mode_key: "totpMode",
    replay_mode_key: "totpReplayMode",
    default_tab: PanelTab::Evaluate,
    default_evaluate_mode: CredentialMode::Inline,
    default_replay_mode: CredentialMode::Stored,
    fields: TOTP_FIELDS,
    trace_operation: "totp.evaluate",
    inline_payload_gate: None,
};

pub static OCRA: ProtocolDescriptor = ProtocolDescriptor {
    protocol: Protocol::Ocra,
    evaluate_mode_key: "mode",
    replay_mode_key: "mode",
    default_tab: PanelTab::Evaluate,
    default_evaluate_mode: CredentialMode::Inline,
    default_replay_mode: CredentialMode::Stored,
    fields: OCRA_FIELDS,
    trace_operation: "ocra.evaluate",
    inline_payload_gate: None,
};

pub static FIDO2: ProtocolDescriptor = ProtocolDescriptor {
    protocol: Protocol::Fido2,
    evaluate_mode_key: "fido2Mode",
    replay_mode_key: "fido2Mode",
    default_tab: PanelTab::Evaluate,
    default_evaluate_mode: CredentialMode::Inline,
    default_replay_mode: CredentialMode::Inline,
    fields: FIDO2_FIELDS,
    trace_operation: "fido2.assertion.evaluate",
    inline_payload_gate: None,
};

pub static EUDIW: ProtocolDescriptor = ProtocolDescriptor {
    protocol: Protocol::Eudiw,
    evaluate_mode_key: "mode",
    replay_mode_key: "mode",
    default_tab: PanelTab::Evaluate,
    default_evaluate_mode: CredentialMode::Inline,
    default_replay_mode: CredentialMode::Inline,
    fields: EUDIW_FIELDS,
    trace_operation: "eudiw.openid4vp.evaluate",
    inline_payload_gate: None,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_values_round_trip_and_accept_aliases() {
        for protocol in Protocol::ALL {
            assert_eq!(Protocol::from_query_value(protocol.query_value()), Some(protocol));
        }
        assert_eq!(Protocol::from_query_value(" EUDIW "), Some(Protocol::Eudiw));
        assert_eq!(Protocol::from_query_value("smtp"), None);
    }

    #[test]
    fn totp_uses_distinct_mode_keys_per_tab() {
        let descriptor = Protocol::Totp.descriptor();
        assert_eq!(descriptor.mode_key(PanelTab::Evaluate), "totpMode");
        assert_eq!(descriptor.mode_key(PanelTab::Replay), "totpReplayMode");
        assert_eq!(Protocol::Hotp.descriptor().mode_key(PanelTab::Replay), "mode");
    }

    #[test]
    fn every_schema_has_unique_field_names() {
        for protocol in Protocol::ALL {
            let descriptor = protocol.descriptor();
            assert_eq!(descriptor.protocol, protocol);
            let mut names: Vec<&str> = descriptor.fields.iter().map(|field| field.name).collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), descriptor.fields.len(), "{protocol:?}");
        }
    }

    #[test]
    fn emv_counters_stay_out_of_the_secret_set() {
        let sensitive: Vec<&str> = EMV.sensitive_fields().map(|field| field.name).collect();
        assert!(sensitive.contains(&"masterKey"));
        assert!(!sensitive.contains(&"atc"));
        assert!(!sensitive.contains(&"branchFactor"));
    }

    #[test]
    fn garbage_tab_and_mode_values_are_rejected() {
        assert_eq!(PanelTab::parse("bogus"), None);
        assert_eq!(PanelTab::parse(" Replay "), Some(PanelTab::Replay));
        assert_eq!(CredentialMode::parse(""), None);
        assert_eq!(CredentialMode::parse("INLINE"), Some(CredentialMode::Inline));
    }
}
