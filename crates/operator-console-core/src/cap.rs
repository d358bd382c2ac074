//! EMV/CAP customer-input gating.
//!
//! Each CAP mode accepts a different subset of customer inputs. Inputs a mode
//! does not accept are disabled in the form and dropped from inline payloads.

use crate::fields::FieldSnapshot;

pub const CHALLENGE_FIELD: &str = "customerInputs.challenge";
pub const REFERENCE_FIELD: &str = "customerInputs.reference";
pub const AMOUNT_FIELD: &str = "customerInputs.amount";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapMode {
    Identify,
    Respond,
    Sign,
}

impl CapMode {
    /// Unknown values fall back to IDENTIFY.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "RESPOND" => Self::Respond,
            "SIGN" => Self::Sign,
            _ => Self::Identify,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identify => "IDENTIFY",
            Self::Respond => "RESPOND",
            Self::Sign => "SIGN",
        }
    }

    pub fn accepts(self, field: &str) -> bool {
        match self {
            Self::Identify => false,
            Self::Respond => field == CHALLENGE_FIELD,
            Self::Sign => field == REFERENCE_FIELD || field == AMOUNT_FIELD,
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            Self::Identify => "Identify mode does not use customer inputs.",
            Self::Respond => "Respond mode uses the challenge only.",
            Self::Sign => "Sign mode uses the reference and amount.",
        }
    }
}

/// Enabled flags for the three customer inputs under one CAP mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerInputGate {
    pub mode: CapMode,
    pub challenge: bool,
    pub reference: bool,
    pub amount: bool,
}

impl CustomerInputGate {
    pub fn for_mode(mode: CapMode) -> Self {
        Self {
            mode,
            challenge: mode.accepts(CHALLENGE_FIELD),
            reference: mode.accepts(REFERENCE_FIELD),
            amount: mode.accepts(AMOUNT_FIELD),
        }
    }

    pub fn fields(&self) -> [(&'static str, bool); 3] {
        [
            (CHALLENGE_FIELD, self.challenge),
            (REFERENCE_FIELD, self.reference),
            (AMOUNT_FIELD, self.amount),
        ]
    }
}

/// Inline payload gate for the EMV descriptor.
pub fn gate_customer_inputs(snapshot: &mut FieldSnapshot) {
    let mode = CapMode::parse(snapshot.get("mode").unwrap_or_default());
    for (field, enabled) in CustomerInputGate::for_mode(mode).fields() {
        if !enabled {
            snapshot.clear(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::protocol::EMV;

    fn snapshot(mode: &str) -> FieldSnapshot {
        let mut form = BTreeMap::new();
        form.insert("mode".to_string(), mode.to_string());
        form.insert(CHALLENGE_FIELD.to_string(), "1234".to_string());
        form.insert(REFERENCE_FIELD.to_string(), "5678".to_string());
        form.insert(AMOUNT_FIELD.to_string(), "100".to_string());
        FieldSnapshot::capture(EMV.fields, &form)
    }

    #[test]
    fn respond_keeps_only_the_challenge() {
        let mut values = snapshot("respond");
        gate_customer_inputs(&mut values);
        assert_eq!(values.get(CHALLENGE_FIELD), Some("1234"));
        assert_eq!(values.get(REFERENCE_FIELD), Some(""));
        assert_eq!(values.get(AMOUNT_FIELD), Some(""));
    }

    #[test]
    fn sign_keeps_reference_and_amount() {
        let mut values = snapshot("SIGN");
        gate_customer_inputs(&mut values);
        assert_eq!(values.get(CHALLENGE_FIELD), Some(""));
        assert_eq!(values.get(REFERENCE_FIELD), Some("5678"));
        assert_eq!(values.get(AMOUNT_FIELD), Some("100"));
    }

    #[test]
    fn unknown_mode_behaves_like_identify() {
        assert_eq!(CapMode::parse("otp"), CapMode::Identify);
        let gate = CustomerInputGate::for_mode(CapMode::parse(""));
        assert!(gate.fields().iter().all(|(_, enabled)| !enabled));
    }
}
