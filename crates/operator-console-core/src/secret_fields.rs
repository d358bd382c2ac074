//! Raw-input versus masked-display presentation of sensitive fields.

use crate::directory::CredentialSummary;
use crate::protocol::{CredentialMode, ProtocolDescriptor};

pub const HIDDEN_PLACEHOLDER: &str = "Hidden";

/// How one sensitive field should be presented after a mode change.
///
/// Only presentation is described here; field values are never touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretFieldPresentation {
    pub field: &'static str,
    pub mode: CredentialMode,
    /// Raw input hidden, disabled and out of the tab order.
    pub input_concealed: bool,
    /// Mask text while concealed; `None` suppresses the mask display.
    pub mask_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SecretFieldVisibilityPolicy {
    fields: Vec<&'static str>,
}

impl SecretFieldVisibilityPolicy {
    pub fn for_descriptor(descriptor: &ProtocolDescriptor) -> Self {
        Self {
            fields: descriptor.sensitive_fields().map(|field| field.name).collect(),
        }
    }

    pub fn fields(&self) -> &[&'static str] {
        &self.fields
    }

    pub fn apply(
        &self,
        mode: CredentialMode,
        summary: Option<&CredentialSummary>,
    ) -> Vec<SecretFieldPresentation> {
        self.fields
            .iter()
            .map(|&field| match mode {
                CredentialMode::Stored => SecretFieldPresentation {
                    field,
                    mode,
                    input_concealed: true,
                    mask_text: Some(mask_text(field, summary)),
                },
                CredentialMode::Inline => SecretFieldPresentation {
                    field,
                    mode,
                    input_concealed: false,
                    mask_text: None,
                },
            })
            .collect()
    }
}

/// Digest first, then declared length, then the bare placeholder.
pub fn mask_text(field: &str, summary: Option<&CredentialSummary>) -> String {
    let Some(summary) = summary else {
        return HIDDEN_PLACEHOLDER.to_string();
    };
    if let Some(digest) = summary
        .metadata_str(&format!("{field}Sha256"))
        .filter(|digest| !digest.is_empty())
    {
        return digest.to_string();
    }
    if let Some(length) = summary.metadata_u64(&format!("{field}HexLength")) {
        return format!("{HIDDEN_PLACEHOLDER} ({length} hex chars)");
    }
    HIDDEN_PLACEHOLDER.to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::protocol::{EMV, HOTP};

    fn summary(value: serde_json::Value) -> Option<CredentialSummary> {
        serde_json::from_value(value).ok()
    }

    #[test]
    fn stored_mode_conceals_inputs_and_prefers_digest() {
        let summary = summary(json!({
            "id": "emv-1",
            "masterKeySha256": "sha256:0011",
            "cdol1HexLength": 68
        }));
        let presentations =
            SecretFieldVisibilityPolicy::for_descriptor(&EMV).apply(CredentialMode::Stored, summary.as_ref());

        let master = presentations.iter().find(|p| p.field == "masterKey");
        assert_eq!(
            master.and_then(|p| p.mask_text.as_deref()),
            Some("sha256:0011")
        );
        let cdol = presentations.iter().find(|p| p.field == "cdol1");
        assert_eq!(
            cdol.and_then(|p| p.mask_text.as_deref()),
            Some("Hidden (68 hex chars)")
        );
        let iad = presentations.iter().find(|p| p.field == "issuerApplicationData");
        assert_eq!(iad.and_then(|p| p.mask_text.as_deref()), Some("Hidden"));
        assert!(presentations.iter().all(|p| p.input_concealed));
    }

    #[test]
    fn inline_mode_reveals_inputs_and_suppresses_masks() {
        let presentations =
            SecretFieldVisibilityPolicy::for_descriptor(&HOTP).apply(CredentialMode::Inline, None);
        assert_eq!(presentations.len(), 1);
        assert_eq!(presentations[0].field, "sharedSecretHex");
        assert!(!presentations[0].input_concealed);
        assert_eq!(presentations[0].mask_text, None);
    }

    #[test]
    fn non_sensitive_parameters_are_not_registered() {
        let policy = SecretFieldVisibilityPolicy::for_descriptor(&EMV);
        assert!(!policy.fields().contains(&"atc"));
        assert!(!policy.fields().contains(&"height"));
        assert!(!policy.fields().contains(&"iv"));
    }

    #[test]
    fn stored_mode_without_summary_uses_placeholder() {
        assert_eq!(mask_text("masterKey", None), HIDDEN_PLACEHOLDER);
    }
}
