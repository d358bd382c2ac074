//! Submission channel selection, payload encoding and result interpretation.

use serde_json::{Map, Value};

use crate::baseline::OverrideGate;
use crate::effects::{ResultMessage, SubmitAffordance, Tone};
use crate::fields::{FieldKind, FieldSnapshot, FieldSpec};
use crate::protocol::{CredentialMode, PanelTab, ProtocolDescriptor};
use crate::transport::TransportError;

pub const DEFAULT_FAILURE_MESSAGE: &str = "Evaluation failed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionChannel {
    Stored,
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub channel: SubmissionChannel,
    /// Selected stored credential, kept on the inline channel for provenance.
    pub credential_id: Option<String>,
}

/// Why a submit request resolved without touching the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    MissingEndpoint,
    MissingSelection,
    InFlight,
}

pub struct SubmissionRouter;

impl SubmissionRouter {
    /// `None` means blocked: stored mode with nothing selected.
    pub fn decide(
        mode: CredentialMode,
        credential_id: Option<&str>,
        gate: &dyn OverrideGate,
    ) -> Option<RouteDecision> {
        let credential_id = credential_id
            .map(str::trim)
            .filter(|id| !id.is_empty());
        match mode {
            CredentialMode::Inline => Some(RouteDecision {
                channel: SubmissionChannel::Inline,
                credential_id: credential_id.map(str::to_string),
            }),
            CredentialMode::Stored => {
                let id = credential_id?;
                let channel = if gate.has_overrides(id) {
                    tracing::debug!(credential_id = id, "stored credential overridden, routing inline");
                    SubmissionChannel::Inline
                } else {
                    SubmissionChannel::Stored
                };
                Some(RouteDecision {
                    channel,
                    credential_id: Some(id.to_string()),
                })
            }
        }
    }

    pub fn affordance(tab: PanelTab, decision: Option<&RouteDecision>) -> SubmitAffordance {
        let channel = decision.map(|decision| decision.channel);
        let label = match (tab, channel) {
            (PanelTab::Evaluate, Some(SubmissionChannel::Inline)) => "Evaluate inline parameters",
            (PanelTab::Evaluate, _) => "Evaluate stored credential",
            (PanelTab::Replay, Some(SubmissionChannel::Inline)) => "Replay inline parameters",
            (PanelTab::Replay, _) => "Replay stored credential",
        };
        SubmitAffordance {
            tab,
            label,
            disabled: decision.is_none(),
        }
    }

    pub fn build_payload(
        descriptor: &ProtocolDescriptor,
        decision: &RouteDecision,
        mut snapshot: FieldSnapshot,
        include_trace: bool,
    ) -> Value {
        let mut payload = Map::new();
        if let Some(id) = decision.credential_id.as_deref() {
            payload.insert("credentialId".to_string(), Value::String(id.to_string()));
        }
        payload.insert("includeTrace".to_string(), Value::Bool(include_trace));
        let fields: Vec<&FieldSpec> = match decision.channel {
            SubmissionChannel::Stored => descriptor
                .fields
                .iter()
                .filter(|field| !field.is_compared())
                .collect(),
            SubmissionChannel::Inline => {
                if let Some(gate) = descriptor.inline_payload_gate {
                    gate(&mut snapshot);
                }
                descriptor.fields.iter().collect()
            }
        };
        let sparse = decision.channel == SubmissionChannel::Stored;
        encode_fields(&mut payload, &fields, &snapshot, sparse);
        Value::Object(payload)
    }
}

/// Writes fields into `payload`. Dotted names nest; a group whose members are
/// all empty is omitted. With `sparse`, empty top-level values are omitted too.
fn encode_fields(
    payload: &mut Map<String, Value>,
    fields: &[&FieldSpec],
    snapshot: &FieldSnapshot,
    sparse: bool,
) {
    let mut groups: Vec<(&'static str, Vec<&FieldSpec>)> = Vec::new();
    for &field in fields {
        match field.group() {
            Some(group) => match groups.iter_mut().find(|(name, _)| *name == group) {
                Some((_, members)) => members.push(field),
                None => groups.push((group, vec![field])),
            },
            None => {
                let raw = snapshot.get(field.name).unwrap_or_default();
                if let Some(value) = encode_value(field.kind, raw, sparse) {
                    payload.insert(field.name.to_string(), value);
                }
            }
        }
    }
    for (group, members) in groups {
        let all_empty = members
            .iter()
            .all(|member| snapshot.get(member.name).unwrap_or_default().is_empty());
        if all_empty {
            continue;
        }
        let mut nested = Map::new();
        for member in members {
            let raw = snapshot.get(member.name).unwrap_or_default();
            if let Some(value) = encode_value(member.kind, raw, sparse) {
                nested.insert(member.leaf().to_string(), value);
            }
        }
        payload.insert(group.to_string(), Value::Object(nested));
    }
}

fn encode_value(kind: FieldKind, normalized: &str, sparse: bool) -> Option<Value> {
    if kind == FieldKind::Numeric {
        return normalized.parse::<i64>().ok().map(Value::from);
    }
    if sparse && normalized.is_empty() {
        return None;
    }
    Some(Value::String(normalized.to_string()))
}

pub fn format_status(status: &str) -> String {
    let normalized = status.trim().to_lowercase();
    let mut chars = normalized.chars();
    match chars.next() {
        None => "Unknown".to_string(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

fn response_status(body: &Value) -> Option<&str> {
    body.get("status")
        .and_then(Value::as_str)
        .or_else(|| body.pointer("/telemetry/status").and_then(Value::as_str))
}

fn reason_code(body: &Value) -> Option<&str> {
    body.get("reasonCode")
        .and_then(Value::as_str)
        .or_else(|| body.pointer("/telemetry/reasonCode").and_then(Value::as_str))
        .map(str::trim)
        .filter(|code| !code.is_empty())
}

fn non_empty_str<'a>(body: &'a Value, pointer: &str) -> Option<&'a str> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

/// `message`, then `detail`, then `error`, then the generic fallback.
pub fn failure_message(body: Option<&Value>) -> String {
    body.and_then(|body| {
        non_empty_str(body, "/message")
            .or_else(|| non_empty_str(body, "/detail"))
            .or_else(|| non_empty_str(body, "/error"))
    })
    .unwrap_or(DEFAULT_FAILURE_MESSAGE)
    .to_string()
}

pub fn failure_hint(body: Option<&Value>) -> Option<String> {
    let body = body?;
    if let Some(code) = reason_code(body) {
        return Some(format!("Reason code: {code}"));
    }
    non_empty_str(body, "/details/field").map(|field| format!("Field: {field}"))
}

/// Result card for a 2xx response.
pub fn interpret_response(tab: PanelTab, body: &Value) -> ResultMessage {
    let status = response_status(body).unwrap_or("unknown");
    let normalized = status.trim().to_lowercase();
    let tone = match normalized.as_str() {
        "success" | "match" | "valid" | "validated" | "generated" => Tone::Success,
        "invalid" | "mismatch" | "error" | "failure" => Tone::Error,
        _ => Tone::Info,
    };
    let (message, hint) = if tone == Tone::Success {
        (None, None)
    } else {
        let message = non_empty_str(body, "/message")
            .or_else(|| non_empty_str(body, "/telemetry/fields/reason"))
            .map(str::to_string);
        (message, reason_code(body).map(|code| format!("Reason code: {code}")))
    };
    ResultMessage {
        tab,
        status: format_status(status),
        message,
        tone,
        hint,
    }
}

/// Result card for a failed request. 4xx is `Invalid`, anything else `Error`.
pub fn interpret_failure(tab: PanelTab, error: &TransportError) -> ResultMessage {
    let status = if error.is_client_error() {
        "Invalid"
    } else {
        "Error"
    };
    ResultMessage {
        tab,
        status: status.to_string(),
        message: Some(failure_message(error.body())),
        tone: Tone::Error,
        hint: failure_hint(error.body()),
    }
}
