//! Verbose trace requests, normalization and plain-text rendering.

use std::fmt::Write as _;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// External verbosity checkbox.
pub trait VerbosityToggle {
    fn is_enabled(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceVariant {
    Info,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub notes: Map<String, Value>,
}

/// Canonical `{operation, metadata, steps}` trace handed to the display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceDocument {
    #[serde(default)]
    pub operation: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub steps: Vec<TraceStep>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TraceCommand {
    Clear,
    Render {
        trace: TraceDocument,
        variant: TraceVariant,
    },
}

pub struct TraceRequestCoordinator {
    toggle: Option<Rc<dyn VerbosityToggle>>,
    fallback_operation: &'static str,
}

impl TraceRequestCoordinator {
    pub fn new(toggle: Option<Rc<dyn VerbosityToggle>>, fallback_operation: &'static str) -> Self {
        Self {
            toggle,
            fallback_operation,
        }
    }

    /// Fails open: without a toggle, traces are requested.
    pub fn is_trace_requested(&self) -> bool {
        self.toggle
            .as_ref()
            .is_none_or(|toggle| toggle.is_enabled())
    }

    pub fn begin_request(&self) -> TraceCommand {
        TraceCommand::Clear
    }

    pub fn handle_response(&self, body: Option<&Value>) -> TraceCommand {
        self.render(body, TraceVariant::Info)
    }

    pub fn handle_error(&self, body: Option<&Value>) -> TraceCommand {
        self.render(body, TraceVariant::Error)
    }

    fn render(&self, body: Option<&Value>, variant: TraceVariant) -> TraceCommand {
        if !self.is_trace_requested() {
            return TraceCommand::Clear;
        }
        match body.and_then(|body| normalize_trace(body, self.fallback_operation)) {
            Some(trace) => TraceCommand::Render { trace, variant },
            None => TraceCommand::Clear,
        }
    }
}

/// Normalizes the `trace` member of a response body. Structured traces are
/// taken as-is; flat legacy traces are rebuilt into steps.
pub fn normalize_trace(body: &Value, fallback_operation: &str) -> Option<TraceDocument> {
    let trace = body.get("trace")?.as_object()?;
    if trace.contains_key("steps") || trace.contains_key("operation") {
        let mut document: TraceDocument =
            serde_json::from_value(Value::Object(trace.clone())).ok()?;
        if document.operation.trim().is_empty() {
            document.operation = fallback_operation.to_string();
        }
        return Some(document);
    }
    Some(normalize_legacy(body, trace, fallback_operation))
}

fn normalize_legacy(body: &Value, trace: &Map<String, Value>, operation: &str) -> TraceDocument {
    let telemetry_fields = body
        .pointer("/telemetry/fields")
        .and_then(Value::as_object);
    let mut metadata = Map::new();
    if let Some(length) = body.get("maskLength").filter(|value| value.is_number()) {
        metadata.insert("maskLength".to_string(), length.clone());
    }
    if let Some(fields) = telemetry_fields {
        for key in ["maskedDigitsCount", "branchFactor", "height"] {
            if let Some(value) = fields.get(key).filter(|value| value.is_number()) {
                metadata.insert(key.to_string(), value.clone());
            }
        }
        if let Some(atc) = fields
            .get("atc")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|atc| !atc.is_empty())
        {
            metadata.insert("atc".to_string(), Value::String(atc.to_string()));
        }
    }

    let present = |key: &str| {
        trace
            .get(key)
            .filter(|value| !value.is_null() && value.as_str() != Some(""))
            .cloned()
    };
    let mut steps = Vec::new();
    let mut push_step = |id: &str, summary: &str, attributes: Map<String, Value>| {
        if !attributes.is_empty() {
            steps.push(TraceStep {
                id: Some(id.to_string()),
                summary: Some(summary.to_string()),
                attributes,
                ..TraceStep::default()
            });
        }
    };

    push_step(
        "session_key",
        "Derived session key",
        collect_attributes([("sessionKey", present("sessionKey"))]),
    );

    let generate_input = trace.get("generateAcInput").and_then(Value::as_object);
    let input_value = |key: &str| {
        generate_input
            .and_then(|input| input.get(key))
            .filter(|value| !value.is_null() && value.as_str() != Some(""))
            .cloned()
    };
    let icc = match present("iccPayloadResolved") {
        Some(resolved) => ("iccResolved", Some(resolved)),
        None => ("icc", input_value("icc")),
    };
    push_step(
        "generate_ac.input",
        "Generate AC inputs",
        collect_attributes([
            ("terminal", input_value("terminal")),
            ("iccTemplate", present("iccPayloadTemplate")),
            icc,
        ]),
    );
    push_step(
        "generate_ac.result",
        "Generate AC cryptogram",
        collect_attributes([("generateAcResult", present("generateAcResult"))]),
    );
    push_step(
        "masking",
        "Masked digits derivation",
        collect_attributes([
            ("bitmask", present("bitmask")),
            ("maskedDigitsOverlay", present("maskedDigitsOverlay")),
        ]),
    );
    push_step(
        "issuer_application_data",
        "Issuer application data",
        collect_attributes([("issuerApplicationData", present("issuerApplicationData"))]),
    );

    TraceDocument {
        operation: operation.to_string(),
        metadata,
        steps,
    }
}

fn collect_attributes<const N: usize>(
    entries: [(&str, Option<Value>); N],
) -> Map<String, Value> {
    entries
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key.to_string(), value)))
        .collect()
}

/// Plain-text rendering used by the trace console and its copy button.
pub fn format_trace(trace: &TraceDocument) -> String {
    let mut out = String::new();
    let operation = if trace.operation.is_empty() {
        "unknown"
    } else {
        trace.operation.as_str()
    };
    let _ = write!(out, "operation: {operation}");

    if !trace.metadata.is_empty() {
        out.push_str("\nmetadata:");
        for (key, value) in sorted(&trace.metadata) {
            let _ = write!(out, "\n  {key}: {}", stringify_value(value));
        }
    }

    if !trace.steps.is_empty() {
        out.push_str("\nsteps:");
        for (index, step) in trace.steps.iter().enumerate() {
            let ordinal = index + 1;
            let id = step
                .id
                .clone()
                .unwrap_or_else(|| format!("step_{ordinal}"));
            let _ = write!(out, "\n{ordinal}. {id}");
            let label = step
                .detail
                .as_deref()
                .filter(|detail| !detail.is_empty())
                .or_else(|| step.summary.as_deref().filter(|summary| !summary.is_empty()));
            if let Some(label) = label {
                let _ = write!(out, " — {label}");
            }
            for (key, value) in sorted(&step.attributes) {
                let _ = write!(out, "\n    {key}: {}", stringify_value(value));
            }
            if !step.notes.is_empty() {
                out.push_str("\n    notes:");
                for (key, value) in sorted(&step.notes) {
                    let _ = write!(out, "\n      {key}: {}", stringify_value(value));
                }
            }
        }
    }
    out
}

fn sorted(map: &Map<String, Value>) -> Vec<(&String, &Value)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|left, right| left.0.cmp(right.0));
    entries
}

fn stringify_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(stringify_value).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(object) => {
            let parts: Vec<String> = sorted(object)
                .into_iter()
                .map(|(key, value)| format!("{key}={}", stringify_value(value)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}
