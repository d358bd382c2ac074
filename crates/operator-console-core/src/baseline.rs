//! Stored-credential baseline and override detection.

use crate::fields::{FieldSnapshot, FieldSpec};

/// Injected capture of the panel's current field values.
pub type SnapshotCapture = Box<dyn Fn() -> FieldSnapshot>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideBaseline {
    pub credential_id: String,
    pub snapshot: FieldSnapshot,
}

/// Answers "has the operator edited the loaded stored credential?".
///
/// The submission router consults this as its only gate before choosing the
/// stored channel, so it must stay side-effect free.
pub trait OverrideGate {
    fn has_overrides(&self, credential_id: &str) -> bool;
}

pub struct BaselineOverrideTracker {
    fields: &'static [FieldSpec],
    capture: SnapshotCapture,
    baseline: Option<OverrideBaseline>,
}

impl BaselineOverrideTracker {
    pub fn new(fields: &'static [FieldSpec], capture: impl Fn() -> FieldSnapshot + 'static) -> Self {
        Self {
            fields,
            capture: Box::new(capture),
            baseline: None,
        }
    }

    pub fn reset_baseline(&mut self, credential_id: &str) {
        let snapshot = (self.capture)();
        tracing::debug!(
            credential_id,
            fields = snapshot.len(),
            "override baseline captured"
        );
        self.baseline = Some(OverrideBaseline {
            credential_id: credential_id.to_string(),
            snapshot,
        });
    }

    pub fn clear_baseline(&mut self) {
        self.baseline = None;
    }

    pub fn baseline(&self) -> Option<&OverrideBaseline> {
        self.baseline.as_ref()
    }

    /// Compared fields whose current value differs from the baseline. Every
    /// compared field is reported when no baseline exists for `credential_id`.
    pub fn overridden_fields(&self, credential_id: &str) -> Vec<&'static str> {
        let compared = self.fields.iter().filter(|field| field.is_compared());
        let Some(baseline) = self
            .baseline
            .as_ref()
            .filter(|baseline| baseline.credential_id == credential_id)
        else {
            return compared.map(|field| field.name).collect();
        };
        let current = (self.capture)();
        compared
            .filter(|field| current.get(field.name) != baseline.snapshot.get(field.name))
            .map(|field| field.name)
            .collect()
    }
}

impl OverrideGate for BaselineOverrideTracker {
    fn has_overrides(&self, credential_id: &str) -> bool {
        let Some(baseline) = self.baseline.as_ref() else {
            return true;
        };
        if baseline.credential_id != credential_id {
            return true;
        }
        let current = (self.capture)();
        self.fields
            .iter()
            .filter(|field| field.is_compared())
            .any(|field| current.get(field.name) != baseline.snapshot.get(field.name))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use super::*;
    use crate::protocol::EMV;

    type Form = Rc<RefCell<BTreeMap<String, String>>>;

    fn emv_form() -> Form {
        let mut values = BTreeMap::new();
        values.insert("mode".to_string(), "IDENTIFY".to_string());
        values.insert("masterKey".to_string(), "AABB".to_string());
        values.insert("atc".to_string(), "01".to_string());
        Rc::new(RefCell::new(values))
    }

    fn tracker(form: &Form) -> BaselineOverrideTracker {
        let source = Rc::clone(form);
        BaselineOverrideTracker::new(EMV.fields, move || {
            FieldSnapshot::capture(EMV.fields, &*source.borrow())
        })
    }

    fn set(form: &Form, name: &str, value: &str) {
        form.borrow_mut().insert(name.to_string(), value.to_string());
    }

    #[test]
    fn fresh_baseline_has_no_overrides() {
        let form = emv_form();
        let mut tracker = tracker(&form);
        tracker.reset_baseline("emv-1");
        assert!(!tracker.has_overrides("emv-1"));
        assert!(!tracker.has_overrides("emv-1"));
        assert!(tracker.overridden_fields("emv-1").is_empty());
    }

    #[test]
    fn missing_or_foreign_baseline_counts_as_overridden() {
        let form = emv_form();
        let mut tracker = tracker(&form);
        assert!(tracker.has_overrides("emv-1"));
        tracker.reset_baseline("emv-1");
        assert!(tracker.has_overrides("emv-2"));
        tracker.clear_baseline();
        assert!(tracker.has_overrides("emv-1"));
    }

    #[test]
    fn editing_a_compared_field_round_trips() {
        let form = emv_form();
        let mut tracker = tracker(&form);
        tracker.reset_baseline("emv-1");

        set(&form, "masterKey", "CCDD");
        assert!(tracker.has_overrides("emv-1"));
        assert_eq!(tracker.overridden_fields("emv-1"), vec!["masterKey"]);

        set(&form, "masterKey", " aabb ");
        assert!(!tracker.has_overrides("emv-1"));
    }

    #[test]
    fn submission_only_fields_are_never_compared() {
        let form = emv_form();
        let mut tracker = tracker(&form);
        tracker.reset_baseline("emv-1");

        set(&form, "previewWindow.backward", "2");
        set(&form, "previewWindow.forward", "3");
        set(&form, "otp", "123456");
        assert!(!tracker.has_overrides("emv-1"));
    }

    #[test]
    fn reset_replaces_the_previous_baseline() {
        let form = emv_form();
        let mut tracker = tracker(&form);
        tracker.reset_baseline("emv-1");
        set(&form, "atc", "02");
        tracker.reset_baseline("emv-2");

        assert_eq!(
            tracker.baseline().map(|baseline| baseline.credential_id.as_str()),
            Some("emv-2")
        );
        assert!(!tracker.has_overrides("emv-2"));
        assert!(tracker.has_overrides("emv-1"));
    }
}
