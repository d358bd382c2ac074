//! One protocol panel wired to its collaborators.
//!
//! `PanelSession` is the dispatcher: every operation computes effects through
//! the pure components and hands them to the panel's [`EffectSink`]. Borrows
//! of the inner `RefCell`s are never held across an `.await`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::Value;

use crate::baseline::{BaselineOverrideTracker, OverrideGate};
use crate::cap::{CapMode, CustomerInputGate};
use crate::config::PanelBootConfig;
use crate::controller::{TabModeController, TransitionContext, TransitionOptions};
use crate::deep_link::{DeepLinkSynchronizer, LocationSource};
use crate::directory::{CredentialDirectory, DirectorySnapshot};
use crate::effects::{EffectSink, PanelEffect, ResultMessage};
use crate::fields::{FieldSnapshot, FieldSource};
use crate::hydration::{hydrated_values, summary_values};
use crate::protocol::{CredentialMode, PanelTab, Protocol, ProtocolDescriptor};
use crate::seeds::{SEED_FAILED, SeedCatalog, SeedOutcome};
use crate::submission::{BlockReason, SubmissionRouter, interpret_failure, interpret_response};
use crate::trace::{TraceCommand, TraceRequestCoordinator, VerbosityToggle};
use crate::transport::ConsoleTransport;

/// Browser-side collaborators of one panel.
pub struct PanelDependencies {
    pub transport: Rc<dyn ConsoleTransport>,
    pub fields: Rc<dyn FieldSource>,
    pub location: Rc<dyn LocationSource>,
    pub verbosity: Option<Rc<dyn VerbosityToggle>>,
    pub sink: Box<dyn EffectSink>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Blocked(BlockReason),
    Completed(ResultMessage),
    Failed(ResultMessage),
    /// The panel moved on (tab or mode changed) before the response arrived.
    Discarded,
}

pub struct PanelSession {
    descriptor: &'static ProtocolDescriptor,
    config: PanelBootConfig,
    seeds: SeedCatalog,
    controller: RefCell<TabModeController>,
    tracker: RefCell<BaselineOverrideTracker>,
    trace: TraceRequestCoordinator,
    directory: CredentialDirectory,
    transport: Rc<dyn ConsoleTransport>,
    fields: Rc<dyn FieldSource>,
    location: Rc<dyn LocationSource>,
    sink: RefCell<Box<dyn EffectSink>>,
    in_flight: [Cell<bool>; 2],
    seeding: Cell<bool>,
    selection_seq: Cell<u64>,
}

impl PanelSession {
    /// Resolves the initial state: explicit search override, then the URL,
    /// then tagged history state, then the server attribute, then defaults.
    pub fn new(
        descriptor: &'static ProtocolDescriptor,
        config: PanelBootConfig,
        seeds: SeedCatalog,
        deps: PanelDependencies,
        override_search: Option<&str>,
    ) -> Rc<Self> {
        let location = deps.location.snapshot();
        let server_state = config.server_initial_state();
        let requested = DeepLinkSynchronizer::new(descriptor)
            .read_initial(override_search, &location)
            .unwrap_or_default()
            .or(server_state);
        let capture_source = Rc::clone(&deps.fields);
        let tracker = BaselineOverrideTracker::new(descriptor.fields, move || {
            FieldSnapshot::capture(descriptor.fields, capture_source.as_ref())
        });
        let directory = CredentialDirectory::new(
            descriptor,
            config.credentials_endpoint.clone(),
            Rc::clone(&deps.transport),
        );
        Rc::new(Self {
            descriptor,
            seeds,
            controller: RefCell::new(
                TabModeController::new(descriptor, requested).with_server_state(server_state),
            ),
            tracker: RefCell::new(tracker),
            trace: TraceRequestCoordinator::new(deps.verbosity, descriptor.trace_operation),
            directory,
            transport: deps.transport,
            fields: deps.fields,
            location: deps.location,
            sink: RefCell::new(deps.sink),
            in_flight: [Cell::new(false), Cell::new(false)],
            seeding: Cell::new(false),
            selection_seq: Cell::new(0),
            config,
        })
    }

    pub fn protocol(&self) -> Protocol {
        self.descriptor.protocol
    }

    pub fn tab(&self) -> PanelTab {
        self.controller.borrow().state().tab
    }

    pub fn mode_for(&self, tab: PanelTab) -> CredentialMode {
        self.controller.borrow().state().mode_for(tab)
    }

    pub fn generation(&self) -> u64 {
        self.controller.borrow().state().generation()
    }

    pub fn selected_credential(&self) -> Option<String> {
        self.controller
            .borrow()
            .selected_credential()
            .map(str::to_string)
    }

    pub fn has_overrides(&self, credential_id: &str) -> bool {
        self.tracker.borrow().has_overrides(credential_id)
    }

    /// Renders the resolved initial state. Only the panel the page opened on
    /// (`active`) canonicalizes the URL.
    pub fn start(&self, active: bool) {
        let effects = self.transition(|controller, ctx| controller.initialize(active, ctx));
        self.emit(effects);
        if self.descriptor.protocol == Protocol::Emv {
            self.cap_mode_changed();
        }
    }

    pub fn set_tab(&self, tab: PanelTab) {
        let effects =
            self.transition(|controller, ctx| controller.set_tab(tab, TransitionOptions::default(), ctx));
        self.emit(effects);
    }

    pub fn set_mode(&self, mode: CredentialMode) {
        let effects =
            self.transition(|controller, ctx| controller.set_mode(mode, TransitionOptions::default(), ctx));
        self.emit(effects);
    }

    pub fn set_replay_mode(&self, mode: CredentialMode) {
        let effects = self.transition(|controller, ctx| {
            controller.set_replay_mode(mode, TransitionOptions::default(), ctx)
        });
        self.emit(effects);
    }

    pub fn handle_popstate(&self, event_state: Option<&Value>) {
        let location = self.location.snapshot();
        let requested = self
            .controller
            .borrow()
            .deep_link()
            .on_popstate(event_state, &location);
        let Some(requested) = requested else {
            return;
        };
        let effects = self.transition(|controller, ctx| controller.apply_requested(requested, ctx));
        self.emit(effects);
    }

    /// Sibling panel handed control to this one.
    pub fn handle_handoff(&self) {
        let location = self.location.snapshot();
        let requested = self.controller.borrow().deep_link().on_handoff(&location);
        let effects = self.transition(|controller, ctx| controller.handoff(requested, ctx));
        self.emit(effects);
    }

    /// Any form edit may flip the stored/inline routing.
    pub fn fields_changed(&self) {
        let effects = self.transition(|controller, ctx| controller.refresh(ctx));
        self.emit(effects);
    }

    pub fn cap_mode_changed(&self) {
        self.emit(vec![self.customer_input_gate()]);
        self.fields_changed();
    }

    fn customer_input_gate(&self) -> PanelEffect {
        let mode = CapMode::parse(&self.fields.read_field("mode").unwrap_or_default());
        PanelEffect::CustomerInputs(CustomerInputGate::for_mode(mode))
    }

    pub fn verbosity_changed(&self) {
        if !self.trace.is_trace_requested() {
            self.emit(vec![PanelEffect::Trace(TraceCommand::Clear)]);
        }
    }

    pub async fn load_directory(&self, force_refresh: bool) -> DirectorySnapshot {
        let snapshot = self.directory.ensure(force_refresh).await;
        let tab = self.tab();
        self.emit(vec![
            PanelEffect::CredentialOptions {
                options: snapshot.options(),
                selected: self.selected_credential(),
            },
            PanelEffect::DirectoryStatus(snapshot.status_message(self.descriptor.protocol, tab)),
        ]);
        snapshot
    }

    /// Applies a stored-credential selection: masks and affordances update
    /// at once, then hydrated defaults are written and the override baseline
    /// is captured from them.
    pub async fn select_credential(&self, credential_id: Option<String>) {
        let seq = self.selection_seq.get() + 1;
        self.selection_seq.set(seq);
        let credential_id = credential_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        let Some(credential_id) = credential_id else {
            self.tracker.borrow_mut().clear_baseline();
            let effects = self.transition(|controller, ctx| controller.select_credential(None, None, ctx));
            self.emit(effects);
            return;
        };

        let summary = self
            .directory
            .cached()
            .and_then(|cache| cache.iter().find(|summary| summary.id == credential_id).cloned());
        let fallback_values = summary
            .as_ref()
            .map(|summary| summary_values(self.descriptor, &summary.defaults))
            .unwrap_or_default();
        let id = credential_id.clone();
        let effects = self.transition(move |controller, ctx| controller.select_credential(Some(id), summary, ctx));
        self.emit(effects);

        let mut values = fallback_values;
        if let Some(url) = self.config.hydration_url(&credential_id) {
            match self.transport.get_json(&url).await {
                Ok(body) => values = hydrated_values(self.descriptor, &body),
                Err(error) => {
                    tracing::warn!(credential_id = %credential_id, %error, "credential hydration failed");
                }
            }
        }
        if self.selection_seq.get() != seq {
            tracing::debug!(credential_id = %credential_id, "superseded credential selection dropped");
            return;
        }
        if !values.is_empty() {
            self.emit(vec![PanelEffect::FieldValues(values)]);
        }
        // Gated inputs are cleared before the baseline is taken.
        if self.descriptor.protocol == Protocol::Emv {
            self.emit(vec![self.customer_input_gate()]);
        }
        self.tracker.borrow_mut().reset_baseline(&credential_id);
        self.fields_changed();
    }

    pub async fn submit(&self, tab: PanelTab) -> SubmitOutcome {
        let slot = &self.in_flight[tab.index()];
        if slot.get() {
            return SubmitOutcome::Blocked(BlockReason::InFlight);
        }
        let Some(decision) = self.transition(|controller, ctx| controller.decision_for(tab, ctx)) else {
            return SubmitOutcome::Blocked(BlockReason::MissingSelection);
        };
        let Some(endpoint) = self
            .config
            .submit_endpoint(tab, decision.channel)
            .map(str::to_string)
        else {
            return SubmitOutcome::Blocked(BlockReason::MissingEndpoint);
        };

        slot.set(true);
        let generation = self.generation();
        let snapshot = FieldSnapshot::capture(self.descriptor.fields, self.fields.as_ref());
        let payload = SubmissionRouter::build_payload(
            self.descriptor,
            &decision,
            snapshot,
            self.trace.is_trace_requested(),
        );
        tracing::debug!(
            protocol = self.descriptor.protocol.query_value(),
            tab = tab.as_str(),
            channel = ?decision.channel,
            generation,
            "submitting panel request"
        );
        self.emit(vec![
            PanelEffect::Trace(self.trace.begin_request()),
            PanelEffect::ResultReset(tab),
            PanelEffect::SubmitBusy { tab, busy: true },
        ]);

        let csrf = self.fields.csrf_token();
        let result = self
            .transport
            .post_json(&endpoint, &payload, csrf.as_deref())
            .await;
        slot.set(false);
        self.emit(vec![PanelEffect::SubmitBusy { tab, busy: false }]);

        if self.generation() != generation {
            tracing::warn!(
                protocol = self.descriptor.protocol.query_value(),
                issued = generation,
                current = self.generation(),
                "discarding stale panel response"
            );
            return SubmitOutcome::Discarded;
        }

        match result {
            Ok(body) => {
                let message = interpret_response(tab, &body);
                self.emit(vec![
                    PanelEffect::Trace(self.trace.handle_response(Some(&body))),
                    PanelEffect::Result(message.clone()),
                ]);
                SubmitOutcome::Completed(message)
            }
            Err(error) => {
                tracing::warn!(
                    protocol = self.descriptor.protocol.query_value(),
                    %error,
                    "panel request failed"
                );
                let message = interpret_failure(tab, &error);
                self.emit(vec![
                    PanelEffect::Trace(self.trace.handle_error(error.body())),
                    PanelEffect::Result(message.clone()),
                ]);
                SubmitOutcome::Failed(message)
            }
        }
    }

    /// Provisions the canonical sample credentials and reloads the directory.
    /// `None` when no seed endpoint is configured or a seed is already running.
    pub async fn seed(&self) -> Option<SeedOutcome> {
        if self.seeding.get() {
            return None;
        }
        let endpoint = self.config.seed_endpoint.clone()?;
        self.seeding.set(true);
        self.emit(vec![PanelEffect::SeedStatus(String::new())]);
        let csrf = self.fields.csrf_token();
        let result = self
            .transport
            .post_json(&endpoint, &self.seeds.request_body(), csrf.as_deref())
            .await;
        let outcome = match result {
            Ok(body) => {
                let outcome = SeedOutcome::from_response(&body, &self.seeds);
                self.emit(vec![PanelEffect::SeedStatus(outcome.status_message())]);
                Some(outcome)
            }
            Err(error) => {
                tracing::warn!(%error, "credential seeding failed");
                self.emit(vec![PanelEffect::SeedStatus(SEED_FAILED.to_string())]);
                None
            }
        };
        self.seeding.set(false);
        if outcome.is_some() {
            self.load_directory(true).await;
        }
        outcome
    }

    fn transition<R>(&self, apply: impl FnOnce(&mut TabModeController, &TransitionContext<'_>) -> R) -> R {
        let location = self.location.snapshot();
        let tracker = self.tracker.borrow();
        let ctx = TransitionContext {
            location: &location,
            overrides: &*tracker,
        };
        let mut controller = self.controller.borrow_mut();
        apply(&mut controller, &ctx)
    }

    fn emit(&self, effects: Vec<PanelEffect>) {
        if effects.is_empty() {
            return;
        }
        self.sink.borrow_mut().dispatch(effects);
    }
}
