//! Panel state ownership and the tab/mode transition functions.

use crate::baseline::OverrideGate;
use crate::deep_link::{
    DeepLinkState, DeepLinkSynchronizer, LocationSnapshot, RequestedPanelState,
};
use crate::directory::CredentialSummary;
use crate::effects::PanelEffect;
use crate::protocol::{CredentialMode, PanelTab, Protocol, ProtocolDescriptor};
use crate::secret_fields::SecretFieldVisibilityPolicy;
use crate::submission::{RouteDecision, SubmissionRouter};
use crate::trace::TraceCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelState {
    pub protocol: Protocol,
    pub tab: PanelTab,
    pub mode: CredentialMode,
    pub replay_mode: CredentialMode,
    generation: u64,
}

impl PanelState {
    pub fn mode_for(&self, tab: PanelTab) -> CredentialMode {
        match tab {
            PanelTab::Evaluate => self.mode,
            PanelTab::Replay => self.replay_mode,
        }
    }

    pub fn active_mode(&self) -> CredentialMode {
        self.mode_for(self.tab)
    }

    /// Bumped once per applied transition.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn deep_link(&self) -> DeepLinkState {
        DeepLinkState {
            protocol: self.protocol,
            tab: self.tab,
            mode: self.active_mode(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOptions {
    pub force: bool,
    pub broadcast: bool,
    pub replace: bool,
}

impl Default for TransitionOptions {
    fn default() -> Self {
        Self {
            force: false,
            broadcast: true,
            replace: false,
        }
    }
}

impl TransitionOptions {
    /// Applies without writing history (popstate, nested re-application).
    pub fn silent() -> Self {
        Self {
            broadcast: false,
            ..Self::default()
        }
    }

    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    pub fn replacing() -> Self {
        Self {
            replace: true,
            ..Self::default()
        }
    }
}

/// Browser facts a transition needs but does not own.
pub struct TransitionContext<'a> {
    pub location: &'a LocationSnapshot,
    pub overrides: &'a dyn OverrideGate,
}

pub struct TabModeController {
    descriptor: &'static ProtocolDescriptor,
    state: PanelState,
    visibility: SecretFieldVisibilityPolicy,
    deep_link: DeepLinkSynchronizer,
    selected_credential: Option<String>,
    active_summary: Option<CredentialSummary>,
    server_state: RequestedPanelState,
}

impl TabModeController {
    /// Fills whatever `requested` leaves open from the descriptor defaults.
    pub fn new(descriptor: &'static ProtocolDescriptor, requested: RequestedPanelState) -> Self {
        let state = PanelState {
            protocol: descriptor.protocol,
            tab: requested.tab.unwrap_or(descriptor.default_tab),
            mode: requested
                .evaluate_mode
                .unwrap_or(descriptor.default_evaluate_mode),
            replay_mode: requested
                .replay_mode
                .unwrap_or(descriptor.default_replay_mode),
            generation: 0,
        };
        Self {
            descriptor,
            state,
            visibility: SecretFieldVisibilityPolicy::for_descriptor(descriptor),
            deep_link: DeepLinkSynchronizer::new(descriptor),
            selected_credential: None,
            active_summary: None,
            server_state: RequestedPanelState::default(),
        }
    }

    /// Server-rendered initial state, consulted again whenever a popstate
    /// leaves values open.
    pub fn with_server_state(mut self, server_state: RequestedPanelState) -> Self {
        self.server_state = server_state;
        self
    }

    pub fn descriptor(&self) -> &'static ProtocolDescriptor {
        self.descriptor
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn deep_link(&self) -> &DeepLinkSynchronizer {
        &self.deep_link
    }

    pub fn selected_credential(&self) -> Option<&str> {
        self.selected_credential.as_deref()
    }

    pub fn active_summary(&self) -> Option<&CredentialSummary> {
        self.active_summary.as_ref()
    }

    /// Full render of the current state. With `broadcast` the URL is
    /// canonicalized with replace; panels not named by the URL pass `false`.
    pub fn initialize(&mut self, broadcast: bool, ctx: &TransitionContext<'_>) -> Vec<PanelEffect> {
        self.state.generation += 1;
        let mut effects = vec![
            PanelEffect::ActivateTab(self.state.tab),
            PanelEffect::Trace(TraceCommand::Clear),
        ];
        for tab in [PanelTab::Evaluate, PanelTab::Replay] {
            effects.extend(self.mode_effects(tab, ctx));
        }
        if broadcast {
            effects.extend(self.sync(ctx, true));
        }
        effects
    }

    pub fn set_tab(
        &mut self,
        tab: PanelTab,
        opts: TransitionOptions,
        ctx: &TransitionContext<'_>,
    ) -> Vec<PanelEffect> {
        if self.state.tab == tab && !opts.force {
            return Vec::new();
        }
        self.state.tab = tab;
        self.state.generation += 1;
        tracing::debug!(
            protocol = self.state.protocol.query_value(),
            tab = tab.as_str(),
            generation = self.state.generation,
            "panel tab applied"
        );
        let mut effects = vec![
            PanelEffect::ActivateTab(tab),
            PanelEffect::Trace(TraceCommand::Clear),
        ];
        effects.extend(self.mode_effects(tab, ctx));
        if opts.broadcast {
            effects.extend(self.sync(ctx, opts.replace));
        }
        effects
    }

    pub fn set_mode(
        &mut self,
        mode: CredentialMode,
        opts: TransitionOptions,
        ctx: &TransitionContext<'_>,
    ) -> Vec<PanelEffect> {
        self.set_mode_for(PanelTab::Evaluate, mode, opts, ctx)
    }

    pub fn set_replay_mode(
        &mut self,
        mode: CredentialMode,
        opts: TransitionOptions,
        ctx: &TransitionContext<'_>,
    ) -> Vec<PanelEffect> {
        self.set_mode_for(PanelTab::Replay, mode, opts, ctx)
    }

    fn set_mode_for(
        &mut self,
        tab: PanelTab,
        mode: CredentialMode,
        opts: TransitionOptions,
        ctx: &TransitionContext<'_>,
    ) -> Vec<PanelEffect> {
        if self.state.mode_for(tab) == mode && !opts.force {
            return Vec::new();
        }
        match tab {
            PanelTab::Evaluate => self.state.mode = mode,
            PanelTab::Replay => self.state.replay_mode = mode,
        }
        self.state.generation += 1;
        tracing::debug!(
            protocol = self.state.protocol.query_value(),
            tab = tab.as_str(),
            mode = mode.as_str(),
            generation = self.state.generation,
            "panel mode applied"
        );
        let mut effects = vec![PanelEffect::Trace(TraceCommand::Clear)];
        effects.extend(self.mode_effects(tab, ctx));
        if opts.broadcast && tab == self.state.tab {
            effects.extend(self.sync(ctx, opts.replace));
        }
        effects
    }

    /// Applies popstate state without writing history. Values the entry
    /// leaves open come from the server initial state, then from the
    /// panel's current state.
    pub fn apply_requested(
        &mut self,
        requested: RequestedPanelState,
        ctx: &TransitionContext<'_>,
    ) -> Vec<PanelEffect> {
        self.apply_resolved(requested.or(self.server_state), ctx)
    }

    /// Cross-panel handoff: applies `requested` silently, then rewrites the
    /// URL for this panel with replace semantics. `None` (the URL still
    /// names another panel) keeps the current tab and modes.
    pub fn handoff(
        &mut self,
        requested: Option<RequestedPanelState>,
        ctx: &TransitionContext<'_>,
    ) -> Vec<PanelEffect> {
        let mut effects = self.apply_resolved(requested.unwrap_or_default(), ctx);
        self.state.generation += 1;
        effects.push(PanelEffect::ActivateTab(self.state.tab));
        effects.extend(self.sync(ctx, true));
        effects
    }

    fn apply_resolved(
        &mut self,
        requested: RequestedPanelState,
        ctx: &TransitionContext<'_>,
    ) -> Vec<PanelEffect> {
        let tab = requested.tab.unwrap_or(self.state.tab);
        let mut effects = Vec::new();
        for mode_tab in [PanelTab::Evaluate, PanelTab::Replay] {
            let mode = requested
                .mode_for(mode_tab)
                .unwrap_or(self.state.mode_for(mode_tab));
            effects.extend(self.set_mode_for(mode_tab, mode, TransitionOptions::silent(), ctx));
        }
        effects.extend(self.set_tab(tab, TransitionOptions::silent(), ctx));
        effects
    }

    /// Records the stored selection and refreshes masks and affordances.
    /// Tab and mode are left alone.
    pub fn select_credential(
        &mut self,
        credential_id: Option<String>,
        summary: Option<CredentialSummary>,
        ctx: &TransitionContext<'_>,
    ) -> Vec<PanelEffect> {
        self.selected_credential = credential_id.filter(|id| !id.trim().is_empty());
        self.active_summary = summary;
        self.refresh(ctx)
    }

    /// Re-derives masks and submit affordances without a transition.
    pub fn refresh(&self, ctx: &TransitionContext<'_>) -> Vec<PanelEffect> {
        let mut effects = self.secret_effects();
        for tab in [PanelTab::Evaluate, PanelTab::Replay] {
            effects.push(PanelEffect::SubmitAffordance(SubmissionRouter::affordance(
                tab,
                self.decision_for(tab, ctx).as_ref(),
            )));
        }
        effects
    }

    pub fn decision_for(&self, tab: PanelTab, ctx: &TransitionContext<'_>) -> Option<RouteDecision> {
        SubmissionRouter::decide(
            self.state.mode_for(tab),
            self.selected_credential.as_deref(),
            ctx.overrides,
        )
    }

    fn mode_effects(&self, tab: PanelTab, ctx: &TransitionContext<'_>) -> Vec<PanelEffect> {
        let mut effects = vec![PanelEffect::ShowModeSection {
            tab,
            mode: self.state.mode_for(tab),
        }];
        if tab == self.state.tab {
            effects.extend(self.secret_effects());
        }
        effects.push(PanelEffect::SubmitAffordance(SubmissionRouter::affordance(
            tab,
            self.decision_for(tab, ctx).as_ref(),
        )));
        effects
    }

    fn secret_effects(&self) -> Vec<PanelEffect> {
        self.visibility
            .apply(self.state.active_mode(), self.active_summary.as_ref())
            .into_iter()
            .map(PanelEffect::SecretField)
            .collect()
    }

    fn sync(&mut self, ctx: &TransitionContext<'_>, replace: bool) -> Vec<PanelEffect> {
        let deep_link = self.state.deep_link();
        self.deep_link
            .sync(&deep_link, self.state.generation, ctx.location, replace)
            .map(PanelEffect::History)
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deep_link::HistoryWriteKind;
    use crate::protocol::{EMV, HOTP};

    struct NoBaseline;

    impl OverrideGate for NoBaseline {
        fn has_overrides(&self, _credential_id: &str) -> bool {
            true
        }
    }

    fn ctx(location: &LocationSnapshot) -> TransitionContext<'_> {
        TransitionContext {
            location,
            overrides: &NoBaseline,
        }
    }

    fn history_writes(effects: &[PanelEffect]) -> usize {
        effects
            .iter()
            .filter(|effect| matches!(effect, PanelEffect::History(_)))
            .count()
    }

    #[test]
    fn repeated_mode_change_is_a_no_op() {
        let location = LocationSnapshot::default();
        let mut controller = TabModeController::new(&HOTP, RequestedPanelState::default());
        let first = controller.set_mode(CredentialMode::Stored, TransitionOptions::default(), &ctx(&location));
        assert!(!first.is_empty());
        let generation = controller.state().generation();

        let second = controller.set_mode(CredentialMode::Stored, TransitionOptions::default(), &ctx(&location));
        assert!(second.is_empty());
        assert_eq!(controller.state().generation(), generation);
    }

    #[test]
    fn forced_transition_reapplies() {
        let location = LocationSnapshot::default();
        let mut controller = TabModeController::new(&HOTP, RequestedPanelState::default());
        let effects = controller.set_tab(PanelTab::Evaluate, TransitionOptions::forced(), &ctx(&location));
        assert!(effects.contains(&PanelEffect::Trace(TraceCommand::Clear)));
        assert_eq!(controller.state().generation(), 1);
    }

    #[test]
    fn tab_switch_writes_history_once() {
        let location = LocationSnapshot::default();
        let mut controller = TabModeController::new(&HOTP, RequestedPanelState::default());
        let effects = controller.set_tab(PanelTab::Replay, TransitionOptions::default(), &ctx(&location));
        assert_eq!(history_writes(&effects), 1);
        assert!(effects.contains(&PanelEffect::ActivateTab(PanelTab::Replay)));
        assert!(effects.contains(&PanelEffect::ShowModeSection {
            tab: PanelTab::Replay,
            mode: CredentialMode::Stored,
        }));
    }

    #[test]
    fn silent_transitions_never_write_history() {
        let location = LocationSnapshot::default();
        let mut controller = TabModeController::new(&HOTP, RequestedPanelState::default());
        let requested = RequestedPanelState {
            tab: Some(PanelTab::Replay),
            evaluate_mode: None,
            replay_mode: Some(CredentialMode::Inline),
        };
        let effects = controller.apply_requested(requested, &ctx(&location));
        assert_eq!(history_writes(&effects), 0);
        assert_eq!(controller.state().tab, PanelTab::Replay);
        assert_eq!(controller.state().replay_mode, CredentialMode::Inline);
    }

    #[test]
    fn inactive_tab_mode_change_does_not_touch_history() {
        let location = LocationSnapshot::default();
        let mut controller = TabModeController::new(&HOTP, RequestedPanelState::default());
        let effects =
            controller.set_replay_mode(CredentialMode::Inline, TransitionOptions::default(), &ctx(&location));
        assert_eq!(history_writes(&effects), 0);
        assert!(
            !effects
                .iter()
                .any(|effect| matches!(effect, PanelEffect::SecretField(_)))
        );
    }

    #[test]
    fn initialize_canonicalizes_with_replace() {
        let location = LocationSnapshot {
            pathname: "/ui/console".to_string(),
            search: "?protocol=emv&tab=bogus".to_string(),
            history_state: None,
        };
        let mut controller = TabModeController::new(&EMV, RequestedPanelState::default());
        let effects = controller.initialize(true, &ctx(&location));
        let write = effects.iter().find_map(|effect| match effect {
            PanelEffect::History(write) => Some(write),
            _ => None,
        });
        assert_eq!(write.map(|write| &write.kind), Some(&HistoryWriteKind::Replace));
        assert_eq!(
            write.map(|write| write.url.as_str()),
            Some("/ui/console?protocol=emv&tab=evaluate&mode=stored")
        );
    }

    #[test]
    fn handoff_replaces_even_when_state_is_unchanged() {
        let location = LocationSnapshot {
            pathname: "/ui/console".to_string(),
            search: "?protocol=hotp".to_string(),
            history_state: None,
        };
        let mut controller = TabModeController::new(&HOTP, RequestedPanelState::default());
        let _ = controller.initialize(true, &ctx(&location));
        let requested = controller.deep_link().on_handoff(&location);
        let effects = controller.handoff(requested, &ctx(&location));
        let kinds: Vec<&HistoryWriteKind> = effects
            .iter()
            .filter_map(|effect| match effect {
                PanelEffect::History(write) => Some(&write.kind),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec![&HistoryWriteKind::Replace]);
    }

    #[test]
    fn popstate_gaps_fall_back_to_server_state_then_current_state() {
        let location = LocationSnapshot::default();
        let server = RequestedPanelState {
            tab: Some(PanelTab::Replay),
            evaluate_mode: None,
            replay_mode: None,
        };
        let mut controller =
            TabModeController::new(&HOTP, RequestedPanelState::default()).with_server_state(server);
        let _ = controller.set_mode(CredentialMode::Stored, TransitionOptions::default(), &ctx(&location));

        let _ = controller.apply_requested(RequestedPanelState::default(), &ctx(&location));
        assert_eq!(controller.state().tab, PanelTab::Replay);
        assert_eq!(controller.state().mode, CredentialMode::Stored);
        assert_eq!(controller.state().replay_mode, CredentialMode::Stored);
    }

    #[test]
    fn stored_mode_without_selection_disables_submit() {
        let location = LocationSnapshot::default();
        let mut controller = TabModeController::new(&EMV, RequestedPanelState::default());
        let effects = controller.initialize(true, &ctx(&location));
        assert!(effects.iter().any(|effect| matches!(
            effect,
            PanelEffect::SubmitAffordance(affordance)
                if affordance.tab == PanelTab::Evaluate && affordance.disabled
        )));
    }
}
