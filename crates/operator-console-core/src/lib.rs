//! Browser-independent core of the operator console protocol panels.
//!
//! Each panel (EMV/CAP, FIDO2, HOTP, TOTP, OCRA, EUDIW) is driven by a
//! [`PanelSession`] that owns the tab/mode state, keeps the URL in sync and
//! routes submissions to the stored or inline endpoint. Browser access goes
//! through the traits in [`fields`], [`deep_link`], [`trace`], [`transport`]
//! and [`effects`] so everything here runs natively under test.

pub mod baseline;
pub mod cap;
pub mod config;
pub mod controller;
pub mod deep_link;
pub mod directory;
pub mod effects;
pub mod fields;
pub mod hydration;
pub mod protocol;
pub mod secret_fields;
pub mod seeds;
pub mod session;
pub mod submission;
pub mod trace;
pub mod transport;

pub use config::{ConfigError, PanelBootConfig};
pub use controller::{PanelState, TabModeController, TransitionContext, TransitionOptions};
pub use deep_link::{
    DeepLinkSynchronizer, HistoryWrite, HistoryWriteKind, LocationSnapshot, LocationSource,
    RequestedPanelState,
};
pub use directory::{CredentialDirectory, CredentialSummary, DirectorySnapshot};
pub use effects::{EffectSink, PanelEffect, ResultMessage, SubmitAffordance, Tone};
pub use fields::{FieldSnapshot, FieldSource};
pub use protocol::{CredentialMode, PanelTab, Protocol, ProtocolDescriptor};
pub use seeds::{SeedCatalog, SeedOutcome};
pub use session::{PanelDependencies, PanelSession, SubmitOutcome};
pub use trace::{TraceCommand, TraceDocument, VerbosityToggle};
pub use transport::{CSRF_HEADER, ConsoleTransport, TransportError};
