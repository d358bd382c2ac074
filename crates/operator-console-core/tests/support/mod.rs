#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use async_trait::async_trait;
use operator_console_core::{
    ConsoleTransport, EffectSink, FieldSource, LocationSnapshot, LocationSource, PanelBootConfig,
    PanelDependencies, PanelEffect, PanelSession, ProtocolDescriptor, SeedCatalog, TransportError,
    VerbosityToggle,
};
use serde_json::Value;

#[derive(Default)]
pub struct FakeForm {
    values: RefCell<BTreeMap<String, String>>,
}

impl FakeForm {
    pub fn set(&self, name: &str, value: &str) {
        self.values
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.values.borrow().get(name).cloned()
    }
}

impl FieldSource for FakeForm {
    fn read_field(&self, name: &str) -> Option<String> {
        self.values.borrow().read_field(name)
    }

    fn csrf_token(&self) -> Option<String> {
        self.values.borrow().csrf_token()
    }
}

pub struct FakeLocation {
    snapshot: RefCell<LocationSnapshot>,
}

impl FakeLocation {
    pub fn new(search: &str) -> Self {
        Self {
            snapshot: RefCell::new(LocationSnapshot {
                pathname: "/ui/console".to_string(),
                search: search.to_string(),
                history_state: None,
            }),
        }
    }

    /// Simulates back/forward or a sibling panel rewriting the URL.
    pub fn navigate(&self, search: &str, history_state: Option<Value>) {
        let mut snapshot = self.snapshot.borrow_mut();
        snapshot.search = search.to_string();
        snapshot.history_state = history_state;
    }

    pub fn search(&self) -> String {
        self.snapshot.borrow().search.clone()
    }
}

impl LocationSource for FakeLocation {
    fn snapshot(&self) -> LocationSnapshot {
        self.snapshot.borrow().clone()
    }
}

#[derive(Default)]
pub struct FakeVerbosity {
    pub enabled: Cell<bool>,
}

impl VerbosityToggle for FakeVerbosity {
    fn is_enabled(&self) -> bool {
        self.enabled.get()
    }
}

/// Records every effect and plays the browser's part for the ones later
/// reads depend on (field writes and history writes).
pub struct RecordingSink {
    effects: Rc<RefCell<Vec<PanelEffect>>>,
    form: Rc<FakeForm>,
    location: Rc<FakeLocation>,
}

impl EffectSink for RecordingSink {
    fn apply(&mut self, effect: PanelEffect) {
        match &effect {
            PanelEffect::FieldValues(values) => {
                for (name, value) in values {
                    self.form.set(name, value);
                }
            }
            PanelEffect::CustomerInputs(gate) => {
                for (name, enabled) in gate.fields() {
                    if !enabled {
                        self.form.set(name, "");
                    }
                }
            }
            PanelEffect::History(write) => {
                let search = write
                    .url
                    .find('?')
                    .map_or_else(String::new, |index| write.url[index..].to_string());
                self.location
                    .navigate(&search, serde_json::to_value(&write.state).ok());
            }
            _ => {}
        }
        self.effects.borrow_mut().push(effect);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub endpoint: String,
    pub body: Option<Value>,
    pub csrf_token: Option<String>,
}

/// Canned responses per endpoint. The last queued response for an endpoint
/// is sticky. Every call yields once before answering so callers can
/// interleave with a pending request.
#[derive(Default)]
pub struct RecordingTransport {
    responses: RefCell<BTreeMap<String, VecDeque<Result<Value, TransportError>>>>,
    calls: RefCell<Vec<RecordedCall>>,
}

impl RecordingTransport {
    pub fn respond(&self, endpoint: &str, response: Result<Value, TransportError>) {
        self.responses
            .borrow_mut()
            .entry(endpoint.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.endpoint == endpoint)
            .count()
    }

    fn answer(&self, endpoint: &str) -> Result<Value, TransportError> {
        let mut responses = self.responses.borrow_mut();
        let Some(queue) = responses.get_mut(endpoint) else {
            return Err(TransportError::Http {
                status: 404,
                body: None,
            });
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap_or_else(|| Err(TransportError::Network {
                message: "empty response queue".to_string(),
            }))
        } else {
            queue.front().cloned().unwrap_or_else(|| Err(TransportError::Network {
                message: "empty response queue".to_string(),
            }))
        }
    }
}

#[async_trait(?Send)]
impl ConsoleTransport for RecordingTransport {
    async fn get_json(&self, endpoint: &str) -> Result<Value, TransportError> {
        self.calls.borrow_mut().push(RecordedCall {
            method: "GET",
            endpoint: endpoint.to_string(),
            body: None,
            csrf_token: None,
        });
        tokio::task::yield_now().await;
        self.answer(endpoint)
    }

    async fn post_json(
        &self,
        endpoint: &str,
        body: &Value,
        csrf_token: Option<&str>,
    ) -> Result<Value, TransportError> {
        self.calls.borrow_mut().push(RecordedCall {
            method: "POST",
            endpoint: endpoint.to_string(),
            body: Some(body.clone()),
            csrf_token: csrf_token.map(str::to_string),
        });
        tokio::task::yield_now().await;
        self.answer(endpoint)
    }
}

pub struct Harness {
    pub session: Rc<PanelSession>,
    pub form: Rc<FakeForm>,
    pub location: Rc<FakeLocation>,
    pub transport: Rc<RecordingTransport>,
    pub verbosity: Rc<FakeVerbosity>,
    effects: Rc<RefCell<Vec<PanelEffect>>>,
}

impl Harness {
    pub fn new(descriptor: &'static ProtocolDescriptor, config: &str, search: &str) -> Self {
        Self::with_seeds(descriptor, config, search, SeedCatalog::default())
    }

    pub fn with_seeds(
        descriptor: &'static ProtocolDescriptor,
        config: &str,
        search: &str,
        seeds: SeedCatalog,
    ) -> Self {
        let transport = Rc::new(RecordingTransport::default());
        let form = Rc::new(FakeForm::default());
        let location = Rc::new(FakeLocation::new(search));
        let verbosity = Rc::new(FakeVerbosity::default());
        let effects = Rc::new(RefCell::new(Vec::new()));
        let sink = RecordingSink {
            effects: Rc::clone(&effects),
            form: Rc::clone(&form),
            location: Rc::clone(&location),
        };
        let deps = PanelDependencies {
            transport: Rc::clone(&transport) as Rc<dyn ConsoleTransport>,
            fields: Rc::clone(&form) as Rc<dyn FieldSource>,
            location: Rc::clone(&location) as Rc<dyn LocationSource>,
            verbosity: Some(Rc::clone(&verbosity) as Rc<dyn VerbosityToggle>),
            sink: Box::new(sink),
        };
        let session = PanelSession::new(
            descriptor,
            PanelBootConfig::from_attribute(Some(config)),
            seeds,
            deps,
            None,
        );
        Self {
            session,
            form,
            location,
            transport,
            verbosity,
            effects,
        }
    }

    /// Drains everything recorded so far.
    pub fn take_effects(&self) -> Vec<PanelEffect> {
        std::mem::take(&mut *self.effects.borrow_mut())
    }

    pub fn history_writes(effects: &[PanelEffect]) -> usize {
        effects
            .iter()
            .filter(|effect| matches!(effect, PanelEffect::History(_)))
            .count()
    }
}
