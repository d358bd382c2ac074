#[cfg(any(target_arch = "wasm32", test))]
mod panel_markup;
#[cfg(target_arch = "wasm32")]
mod wasm_constants;

#[cfg(target_arch = "wasm32")]
mod wasm {
    use std::cell::RefCell;
    use std::rc::Rc;

    use async_trait::async_trait;
    use gloo_net::http::Request;
    use operator_console_core::config::InitialStateAttribute;
    use operator_console_core::trace::{TraceVariant, format_trace};
    use operator_console_core::{
        CSRF_HEADER, ConsoleTransport, CredentialMode, EffectSink, FieldSource, HistoryWrite,
        HistoryWriteKind, LocationSnapshot, LocationSource, PanelBootConfig, PanelDependencies,
        PanelEffect, PanelSession, PanelTab, Protocol, SeedCatalog, TraceCommand, TransportError,
        VerbosityToggle,
    };
    use serde_json::Value;
    use thiserror::Error;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::spawn_local;
    use web_sys::{
        CustomEvent, CustomEventInit, Document, Element, HtmlElement, HtmlInputElement,
        HtmlOptionElement, HtmlSelectElement, HtmlTextAreaElement, PopStateEvent,
    };

    use crate::panel_markup::{
        PanelDiagnostics, SecretFieldMarkup, active_protocol, field_selector, mode_section_selector,
        secret_mask_selector, tab_selector, tone_attribute,
    };
    use crate::wasm_constants::*;

    mod dom;
    mod lifecycle;
    mod network;
    mod routing;

    use dom::*;
    use lifecycle::*;
    use network::*;
    use routing::*;

    thread_local! {
        static PANELS: RefCell<Vec<MountedPanel>> = const { RefCell::new(Vec::new()) };
        static PANEL_HANDLERS: RefCell<Vec<Closure<dyn FnMut(web_sys::Event)>>> = const { RefCell::new(Vec::new()) };
        static POPSTATE_HANDLER: RefCell<Option<Closure<dyn FnMut(web_sys::Event)>>> = const { RefCell::new(None) };
        static PROTOCOL_ACTIVATED_HANDLER: RefCell<Option<Closure<dyn FnMut(web_sys::Event)>>> = const { RefCell::new(None) };
        static VERBOSE_TOGGLE_HANDLER: RefCell<Option<Closure<dyn FnMut(web_sys::Event)>>> = const { RefCell::new(None) };
    }

    #[derive(Clone)]
    pub(super) struct MountedPanel {
        protocol: Protocol,
        root: HtmlElement,
        session: Rc<PanelSession>,
    }

    #[wasm_bindgen(start)]
    pub fn start() {
        console_error_panic_hook::set_once();
        install_console_tracing();
        if let Err(error) = boot() {
            tracing::error!(%error, "operator console boot failed");
        }
    }

    /// JSON snapshot of one mounted panel, or `null` when it is not mounted.
    #[wasm_bindgen]
    pub fn panel_state_json(protocol: String) -> String {
        let session = Protocol::from_query_value(&protocol).and_then(panel_session);
        match session {
            Some(session) => serde_json::to_string(&PanelDiagnostics::capture(&session))
                .unwrap_or_else(|_| "null".to_string()),
            None => "null".to_string(),
        }
    }

    /// Page-script entry for switching panels; same path as the custom event.
    #[wasm_bindgen]
    pub fn activate_protocol(protocol: String) {
        if let Some(protocol) = Protocol::from_query_value(&protocol) {
            activate_panel(protocol);
        }
    }

    pub(super) fn panel_session(protocol: Protocol) -> Option<Rc<PanelSession>> {
        PANELS.with(|panels| {
            panels
                .borrow()
                .iter()
                .find(|panel| panel.protocol == protocol)
                .map(|panel| Rc::clone(&panel.session))
        })
    }

    pub(super) fn mounted_panels() -> Vec<MountedPanel> {
        PANELS.with(|panels| panels.borrow().clone())
    }
}
