use super::*;

    pub(super) struct BrowserLocation;

    impl LocationSource for BrowserLocation {
        fn snapshot(&self) -> LocationSnapshot {
            let Some(window) = web_sys::window() else {
                return LocationSnapshot::default();
            };
            let location = window.location();
            LocationSnapshot {
                pathname: location.pathname().unwrap_or_default(),
                search: location.search().unwrap_or_default(),
                history_state: window
                    .history()
                    .ok()
                    .and_then(|history| history.state().ok())
                    .and_then(|state| js_to_json(&state)),
            }
        }
    }

    pub(super) fn current_search() -> String {
        web_sys::window()
            .and_then(|window| window.location().search().ok())
            .unwrap_or_default()
    }

    pub(super) fn js_to_json(value: &JsValue) -> Option<Value> {
        if value.is_null() || value.is_undefined() {
            return None;
        }
        let raw = js_sys::JSON::stringify(value).ok()?.as_string()?;
        serde_json::from_str(&raw).ok()
    }

    pub(super) fn write_history(write: &HistoryWrite) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let Ok(history) = window.history() else {
            return;
        };
        let state = serde_json::to_string(&write.state)
            .ok()
            .and_then(|raw| js_sys::JSON::parse(&raw).ok())
            .unwrap_or(JsValue::NULL);
        let result = match write.kind {
            HistoryWriteKind::Push => history.push_state_with_url(&state, "", Some(&write.url)),
            HistoryWriteKind::Replace => history.replace_state_with_url(&state, "", Some(&write.url)),
        };
        if result.is_err() {
            tracing::warn!(url = %write.url, "history write rejected by the browser");
        }
    }

    pub(super) fn install_navigation_handlers() {
        let Some(window) = web_sys::window() else {
            return;
        };
        let Some(document) = window.document() else {
            return;
        };

        POPSTATE_HANDLER.with(|slot| {
            if slot.borrow().is_some() {
                return;
            }
            let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |event: web_sys::Event| {
                let state = event
                    .dyn_ref::<PopStateEvent>()
                    .and_then(|event| js_to_json(&event.state()));
                apply_popstate(state.as_ref());
            }));
            let _ = window
                .add_event_listener_with_callback("popstate", callback.as_ref().unchecked_ref());
            *slot.borrow_mut() = Some(callback);
        });

        PROTOCOL_ACTIVATED_HANDLER.with(|slot| {
            if slot.borrow().is_some() {
                return;
            }
            let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |event: web_sys::Event| {
                let protocol = event
                    .dyn_ref::<CustomEvent>()
                    .map(CustomEvent::detail)
                    .and_then(|detail| js_sys::Reflect::get(&detail, &JsValue::from_str("protocol")).ok())
                    .and_then(|value| value.as_string())
                    .and_then(|value| Protocol::from_query_value(&value));
                if let Some(protocol) = protocol {
                    activate_panel(protocol);
                }
            }));
            let _ = document.add_event_listener_with_callback(
                PROTOCOL_ACTIVATED_EVENT,
                callback.as_ref().unchecked_ref(),
            );
            *slot.borrow_mut() = Some(callback);
        });
    }

    /// Every panel sees the event; sessions drop entries tagged for another
    /// protocol on their own.
    pub(super) fn apply_popstate(state: Option<&Value>) {
        let panels = mounted_panels();
        let mounted: Vec<Protocol> = panels.iter().map(|panel| panel.protocol).collect();
        let visible = active_protocol(&current_search(), &mounted);
        for panel in &panels {
            set_hidden(&panel.root, Some(panel.protocol) != visible);
            panel.session.handle_popstate(state);
        }
    }

    pub(super) fn activate_panel(protocol: Protocol) {
        let panels = mounted_panels();
        let Some(target) = panels.iter().find(|panel| panel.protocol == protocol) else {
            tracing::warn!(protocol = protocol.query_value(), "no mounted panel for protocol");
            return;
        };
        for panel in &panels {
            set_hidden(&panel.root, panel.protocol != protocol);
        }
        target.session.handle_handoff();
        let session = Rc::clone(&target.session);
        spawn_local(async move {
            let _ = session.load_directory(false).await;
        });
    }

    pub(super) fn dispatch_protocol_activated(protocol: Protocol) {
        let Some(document) = web_sys::window().and_then(|window| window.document()) else {
            return;
        };
        let detail = js_sys::Object::new();
        let _ = js_sys::Reflect::set(
            &detail,
            &JsValue::from_str("protocol"),
            &JsValue::from_str(protocol.query_value()),
        );
        let init = CustomEventInit::new();
        init.set_detail(&detail);
        if let Ok(event) = CustomEvent::new_with_event_init_dict(PROTOCOL_ACTIVATED_EVENT, &init) {
            let _ = document.dispatch_event(&event);
        }
    }
