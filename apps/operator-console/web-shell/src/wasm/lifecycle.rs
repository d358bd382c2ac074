use super::*;

    #[derive(Debug, Error)]
    pub(super) enum BootError {
        #[error("window is unavailable")]
        MissingWindow,
        #[error("document is unavailable")]
        MissingDocument,
    }

    /// Buffers one formatted event and hands it to `console.log` on drop.
    #[derive(Default)]
    pub(super) struct ConsoleWriter {
        buffer: Vec<u8>,
    }

    impl std::io::Write for ConsoleWriter {
        fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
            self.buffer.extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Drop for ConsoleWriter {
        fn drop(&mut self) {
            let line = String::from_utf8_lossy(&self.buffer);
            let line = line.trim_end();
            if !line.is_empty() {
                web_sys::console::log_1(&JsValue::from_str(line));
            }
        }
    }

    pub(super) fn install_console_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_writer(ConsoleWriter::default)
            .without_time()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    }

    pub(super) fn boot() -> Result<(), BootError> {
        let window = web_sys::window().ok_or(BootError::MissingWindow)?;
        let document = window.document().ok_or(BootError::MissingDocument)?;
        let Some(page) = document.document_element() else {
            return Err(BootError::MissingDocument);
        };

        let transport: Rc<dyn ConsoleTransport> = Rc::new(GlooTransport);
        let location: Rc<dyn LocationSource> = Rc::new(BrowserLocation);
        let verbosity = document_query(&document, VERBOSE_CHECKBOX_SELECTOR)
            .and_then(|element| element.dyn_into::<HtmlInputElement>().ok())
            .map(|checkbox| Rc::new(DomVerbosityToggle { checkbox }) as Rc<dyn VerbosityToggle>);

        let mut panels = Vec::new();
        for element in query_all(&page, PANEL_SELECTOR) {
            let raw_protocol = element.get_attribute(PANEL_PROTOCOL_ATTRIBUTE).unwrap_or_default();
            let Some(protocol) = Protocol::from_query_value(&raw_protocol) else {
                tracing::warn!(protocol = %raw_protocol, "skipping panel with unknown protocol");
                continue;
            };
            if panels.iter().any(|panel: &MountedPanel| panel.protocol == protocol) {
                tracing::warn!(protocol = protocol.query_value(), "skipping duplicate panel");
                continue;
            }
            let Ok(root) = element.clone().dyn_into::<HtmlElement>() else {
                continue;
            };

            let config = PanelBootConfig::from_attribute(
                element.get_attribute(PANEL_CONFIG_ATTRIBUTE).as_deref(),
            )
            .with_initial_state(InitialStateAttribute::from_attribute(
                element.get_attribute(PANEL_INITIAL_STATE_ATTRIBUTE).as_deref(),
            ));
            let seeds = SeedCatalog::from_attribute(
                element.get_attribute(PANEL_SEED_DEFINITIONS_ATTRIBUTE).as_deref(),
            );
            let deps = PanelDependencies {
                transport: Rc::clone(&transport),
                fields: Rc::new(DomFieldSource {
                    root: element.clone(),
                }),
                location: Rc::clone(&location),
                verbosity: verbosity.clone(),
                sink: Box::new(DomEffectSink {
                    root: element.clone(),
                    document: document.clone(),
                }),
            };
            let session = PanelSession::new(protocol.descriptor(), config, seeds, deps, None);
            panels.push(MountedPanel {
                protocol,
                root,
                session,
            });
        }

        if panels.is_empty() {
            tracing::info!("no protocol panels on this page");
            return Ok(());
        }

        PANELS.with(|slot| *slot.borrow_mut() = panels.clone());

        let mounted: Vec<Protocol> = panels.iter().map(|panel| panel.protocol).collect();
        let active = active_protocol(&current_search(), &mounted);
        for panel in &panels {
            let is_active = Some(panel.protocol) == active;
            set_hidden(&panel.root, !is_active);
            panel.session.start(is_active);
            wire_panel(panel);
            if is_active {
                let session = Rc::clone(&panel.session);
                spawn_local(async move {
                    let _ = session.load_directory(false).await;
                });
            }
        }

        wire_protocol_switches(&page);
        install_verbosity_handler(&document);
        install_navigation_handlers();
        tracing::info!(
            panels = panels.len(),
            active = active.map(Protocol::query_value),
            "operator console ready"
        );
        Ok(())
    }

    fn listen(target: &Element, event: &str, handler: impl FnMut(web_sys::Event) + 'static) {
        let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(handler));
        let _ = target.add_event_listener_with_callback(event, callback.as_ref().unchecked_ref());
        PANEL_HANDLERS.with(|handlers| handlers.borrow_mut().push(callback));
    }

    fn wire_panel(panel: &MountedPanel) {
        let root: &Element = &panel.root;

        for button in query_all(root, &format!("[{TAB_BUTTON_ATTRIBUTE}]")) {
            let Some(tab) = button.get_attribute(TAB_BUTTON_ATTRIBUTE).as_deref().and_then(PanelTab::parse) else {
                continue;
            };
            let session = Rc::clone(&panel.session);
            listen(&button, "click", move |event: web_sys::Event| {
                event.prevent_default();
                session.set_tab(tab);
            });
        }

        for toggle in query_all(root, &format!("input[{MODE_TOGGLE_ATTRIBUTE}]")) {
            let Some(tab) = toggle.get_attribute(MODE_TOGGLE_ATTRIBUTE).as_deref().and_then(PanelTab::parse) else {
                continue;
            };
            let session = Rc::clone(&panel.session);
            let input = toggle.clone();
            listen(&toggle, "change", move |_event: web_sys::Event| {
                let Some(mode) = element_value(&input).as_deref().and_then(CredentialMode::parse) else {
                    return;
                };
                match tab {
                    PanelTab::Evaluate => session.set_mode(mode),
                    PanelTab::Replay => session.set_replay_mode(mode),
                }
            });
        }

        for field in query_all(root, &format!("[{FIELD_ATTRIBUTE}]")) {
            for event_name in ["input", "change"] {
                let session = Rc::clone(&panel.session);
                listen(&field, event_name, move |_event: web_sys::Event| {
                    session.fields_changed();
                });
            }
        }

        if panel.protocol == Protocol::Emv {
            if let Some(mode_field) = query(root, CAP_MODE_SELECTOR) {
                let session = Rc::clone(&panel.session);
                listen(&mode_field, "change", move |_event: web_sys::Event| {
                    session.cap_mode_changed();
                });
            }
        }

        for select in query_all(root, CREDENTIAL_SELECT_SELECTOR) {
            let session = Rc::clone(&panel.session);
            let input = select.clone();
            listen(&select, "change", move |_event: web_sys::Event| {
                let selected = element_value(&input).filter(|value| !value.is_empty());
                let session = Rc::clone(&session);
                spawn_local(async move {
                    session.select_credential(selected).await;
                });
            });
        }

        for button in query_all(root, &format!("[{SUBMIT_ATTRIBUTE}]")) {
            let Some(tab) = button.get_attribute(SUBMIT_ATTRIBUTE).as_deref().and_then(PanelTab::parse) else {
                continue;
            };
            let session = Rc::clone(&panel.session);
            listen(&button, "click", move |event: web_sys::Event| {
                event.prevent_default();
                let session = Rc::clone(&session);
                spawn_local(async move {
                    let outcome = session.submit(tab).await;
                    tracing::debug!(?outcome, tab = tab.as_str(), "submission settled");
                });
            });
        }

        if let Some(button) = query(root, SEED_BUTTON_SELECTOR) {
            let session = Rc::clone(&panel.session);
            listen(&button, "click", move |event: web_sys::Event| {
                event.prevent_default();
                let session = Rc::clone(&session);
                spawn_local(async move {
                    let _ = session.seed().await;
                });
            });
        }
    }

    fn wire_protocol_switches(page: &Element) {
        for button in query_all(page, &format!("[{PROTOCOL_SWITCH_ATTRIBUTE}]")) {
            let Some(protocol) = button
                .get_attribute(PROTOCOL_SWITCH_ATTRIBUTE)
                .as_deref()
                .and_then(Protocol::from_query_value)
            else {
                continue;
            };
            listen(&button, "click", move |event: web_sys::Event| {
                event.prevent_default();
                dispatch_protocol_activated(protocol);
            });
        }
    }

    fn install_verbosity_handler(document: &Document) {
        let Some(checkbox) = document_query(document, VERBOSE_CHECKBOX_SELECTOR) else {
            return;
        };
        VERBOSE_TOGGLE_HANDLER.with(|slot| {
            if slot.borrow().is_some() {
                return;
            }
            let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |_event: web_sys::Event| {
                for panel in mounted_panels() {
                    panel.session.verbosity_changed();
                }
            }));
            let _ = checkbox
                .add_event_listener_with_callback("change", callback.as_ref().unchecked_ref());
            *slot.borrow_mut() = Some(callback);
        });
    }
