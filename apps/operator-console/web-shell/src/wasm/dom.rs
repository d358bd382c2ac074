use super::*;

    pub(super) fn query(root: &Element, selector: &str) -> Option<Element> {
        root.query_selector(selector).ok().flatten()
    }

    pub(super) fn query_all(root: &Element, selector: &str) -> Vec<Element> {
        let Ok(nodes) = root.query_selector_all(selector) else {
            return Vec::new();
        };
        (0..nodes.length())
            .filter_map(|index| nodes.item(index))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }

    pub(super) fn document_query(document: &Document, selector: &str) -> Option<Element> {
        document.query_selector(selector).ok().flatten()
    }

    pub(super) fn element_value(element: &Element) -> Option<String> {
        if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
            if input.type_() == "checkbox" {
                return Some(input.checked().to_string());
            }
            return Some(input.value());
        }
        if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
            return Some(select.value());
        }
        if let Some(textarea) = element.dyn_ref::<HtmlTextAreaElement>() {
            return Some(textarea.value());
        }
        None
    }

    pub(super) fn set_element_value(element: &Element, value: &str) {
        if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
            if input.type_() == "checkbox" {
                input.set_checked(value.eq_ignore_ascii_case("true"));
            } else {
                input.set_value(value);
            }
        } else if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
            select.set_value(value);
        } else if let Some(textarea) = element.dyn_ref::<HtmlTextAreaElement>() {
            textarea.set_value(value);
        }
    }

    pub(super) fn set_hidden(element: &Element, hidden: bool) {
        if hidden {
            let _ = element.set_attribute("hidden", "hidden");
        } else {
            let _ = element.remove_attribute("hidden");
        }
    }

    pub(super) fn set_optional_attribute(element: &Element, name: &str, value: Option<&str>) {
        match value {
            Some(value) => {
                let _ = element.set_attribute(name, value);
            }
            None => {
                let _ = element.remove_attribute(name);
            }
        }
    }

    fn set_text(element: Option<Element>, text: &str) {
        if let Some(element) = element {
            element.set_text_content(Some(text));
        }
    }

    fn set_style(element: &Element, property: &str, value: Option<&str>) {
        let Some(element) = element.dyn_ref::<HtmlElement>() else {
            return;
        };
        let style = element.style();
        let _ = match value {
            Some(value) => style.set_property(property, value),
            None => style.remove_property(property).map(|_| ()),
        };
    }

    /// Form reads scoped to one panel root.
    pub(super) struct DomFieldSource {
        pub(super) root: Element,
    }

    impl FieldSource for DomFieldSource {
        fn read_field(&self, name: &str) -> Option<String> {
            query(&self.root, &field_selector(name)).and_then(|element| element_value(&element))
        }

        fn csrf_token(&self) -> Option<String> {
            let input = query(&self.root, CSRF_INPUT_SELECTOR).or_else(|| {
                web_sys::window()
                    .and_then(|window| window.document())
                    .and_then(|document| document_query(&document, CSRF_INPUT_SELECTOR))
            })?;
            element_value(&input)
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty())
        }
    }

    pub(super) struct DomVerbosityToggle {
        pub(super) checkbox: HtmlInputElement,
    }

    impl VerbosityToggle for DomVerbosityToggle {
        fn is_enabled(&self) -> bool {
            self.checkbox.checked()
        }
    }

    /// Applies panel effects to the panel subtree and the shared trace panel.
    pub(super) struct DomEffectSink {
        pub(super) root: Element,
        pub(super) document: Document,
    }

    impl EffectSink for DomEffectSink {
        fn apply(&mut self, effect: PanelEffect) {
            match effect {
                PanelEffect::ActivateTab(tab) => self.activate_tab(tab),
                PanelEffect::ShowModeSection { tab, mode } => self.show_mode_section(tab, mode),
                PanelEffect::SecretField(presentation) => {
                    let markup = SecretFieldMarkup::for_presentation(&presentation);
                    self.apply_secret_field(presentation.field, &markup);
                }
                PanelEffect::SubmitAffordance(affordance) => {
                    for button in query_all(&self.root, &tab_selector(SUBMIT_ATTRIBUTE, affordance.tab)) {
                        button.set_text_content(Some(affordance.label));
                        set_optional_attribute(&button, "disabled", affordance.disabled.then_some("disabled"));
                    }
                }
                PanelEffect::SubmitBusy { tab, busy } => {
                    for button in query_all(&self.root, &tab_selector(SUBMIT_ATTRIBUTE, tab)) {
                        set_optional_attribute(&button, "aria-busy", busy.then_some("true"));
                    }
                }
                PanelEffect::Trace(command) => self.apply_trace(command),
                PanelEffect::History(write) => write_history(&write),
                PanelEffect::ResultReset(tab) => {
                    if let Some(result) = query(&self.root, &tab_selector(RESULT_ATTRIBUTE, tab)) {
                        set_hidden(&result, true);
                        set_text(query(&result, RESULT_STATUS_SELECTOR), "");
                        set_text(query(&result, RESULT_MESSAGE_SELECTOR), "");
                        set_text(query(&result, RESULT_HINT_SELECTOR), "");
                    }
                }
                PanelEffect::Result(message) => {
                    let Some(result) = query(&self.root, &tab_selector(RESULT_ATTRIBUTE, message.tab)) else {
                        return;
                    };
                    let _ = result.set_attribute("data-tone", tone_attribute(message.tone));
                    set_text(query(&result, RESULT_STATUS_SELECTOR), &message.status);
                    set_text(
                        query(&result, RESULT_MESSAGE_SELECTOR),
                        message.message.as_deref().unwrap_or_default(),
                    );
                    if let Some(hint) = query(&result, RESULT_HINT_SELECTOR) {
                        set_hidden(&hint, message.hint.is_none());
                        hint.set_text_content(message.hint.as_deref());
                    }
                    set_hidden(&result, false);
                }
                PanelEffect::DirectoryStatus(text) => {
                    set_text(query(&self.root, DIRECTORY_STATUS_SELECTOR), &text);
                }
                PanelEffect::CredentialOptions { options, selected } => {
                    self.replace_credential_options(&options, selected.as_deref());
                }
                PanelEffect::FieldValues(values) => {
                    for (name, value) in values {
                        if let Some(element) = query(&self.root, &field_selector(&name)) {
                            set_element_value(&element, &value);
                        }
                    }
                }
                PanelEffect::CustomerInputs(gate) => {
                    for (name, enabled) in gate.fields() {
                        if let Some(element) = query(&self.root, &field_selector(name)) {
                            set_optional_attribute(&element, "disabled", (!enabled).then_some("disabled"));
                            if !enabled {
                                set_element_value(&element, "");
                            }
                        }
                    }
                    set_text(query(&self.root, CAP_HINT_SELECTOR), gate.mode.hint());
                }
                PanelEffect::SeedStatus(text) => {
                    if let Some(status) = query(&self.root, SEED_STATUS_SELECTOR) {
                        set_hidden(&status, text.is_empty());
                        status.set_text_content(Some(&text));
                    }
                }
            }
        }
    }

    impl DomEffectSink {
        fn activate_tab(&self, tab: PanelTab) {
            for candidate in [PanelTab::Evaluate, PanelTab::Replay] {
                let active = candidate == tab;
                for button in query_all(&self.root, &tab_selector(TAB_BUTTON_ATTRIBUTE, candidate)) {
                    let _ = button.set_attribute("aria-selected", if active { "true" } else { "false" });
                    let _ = button.class_list().toggle_with_force("is-active", active);
                }
                for section in query_all(&self.root, &tab_selector(TAB_PANEL_ATTRIBUTE, candidate)) {
                    set_hidden(&section, !active);
                }
            }
        }

        fn show_mode_section(&self, tab: PanelTab, mode: CredentialMode) {
            for candidate in [CredentialMode::Stored, CredentialMode::Inline] {
                for section in query_all(&self.root, &mode_section_selector(tab, candidate)) {
                    set_hidden(&section, candidate != mode);
                }
            }
            let toggle = format!(
                "input[{MODE_TOGGLE_ATTRIBUTE}=\"{}\"][value=\"{}\"]",
                tab.as_str(),
                mode.as_str()
            );
            if let Some(radio) = query(&self.root, &toggle).and_then(|element| element.dyn_into::<HtmlInputElement>().ok()) {
                radio.set_checked(true);
            }
        }

        /// Never touches the input's value.
        fn apply_secret_field(&self, field: &str, markup: &SecretFieldMarkup) {
            if let Some(input) = query(&self.root, &field_selector(field)) {
                let _ = input.set_attribute(SECRET_MODE_ATTRIBUTE, markup.secret_mode);
                for (name, value) in markup.input_attributes() {
                    set_optional_attribute(&input, name, value);
                }
                set_style(&input, "pointer-events", markup.pointer_events());
            }
            if let Some(mask) = query(&self.root, &secret_mask_selector(field)) {
                let _ = mask.remove_attribute("hidden");
                set_style(&mask, "display", markup.mask_display);
                if let Some(text) = markup.mask_text.as_deref() {
                    mask.set_text_content(Some(text));
                }
            }
        }

        fn replace_credential_options(&self, options: &[(String, String)], selected: Option<&str>) {
            for select in query_all(&self.root, CREDENTIAL_SELECT_SELECTOR) {
                let Ok(select) = select.dyn_into::<HtmlSelectElement>() else {
                    continue;
                };
                select.set_inner_html("");
                if let Ok(placeholder) = HtmlOptionElement::new_with_text_and_value("Select a credential", "") {
                    let _ = select.append_child(&placeholder);
                }
                for (value, label) in options {
                    if let Ok(option) = HtmlOptionElement::new_with_text_and_value(label, value) {
                        let _ = select.append_child(&option);
                    }
                }
                select.set_value(selected.unwrap_or_default());
                set_optional_attribute(&select, "disabled", options.is_empty().then_some("disabled"));
            }
        }

        fn apply_trace(&self, command: TraceCommand) {
            let Some(panel) = document_query(&self.document, TRACE_PANEL_SELECTOR) else {
                return;
            };
            match command {
                TraceCommand::Clear => {
                    let _ = panel.set_attribute("data-trace-visible", "false");
                    let _ = panel.set_attribute("data-trace-variant", "info");
                    set_hidden(&panel, true);
                    set_text(query(&panel, TRACE_OPERATION_SELECTOR), "\u{2014}");
                    set_text(query(&panel, TRACE_CONTENT_SELECTOR), "");
                }
                TraceCommand::Render { trace, variant } => {
                    let variant = match variant {
                        TraceVariant::Info => "info",
                        TraceVariant::Error => "error",
                    };
                    let _ = panel.set_attribute("data-trace-variant", variant);
                    let _ = panel.set_attribute("data-trace-visible", "true");
                    set_text(query(&panel, TRACE_OPERATION_SELECTOR), &trace.operation);
                    set_text(query(&panel, TRACE_CONTENT_SELECTOR), &format_trace(&trace));
                    set_hidden(&panel, false);
                }
            }
        }
    }
