pub(crate) const PANEL_SELECTOR: &str = "[data-protocol-panel]";
pub(crate) const PANEL_PROTOCOL_ATTRIBUTE: &str = "data-protocol-panel";
pub(crate) const PANEL_CONFIG_ATTRIBUTE: &str = "data-console-config";
pub(crate) const PANEL_INITIAL_STATE_ATTRIBUTE: &str = "data-initial-state";
pub(crate) const PANEL_SEED_DEFINITIONS_ATTRIBUTE: &str = "data-seed-definitions";

pub(crate) const TAB_BUTTON_ATTRIBUTE: &str = "data-tab-button";
pub(crate) const TAB_PANEL_ATTRIBUTE: &str = "data-tab-panel";
pub(crate) const MODE_TOGGLE_ATTRIBUTE: &str = "data-mode-toggle";
pub(crate) const FIELD_ATTRIBUTE: &str = "data-field";
pub(crate) const SECRET_MODE_ATTRIBUTE: &str = "data-secret-mode";
pub(crate) const SUBMIT_ATTRIBUTE: &str = "data-submit";
pub(crate) const RESULT_ATTRIBUTE: &str = "data-result";
pub(crate) const RESULT_STATUS_SELECTOR: &str = "[data-result-status]";
pub(crate) const RESULT_MESSAGE_SELECTOR: &str = "[data-result-message]";
pub(crate) const RESULT_HINT_SELECTOR: &str = "[data-result-hint]";
pub(crate) const CREDENTIAL_SELECT_SELECTOR: &str = "select[data-credential-select]";
pub(crate) const DIRECTORY_STATUS_SELECTOR: &str = "[data-directory-status]";
pub(crate) const SEED_BUTTON_SELECTOR: &str = "[data-seed-button]";
pub(crate) const SEED_STATUS_SELECTOR: &str = "[data-seed-status]";
pub(crate) const CAP_MODE_SELECTOR: &str = "[data-field=\"mode\"]";
pub(crate) const CAP_HINT_SELECTOR: &str = "[data-cap-hint]";
pub(crate) const CSRF_INPUT_SELECTOR: &str = "input[name=\"_csrf\"]";
pub(crate) const PROTOCOL_SWITCH_ATTRIBUTE: &str = "data-protocol-switch";

pub(crate) const VERBOSE_CHECKBOX_SELECTOR: &str = "[data-testid=\"verbose-trace-checkbox\"]";
pub(crate) const TRACE_PANEL_SELECTOR: &str = "[data-testid=\"verbose-trace-panel\"]";
pub(crate) const TRACE_OPERATION_SELECTOR: &str = "[data-testid=\"verbose-trace-operation\"]";
pub(crate) const TRACE_CONTENT_SELECTOR: &str = "[data-testid=\"verbose-trace-content\"]";

pub(crate) const PROTOCOL_ACTIVATED_EVENT: &str = "operator:protocol-activated";
