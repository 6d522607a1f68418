use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::roster::EncounterRuntime;

#[derive(tui_dispatch::Action, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[action(infer_categories)]
pub enum Action {
    Init,
    UiTerminalResize(u16, u16),
    Tick,
    Quit,

    // The whole battle is driven by four abstract inputs.
    MenuUp,
    MenuDown,
    MenuConfirm,
    MenuCancel,

    // Encounter loading
    EncounterDidLoad(Box<EncounterRuntime>),
    EncounterDidError { error: String },
}
