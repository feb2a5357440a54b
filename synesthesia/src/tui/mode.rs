// state local to the tui; never reaches the middle layer
#[derive(Clone, Debug, Default)]
pub struct TuiState {
    pub show_help: bool, // full key list instead of the one-line hint
}
