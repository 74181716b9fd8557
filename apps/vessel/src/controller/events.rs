use shared::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerStatus {
    Idle,
    Busy { generation: u64 },
}

/// What the input surface should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiState {
    pub loading_indicator: bool,
    pub export_enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Busy {
        generation: u64,
    },
    Completed {
        generation: u64,
        objects: usize,
        wireframes: usize,
    },
    /// A newer cycle started before this one finished; its result was dropped.
    Discarded {
        generation: u64,
    },
    Failed {
        generation: u64,
        error: ApiError,
    },
    Ui(UiState),
}
