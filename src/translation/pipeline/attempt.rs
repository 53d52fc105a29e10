/*!
 * Per-attempt state machine.
 *
 * `Pending → Running(0) → … → Running(n-1) → Succeeded`, or `Failed` from
 * any running stage. `n` is the number of planned stages, which already
 * accounts for fast mode.
 */

/// Progress of one attempt through the stages of a step set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttemptState {
    #[default]
    Pending,
    /// Running the stage with this index
    Running(usize),
    Succeeded,
    Failed,
}

impl AttemptState {
    /// Move to the next stage, or to `Succeeded` after the last planned one
    pub fn advance(self, planned_stages: usize) -> Self {
        match self {
            Self::Pending if planned_stages == 0 => Self::Succeeded,
            Self::Pending => Self::Running(0),
            Self::Running(stage) if stage + 1 < planned_stages => Self::Running(stage + 1),
            Self::Running(_) => Self::Succeeded,
            terminal => terminal,
        }
    }

    /// Abort the attempt; terminal states are kept
    pub fn fail(self) -> Self {
        match self {
            Self::Pending | Self::Running(_) => Self::Failed,
            terminal => terminal,
        }
    }

    /// Index of the running stage
    pub fn stage(&self) -> Option<usize> {
        match self {
            Self::Running(stage) => Some(*stage),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}
