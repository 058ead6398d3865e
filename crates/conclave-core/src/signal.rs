use serde::{Deserialize, Serialize};

/// The reason a session's round loop stopped.
///
/// Exactly one signal is produced per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationSignal {
    /// The round ceiling was reached.
    MaxRoundsReached,
    /// An agent reported that no further action is needed.
    NoFurtherActionAgentSelected,
    /// The most recent turn carried the configured completion marker.
    ExplicitCompletionMarkerSeen,
    /// The selection strategy declined to pick another speaker.
    SelectionStrategyReturnedNone,
    /// The caller cancelled the session.
    Cancelled,
}

impl TerminationSignal {
    /// Whether the session ended without reaching a natural conclusion.
    pub fn is_forced(&self) -> bool {
        matches!(
            self,
            TerminationSignal::MaxRoundsReached | TerminationSignal::Cancelled
        )
    }
}

impl std::fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationSignal::MaxRoundsReached => write!(f, "max_rounds_reached"),
            TerminationSignal::NoFurtherActionAgentSelected => {
                write!(f, "no_further_action_agent_selected")
            }
            TerminationSignal::ExplicitCompletionMarkerSeen => {
                write!(f, "explicit_completion_marker_seen")
            }
            TerminationSignal::SelectionStrategyReturnedNone => {
                write!(f, "selection_strategy_returned_none")
            }
            TerminationSignal::Cancelled => write!(f, "cancelled"),
        }
    }
}
