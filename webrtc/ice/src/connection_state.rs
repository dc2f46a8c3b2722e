//! ICE connection and gathering states.

/// Represents the ICE connection state.
///
/// New → Checking → Connected/Completed ↔ Disconnected → Failed or Closed.
/// Closed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Agent created, checks not started
    #[default]
    New,
    /// Checks are running and no pair has been selected
    Checking,
    /// A candidate pair has been selected
    Connected,
    /// Checks have completed on every pair
    Completed,
    /// No pair could be selected
    Failed,
    /// The selected pair went silent
    Disconnected,
    /// The agent was closed
    Closed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Completed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Checking => write!(f, "checking"),
            Self::Connected => write!(f, "connected"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Progress of candidate gathering. Gathering runs to completion while the
/// agent is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatheringState {
    #[default]
    New,
    Gathering,
    Complete,
}

impl std::fmt::Display for GatheringState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Gathering => write!(f, "gathering"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_new() {
        assert_eq!(ConnectionState::default(), ConnectionState::New);
        assert_eq!(GatheringState::default(), GatheringState::New);
    }

    #[test]
    fn test_display_outputs_correct_strings() {
        assert_eq!(ConnectionState::New.to_string(), "new");
        assert_eq!(ConnectionState::Checking.to_string(), "checking");
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(ConnectionState::Completed.to_string(), "completed");
        assert_eq!(ConnectionState::Failed.to_string(), "failed");
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
        assert_eq!(ConnectionState::Closed.to_string(), "closed");
        assert_eq!(GatheringState::Complete.to_string(), "complete");
    }

    #[test]
    fn test_is_connected() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(ConnectionState::Completed.is_connected());
        assert!(!ConnectionState::Disconnected.is_connected());
    }
}
