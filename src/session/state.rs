//! Relay connection state machine.

/// Lifecycle state of the relay's single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection; the initial state and the state after any close.
    #[default]
    Closed,
    /// Open requested, waiting for the transport to report the outcome.
    Connecting,
    /// Connection established; envelopes may be sent.
    Open,
}

impl ConnectionState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Closed -> Connecting
    /// - Connecting -> Open
    /// - Connecting -> Closed (connect failed)
    /// - Open -> Closed
    /// - Open -> Connecting (explicit reopen replaces the connection)
    pub fn can_transition_to(&self, target: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (*self, target),
            (Closed, Connecting)
                | (Connecting, Open)
                | (Connecting, Closed)
                | (Open, Closed)
                | (Open, Connecting)
        )
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `true` if the transition happened; the state is unchanged otherwise.
    pub fn transition_to(&mut self, target: ConnectionState) -> bool {
        if self.can_transition_to(target) {
            *self = target;
            true
        } else {
            false
        }
    }

    /// Check if envelopes can be sent.
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_lifecycle() {
        let mut state = ConnectionState::Closed;
        assert!(state.transition_to(ConnectionState::Connecting));
        assert!(state.transition_to(ConnectionState::Open));
        assert!(state.is_open());
        assert!(state.transition_to(ConnectionState::Closed));
        assert_eq!(state, ConnectionState::Closed);
    }

    #[test]
    fn test_connect_failure() {
        let mut state = ConnectionState::Connecting;
        assert!(state.transition_to(ConnectionState::Closed));
    }

    #[test]
    fn test_invalid_closed_to_open() {
        let mut state = ConnectionState::Closed;
        assert!(!state.transition_to(ConnectionState::Open));
        assert_eq!(state, ConnectionState::Closed);
    }

    #[test]
    fn test_default() {
        assert_eq!(ConnectionState::default(), ConnectionState::Closed);
        assert!(!ConnectionState::Connecting.is_open());
    }
}
