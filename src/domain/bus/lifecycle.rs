//! Connection lifecycle states and close reasons.

use std::fmt;

use crate::domain::foundation::StateMachine;

/// Lifecycle of a single client connection.
///
/// ```text
/// Connecting ──► Authenticated ──► Active ──► Closing ──► Closed
///      │               │                         ▲
///      └───────────────┴─────────────────────────┘
/// ```
///
/// Only `Active` connections may appear in the registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Socket accepted, token not yet checked.
    Connecting,
    /// Token validated, not yet admitted.
    Authenticated,
    /// Admitted into the registry; frames are being processed.
    Active,
    /// Being torn down; the connection task has been told why.
    Closing,
    /// Record released from the registry; its queues are gone.
    Closed,
}

impl StateMachine for ConnectionState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ConnectionState::*;
        matches!(
            (self, target),
            (Connecting, Authenticated)
                | (Connecting, Closing)
                | (Authenticated, Active)
                | (Authenticated, Closing)
                | (Active, Closing)
                | (Closing, Closed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConnectionState::*;
        match self {
            Connecting => vec![Authenticated, Closing],
            Authenticated => vec![Active, Closing],
            Active => vec![Closing],
            Closing => vec![Closed],
            Closed => vec![],
        }
    }
}

/// Why a connection was closed.
///
/// Each reason maps to a WebSocket close code and a stable reason string so
/// that closes can be told apart in client logs and server telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// Missing, malformed or expired token.
    AuthFailed,
    /// Malformed frame, invalid channel name or abuse threshold exceeded.
    ProtocolError,
    /// No liveness acknowledgment within the timeout window.
    LivenessTimeout,
    /// Outbound queue full or transport write failed.
    SendFailed,
    /// The broker is shutting down.
    ServerShutdown,
    /// The client closed the socket.
    ClientClosed,
    /// Registry invariant violated while admitting the connection.
    InternalError,
}

impl CloseReason {
    /// WebSocket close code sent in the close frame.
    pub fn code(&self) -> u16 {
        match self {
            CloseReason::ClientClosed => 1000,
            CloseReason::ServerShutdown => 1001,
            CloseReason::InternalError => 1011,
            CloseReason::AuthFailed => 4001,
            CloseReason::ProtocolError => 4002,
            CloseReason::LivenessTimeout => 4003,
            CloseReason::SendFailed => 4004,
        }
    }

    /// Reason string sent in the close frame.
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::AuthFailed => "auth_failed",
            CloseReason::ProtocolError => "protocol_error",
            CloseReason::LivenessTimeout => "liveness_timeout",
            CloseReason::SendFailed => "send_failed",
            CloseReason::ServerShutdown => "server_shutdown",
            CloseReason::ClientClosed => "client_closed",
            CloseReason::InternalError => "internal_error",
        }
    }

    /// Whether the server should send a close frame for this reason.
    ///
    /// A client that closed (or vanished) is not owed one.
    pub fn server_initiated(&self) -> bool {
        !matches!(self, CloseReason::ClientClosed)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_valid() {
        let state = ConnectionState::Connecting
            .transition_to(ConnectionState::Authenticated)
            .and_then(|s| s.transition_to(ConnectionState::Active))
            .and_then(|s| s.transition_to(ConnectionState::Closing))
            .and_then(|s| s.transition_to(ConnectionState::Closed));
        assert_eq!(state, Ok(ConnectionState::Closed));
    }

    #[test]
    fn rejected_connection_can_close_before_activation() {
        assert!(ConnectionState::Connecting.can_transition_to(&ConnectionState::Closing));
        assert!(ConnectionState::Authenticated.can_transition_to(&ConnectionState::Closing));
    }

    #[test]
    fn cannot_skip_authentication() {
        assert!(ConnectionState::Connecting
            .transition_to(ConnectionState::Active)
            .is_err());
    }

    #[test]
    fn closed_is_terminal() {
        assert!(ConnectionState::Closed.is_terminal());
        assert!(!ConnectionState::Closing.is_terminal());
    }

    #[test]
    fn close_codes_are_distinct() {
        let reasons = [
            CloseReason::AuthFailed,
            CloseReason::ProtocolError,
            CloseReason::LivenessTimeout,
            CloseReason::SendFailed,
            CloseReason::ServerShutdown,
            CloseReason::ClientClosed,
            CloseReason::InternalError,
        ];
        let codes: std::collections::HashSet<u16> = reasons.iter().map(|r| r.code()).collect();
        assert_eq!(codes.len(), reasons.len());
    }

    #[test]
    fn reason_strings_match_observability_names() {
        assert_eq!(CloseReason::AuthFailed.to_string(), "auth_failed");
        assert_eq!(CloseReason::ProtocolError.to_string(), "protocol_error");
        assert_eq!(CloseReason::LivenessTimeout.to_string(), "liveness_timeout");
        assert_eq!(CloseReason::ServerShutdown.to_string(), "server_shutdown");
        assert_eq!(CloseReason::ClientClosed.to_string(), "client_closed");
    }

    #[test]
    fn client_close_is_not_server_initiated() {
        assert!(!CloseReason::ClientClosed.server_initiated());
        assert!(CloseReason::LivenessTimeout.server_initiated());
    }
}
