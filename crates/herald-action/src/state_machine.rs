//! Per-message processing state machine.
//!
//! Enforces the lifecycle of one incoming message:
//! Received -> Parsed -> Validated -> Dispatching -> Completed/Failed
//! Received/Parsed -> Failed (envelope rejected)

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    Received,
    Parsed,
    Validated,
    Dispatching,
    Completed,
    Failed,
}

impl MessageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageState::Completed | MessageState::Failed)
    }
}

impl fmt::Display for MessageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageState::Received => write!(f, "received"),
            MessageState::Parsed => write!(f, "parsed"),
            MessageState::Validated => write!(f, "validated"),
            MessageState::Dispatching => write!(f, "dispatching"),
            MessageState::Completed => write!(f, "completed"),
            MessageState::Failed => write!(f, "failed"),
        }
    }
}

/// Validate that a state transition is allowed.
///
/// Valid transitions:
/// - Received -> Parsed
/// - Received -> Failed (undecodable input)
/// - Parsed -> Validated
/// - Parsed -> Failed (bad envelope)
/// - Validated -> Dispatching
/// - Dispatching -> Completed
/// - Dispatching -> Failed
pub fn validate_transition(from: MessageState, to: MessageState) -> Result<(), ProtocolError> {
    let valid = matches!(
        (from, to),
        (MessageState::Received, MessageState::Parsed)
            | (MessageState::Received, MessageState::Failed)
            | (MessageState::Parsed, MessageState::Validated)
            | (MessageState::Parsed, MessageState::Failed)
            | (MessageState::Validated, MessageState::Dispatching)
            | (MessageState::Dispatching, MessageState::Completed)
            | (MessageState::Dispatching, MessageState::Failed)
    );

    if valid {
        Ok(())
    } else {
        Err(ProtocolError::InvalidTransition(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [MessageState; 6] = [
        MessageState::Received,
        MessageState::Parsed,
        MessageState::Validated,
        MessageState::Dispatching,
        MessageState::Completed,
        MessageState::Failed,
    ];

    #[test]
    fn test_happy_path() {
        assert!(validate_transition(MessageState::Received, MessageState::Parsed).is_ok());
        assert!(validate_transition(MessageState::Parsed, MessageState::Validated).is_ok());
        assert!(validate_transition(MessageState::Validated, MessageState::Dispatching).is_ok());
        assert!(validate_transition(MessageState::Dispatching, MessageState::Completed).is_ok());
    }

    #[test]
    fn test_envelope_failures() {
        assert!(validate_transition(MessageState::Received, MessageState::Failed).is_ok());
        assert!(validate_transition(MessageState::Parsed, MessageState::Failed).is_ok());
    }

    #[test]
    fn test_cannot_skip_validation() {
        assert!(validate_transition(MessageState::Parsed, MessageState::Dispatching).is_err());
        assert!(validate_transition(MessageState::Received, MessageState::Dispatching).is_err());
    }

    #[test]
    fn test_validated_cannot_fail_directly() {
        assert!(validate_transition(MessageState::Validated, MessageState::Failed).is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        for from in [MessageState::Completed, MessageState::Failed] {
            assert!(from.is_terminal());
            for to in ALL {
                assert!(validate_transition(from, to).is_err());
            }
        }
    }

    #[test]
    fn test_error_message_names_states() {
        let err = validate_transition(MessageState::Completed, MessageState::Parsed).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidTransition(MessageState::Completed, MessageState::Parsed)
        );
        let msg = err.to_string();
        assert!(msg.contains("completed"));
        assert!(msg.contains("parsed"));
    }

    #[test]
    fn test_all_valid_transitions_count() {
        let mut valid_count = 0;
        for from in ALL {
            for to in ALL {
                if validate_transition(from, to).is_ok() {
                    valid_count += 1;
                }
            }
        }
        assert_eq!(valid_count, 7);
    }
}
