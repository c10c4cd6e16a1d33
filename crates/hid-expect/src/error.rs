use thiserror::Error;

use crate::keys::{KeyAction, KeyId};

/// Keyboard matrix model failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MatrixError {
    /// Cell coordinates fall outside the matrix dimensions.
    #[error("cell ({row}, {col}) outside the matrix")]
    OutOfBounds {
        /// Targeted row.
        row: u8,
        /// Targeted column.
        col: u8,
    },
    /// The row/column intersection is not populated with a key.
    #[error("cell ({row}, {col}) is not populated")]
    AbsentCell {
        /// Targeted row.
        row: u8,
        /// Targeted column.
        col: u8,
    },
    /// A press hit a non-released cell or a release hit a released cell.
    #[error("invalid transition on cell ({row}, {col})")]
    InvalidTransition {
        /// Targeted row.
        row: u8,
        /// Targeted column.
        col: u8,
    },
}

/// Expectation engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExpectError {
    /// The keystroke contradicts the tracked pressed-key list.
    #[error("{action:?} of {key:?} is inconsistent with the pressed-key list")]
    InconsistentKeyState {
        /// Offending key.
        key: KeyId,
        /// Offending transition.
        action: KeyAction,
    },
    /// Matrix model rejected the keystroke.
    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

/// HID++ framing and pre-pairing failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HidppError {
    /// Payload length does not fit the selected report size.
    #[error("payload of {len} bytes does not fit a {kind} report")]
    PayloadOverflow {
        /// Offending payload length.
        len: usize,
        /// Report kind name.
        kind: &'static str,
    },
    /// Frame too short or carrying an unknown report identifier.
    #[error("malformed HID++ frame")]
    MalformedFrame,
    /// Function or software identifier exceeds its 4-bit field.
    #[error("nibble field value {0:#x} exceeds 4 bits")]
    NibbleOverflow(u8),
    /// Friendly-name chunk is not ASCII or exceeds the chunk size.
    #[error("friendly-name chunk is not a valid 16-byte ASCII chunk")]
    InvalidNameChunk,
    /// Pre-pairing command issued in a state that forbids it;
    /// maps to protocol error `NOT_ALLOWED` (0x05).
    #[error("pre-pairing command not allowed in the current state")]
    NotAllowed,
}

#[cfg(test)]
mod tests {
    use super::{ExpectError, HidppError, MatrixError};
    use crate::keys::{KeyAction, KeyId};

    #[test]
    fn matrix_error_converts_into_expect_error() {
        let err: ExpectError = MatrixError::AbsentCell { row: 1, col: 2 }.into();
        assert_eq!(err, ExpectError::Matrix(MatrixError::AbsentCell { row: 1, col: 2 }));
    }

    #[test]
    fn display_messages_carry_context() {
        let err = ExpectError::InconsistentKeyState {
            key: KeyId::KeyboardA,
            action: KeyAction::Break,
        };
        assert!(err.to_string().contains("KeyboardA"));
        assert!(HidppError::NotAllowed.to_string().contains("not allowed"));
    }
}
