use thiserror::Error;

use crate::regmap::RegKind;

/// Register-map lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegMapError {
    /// No register is declared at this address.
    #[error("unknown register address {addr:#04x}")]
    UnknownRegister {
        /// Offending register address.
        addr: u8,
    },
    /// No register is declared under this name.
    #[error("unknown register name `{0}`")]
    UnknownRegisterName(String),
    /// No command is declared under this name.
    #[error("unknown command name `{0}`")]
    UnknownCommandName(String),
}

/// Controller-level validation failures raised while staging register intent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    /// Lookup against the register map failed.
    #[error(transparent)]
    Map(#[from] RegMapError),
    /// A staged value does not fit the declared signed or unsigned range.
    #[error("{what} value {value} out of range [{min}, {max}]")]
    ValueOutOfRange {
        /// Human-readable name of the rejected quantity.
        what: &'static str,
        /// Rejected value.
        value: i32,
        /// Inclusive lower bound.
        min: i32,
        /// Inclusive upper bound.
        max: i32,
    },
    /// The operation is not defined for the register's access class.
    #[error("register {addr:#04x} is {kind:?}: {operation} is not defined for it")]
    TypeMismatch {
        /// Offending register address.
        addr: u8,
        /// Declared access class of the register.
        kind: RegKind,
        /// Operation that was attempted.
        operation: &'static str,
    },
    /// The sensor map declares no register backing this action.
    #[error("sensor does not support the {0} action")]
    UnsupportedAction(&'static str),
}

/// Micro-instruction word encode/decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InstructionError {
    /// Raw command index exceeds the 5-bit field of the instruction word.
    #[error("raw command index {0:#04x} exceeds the 5-bit field")]
    CmdIdxOverflow(u8),
    /// Compressed delta does not fit the 3-bit signed field.
    #[error("compressed delta {0} outside the 3-bit signed range [-4, 3]")]
    DeltaOverflow(i16),
    /// Compressed skip count does not fit its 3-bit field.
    #[error("compressed skip {0} exceeds the 3-bit field")]
    SkipOverflow(u8),
    /// Compressed repeat count does not fit its 3-bit field.
    #[error("compressed repeat {0} exceeds the 3-bit field")]
    RepeatOverflow(u8),
    /// The word carries a mode tag that is not assigned.
    #[error("unassigned instruction mode tag in word {0:#06x}")]
    UnassignedTag(u16),
}

/// Sequencer bridge and transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencerError {
    /// A PES wait did not observe its resume event within the tick budget.
    #[error("wait for {event} timed out after {ticks} ticks")]
    WaitTimeout {
        /// Name of the resume event that was awaited.
        event: &'static str,
        /// Number of polling ticks elapsed before giving up.
        ticks: u32,
    },
    /// The staging buffer cannot accept more instructions.
    #[error("staging buffer full ({capacity} instructions)")]
    BufferFull {
        /// Capacity of the staging buffer.
        capacity: usize,
    },
    /// A status reply failed its sanity checks.
    #[error("unexpected module status after {operation}: {detail}")]
    StatusCheck {
        /// Control operation whose reply was rejected.
        operation: &'static str,
        /// Short description of the violated expectation.
        detail: &'static str,
    },
    /// An instruction word failed to encode or decode in transport.
    #[error(transparent)]
    Codec(#[from] InstructionError),
}
