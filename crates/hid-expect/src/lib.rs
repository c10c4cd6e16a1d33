//! HID keystroke expectation engine.
//!
//! Deterministic model of the HID reports a device under test must emit
//! for a stream of logical make/break events: modifier coalescing,
//! consumer slot allocation, OS-variant remapping, ghost-key matrix
//! physics, and the force-release side effects of virtual switch keys.
//! A companion module carries the HID++ envelope and pre-pairing wire
//! layouts used by the surrounding harness.

/// Error taxonomy for the matrix, the engine, and HID++ framing.
pub mod error;
pub use error::{ExpectError, HidppError, MatrixError};

/// Logical key identifiers and keystroke transitions.
pub mod keys;
pub use keys::{KeyAction, KeyId};

/// HID usage codes and modifier masks.
pub mod usage;

/// Byte-exact HID report models.
pub mod report;
pub use report::{
    ConsumerReport, KeyboardReport, MouseReport, Report, ReportClass, CONSUMER_REPORT_LEN,
    KEYBOARD_KEYCODE_SLOTS, KEYBOARD_REPORT_LEN, MOUSE_REPORT_LEN,
};

/// Per-OS HID translation table.
pub mod variants;
pub use variants::{resolve, Field, KeyBehavior, OsSelector, OsVariant, VariantEntry};

/// Keyboard matrix model with ghost-key classification.
pub mod matrix;
pub use matrix::{CellState, GhostKind, GhostMatrix, PressOutcome, ReleaseOutcome};

/// Deterministic HID report expectation engine.
pub mod engine;
pub use engine::{EngineConfig, KeyExpectationEngine};

/// HID++ envelope and pre-pairing wire layouts.
pub mod hidpp;
pub use hidpp::{
    Envelope, FriendlyNameChunk, PrepairingRecord, PrepairingSession, ReportKind,
    ERR_NOT_ALLOWED, LONG_REPORT_ID, LONG_REPORT_LEN, PREPAIRING_FEATURE_ID, SHORT_REPORT_ID,
    SHORT_REPORT_LEN,
};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
