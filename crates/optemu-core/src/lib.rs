//! Optical sensor emulator control core.
//!
//! Compiles user-level motion intents into the compact micro-instruction
//! stream executed by the FPGA against the device under test, with
//! instruction compression, deferred state reconciliation, FIFO flow
//! control, and programmable-event-sequencer synchronization.

/// Error taxonomy for map lookups, control staging, and sequencing.
pub mod error;
pub use error::{ControlError, InstructionError, RegMapError, SequencerError};

/// Declarative sensor register-map tables.
pub mod regmap;
pub use regmap::{
    CmdBinding, CommandDesc, CompressedLayout, DeltaLayout, Limits, RegKind, Register,
    RegisterMap, EM12_MAP, EM16_MAP,
};

/// Micro-instruction model and bit-exact FPGA word codec.
pub mod instruction;
pub use instruction::{
    sign_extend_3bits, Instruction, CMP_DELTA_MAX, CMP_DELTA_MIN, CMP_REPEAT_MAX, CMP_SKIP_MAX,
    RAW_CMD_IDX_MAX,
};

/// Sensor emulator state snapshots and diffing.
pub mod state;
pub use state::{reg_state_diff, MaskedRegVal, RegCell, RegVal, SensorState};

/// Low-level register-intent to instruction translation.
pub mod low_level;
pub use low_level::{signed_deltas, LowLevelController};

/// RAW to COMPRESSED instruction rewrite.
pub mod compress;
pub use compress::compress_instructions;

/// High-level action staging.
pub mod high_level;
pub use high_level::{Action, HighLevelController, SensorButton};

/// Buffer flushing, FIFO flow control, and PES synchronization.
pub mod sequencer;
pub use sequencer::{
    ActionEvent, ControlRequest, FpgaTransport, MotionSample, PesOp, PesSequence, ResumeEvent,
    SensorModelSim, SequencerBridge, StatusWord, DEFAULT_BUFFER_SIZE, DEFAULT_FIFO_SIZE,
    DEFAULT_SETUP_TICKS,
};

/// DPI calibration phase tracking.
pub mod calibration;
pub use calibration::{
    CalibrationDeadlines, CalibrationNotification, CalibrationPhase, DpiCalibration,
    CALIBRATION_FAILED,
};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
