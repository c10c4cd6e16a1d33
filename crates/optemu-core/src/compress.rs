//! RAW to COMPRESSED instruction rewrite.
//!
//! A compressed instruction can replace the delta/skip/repeat related RAW
//! writes of one state update when:
//!
//! - at least two compressible commands are staged (replacing a single
//!   RAW write saves nothing),
//! - the full signed delta values and the skip/repeat counts fit the
//!   sensor's compressed layout,
//! - a lift write is folded only when it can be represented entirely by
//!   the compressed lift bit.
//!
//! When any condition fails the input RAW list is returned unchanged.
//! The rewrite never touches register-value tracking: the current state
//! cells already reflect the implied byte values.

use crate::instruction::Instruction;
use crate::low_level::signed_deltas;
use crate::regmap::{CmdBinding, RegisterMap, LIFT_LIFTED};
use crate::state::{RegCell, SensorState};

/// Lift feature status derived from the masked lift register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LiftStatus {
    /// Lift status as the firmware would read it.
    lifted: bool,
    /// True when the lift cell carries nothing but the lift bit, so its
    /// RAW writes can be absorbed by the compressed instruction.
    foldable: bool,
    set_cmd: u8,
    clr_cmd: u8,
}

fn lift_status(map: &RegisterMap, state: &SensorState) -> Option<LiftStatus> {
    let cell = state.cell(map.lift_addr)?;
    let RegCell::Masked(masked) = cell else {
        return None;
    };
    let CmdBinding::Masked { set, clr } = map.reg2cmd(map.lift_addr).ok()? else {
        return None;
    };
    Some(LiftStatus {
        lifted: masked.set_mask & LIFT_LIFTED != 0,
        foldable: masked.set_mask & !LIFT_LIFTED == 0 && masked.clr_mask & !LIFT_LIFTED == 0,
        set_cmd: set,
        clr_cmd: clr,
    })
}

/// Rewrites `instructions` with one compressed instruction when the
/// current state is eligible; otherwise returns the input unchanged.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn compress_instructions(
    map: &RegisterMap,
    state: &SensorState,
    instructions: Vec<Instruction>,
) -> Vec<Instruction> {
    let compressible_staged = state
        .cmds()
        .iter()
        .filter(|(cmd_idx, _)| map.is_compressible_cmd(*cmd_idx))
        .count();
    if compressible_staged < 2 {
        return instructions;
    }

    let (dx, dy) = signed_deltas(map, state);
    let lift = lift_status(map, state);
    let lifted = lift.is_some_and(|status| status.lifted);
    let skip = state.staged_cmd(map.skip_cmd).unwrap_or(0);
    let repeat = state.staged_cmd(map.repeat_cmd).unwrap_or(0);

    if !map.compressed.contains(dx, dy, skip, repeat) {
        return instructions;
    }

    let mut rewritten: Vec<Instruction> = instructions
        .into_iter()
        .filter(|instr| match *instr {
            Instruction::Raw { cmd_idx, .. } => {
                if map.is_compressible_cmd(cmd_idx) {
                    return false;
                }
                // Absorb the lift write only when the compressed lift bit
                // carries the whole register update.
                if let Some(status) = lift {
                    if status.foldable && (cmd_idx == status.set_cmd || cmd_idx == status.clr_cmd)
                    {
                        return false;
                    }
                }
                true
            }
            Instruction::Nop { .. } | Instruction::Compressed { .. } => true,
        })
        .collect();

    rewritten.push(Instruction::Compressed {
        dx: dx as i8,
        dy: dy as i8,
        lift: lifted,
        skip,
        repeat,
    });
    rewritten
}
