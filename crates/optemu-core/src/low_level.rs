//! Low-level control: register intent to micro-instruction translation.
//!
//! The controller keeps the previously committed state and the state
//! being built. Finalizing resolves the register diff into the minimal
//! command sequence, optionally compresses it, and marks the frame
//! terminator. No-op writes never reach the instruction stream.

use crate::compress::compress_instructions;
use crate::error::ControlError;
use crate::instruction::Instruction;
use crate::regmap::{CmdBinding, RegKind, RegisterMap};
use crate::state::{reg_state_diff, RegCell, SensorState};

/// Reads the full signed delta-X/Y pair out of a state's delta registers.
#[must_use]
pub fn signed_deltas(map: &RegisterMap, state: &SensorState) -> (i16, i16) {
    map.delta.decode(|addr| state.direct_value(addr).unwrap_or(0))
}

/// Low-level controller over one sensor register map.
#[derive(Debug, Clone)]
pub struct LowLevelController {
    map: &'static RegisterMap,
    previous: SensorState,
    current: SensorState,
    /// Enables the RAW to COMPRESSED rewrite whenever eligible.
    pub compress: bool,
}

impl LowLevelController {
    /// Creates a controller with both states at power-on defaults.
    #[must_use]
    pub fn new(map: &'static RegisterMap) -> Self {
        let previous = SensorState::from_map(map);
        let current = previous.next();
        Self { map, previous, current, compress: true }
    }

    /// Reinitializes both states and re-enables compression.
    pub fn reset(&mut self) {
        self.previous = SensorState::from_map(self.map);
        self.current = self.previous.next();
        self.compress = true;
    }

    /// Register map driving this controller.
    #[must_use]
    pub const fn map(&self) -> &'static RegisterMap {
        self.map
    }

    /// Last committed state.
    #[must_use]
    pub const fn previous_state(&self) -> &SensorState {
        &self.previous
    }

    /// State currently being built.
    #[must_use]
    pub const fn current_state(&self) -> &SensorState {
        &self.current
    }

    /// Records the intent to set the given bits of a register.
    ///
    /// For a direct register the value replaces the cell content under
    /// `mask`. For a masked register, `Some(value)` stages set/clear
    /// forcing under `mask` while `None` drops all forcing under `mask`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Map`] for an unmapped address and
    /// [`ControlError::TypeMismatch`] for a clear-mask operation on a
    /// direct register.
    pub fn update_reg(
        &mut self,
        addr: u8,
        value: Option<u8>,
        mask: u8,
    ) -> Result<(), ControlError> {
        let reg = self.map.reg(addr)?;
        let cell = self
            .current
            .cell(addr)
            .ok_or(crate::error::RegMapError::UnknownRegister { addr })?;

        let updated = match (reg.kind, cell) {
            (RegKind::Direct, RegCell::Direct(reg_val)) => {
                let Some(value) = value else {
                    return Err(ControlError::TypeMismatch {
                        addr,
                        kind: RegKind::Direct,
                        operation: "clear-mask",
                    });
                };
                RegCell::Direct(reg_val.write(value, mask))
            }
            (RegKind::Masked, RegCell::Masked(masked)) => match value {
                Some(value) => RegCell::Masked(masked.write(value, mask)),
                None => RegCell::Masked(masked.clear(mask)),
            },
            (kind, _) => {
                return Err(ControlError::TypeMismatch { addr, kind, operation: "update" })
            }
        };

        if Some(updated) != self.current.cell(addr) {
            self.current.set_cell(addr, updated);
        }
        Ok(())
    }

    /// Stages a command value directly, bypassing register-state
    /// deduplication. Used for per-update directives such as skip and
    /// repeat counts.
    pub fn stage_command(&mut self, cmd_idx: u8, cmd_val: u8) {
        self.current.stage_cmd(cmd_idx, cmd_val);
    }

    /// Resolves pending register writes into the state's instruction
    /// list.
    ///
    /// The diff against the previous state yields one write command per
    /// changed direct register and a set/clear command pair per changed
    /// masked register (set before clear). When compression is enabled
    /// the RAW list is rewritten where eligible. An empty update
    /// produces one send-flagged NOP; otherwise the last instruction
    /// carries the send flag.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::TypeMismatch`] when a cell shape does not
    /// match its declared register class.
    pub fn finalize_state(&mut self) -> Result<(), ControlError> {
        for (addr, p_cell, c_cell) in reg_state_diff(&self.previous, &self.current) {
            let binding = self.map.reg2cmd(addr)?;
            match (binding, p_cell, c_cell) {
                (CmdBinding::Direct(idx), RegCell::Direct(prev), RegCell::Direct(curr)) => {
                    if prev.value != curr.value {
                        self.current.stage_cmd(idx, curr.value);
                    }
                }
                (
                    CmdBinding::Masked { set, clr },
                    RegCell::Masked(prev),
                    RegCell::Masked(curr),
                ) => {
                    if prev.set_mask != curr.set_mask {
                        self.current.stage_cmd(set, curr.set_mask);
                    }
                    if prev.clr_mask != curr.clr_mask {
                        self.current.stage_cmd(clr, curr.clr_mask);
                    }
                }
                _ => {
                    let kind = self.map.reg(addr)?.kind;
                    return Err(ControlError::TypeMismatch { addr, kind, operation: "finalize" });
                }
            }
        }

        let mut instructions: Vec<Instruction> = self
            .current
            .cmds()
            .iter()
            .map(|&(cmd_idx, cmd_val)| Instruction::Raw { cmd_idx, cmd_val, send: false })
            .collect();

        if self.compress {
            instructions = compress_instructions(self.map, &self.current, instructions);
        }

        if instructions.is_empty() {
            instructions.push(Instruction::Nop { send: false });
        }

        if let Some(last) = instructions.last_mut() {
            last.set_send(true);
        }

        self.current.set_instructions(instructions);
        Ok(())
    }

    /// Drains the finalized instructions of the current state for the
    /// caller to append to the module buffer.
    pub fn commit_state(&mut self) -> Vec<Instruction> {
        self.current.take_instructions()
    }

    /// Promotes the current state to previous and starts a fresh one
    /// carrying the register values forward.
    pub fn init_next_state(&mut self) {
        let next = self.current.next();
        self.previous = core::mem::replace(&mut self.current, next);
    }

    /// Register differences between the previous and current states.
    #[must_use]
    pub fn reg_state_diff(&self) -> Vec<(u8, RegCell, RegCell)> {
        reg_state_diff(&self.previous, &self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::{signed_deltas, LowLevelController};
    use crate::error::{ControlError, RegMapError};
    use crate::instruction::Instruction;
    use crate::regmap::{RegKind, EM12_MAP, EM16_MAP, LIFT_LIFTED, POWER_FORCE_REST2};
    use crate::state::SensorState;

    fn finalize_cycle(ll: &mut LowLevelController) -> Vec<Instruction> {
        ll.finalize_state().expect("finalize");
        let instructions = ll.commit_state();
        ll.init_next_state();
        instructions
    }

    #[test]
    fn direct_register_change_emits_one_send_flagged_write() {
        let mut ll = LowLevelController::new(&EM12_MAP);
        ll.compress = false;
        ll.update_reg(0x00, Some(0x42), 0xFF).unwrap();

        let instructions = finalize_cycle(&mut ll);
        assert_eq!(
            instructions,
            vec![Instruction::Raw { cmd_idx: 0x00, cmd_val: 0x42, send: true }]
        );
    }

    #[test]
    fn unchanged_write_is_deduplicated_into_a_nop() {
        let mut ll = LowLevelController::new(&EM12_MAP);
        ll.compress = false;
        ll.update_reg(0x00, Some(0x42), 0xFF).unwrap();
        finalize_cycle(&mut ll);

        // Same value again: nothing to do on the wire.
        ll.update_reg(0x00, Some(0x42), 0xFF).unwrap();
        let instructions = finalize_cycle(&mut ll);
        assert_eq!(instructions, vec![Instruction::Nop { send: true }]);
    }

    #[test]
    fn masked_register_set_then_clear_emits_command_pair() {
        let mut ll = LowLevelController::new(&EM12_MAP);
        ll.compress = false;
        let addr = EM12_MAP.power_mode_addr;

        ll.update_reg(addr, Some(POWER_FORCE_REST2), POWER_FORCE_REST2).unwrap();
        let instructions = finalize_cycle(&mut ll);
        assert_eq!(
            instructions,
            vec![Instruction::Raw { cmd_idx: 0x05, cmd_val: POWER_FORCE_REST2, send: true }]
        );

        // Forcing the bits to zero updates both masks.
        ll.update_reg(addr, Some(0), POWER_FORCE_REST2).unwrap();
        let instructions = finalize_cycle(&mut ll);
        assert_eq!(
            instructions,
            vec![
                Instruction::Raw { cmd_idx: 0x05, cmd_val: 0, send: false },
                Instruction::Raw { cmd_idx: 0x06, cmd_val: POWER_FORCE_REST2, send: true },
            ]
        );

        // Dropping the forcing clears the clear-mask.
        ll.update_reg(addr, None, POWER_FORCE_REST2).unwrap();
        let instructions = finalize_cycle(&mut ll);
        assert_eq!(
            instructions,
            vec![Instruction::Raw { cmd_idx: 0x06, cmd_val: 0, send: true }]
        );
    }

    #[test]
    fn clear_mask_on_direct_register_is_a_type_error() {
        let mut ll = LowLevelController::new(&EM12_MAP);
        assert_eq!(
            ll.update_reg(0x00, None, 0xFF),
            Err(ControlError::TypeMismatch {
                addr: 0x00,
                kind: RegKind::Direct,
                operation: "clear-mask",
            })
        );
    }

    #[test]
    fn unknown_register_is_rejected() {
        let mut ll = LowLevelController::new(&EM12_MAP);
        assert_eq!(
            ll.update_reg(0x7F, Some(0), 0xFF),
            Err(ControlError::Map(RegMapError::UnknownRegister { addr: 0x7F }))
        );
    }

    #[test]
    fn lift_forcing_survives_until_cleared() {
        let mut ll = LowLevelController::new(&EM12_MAP);
        ll.compress = false;
        ll.update_reg(EM12_MAP.lift_addr, Some(LIFT_LIFTED), LIFT_LIFTED).unwrap();
        let instructions = finalize_cycle(&mut ll);
        assert_eq!(
            instructions,
            vec![Instruction::Raw { cmd_idx: 0x03, cmd_val: LIFT_LIFTED, send: true }]
        );

        // No further change: forcing is part of the carried state.
        let instructions = finalize_cycle(&mut ll);
        assert_eq!(instructions, vec![Instruction::Nop { send: true }]);
    }

    #[test]
    fn signed_deltas_decode_shared_high_nibbles() {
        let mut state = SensorState::from_map(&EM12_MAP);
        // dx = -4 (0xFFC), dy = +3.
        state.set_cell(0x00, crate::state::RegCell::Direct(crate::state::RegVal { value: 0xFC }));
        state.set_cell(0x01, crate::state::RegCell::Direct(crate::state::RegVal { value: 0x03 }));
        state.set_cell(0x02, crate::state::RegCell::Direct(crate::state::RegVal { value: 0xF0 }));
        assert_eq!(signed_deltas(&EM12_MAP, &state), (-4, 3));
    }

    #[test]
    fn signed_deltas_decode_split_pairs() {
        let mut state = SensorState::from_map(&EM16_MAP);
        // dx = -0x123, dy = 0x456.
        state.set_cell(0x00, crate::state::RegCell::Direct(crate::state::RegVal { value: 0xFE }));
        state.set_cell(0x01, crate::state::RegCell::Direct(crate::state::RegVal { value: 0xDD }));
        state.set_cell(0x02, crate::state::RegCell::Direct(crate::state::RegVal { value: 0x04 }));
        state.set_cell(0x03, crate::state::RegCell::Direct(crate::state::RegVal { value: 0x56 }));
        assert_eq!(signed_deltas(&EM16_MAP, &state), (-0x123, 0x456));
    }

    #[test]
    fn commit_drains_instructions_and_promotes_state() {
        let mut ll = LowLevelController::new(&EM12_MAP);
        ll.compress = false;
        ll.update_reg(0x01, Some(0x10), 0xFF).unwrap();
        ll.finalize_state().unwrap();
        assert_eq!(ll.current_state().instructions().len(), 1);

        let drained = ll.commit_state();
        assert_eq!(drained.len(), 1);
        ll.init_next_state();

        assert_eq!(ll.previous_state().direct_value(0x01), Some(0x10));
        assert_eq!(ll.current_state().direct_value(0x01), Some(0x10));
        assert!(ll.current_state().cmds().is_empty());
        assert!(ll.reg_state_diff().is_empty());
    }
}
