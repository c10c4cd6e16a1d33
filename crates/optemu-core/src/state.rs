//! Sensor emulator state model.
//!
//! A state snapshot owns one register cell per mapped register, the
//! commands issued while building the state, and the finalized
//! instruction list. Two snapshots are alive at any time: the previously
//! committed state and the one being built.

use crate::instruction::Instruction;
use crate::regmap::{RegKind, RegisterMap};

/// Value cell of a direct register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegVal {
    /// Unsigned register value.
    pub value: u8,
}

impl RegVal {
    /// Read-modify-write under `mask`.
    #[must_use]
    pub const fn write(self, value: u8, mask: u8) -> Self {
        Self { value: (self.value & !mask) | (value & mask) }
    }
}

/// Value cell of a masked register: bits forced set and bits forced clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MaskedRegVal {
    /// Bits the emulator forces to one.
    pub set_mask: u8,
    /// Bits the emulator forces to zero.
    pub clr_mask: u8,
}

impl MaskedRegVal {
    /// Stages `value` under `mask`: masked-in one bits join the set-mask,
    /// masked-in zero bits join the clear-mask.
    #[must_use]
    pub const fn write(self, value: u8, mask: u8) -> Self {
        Self {
            set_mask: (self.set_mask & !mask) | (value & mask),
            clr_mask: (self.clr_mask & !mask) | (!value & mask),
        }
    }

    /// Drops all forcing under `mask` from both masks.
    #[must_use]
    pub const fn clear(self, mask: u8) -> Self {
        Self { set_mask: self.set_mask & !mask, clr_mask: self.clr_mask & !mask }
    }
}

/// One register cell, shaped by the register's access class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RegCell {
    /// Cell of a direct register.
    Direct(RegVal),
    /// Cell of a masked register.
    Masked(MaskedRegVal),
}

/// One optical sensor emulator state snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SensorState {
    cells: Vec<(u8, RegCell)>,
    cmds: Vec<(u8, u8)>,
    instructions: Vec<Instruction>,
}

impl SensorState {
    /// Creates the initial state with every register at its power-on
    /// default and no forcing on masked registers.
    #[must_use]
    pub fn from_map(map: &RegisterMap) -> Self {
        let cells = map
            .registers()
            .iter()
            .map(|reg| {
                let cell = match reg.kind {
                    RegKind::Direct => RegCell::Direct(RegVal { value: reg.default }),
                    RegKind::Masked => RegCell::Masked(MaskedRegVal::default()),
                };
                (reg.addr, cell)
            })
            .collect();
        Self { cells, cmds: Vec::new(), instructions: Vec::new() }
    }

    /// Creates the successor state: register cells carry over, commands
    /// and instructions start empty.
    #[must_use]
    pub fn next(&self) -> Self {
        Self { cells: self.cells.clone(), cmds: Vec::new(), instructions: Vec::new() }
    }

    /// Returns the cell at `addr`, if mapped.
    #[must_use]
    pub fn cell(&self, addr: u8) -> Option<RegCell> {
        self.cells
            .iter()
            .find_map(|(cell_addr, cell)| (*cell_addr == addr).then_some(*cell))
    }

    /// Replaces the cell at `addr`; returns false when unmapped.
    pub fn set_cell(&mut self, addr: u8, cell: RegCell) -> bool {
        for (cell_addr, slot) in &mut self.cells {
            if *cell_addr == addr {
                *slot = cell;
                return true;
            }
        }
        false
    }

    /// Unsigned value of the direct register at `addr`.
    #[must_use]
    pub fn direct_value(&self, addr: u8) -> Option<u8> {
        match self.cell(addr)? {
            RegCell::Direct(reg_val) => Some(reg_val.value),
            RegCell::Masked(_) => None,
        }
    }

    /// Stages a command value, replacing any earlier value for the same
    /// command while keeping first-issue order.
    pub fn stage_cmd(&mut self, idx: u8, val: u8) {
        for (cmd_idx, cmd_val) in &mut self.cmds {
            if *cmd_idx == idx {
                *cmd_val = val;
                return;
            }
        }
        self.cmds.push((idx, val));
    }

    /// Returns the staged value of a command, if any.
    #[must_use]
    pub fn staged_cmd(&self, idx: u8) -> Option<u8> {
        self.cmds
            .iter()
            .find_map(|(cmd_idx, cmd_val)| (*cmd_idx == idx).then_some(*cmd_val))
    }

    /// Commands staged while building this state, in first-issue order.
    #[must_use]
    pub fn cmds(&self) -> &[(u8, u8)] {
        &self.cmds
    }

    /// Finalized instructions of this state.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Replaces the finalized instruction list.
    pub fn set_instructions(&mut self, instructions: Vec<Instruction>) {
        self.instructions = instructions;
    }

    /// Drains the finalized instruction list for commit.
    pub fn take_instructions(&mut self) -> Vec<Instruction> {
        core::mem::take(&mut self.instructions)
    }

    /// Ordered register cells of this state.
    #[must_use]
    pub fn cells(&self) -> &[(u8, RegCell)] {
        &self.cells
    }
}

/// Computes the register differences between two states.
///
/// Both states must come from the same register map; cells are compared
/// pairwise in map order.
#[must_use]
pub fn reg_state_diff(previous: &SensorState, current: &SensorState) -> Vec<(u8, RegCell, RegCell)> {
    previous
        .cells
        .iter()
        .zip(&current.cells)
        .filter_map(|((p_addr, p_cell), (c_addr, c_cell))| {
            debug_assert_eq!(p_addr, c_addr);
            (p_cell != c_cell).then_some((*p_addr, *p_cell, *c_cell))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{reg_state_diff, MaskedRegVal, RegCell, RegVal, SensorState};
    use crate::instruction::Instruction;
    use crate::regmap::EM12_MAP;

    #[test]
    fn direct_cell_read_modify_write_honors_mask() {
        let cell = RegVal { value: 0b1010_0101 };
        let cell = cell.write(0b0000_1111, 0x0F);
        assert_eq!(cell.value, 0b1010_1111);
        let cell = cell.write(0x00, 0xF0);
        assert_eq!(cell.value, 0b0000_1111);
    }

    #[test]
    fn masked_cell_write_splits_set_and_clear_masks() {
        let cell = MaskedRegVal::default();
        let cell = cell.write(0x02, 0x02);
        assert_eq!(cell, MaskedRegVal { set_mask: 0x02, clr_mask: 0x00 });

        let cell = cell.write(0x00, 0x02);
        assert_eq!(cell, MaskedRegVal { set_mask: 0x00, clr_mask: 0x02 });

        let cell = cell.clear(0x02);
        assert_eq!(cell, MaskedRegVal::default());
    }

    #[test]
    fn initial_state_matches_map_defaults() {
        let state = SensorState::from_map(&EM12_MAP);
        assert_eq!(state.cells().len(), EM12_MAP.registers().len());
        assert_eq!(state.direct_value(0x00), Some(0));
        assert_eq!(
            state.cell(EM12_MAP.power_mode_addr),
            Some(RegCell::Masked(MaskedRegVal::default()))
        );
        assert!(state.cmds().is_empty());
        assert!(state.instructions().is_empty());
    }

    #[test]
    fn successor_state_carries_cells_but_not_work_lists() {
        let mut state = SensorState::from_map(&EM12_MAP);
        state.set_cell(0x00, RegCell::Direct(RegVal { value: 0x55 }));
        state.stage_cmd(0x00, 0x55);
        state.set_instructions(vec![Instruction::Nop { send: true }]);

        let next = state.next();
        assert_eq!(next.direct_value(0x00), Some(0x55));
        assert!(next.cmds().is_empty());
        assert!(next.instructions().is_empty());
    }

    #[test]
    fn staged_commands_keep_first_issue_order_on_update() {
        let mut state = SensorState::from_map(&EM12_MAP);
        state.stage_cmd(0x02, 1);
        state.stage_cmd(0x00, 2);
        state.stage_cmd(0x02, 3);
        assert_eq!(state.cmds(), &[(0x02, 3), (0x00, 2)]);
        assert_eq!(state.staged_cmd(0x02), Some(3));
        assert_eq!(state.staged_cmd(0x01), None);
    }

    #[test]
    fn state_diff_reports_only_changed_cells() {
        let previous = SensorState::from_map(&EM12_MAP);
        let mut current = previous.next();
        assert!(reg_state_diff(&previous, &current).is_empty());

        current.set_cell(0x01, RegCell::Direct(RegVal { value: 0x10 }));
        let diff = reg_state_diff(&previous, &current);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].0, 0x01);
        assert_eq!(diff[0].1, RegCell::Direct(RegVal { value: 0 }));
        assert_eq!(diff[0].2, RegCell::Direct(RegVal { value: 0x10 }));
    }
}
