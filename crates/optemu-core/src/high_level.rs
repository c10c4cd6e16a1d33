//! High-level control: semantic actions to register writes.
//!
//! Actions are staged onto the low-level controller's current state and
//! take effect together at commit. Later updates of the same action
//! before a commit override earlier ones; the overridden value is never
//! observable on the DUT.

use crate::error::ControlError;
use crate::instruction::Instruction;
use crate::low_level::LowLevelController;
use crate::regmap::{
    DeltaLayout, RegisterMap, BUTTON_LEFT, BUTTON_MIDDLE, BUTTON_RIGHT, LIFT_LIFTED,
    POWER_FORCE_REST2, POWER_FORCE_SLEEP,
};

/// Sensor-level button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum SensorButton {
    /// Left button bit.
    Left,
    /// Right button bit.
    Right,
    /// Middle button bit.
    Middle,
}

impl SensorButton {
    /// Register bit backing this button.
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::Left => BUTTON_LEFT,
            Self::Right => BUTTON_RIGHT,
            Self::Middle => BUTTON_MIDDLE,
        }
    }
}

/// Semantic update applied to the emulator's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Action {
    /// Signed displacement along X.
    Dx(i16),
    /// Signed displacement along Y.
    Dy(i16),
    /// Force Rest2 power mode; `None` drops the forcing.
    PowerModeRest2(Option<bool>),
    /// Force Sleep power mode; `None` drops the forcing.
    PowerModeSleep(Option<bool>),
    /// Force the lift status; `None` drops the forcing.
    Lift(Option<bool>),
    /// Skip this many polling intervals before the next sample.
    Skip(u8),
    /// Repeat the next sample this many extra times.
    Repeat(u8),
    /// Press or release a sensor button.
    Button {
        /// Targeted button.
        button: SensorButton,
        /// True on press, false on release.
        pressed: bool,
    },
}

/// High-level controller translating [`Action`]s into register writes.
#[derive(Debug, Clone)]
pub struct HighLevelController {
    ll: LowLevelController,
}

impl HighLevelController {
    /// Creates a controller over a fresh low-level controller.
    #[must_use]
    pub fn new(map: &'static RegisterMap) -> Self {
        Self { ll: LowLevelController::new(map) }
    }

    /// Shared access to the underlying low-level controller.
    #[must_use]
    pub const fn low_level(&self) -> &LowLevelController {
        &self.ll
    }

    /// Exclusive access to the underlying low-level controller.
    #[must_use]
    pub const fn low_level_mut(&mut self) -> &mut LowLevelController {
        &mut self.ll
    }

    /// Stages one action in the pending current state.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::ValueOutOfRange`] when a delta or count
    /// exceeds the sensor limits and [`ControlError::UnsupportedAction`]
    /// when the map declares no backing register.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn update(&mut self, action: Action) -> Result<(), ControlError> {
        let map = self.ll.map();
        let limits = map.limits();
        match action {
            Action::Dx(delta) => {
                check_delta(delta, "delta-x", map)?;
                let unsigned = delta as u16;
                match map.delta {
                    DeltaLayout::SharedHigh { x_low, xy_high, .. } => {
                        self.ll.update_reg(x_low, Some(unsigned as u8), 0xFF)?;
                        self.ll.update_reg(xy_high, Some(((unsigned >> 4) & 0xF0) as u8), 0xF0)?;
                    }
                    DeltaLayout::SplitHigh { x_high, x_low, .. } => {
                        self.ll.update_reg(x_high, Some((unsigned >> 8) as u8), 0xFF)?;
                        self.ll.update_reg(x_low, Some(unsigned as u8), 0xFF)?;
                    }
                }
            }
            Action::Dy(delta) => {
                check_delta(delta, "delta-y", map)?;
                let unsigned = delta as u16;
                match map.delta {
                    DeltaLayout::SharedHigh { y_low, xy_high, .. } => {
                        self.ll.update_reg(y_low, Some(unsigned as u8), 0xFF)?;
                        self.ll.update_reg(xy_high, Some(((unsigned >> 8) & 0x0F) as u8), 0x0F)?;
                    }
                    DeltaLayout::SplitHigh { y_high, y_low, .. } => {
                        self.ll.update_reg(y_high, Some((unsigned >> 8) as u8), 0xFF)?;
                        self.ll.update_reg(y_low, Some(unsigned as u8), 0xFF)?;
                    }
                }
            }
            Action::PowerModeRest2(force) => {
                self.update_masked_bit(map.power_mode_addr, POWER_FORCE_REST2, force)?;
            }
            Action::PowerModeSleep(force) => {
                self.update_masked_bit(map.power_mode_addr, POWER_FORCE_SLEEP, force)?;
            }
            Action::Lift(force) => {
                self.update_masked_bit(map.lift_addr, LIFT_LIFTED, force)?;
            }
            Action::Skip(count) => {
                if count > limits.skip_max {
                    return Err(ControlError::ValueOutOfRange {
                        what: "skip",
                        value: i32::from(count),
                        min: 0,
                        max: i32::from(limits.skip_max),
                    });
                }
                self.ll.stage_command(map.skip_cmd, count);
            }
            Action::Repeat(count) => {
                if count > limits.repeat_max {
                    return Err(ControlError::ValueOutOfRange {
                        what: "repeat",
                        value: i32::from(count),
                        min: 0,
                        max: i32::from(limits.repeat_max),
                    });
                }
                self.ll.stage_command(map.repeat_cmd, count);
            }
            Action::Button { button, pressed } => {
                let addr = map
                    .button_addr
                    .ok_or(ControlError::UnsupportedAction("button"))?;
                let bit = button.bit();
                self.ll.update_reg(addr, Some(if pressed { bit } else { 0 }), bit)?;
            }
        }
        Ok(())
    }

    /// Finalizes, commits, and reinitializes the pending state.
    ///
    /// Returns the committed instructions for the caller to buffer.
    ///
    /// # Errors
    ///
    /// Propagates [`ControlError`] from state finalization.
    pub fn commit(&mut self) -> Result<Vec<Instruction>, ControlError> {
        self.ll.finalize_state()?;
        let instructions = self.ll.commit_state();
        self.ll.init_next_state();
        Ok(instructions)
    }

    fn update_masked_bit(
        &mut self,
        addr: u8,
        bit: u8,
        force: Option<bool>,
    ) -> Result<(), ControlError> {
        match force {
            Some(true) => self.ll.update_reg(addr, Some(bit), bit),
            Some(false) => self.ll.update_reg(addr, Some(0), bit),
            None => self.ll.update_reg(addr, None, bit),
        }
    }
}

fn check_delta(delta: i16, what: &'static str, map: &RegisterMap) -> Result<(), ControlError> {
    let limits = map.limits();
    if delta < limits.delta_signed_min || delta > limits.delta_signed_max {
        return Err(ControlError::ValueOutOfRange {
            what,
            value: i32::from(delta),
            min: i32::from(limits.delta_signed_min),
            max: i32::from(limits.delta_signed_max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Action, HighLevelController, SensorButton};
    use crate::error::ControlError;
    use crate::instruction::Instruction;
    use crate::regmap::{EM12_MAP, EM16_MAP, POWER_FORCE_REST2, POWER_FORCE_SLEEP};

    fn raw(cmd_idx: u8, cmd_val: u8, send: bool) -> Instruction {
        Instruction::Raw { cmd_idx, cmd_val, send }
    }

    #[test]
    fn small_delta_pair_compresses_to_one_instruction() {
        let mut hl = HighLevelController::new(&EM12_MAP);
        hl.update(Action::Dx(1)).unwrap();
        hl.update(Action::Dy(1)).unwrap();
        let instructions = hl.commit().unwrap();
        assert_eq!(
            instructions,
            vec![Instruction::Compressed { dx: 1, dy: 1, lift: false, skip: 0, repeat: 0 }]
        );
    }

    #[test]
    fn raw_fallback_carries_send_on_the_last_write_only() {
        let mut hl = HighLevelController::new(&EM12_MAP);
        hl.low_level_mut().compress = false;
        hl.update(Action::Dx(0x123)).unwrap();
        hl.update(Action::Dy(-0x123)).unwrap();
        let instructions = hl.commit().unwrap();
        // dx=0x123 -> low 0x23, high nibble 0x1; dy=-0x123=0xEDD.
        assert_eq!(
            instructions,
            vec![
                raw(0x00, 0x23, false),
                raw(0x01, 0xDD, false),
                raw(0x02, 0x1E, true),
            ]
        );
    }

    #[test]
    fn sixteen_bit_deltas_occupy_independent_pairs() {
        let mut hl = HighLevelController::new(&EM16_MAP);
        hl.low_level_mut().compress = false;
        hl.update(Action::Dx(0x0456)).unwrap();
        let instructions = hl.commit().unwrap();
        assert_eq!(instructions, vec![raw(0x00, 0x04, false), raw(0x01, 0x56, true)]);
    }

    #[test]
    fn successive_updates_before_commit_coalesce() {
        let mut hl = HighLevelController::new(&EM12_MAP);
        hl.low_level_mut().compress = false;
        hl.update(Action::Dx(5)).unwrap();
        hl.update(Action::Dx(7)).unwrap();
        let instructions = hl.commit().unwrap();
        assert_eq!(instructions, vec![raw(0x00, 0x07, true)]);
    }

    #[test]
    fn power_mode_transitions_emit_only_changed_bits() {
        let mut hl = HighLevelController::new(&EM12_MAP);

        hl.update(Action::Dx(1)).unwrap();
        hl.update(Action::PowerModeRest2(Some(true))).unwrap();
        let instructions = hl.commit().unwrap();
        assert_eq!(
            instructions,
            vec![raw(0x00, 0x01, false), raw(0x05, POWER_FORCE_REST2, true)]
        );

        hl.update(Action::Dx(2)).unwrap();
        hl.update(Action::PowerModeSleep(Some(true))).unwrap();
        let instructions = hl.commit().unwrap();
        assert_eq!(
            instructions,
            vec![
                raw(0x00, 0x02, false),
                raw(0x05, POWER_FORCE_REST2 | POWER_FORCE_SLEEP, true),
            ]
        );

        hl.update(Action::Dx(3)).unwrap();
        hl.update(Action::PowerModeRest2(None)).unwrap();
        hl.update(Action::PowerModeSleep(None)).unwrap();
        let instructions = hl.commit().unwrap();
        assert_eq!(instructions, vec![raw(0x00, 0x03, false), raw(0x05, 0, true)]);
    }

    #[test]
    fn repeat_directive_rides_ahead_of_register_writes() {
        let mut hl = HighLevelController::new(&EM12_MAP);
        hl.low_level_mut().compress = false;
        hl.update(Action::Repeat(3)).unwrap();
        hl.update(Action::Dx(0x40)).unwrap();
        let instructions = hl.commit().unwrap();
        assert_eq!(instructions, vec![raw(0x0A, 3, false), raw(0x00, 0x40, true)]);
    }

    #[test]
    fn repeat_joins_the_compressed_word_when_in_range() {
        let mut hl = HighLevelController::new(&EM12_MAP);
        hl.update(Action::Repeat(2)).unwrap();
        hl.update(Action::Dx(1)).unwrap();
        hl.update(Action::Dy(1)).unwrap();
        let instructions = hl.commit().unwrap();
        assert_eq!(
            instructions,
            vec![Instruction::Compressed { dx: 1, dy: 1, lift: false, skip: 0, repeat: 2 }]
        );
    }

    #[test]
    fn empty_commit_emits_one_send_flagged_nop() {
        let mut hl = HighLevelController::new(&EM12_MAP);
        let instructions = hl.commit().unwrap();
        assert_eq!(instructions, vec![Instruction::Nop { send: true }]);
    }

    #[test]
    fn out_of_range_delta_is_rejected() {
        let mut hl = HighLevelController::new(&EM12_MAP);
        assert!(matches!(
            hl.update(Action::Dx(2048)),
            Err(ControlError::ValueOutOfRange { what: "delta-x", .. })
        ));
        assert!(matches!(
            hl.update(Action::Dy(-2049)),
            Err(ControlError::ValueOutOfRange { what: "delta-y", .. })
        ));
    }

    #[test]
    fn button_action_requires_a_button_register() {
        let mut hl = HighLevelController::new(&EM16_MAP);
        assert_eq!(
            hl.update(Action::Button { button: SensorButton::Left, pressed: true }),
            Err(ControlError::UnsupportedAction("button"))
        );

        let mut hl = HighLevelController::new(&EM12_MAP);
        hl.update(Action::Button { button: SensorButton::Left, pressed: true }).unwrap();
        let instructions = hl.commit().unwrap();
        assert_eq!(instructions, vec![raw(0x07, 0x01, true)]);
    }

    #[test]
    fn commutative_updates_reach_the_same_state() {
        let mut ab = HighLevelController::new(&EM12_MAP);
        ab.update(Action::Dx(9)).unwrap();
        ab.update(Action::Dy(-9)).unwrap();
        ab.commit().unwrap();

        let mut ba = HighLevelController::new(&EM12_MAP);
        ba.update(Action::Dy(-9)).unwrap();
        ba.update(Action::Dx(9)).unwrap();
        ba.commit().unwrap();

        assert_eq!(
            ab.low_level().previous_state().cells(),
            ba.low_level().previous_state().cells()
        );
    }
}
