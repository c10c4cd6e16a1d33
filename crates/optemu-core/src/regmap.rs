//! Declarative register-map tables for the emulated optical sensors.
//!
//! A map is a static description of one sensor generation: its register
//! set, the dense command namespace bound to it, value limits, and the
//! compressed-instruction layout supported by the FPGA for that sensor.

use crate::error::RegMapError;

/// `POWER_MODE` register bit forcing Rest2 mode.
pub const POWER_FORCE_REST2: u8 = 0x02;
/// `POWER_MODE` register bit forcing Sleep mode.
pub const POWER_FORCE_SLEEP: u8 = 0x04;
/// `LIFT` register bit reporting a lifted sensor.
pub const LIFT_LIFTED: u8 = 0x01;
/// `BUTTON` register bit for the left button.
pub const BUTTON_LEFT: u8 = 0x01;
/// `BUTTON` register bit for the right button.
pub const BUTTON_RIGHT: u8 = 0x02;
/// `BUTTON` register bit for the middle button.
pub const BUTTON_MIDDLE: u8 = 0x04;

/// Register access class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegKind {
    /// Single write-value command; read-modify-write under a byte mask.
    Direct,
    /// Set-bits / clear-bits command pair.
    Masked,
}

/// One register record of a sensor map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    /// Register address within the sensor address space.
    pub addr: u8,
    /// Declared register name.
    pub name: &'static str,
    /// Access class.
    pub kind: RegKind,
    /// Power-on default value.
    pub default: u8,
}

/// Command index(es) bound to one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdBinding {
    /// Direct register: one write-value command.
    Direct(u8),
    /// Masked register: set-bits and clear-bits command pair.
    Masked {
        /// Command applying the set-mask.
        set: u8,
        /// Command applying the clear-mask.
        clr: u8,
    },
}

/// One command record of the dense command namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDesc {
    /// Command index.
    pub idx: u8,
    /// Declared command name.
    pub name: &'static str,
}

/// Placement of the signed delta-X/Y values across registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaLayout {
    /// 12-bit sensor: both high nibbles share one register
    /// (DX high nibble in bits 7..4, DY high nibble in bits 3..0).
    SharedHigh {
        /// Register holding DX bits 7..0.
        x_low: u8,
        /// Register holding DY bits 7..0.
        y_low: u8,
        /// Register holding both high nibbles.
        xy_high: u8,
    },
    /// 16-bit sensor: independent high/low register pairs.
    SplitHigh {
        /// Register holding DX bits 15..8.
        x_high: u8,
        /// Register holding DX bits 7..0.
        x_low: u8,
        /// Register holding DY bits 15..8.
        y_high: u8,
        /// Register holding DY bits 7..0.
        y_low: u8,
    },
}

impl DeltaLayout {
    /// Reassembles the signed delta pair from per-register byte reads.
    #[allow(clippy::cast_possible_wrap)]
    pub fn decode<F: Fn(u8) -> u8>(self, read: F) -> (i16, i16) {
        const fn sign_extend_12bits(value: u16) -> i16 {
            if value & 0x0800 == 0 {
                (value & 0x0FFF) as i16
            } else {
                (value | 0xF000) as i16
            }
        }

        match self {
            Self::SharedHigh { x_low, y_low, xy_high } => {
                let high = u16::from(read(xy_high));
                let dx = sign_extend_12bits(((high & 0x00F0) << 4) | u16::from(read(x_low)));
                let dy = sign_extend_12bits(((high & 0x000F) << 8) | u16::from(read(y_low)));
                (dx, dy)
            }
            Self::SplitHigh { x_high, x_low, y_high, y_low } => {
                let dx = (u16::from(read(x_high)) << 8) | u16::from(read(x_low));
                let dy = (u16::from(read(y_high)) << 8) | u16::from(read(y_low));
                (dx as i16, dy as i16)
            }
        }
    }
}

/// Signed/unsigned value limits declared by a sensor map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Smallest accepted signed delta.
    pub delta_signed_min: i16,
    /// Largest accepted signed delta.
    pub delta_signed_max: i16,
    /// Largest accepted skip count (raw command value).
    pub skip_max: u8,
    /// Largest accepted repeat count (raw command value).
    pub repeat_max: u8,
}

/// Compressed-instruction field bounds for this sensor.
///
/// The exact layout is sensor-specific, so the map carries it instead of
/// the instruction codec hard-coding one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedLayout {
    /// Smallest delta representable in the compressed word.
    pub delta_min: i8,
    /// Largest delta representable in the compressed word.
    pub delta_max: i8,
    /// Largest skip count representable in the compressed word.
    pub skip_max: u8,
    /// Largest repeat count representable in the compressed word.
    pub repeat_max: u8,
}

impl CompressedLayout {
    /// Returns true when all compressed fields fit this layout.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn contains(&self, dx: i16, dy: i16, skip: u8, repeat: u8) -> bool {
        dx >= self.delta_min as i16
            && dx <= self.delta_max as i16
            && dy >= self.delta_min as i16
            && dy <= self.delta_max as i16
            && skip <= self.skip_max
            && repeat <= self.repeat_max
    }
}

/// Static description of one emulated sensor's register set.
#[derive(Debug, Clone, Copy)]
pub struct RegisterMap {
    /// Sensor model name.
    pub name: &'static str,
    registers: &'static [Register],
    bindings: &'static [(u8, CmdBinding)],
    commands: &'static [CommandDesc],
    /// Delta register placement.
    pub delta: DeltaLayout,
    /// Address of the masked `POWER_MODE` register.
    pub power_mode_addr: u8,
    /// Address of the masked `LIFT` register.
    pub lift_addr: u8,
    /// Address of the masked `BUTTON` register, when the sensor has one.
    pub button_addr: Option<u8>,
    /// Command index consuming skip counts.
    pub skip_cmd: u8,
    /// Command index consuming repeat counts.
    pub repeat_cmd: u8,
    /// Command indices replaceable by one compressed instruction.
    pub compressible_cmds: &'static [u8],
    /// Declared value limits.
    pub limits: Limits,
    /// Compressed-instruction field bounds.
    pub compressed: CompressedLayout,
}

impl RegisterMap {
    /// Returns the register declared at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`RegMapError::UnknownRegister`] when no register is
    /// declared at this address.
    pub fn reg(&self, addr: u8) -> Result<&'static Register, RegMapError> {
        self.registers
            .iter()
            .find(|reg| reg.addr == addr)
            .ok_or(RegMapError::UnknownRegister { addr })
    }

    /// Returns the register declared under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegMapError::UnknownRegisterName`] when the name is not
    /// declared.
    pub fn reg_by_name(&self, name: &str) -> Result<&'static Register, RegMapError> {
        self.registers
            .iter()
            .find(|reg| reg.name == name)
            .ok_or_else(|| RegMapError::UnknownRegisterName(name.to_owned()))
    }

    /// Returns the command index(es) bound to the register at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`RegMapError::UnknownRegister`] when no register is
    /// declared at this address.
    pub fn reg2cmd(&self, addr: u8) -> Result<CmdBinding, RegMapError> {
        self.bindings
            .iter()
            .find_map(|(reg_addr, binding)| (*reg_addr == addr).then_some(*binding))
            .ok_or(RegMapError::UnknownRegister { addr })
    }

    /// Returns the command index declared under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegMapError::UnknownCommandName`] when the name is not
    /// declared.
    pub fn command_by_name(&self, name: &str) -> Result<u8, RegMapError> {
        self.commands
            .iter()
            .find_map(|cmd| (cmd.name == name).then_some(cmd.idx))
            .ok_or_else(|| RegMapError::UnknownCommandName(name.to_owned()))
    }

    /// Returns the declared command name for a command index, if any.
    #[must_use]
    pub fn command_name(&self, idx: u8) -> Option<&'static str> {
        self.commands
            .iter()
            .find_map(|cmd| (cmd.idx == idx).then_some(cmd.name))
    }

    /// Ordered register declarations of this map.
    #[must_use]
    pub const fn registers(&self) -> &'static [Register] {
        self.registers
    }

    /// Ordered command declarations of this map.
    #[must_use]
    pub const fn commands(&self) -> &'static [CommandDesc] {
        self.commands
    }

    /// Declared value limits of this map.
    #[must_use]
    pub const fn limits(&self) -> Limits {
        self.limits
    }

    /// Returns true when a command index can be folded into one
    /// compressed instruction.
    #[must_use]
    pub fn is_compressible_cmd(&self, idx: u8) -> bool {
        self.compressible_cmds.contains(&idx)
    }
}

/// Register map for the 12-bit delta sensor generation.
pub static EM12_MAP: RegisterMap = RegisterMap {
    name: "em12",
    registers: &[
        Register { addr: 0x00, name: "DELTA_X_L", kind: RegKind::Direct, default: 0 },
        Register { addr: 0x01, name: "DELTA_Y_L", kind: RegKind::Direct, default: 0 },
        Register { addr: 0x02, name: "DELTA_XY_H", kind: RegKind::Direct, default: 0 },
        Register { addr: 0x03, name: "LIFT", kind: RegKind::Masked, default: 0 },
        Register { addr: 0x04, name: "POWER_MODE", kind: RegKind::Masked, default: 0 },
        Register { addr: 0x05, name: "BUTTON", kind: RegKind::Masked, default: 0 },
    ],
    bindings: &[
        (0x00, CmdBinding::Direct(0x00)),
        (0x01, CmdBinding::Direct(0x01)),
        (0x02, CmdBinding::Direct(0x02)),
        (0x03, CmdBinding::Masked { set: 0x03, clr: 0x04 }),
        (0x04, CmdBinding::Masked { set: 0x05, clr: 0x06 }),
        (0x05, CmdBinding::Masked { set: 0x07, clr: 0x08 }),
    ],
    commands: &[
        CommandDesc { idx: 0x00, name: "DELTA_X_L" },
        CommandDesc { idx: 0x01, name: "DELTA_Y_L" },
        CommandDesc { idx: 0x02, name: "DELTA_XY_H" },
        CommandDesc { idx: 0x03, name: "LIFT_SET" },
        CommandDesc { idx: 0x04, name: "LIFT_CLR" },
        CommandDesc { idx: 0x05, name: "POWER_MODE_SET" },
        CommandDesc { idx: 0x06, name: "POWER_MODE_CLR" },
        CommandDesc { idx: 0x07, name: "BUTTON_SET" },
        CommandDesc { idx: 0x08, name: "BUTTON_CLR" },
        CommandDesc { idx: 0x09, name: "SKIP" },
        CommandDesc { idx: 0x0A, name: "REPEAT" },
    ],
    delta: DeltaLayout::SharedHigh { x_low: 0x00, y_low: 0x01, xy_high: 0x02 },
    power_mode_addr: 0x04,
    lift_addr: 0x03,
    button_addr: Some(0x05),
    skip_cmd: 0x09,
    repeat_cmd: 0x0A,
    compressible_cmds: &[0x00, 0x01, 0x02, 0x09, 0x0A],
    limits: Limits {
        delta_signed_min: -2048,
        delta_signed_max: 2047,
        skip_max: 0xFF,
        repeat_max: 0xFF,
    },
    compressed: CompressedLayout { delta_min: -4, delta_max: 3, skip_max: 7, repeat_max: 7 },
};

/// Register map for the 16-bit delta sensor generation.
pub static EM16_MAP: RegisterMap = RegisterMap {
    name: "em16",
    registers: &[
        Register { addr: 0x00, name: "DELTA_X_H", kind: RegKind::Direct, default: 0 },
        Register { addr: 0x01, name: "DELTA_X_L", kind: RegKind::Direct, default: 0 },
        Register { addr: 0x02, name: "DELTA_Y_H", kind: RegKind::Direct, default: 0 },
        Register { addr: 0x03, name: "DELTA_Y_L", kind: RegKind::Direct, default: 0 },
        Register { addr: 0x04, name: "LIFT", kind: RegKind::Masked, default: 0 },
        Register { addr: 0x05, name: "POWER_MODE", kind: RegKind::Masked, default: 0 },
    ],
    bindings: &[
        (0x00, CmdBinding::Direct(0x00)),
        (0x01, CmdBinding::Direct(0x01)),
        (0x02, CmdBinding::Direct(0x02)),
        (0x03, CmdBinding::Direct(0x03)),
        (0x04, CmdBinding::Masked { set: 0x04, clr: 0x05 }),
        (0x05, CmdBinding::Masked { set: 0x06, clr: 0x07 }),
    ],
    commands: &[
        CommandDesc { idx: 0x00, name: "DELTA_X_H" },
        CommandDesc { idx: 0x01, name: "DELTA_X_L" },
        CommandDesc { idx: 0x02, name: "DELTA_Y_H" },
        CommandDesc { idx: 0x03, name: "DELTA_Y_L" },
        CommandDesc { idx: 0x04, name: "LIFT_SET" },
        CommandDesc { idx: 0x05, name: "LIFT_CLR" },
        CommandDesc { idx: 0x06, name: "POWER_MODE_SET" },
        CommandDesc { idx: 0x07, name: "POWER_MODE_CLR" },
        CommandDesc { idx: 0x08, name: "SKIP" },
        CommandDesc { idx: 0x09, name: "REPEAT" },
    ],
    delta: DeltaLayout::SplitHigh { x_high: 0x00, x_low: 0x01, y_high: 0x02, y_low: 0x03 },
    power_mode_addr: 0x05,
    lift_addr: 0x04,
    button_addr: None,
    skip_cmd: 0x08,
    repeat_cmd: 0x09,
    compressible_cmds: &[0x00, 0x01, 0x02, 0x03, 0x08, 0x09],
    limits: Limits {
        delta_signed_min: i16::MIN,
        delta_signed_max: i16::MAX,
        skip_max: 0xFF,
        repeat_max: 0xFF,
    },
    compressed: CompressedLayout { delta_min: -4, delta_max: 3, skip_max: 7, repeat_max: 7 },
};

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{CmdBinding, RegKind, RegisterMap, EM12_MAP, EM16_MAP};
    use crate::error::RegMapError;

    fn check_map_consistency(map: &RegisterMap) {
        let addrs: HashSet<_> = map.registers().iter().map(|reg| reg.addr).collect();
        assert_eq!(addrs.len(), map.registers().len());

        let names: HashSet<_> = map.registers().iter().map(|reg| reg.name).collect();
        assert_eq!(names.len(), map.registers().len());

        let cmd_idxs: HashSet<_> = map.commands().iter().map(|cmd| cmd.idx).collect();
        assert_eq!(cmd_idxs.len(), map.commands().len());

        for reg in map.registers() {
            let binding = map.reg2cmd(reg.addr).expect("declared register");
            match (reg.kind, binding) {
                (RegKind::Direct, CmdBinding::Direct(idx)) => {
                    assert!(cmd_idxs.contains(&idx), "{}: unbound command", reg.name);
                }
                (RegKind::Masked, CmdBinding::Masked { set, clr }) => {
                    assert!(cmd_idxs.contains(&set));
                    assert!(cmd_idxs.contains(&clr));
                    assert_ne!(set, clr);
                }
                (kind, binding) => panic!("{}: {kind:?} bound to {binding:?}", reg.name),
            }
        }

        for idx in map.compressible_cmds {
            assert!(cmd_idxs.contains(idx));
        }
        assert!(cmd_idxs.contains(&map.skip_cmd));
        assert!(cmd_idxs.contains(&map.repeat_cmd));
    }

    #[test]
    fn shipped_maps_are_internally_consistent() {
        check_map_consistency(&EM12_MAP);
        check_map_consistency(&EM16_MAP);
    }

    #[test]
    fn masked_registers_expose_set_and_clear_commands() {
        let binding = EM12_MAP.reg2cmd(EM12_MAP.power_mode_addr).unwrap();
        assert_eq!(binding, CmdBinding::Masked { set: 0x05, clr: 0x06 });

        let set = EM12_MAP.command_by_name("POWER_MODE_SET").unwrap();
        let clr = EM12_MAP.command_by_name("POWER_MODE_CLR").unwrap();
        assert_eq!(binding, CmdBinding::Masked { set, clr });
    }

    #[test]
    fn direct_registers_expose_one_write_command() {
        let binding = EM16_MAP.reg2cmd(0x01).unwrap();
        assert_eq!(binding, CmdBinding::Direct(0x01));
        assert_eq!(EM16_MAP.reg(0x01).unwrap().name, "DELTA_X_L");
    }

    #[test]
    fn unknown_lookups_are_rejected() {
        assert_eq!(
            EM12_MAP.reg2cmd(0x7F),
            Err(RegMapError::UnknownRegister { addr: 0x7F })
        );
        assert!(matches!(
            EM12_MAP.reg_by_name("NO_SUCH_REG"),
            Err(RegMapError::UnknownRegisterName(_))
        ));
        assert!(matches!(
            EM16_MAP.command_by_name("NO_SUCH_CMD"),
            Err(RegMapError::UnknownCommandName(_))
        ));
    }

    #[test]
    fn delta_limits_match_sensor_width() {
        assert_eq!(EM12_MAP.limits().delta_signed_min, -2048);
        assert_eq!(EM12_MAP.limits().delta_signed_max, 2047);
        assert_eq!(EM16_MAP.limits().delta_signed_min, i16::MIN);
        assert_eq!(EM16_MAP.limits().delta_signed_max, i16::MAX);
    }

    #[test]
    fn compressed_layout_bounds_check() {
        let layout = EM12_MAP.compressed;
        assert!(layout.contains(-4, 3, 0, 0));
        assert!(!layout.contains(-5, 0, 0, 0));
        assert!(!layout.contains(0, 4, 0, 0));
        assert!(!layout.contains(0, 0, 8, 0));
        assert!(!layout.contains(0, 0, 0, 8));
    }

    #[test]
    fn command_names_resolve_both_ways() {
        for cmd in EM12_MAP.commands() {
            assert_eq!(EM12_MAP.command_by_name(cmd.name).unwrap(), cmd.idx);
            assert_eq!(EM12_MAP.command_name(cmd.idx).unwrap(), cmd.name);
        }
        assert!(EM12_MAP.command_name(0x7F).is_none());
    }
}
