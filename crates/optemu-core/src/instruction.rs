//! Micro-instruction model and bit-exact FPGA word codec.
//!
//! The FPGA consumes 16-bit instruction words. Three encodings are
//! assigned; anything else is illegal by definition.
//!
//! ```text
//! NOP:        | 00 | .............0 | send |
//! RAW:        | 01 | idx:5 | val:8  | send |
//! COMPRESSED: | 10 | dx:3 | dy:3 | lift | skip:3 | repeat:3 | 0 |
//! ```
//!
//! Only send-flagged words commit the accumulated register updates to the
//! sensor model and produce a motion sample; a compressed word always
//! commits (its send bit is implicit).

use core::fmt;

use crate::error::InstructionError;

/// Widest raw command index representable in the instruction word.
pub const RAW_CMD_IDX_MAX: u8 = 0x1F;
/// Smallest compressed delta representable in the 3-bit signed field.
pub const CMP_DELTA_MIN: i8 = -4;
/// Largest compressed delta representable in the 3-bit signed field.
pub const CMP_DELTA_MAX: i8 = 3;
/// Largest compressed skip count representable in the 3-bit field.
pub const CMP_SKIP_MAX: u8 = 7;
/// Largest compressed repeat count representable in the 3-bit field.
pub const CMP_REPEAT_MAX: u8 = 7;

const TAG_NOP: u16 = 0b00;
const TAG_RAW: u16 = 0b01;
const TAG_COMPRESSED: u16 = 0b10;

/// Sign-extends a 3-bit field into a signed byte.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub const fn sign_extend_3bits(bits: u8) -> i8 {
    let bits = bits & 0x07;
    if bits & 0x04 == 0 {
        bits as i8
    } else {
        (bits | 0xF8) as i8
    }
}

/// One micro-instruction executed by the FPGA against the DUT sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Instruction {
    /// Padding; commits pending updates only when send-flagged.
    Nop {
        /// Frame terminator flag.
        send: bool,
    },
    /// One command write against the sensor register file.
    Raw {
        /// Command index within the sensor's dense command namespace.
        cmd_idx: u8,
        /// Byte-sized command value.
        cmd_val: u8,
        /// Frame terminator flag.
        send: bool,
    },
    /// Compact multi-register delta update; send is implicit.
    Compressed {
        /// Signed delta-X.
        dx: i8,
        /// Signed delta-Y.
        dy: i8,
        /// Lift status carried with the sample.
        lift: bool,
        /// Sample skip count.
        skip: u8,
        /// Sample repeat count.
        repeat: u8,
    },
}

impl Instruction {
    /// Returns true when this instruction terminates a frame.
    #[must_use]
    pub const fn send(&self) -> bool {
        match self {
            Self::Nop { send } | Self::Raw { send, .. } => *send,
            Self::Compressed { .. } => true,
        }
    }

    /// Sets the frame-terminator flag; a no-op on compressed words.
    pub const fn set_send(&mut self, value: bool) {
        match self {
            Self::Nop { send } | Self::Raw { send, .. } => *send = value,
            Self::Compressed { .. } => {}
        }
    }

    /// Returns true for the raw encoding.
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        matches!(self, Self::Raw { .. })
    }

    /// Returns true for the padding encoding.
    #[must_use]
    pub const fn is_nop(&self) -> bool {
        matches!(self, Self::Nop { .. })
    }

    /// Encodes this instruction into its 16-bit FPGA word.
    ///
    /// # Errors
    ///
    /// Returns an [`InstructionError`] when a field does not fit its
    /// assigned bit width.
    #[allow(clippy::cast_sign_loss)]
    pub fn encode(&self) -> Result<u16, InstructionError> {
        match *self {
            Self::Nop { send } => Ok((TAG_NOP << 14) | u16::from(send)),
            Self::Raw { cmd_idx, cmd_val, send } => {
                if cmd_idx > RAW_CMD_IDX_MAX {
                    return Err(InstructionError::CmdIdxOverflow(cmd_idx));
                }
                Ok((TAG_RAW << 14)
                    | (u16::from(cmd_idx) << 9)
                    | (u16::from(cmd_val) << 1)
                    | u16::from(send))
            }
            Self::Compressed { dx, dy, lift, skip, repeat } => {
                if !(CMP_DELTA_MIN..=CMP_DELTA_MAX).contains(&dx) {
                    return Err(InstructionError::DeltaOverflow(i16::from(dx)));
                }
                if !(CMP_DELTA_MIN..=CMP_DELTA_MAX).contains(&dy) {
                    return Err(InstructionError::DeltaOverflow(i16::from(dy)));
                }
                if skip > CMP_SKIP_MAX {
                    return Err(InstructionError::SkipOverflow(skip));
                }
                if repeat > CMP_REPEAT_MAX {
                    return Err(InstructionError::RepeatOverflow(repeat));
                }
                Ok((TAG_COMPRESSED << 14)
                    | (u16::from(dx as u8 & 0x07) << 11)
                    | (u16::from(dy as u8 & 0x07) << 8)
                    | (u16::from(lift) << 7)
                    | (u16::from(skip) << 4)
                    | (u16::from(repeat) << 1))
            }
        }
    }

    /// Decodes a 16-bit FPGA word back into an instruction.
    ///
    /// # Errors
    ///
    /// Returns [`InstructionError::UnassignedTag`] for the reserved mode
    /// tag.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn decode(word: u16) -> Result<Self, InstructionError> {
        match word >> 14 {
            TAG_NOP => Ok(Self::Nop { send: word & 1 == 1 }),
            TAG_RAW => Ok(Self::Raw {
                cmd_idx: ((word >> 9) & 0x1F) as u8,
                cmd_val: ((word >> 1) & 0xFF) as u8,
                send: word & 1 == 1,
            }),
            TAG_COMPRESSED => Ok(Self::Compressed {
                dx: sign_extend_3bits(((word >> 11) & 0x07) as u8),
                dy: sign_extend_3bits(((word >> 8) & 0x07) as u8),
                lift: (word >> 7) & 1 == 1,
                skip: ((word >> 4) & 0x07) as u8,
                repeat: ((word >> 1) & 0x07) as u8,
            }),
            _ => Err(InstructionError::UnassignedTag(word)),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Nop { send } => {
                write!(f, "NOP: {}", if send { "UP_SEND" } else { "UPDATE" })
            }
            Self::Raw { cmd_idx, cmd_val, send } => write!(
                f,
                "RAW: {}, CMD={cmd_idx:#04x}, VAL={cmd_val:#04x}",
                if send { "UP_SEND" } else { "UPDATE" },
            ),
            Self::Compressed { dx, dy, lift, skip, repeat } => write!(
                f,
                "CMP: dX={dx:+}, dY={dy:+}, lift={}, skip={skip}, repeat={repeat}",
                u8::from(lift),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        sign_extend_3bits, Instruction, CMP_DELTA_MAX, CMP_DELTA_MIN, RAW_CMD_IDX_MAX,
    };
    use crate::error::InstructionError;

    #[test]
    fn three_bit_sign_extension_covers_full_range() {
        assert_eq!(sign_extend_3bits(0b000), 0);
        assert_eq!(sign_extend_3bits(0b011), 3);
        assert_eq!(sign_extend_3bits(0b100), -4);
        assert_eq!(sign_extend_3bits(0b111), -1);
    }

    #[test]
    fn raw_word_roundtrip_is_bit_exact() {
        let instr = Instruction::Raw { cmd_idx: 0x12, cmd_val: 0xA5, send: true };
        let word = instr.encode().unwrap();
        assert_eq!(word, (0b01 << 14) | (0x12 << 9) | (0xA5 << 1) | 1);
        assert_eq!(Instruction::decode(word).unwrap(), instr);
    }

    #[test]
    fn nop_word_carries_only_the_send_bit() {
        let idle = Instruction::Nop { send: false };
        assert_eq!(idle.encode().unwrap(), 0x0000);
        let term = Instruction::Nop { send: true };
        assert_eq!(term.encode().unwrap(), 0x0001);
        assert_eq!(Instruction::decode(0x0001).unwrap(), term);
    }

    #[test]
    fn compressed_roundtrip_over_full_delta_range() {
        for dx in CMP_DELTA_MIN..=CMP_DELTA_MAX {
            for dy in CMP_DELTA_MIN..=CMP_DELTA_MAX {
                let instr = Instruction::Compressed { dx, dy, lift: true, skip: 5, repeat: 2 };
                let decoded = Instruction::decode(instr.encode().unwrap()).unwrap();
                assert_eq!(decoded, instr);
            }
        }
    }

    #[test]
    fn compressed_send_is_implicit() {
        let mut instr = Instruction::Compressed { dx: 1, dy: -1, lift: false, skip: 0, repeat: 0 };
        assert!(instr.send());
        instr.set_send(false);
        assert!(instr.send());
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        let instr = Instruction::Raw { cmd_idx: RAW_CMD_IDX_MAX + 1, cmd_val: 0, send: false };
        assert_eq!(
            instr.encode(),
            Err(InstructionError::CmdIdxOverflow(RAW_CMD_IDX_MAX + 1))
        );

        let instr = Instruction::Compressed { dx: 4, dy: 0, lift: false, skip: 0, repeat: 0 };
        assert_eq!(instr.encode(), Err(InstructionError::DeltaOverflow(4)));

        let instr = Instruction::Compressed { dx: 0, dy: 0, lift: false, skip: 8, repeat: 0 };
        assert_eq!(instr.encode(), Err(InstructionError::SkipOverflow(8)));

        let instr = Instruction::Compressed { dx: 0, dy: 0, lift: false, skip: 0, repeat: 9 };
        assert_eq!(instr.encode(), Err(InstructionError::RepeatOverflow(9)));
    }

    #[test]
    fn reserved_tag_is_illegal() {
        assert_eq!(
            Instruction::decode(0b11 << 14),
            Err(InstructionError::UnassignedTag(0b11 << 14))
        );
    }

    #[test]
    fn send_flag_toggles_on_raw_and_nop() {
        let mut instr = Instruction::Raw { cmd_idx: 0, cmd_val: 0, send: false };
        instr.set_send(true);
        assert!(instr.send());

        let mut instr = Instruction::Nop { send: true };
        instr.set_send(false);
        assert!(!instr.send());
    }
}
