//! HID usage codes and modifier masks used by the behavior table.
//!
//! Keyboard usages come from the Keyboard/Keypad usage page (0x07),
//! consumer usages from the Consumer page (0x0C).

#![allow(missing_docs)]

// Keyboard/Keypad page usages.
pub const KEYBOARD_A: u8 = 0x04;
pub const KEYBOARD_B: u8 = 0x05;
pub const KEYBOARD_C: u8 = 0x06;
pub const KEYBOARD_D: u8 = 0x07;
pub const KEYBOARD_E: u8 = 0x08;
pub const KEYBOARD_F: u8 = 0x09;
pub const KEYBOARD_G: u8 = 0x0A;
pub const KEYBOARD_H: u8 = 0x0B;
pub const KEYBOARD_I: u8 = 0x0C;
pub const KEYBOARD_J: u8 = 0x0D;
pub const KEYBOARD_K: u8 = 0x0E;
pub const KEYBOARD_L: u8 = 0x0F;
pub const KEYBOARD_M: u8 = 0x10;
pub const KEYBOARD_N: u8 = 0x11;
pub const KEYBOARD_O: u8 = 0x12;
pub const KEYBOARD_P: u8 = 0x13;
pub const KEYBOARD_Q: u8 = 0x14;
pub const KEYBOARD_R: u8 = 0x15;
pub const KEYBOARD_S: u8 = 0x16;
pub const KEYBOARD_T: u8 = 0x17;
pub const KEYBOARD_U: u8 = 0x18;
pub const KEYBOARD_V: u8 = 0x19;
pub const KEYBOARD_W: u8 = 0x1A;
pub const KEYBOARD_X: u8 = 0x1B;
pub const KEYBOARD_Y: u8 = 0x1C;
pub const KEYBOARD_Z: u8 = 0x1D;
pub const KEYBOARD_RETURN_ENTER: u8 = 0x28;
pub const KEYBOARD_ESCAPE: u8 = 0x29;
pub const KEYBOARD_DELETE_BACKSPACE: u8 = 0x2A;
pub const KEYBOARD_TAB: u8 = 0x2B;
pub const KEYBOARD_SPACE_BAR: u8 = 0x2C;
pub const KEYBOARD_RIGHT_ARROW: u8 = 0x4F;
pub const KEYBOARD_LEFT_ARROW: u8 = 0x50;
pub const KEYBOARD_DOWN_ARROW: u8 = 0x51;
pub const KEYBOARD_UP_ARROW: u8 = 0x52;
pub const KEYBOARD_INTERNATIONAL1: u8 = 0x87;
pub const KEYBOARD_INTERNATIONAL2: u8 = 0x88;
pub const KEYBOARD_INTERNATIONAL3: u8 = 0x89;
pub const KEYBOARD_INTERNATIONAL4: u8 = 0x8A;
pub const KEYBOARD_INTERNATIONAL5: u8 = 0x8B;
pub const KEYBOARD_LANG1: u8 = 0x90;
pub const KEYBOARD_LANG2: u8 = 0x91;

// Modifier bit masks of the keyboard report's first byte.
pub const MOD_LEFT_CONTROL: u8 = 0x01;
pub const MOD_LEFT_SHIFT: u8 = 0x02;
pub const MOD_LEFT_ALT: u8 = 0x04;
pub const MOD_LEFT_GUI: u8 = 0x08;
pub const MOD_RIGHT_CONTROL: u8 = 0x10;
pub const MOD_RIGHT_SHIFT: u8 = 0x20;
pub const MOD_RIGHT_ALT: u8 = 0x40;
pub const MOD_RIGHT_GUI: u8 = 0x80;

// Consumer page usages.
pub const CS_PLAY_PAUSE: u16 = 0x00CD;
pub const CS_SCAN_NEXT_TRACK: u16 = 0x00B5;
pub const CS_SCAN_PREVIOUS_TRACK: u16 = 0x00B6;
pub const CS_MUTE: u16 = 0x00E2;
pub const CS_VOLUME_UP: u16 = 0x00E9;
pub const CS_VOLUME_DOWN: u16 = 0x00EA;
pub const CS_BRIGHTNESS_UP: u16 = 0x006F;
pub const CS_BRIGHTNESS_DOWN: u16 = 0x0070;

#[cfg(test)]
mod tests {
    use super::{
        KEYBOARD_A, KEYBOARD_Z, MOD_LEFT_CONTROL, MOD_LEFT_GUI, MOD_RIGHT_CONTROL,
        MOD_RIGHT_GUI,
    };

    #[test]
    fn alphabetic_usages_are_contiguous() {
        assert_eq!(KEYBOARD_Z - KEYBOARD_A, 25);
    }

    #[test]
    fn modifier_masks_occupy_one_byte_without_overlap() {
        let masks = [
            MOD_LEFT_CONTROL,
            super::MOD_LEFT_SHIFT,
            super::MOD_LEFT_ALT,
            MOD_LEFT_GUI,
            MOD_RIGHT_CONTROL,
            super::MOD_RIGHT_SHIFT,
            super::MOD_RIGHT_ALT,
            MOD_RIGHT_GUI,
        ];
        let combined = masks.iter().fold(0_u8, |acc, mask| {
            assert_eq!(acc & mask, 0);
            acc | mask
        });
        assert_eq!(combined, 0xFF);
    }
}
