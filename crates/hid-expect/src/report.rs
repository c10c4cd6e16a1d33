//! Byte-exact HID report models.
//!
//! Every model serializes to the exact bytes the DUT emits so that
//! expectation checks can compare whole frames. Slot bookkeeping follows
//! the firmware: keyboard key codes form an ascending multi-set that
//! left-packs on release, consumer usages fill two slots with slot-2 to
//! slot-1 shift-down.

/// Keyboard key-code slot count.
pub const KEYBOARD_KEYCODE_SLOTS: usize = 6;
/// Serialized keyboard report length.
pub const KEYBOARD_REPORT_LEN: usize = 8;
/// Serialized consumer report length.
pub const CONSUMER_REPORT_LEN: usize = 4;
/// Serialized mouse report length.
pub const MOUSE_REPORT_LEN: usize = 8;

/// HID report classes produced by the DUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ReportClass {
    /// Boot-compatible keyboard report.
    Keyboard,
    /// Two-slot consumer-control report.
    Consumer,
    /// Button/displacement mouse report.
    Mouse,
}

/// Boot-compatible keyboard report: modifier byte, reserved byte, six
/// ascending key-code slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct KeyboardReport {
    /// Modifier bit mask.
    pub modifiers: u8,
    key_codes: [u8; KEYBOARD_KEYCODE_SLOTS],
}

impl KeyboardReport {
    /// Inserts a usage, keeping the occupied prefix sorted ascending.
    /// A usage already present is left untouched; a full report drops
    /// the usage.
    pub fn press_usage(&mut self, usage: u8) {
        let mut to_write = usage;
        for slot in &mut self.key_codes {
            if *slot == 0 {
                *slot = to_write;
                break;
            }
            if *slot == to_write {
                break;
            }
            if *slot > to_write {
                core::mem::swap(slot, &mut to_write);
            }
        }
    }

    /// Removes a usage and left-packs the remaining slots.
    pub fn release_usage(&mut self, usage: u8) {
        let mut shift = false;
        for index in 0..KEYBOARD_KEYCODE_SLOTS - 1 {
            if self.key_codes[index] == usage || shift {
                self.key_codes[index] = self.key_codes[index + 1];
                shift = true;
            }
        }
        let last = &mut self.key_codes[KEYBOARD_KEYCODE_SLOTS - 1];
        if shift || *last == usage {
            *last = 0;
        }
    }

    /// Sets or clears modifier bits.
    pub fn set_modifier(&mut self, mask: u8, set: bool) {
        if set {
            self.modifiers |= mask;
        } else {
            self.modifiers &= !mask;
        }
    }

    /// Current key-code slots.
    #[must_use]
    pub const fn key_codes(&self) -> &[u8; KEYBOARD_KEYCODE_SLOTS] {
        &self.key_codes
    }

    /// Serializes to the wire layout.
    #[must_use]
    pub const fn as_bytes(&self) -> [u8; KEYBOARD_REPORT_LEN] {
        [
            self.modifiers,
            0,
            self.key_codes[0],
            self.key_codes[1],
            self.key_codes[2],
            self.key_codes[3],
            self.key_codes[4],
            self.key_codes[5],
        ]
    }
}

/// Two-slot consumer-control report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ConsumerReport {
    /// First usage slot.
    pub key_1: u16,
    /// Second usage slot.
    pub key_2: u16,
}

impl ConsumerReport {
    /// Fills the first empty slot; both slots full drops the usage.
    pub fn press_usage(&mut self, usage: u16) {
        if self.key_2 != 0 {
            return;
        }
        if self.key_1 != 0 {
            self.key_2 = usage;
        } else {
            self.key_1 = usage;
        }
    }

    /// Clears the matching slot, shifting slot 2 down to slot 1.
    pub fn release_usage(&mut self, usage: u16) {
        if self.key_2 == usage {
            self.key_2 = 0;
        } else if self.key_1 == usage {
            if self.key_2 == 0 {
                self.key_1 = 0;
            } else {
                self.key_1 = self.key_2;
                self.key_2 = 0;
            }
        }
    }

    /// Serializes to the wire layout (little-endian slots).
    #[must_use]
    pub const fn as_bytes(&self) -> [u8; CONSUMER_REPORT_LEN] {
        let key_1 = self.key_1.to_le_bytes();
        let key_2 = self.key_2.to_le_bytes();
        [key_1[0], key_1[1], key_2[0], key_2[1]]
    }
}

/// Button/displacement mouse report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MouseReport {
    /// Sixteen button bits, button 1 in bit 0.
    pub buttons: u16,
    /// Horizontal displacement.
    pub dx: i16,
    /// Vertical displacement.
    pub dy: i16,
    /// Vertical wheel detents.
    pub wheel: i8,
    /// Horizontal wheel detents.
    pub pan: i8,
}

impl MouseReport {
    /// Sets or clears one button bit; `button` counts from 1.
    pub fn set_button(&mut self, button: u8, set: bool) {
        if button == 0 || button > 16 {
            return;
        }
        let bit = 1_u16 << (button - 1);
        if set {
            self.buttons |= bit;
        } else {
            self.buttons &= !bit;
        }
    }

    /// Serializes to the wire layout.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn as_bytes(&self) -> [u8; MOUSE_REPORT_LEN] {
        let buttons = self.buttons.to_le_bytes();
        let dx = self.dx.to_le_bytes();
        let dy = self.dy.to_le_bytes();
        [
            buttons[0],
            buttons[1],
            dx[0],
            dx[1],
            dy[0],
            dy[1],
            self.wheel as u8,
            self.pan as u8,
        ]
    }
}

/// Snapshot of one report of any class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Report {
    /// Keyboard snapshot.
    Keyboard(KeyboardReport),
    /// Consumer snapshot.
    Consumer(ConsumerReport),
    /// Mouse snapshot.
    Mouse(MouseReport),
}

impl Report {
    /// Class of this snapshot.
    #[must_use]
    pub const fn class(&self) -> ReportClass {
        match self {
            Self::Keyboard(_) => ReportClass::Keyboard,
            Self::Consumer(_) => ReportClass::Consumer,
            Self::Mouse(_) => ReportClass::Mouse,
        }
    }

    /// Serialized wire bytes of this snapshot.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        match self {
            Self::Keyboard(report) => report.as_bytes().to_vec(),
            Self::Consumer(report) => report.as_bytes().to_vec(),
            Self::Mouse(report) => report.as_bytes().to_vec(),
        }
    }
}
