//! Logical key identifiers and keystroke transitions.

/// Keystroke transition: press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum KeyAction {
    /// Key press.
    Make,
    /// Key release.
    Break,
}

/// Logical key identifier, decoupled from any HID usage code.
///
/// The same logical key can translate to different HID usages depending
/// on the detected host OS; see the behavior table in
/// [`crate::variants`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum KeyId {
    // Alphabetic block.
    KeyboardA,
    KeyboardB,
    KeyboardC,
    KeyboardD,
    KeyboardE,
    KeyboardF,
    KeyboardG,
    KeyboardH,
    KeyboardI,
    KeyboardJ,
    KeyboardK,
    KeyboardL,
    KeyboardM,
    KeyboardN,
    KeyboardO,
    KeyboardP,
    KeyboardQ,
    KeyboardR,
    KeyboardS,
    KeyboardT,
    KeyboardU,
    KeyboardV,
    KeyboardW,
    KeyboardX,
    KeyboardY,
    KeyboardZ,
    // Editing and navigation.
    KeyboardReturnEnter,
    KeyboardEscape,
    KeyboardBackspace,
    KeyboardTab,
    KeyboardSpaceBar,
    KeyboardRightArrow,
    KeyboardLeftArrow,
    KeyboardDownArrow,
    KeyboardUpArrow,
    // Modifiers.
    KeyboardLeftControl,
    KeyboardLeftShift,
    KeyboardLeftAlt,
    KeyboardLeftGui,
    KeyboardRightControl,
    KeyboardRightShift,
    KeyboardRightAlt,
    KeyboardRightGui,
    // Language-input keys.
    Muhenkan,
    Henkan,
    Kana,
    KataHira,
    Yen,
    Ro,
    // Consumer keys.
    PlayPause,
    ScanNextTrack,
    ScanPreviousTrack,
    Mute,
    VolumeUp,
    VolumeDown,
    BrightnessUp,
    BrightnessDown,
    // Virtual switch keys with a grace-hold window.
    LanguageSwitch,
    AppSwitchLaunchpad,
    // Keys with no HID translation.
    Host1,
    Host2,
    Host3,
    FnKey,
    // Mouse buttons.
    LeftButton,
    RightButton,
    MiddleButton,
    BackButton,
    ForwardButton,
}

#[cfg(test)]
mod tests {
    use super::{KeyAction, KeyId};

    #[test]
    fn key_ids_are_hashable_and_comparable() {
        use std::collections::HashSet;
        let keys: HashSet<KeyId> =
            [KeyId::KeyboardA, KeyId::KeyboardB, KeyId::KeyboardA].into_iter().collect();
        assert_eq!(keys.len(), 2);
        assert_ne!(KeyAction::Make, KeyAction::Break);
    }
}
