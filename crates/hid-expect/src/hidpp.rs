//! HID++ report envelope and pre-pairing wire layouts.
//!
//! Frames are byte-exact:
//!
//! ```text
//! | ReportID(8) | DeviceIndex(8) | FeatureIndex(8) | FnID(4)|SwID(4) | payload |
//! ```
//!
//! Short reports are 7 bytes, long reports 20 bytes. The pre-pairing
//! session (feature 0x1817) stages a pairing address, eQuad attributes,
//! and a long-term key; storing with any piece missing fails with
//! `NOT_ALLOWED` (0x05) and leaves the stored slot untouched.

use crate::error::HidppError;

/// Report identifier of a short (7-byte) HID++ frame.
pub const SHORT_REPORT_ID: u8 = 0x10;
/// Report identifier of a long (20-byte) HID++ frame.
pub const LONG_REPORT_ID: u8 = 0x11;
/// Total length of a short frame.
pub const SHORT_REPORT_LEN: usize = 7;
/// Total length of a long frame.
pub const LONG_REPORT_LEN: usize = 20;
/// Envelope bytes ahead of the payload.
pub const HEADER_LEN: usize = 4;
/// Protocol error code for a command issued in a forbidden state.
pub const ERR_NOT_ALLOWED: u8 = 0x05;
/// Feature identifier of the pre-pairing management feature.
pub const PREPAIRING_FEATURE_ID: u16 = 0x1817;
/// Friendly-name chunk payload size.
pub const NAME_CHUNK_LEN: usize = 16;

/// HID++ frame sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ReportKind {
    /// 7-byte frame, 3-byte payload.
    Short,
    /// 20-byte frame, 16-byte payload.
    Long,
}

impl ReportKind {
    /// Total frame length.
    #[must_use]
    pub const fn frame_len(self) -> usize {
        match self {
            Self::Short => SHORT_REPORT_LEN,
            Self::Long => LONG_REPORT_LEN,
        }
    }

    /// Payload capacity of this frame size.
    #[must_use]
    pub const fn payload_len(self) -> usize {
        self.frame_len() - HEADER_LEN
    }

    const fn report_id(self) -> u8 {
        match self {
            Self::Short => SHORT_REPORT_ID,
            Self::Long => LONG_REPORT_ID,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Long => "long",
        }
    }
}

/// HID++ envelope ahead of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Envelope {
    /// Frame size selector.
    pub kind: ReportKind,
    /// Device index on the receiver.
    pub device_index: u8,
    /// Feature table index.
    pub feature_index: u8,
    /// Function identifier, 4 bits.
    pub function_id: u8,
    /// Software identifier, 4 bits.
    pub software_id: u8,
}

impl Envelope {
    /// Serializes the envelope and payload into one frame, zero-padding
    /// the payload to the frame size.
    ///
    /// # Errors
    ///
    /// Returns [`HidppError::PayloadOverflow`] when the payload exceeds
    /// the frame capacity and [`HidppError::NibbleOverflow`] when an
    /// identifier exceeds its 4-bit field.
    pub fn to_frame(&self, payload: &[u8]) -> Result<Vec<u8>, HidppError> {
        if self.function_id > 0x0F {
            return Err(HidppError::NibbleOverflow(self.function_id));
        }
        if self.software_id > 0x0F {
            return Err(HidppError::NibbleOverflow(self.software_id));
        }
        if payload.len() > self.kind.payload_len() {
            return Err(HidppError::PayloadOverflow {
                len: payload.len(),
                kind: self.kind.name(),
            });
        }
        let mut frame = vec![0_u8; self.kind.frame_len()];
        frame[0] = self.kind.report_id();
        frame[1] = self.device_index;
        frame[2] = self.feature_index;
        frame[3] = (self.function_id << 4) | self.software_id;
        frame[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);
        Ok(frame)
    }

    /// Parses a frame back into its envelope and payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HidppError::MalformedFrame`] for an unknown report
    /// identifier or a length mismatch.
    pub fn parse(frame: &[u8]) -> Result<(Self, &[u8]), HidppError> {
        let kind = match frame.first() {
            Some(&SHORT_REPORT_ID) => ReportKind::Short,
            Some(&LONG_REPORT_ID) => ReportKind::Long,
            _ => return Err(HidppError::MalformedFrame),
        };
        if frame.len() != kind.frame_len() {
            return Err(HidppError::MalformedFrame);
        }
        let envelope = Self {
            kind,
            device_index: frame[1],
            feature_index: frame[2],
            function_id: frame[3] >> 4,
            software_id: frame[3] & 0x0F,
        };
        Ok((envelope, &frame[HEADER_LEN..]))
    }
}

/// Host friendly-name chunk payload:
/// `HostIndex(8) | ByteIndex(8) | NameChunk(16)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FriendlyNameChunk {
    /// Targeted host slot.
    pub host_index: u8,
    /// Offset of this chunk within the full name.
    pub byte_index: u8,
    /// ASCII bytes, null-padded.
    pub chunk: [u8; NAME_CHUNK_LEN],
}

impl FriendlyNameChunk {
    /// Builds the chunk covering `name[byte_index..]`, null-padded.
    ///
    /// # Errors
    ///
    /// Returns [`HidppError::InvalidNameChunk`] for non-ASCII names.
    pub fn write(host_index: u8, byte_index: u8, name: &str) -> Result<Self, HidppError> {
        if !name.is_ascii() {
            return Err(HidppError::InvalidNameChunk);
        }
        let mut chunk = [0_u8; NAME_CHUNK_LEN];
        let bytes = name.as_bytes();
        let start = usize::from(byte_index).min(bytes.len());
        let tail = &bytes[start..];
        let len = tail.len().min(NAME_CHUNK_LEN);
        chunk[..len].copy_from_slice(&tail[..len]);
        Ok(Self { host_index, byte_index, chunk })
    }

    /// Serializes to the 18-byte long-report payload prefix.
    #[must_use]
    pub fn to_payload(&self) -> [u8; 2 + NAME_CHUNK_LEN] {
        let mut payload = [0_u8; 2 + NAME_CHUNK_LEN];
        payload[0] = self.host_index;
        payload[1] = self.byte_index;
        payload[2..].copy_from_slice(&self.chunk);
        payload
    }

    /// Parses a payload prefix back into a chunk.
    ///
    /// # Errors
    ///
    /// Returns [`HidppError::InvalidNameChunk`] for short or non-ASCII
    /// payloads.
    pub fn parse(payload: &[u8]) -> Result<Self, HidppError> {
        if payload.len() < 2 + NAME_CHUNK_LEN {
            return Err(HidppError::InvalidNameChunk);
        }
        let mut chunk = [0_u8; NAME_CHUNK_LEN];
        chunk.copy_from_slice(&payload[2..2 + NAME_CHUNK_LEN]);
        if !chunk.iter().all(|byte| *byte == 0 || byte.is_ascii()) {
            return Err(HidppError::InvalidNameChunk);
        }
        Ok(Self { host_index: payload[0], byte_index: payload[1], chunk })
    }

    /// Name bytes up to the first null.
    #[must_use]
    pub fn name_bytes(&self) -> &[u8] {
        let end = self.chunk.iter().position(|byte| *byte == 0).unwrap_or(NAME_CHUNK_LEN);
        &self.chunk[..end]
    }
}

/// Data persisted by a successful pre-pairing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PrepairingRecord {
    /// eQuad base address and destination id.
    pub address: [u8; 6],
    /// eQuad attribute bytes.
    pub equad_attributes: [u8; 2],
    /// Long-term key.
    pub ltk: [u8; 16],
}

/// Pre-pairing management session (feature 0x1817).
///
/// `start` opens a staging session; the three setters may arrive in any
/// order; `store` persists only when all three were supplied.
#[derive(Debug, Clone, Default)]
pub struct PrepairingSession {
    started: bool,
    address: Option<[u8; 6]>,
    equad_attributes: Option<[u8; 2]>,
    ltk: Option<[u8; 16]>,
    stored: Option<PrepairingRecord>,
}

impl PrepairingSession {
    /// Creates a session with nothing staged or stored.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a staging session, discarding previously staged data.
    pub fn start(&mut self) {
        self.started = true;
        self.address = None;
        self.equad_attributes = None;
        self.ltk = None;
    }

    /// Stages the pairing address.
    ///
    /// # Errors
    ///
    /// Returns [`HidppError::NotAllowed`] outside a started session.
    pub fn set_pairing_address(&mut self, address: [u8; 6]) -> Result<(), HidppError> {
        if !self.started {
            return Err(HidppError::NotAllowed);
        }
        self.address = Some(address);
        Ok(())
    }

    /// Stages the eQuad attributes.
    ///
    /// # Errors
    ///
    /// Returns [`HidppError::NotAllowed`] outside a started session.
    pub fn set_equad_attributes(&mut self, attributes: [u8; 2]) -> Result<(), HidppError> {
        if !self.started {
            return Err(HidppError::NotAllowed);
        }
        self.equad_attributes = Some(attributes);
        Ok(())
    }

    /// Stages the long-term key.
    ///
    /// # Errors
    ///
    /// Returns [`HidppError::NotAllowed`] outside a started session.
    pub fn set_ltk(&mut self, ltk: [u8; 16]) -> Result<(), HidppError> {
        if !self.started {
            return Err(HidppError::NotAllowed);
        }
        self.ltk = Some(ltk);
        Ok(())
    }

    /// Persists the staged record and closes the session.
    ///
    /// # Errors
    ///
    /// Returns [`HidppError::NotAllowed`] when any piece is missing;
    /// the stored record is left untouched in that case.
    pub fn store(&mut self) -> Result<(), HidppError> {
        let (Some(address), Some(equad_attributes), Some(ltk)) =
            (self.address, self.equad_attributes, self.ltk)
        else {
            return Err(HidppError::NotAllowed);
        };
        if !self.started {
            return Err(HidppError::NotAllowed);
        }
        self.stored = Some(PrepairingRecord { address, equad_attributes, ltk });
        self.started = false;
        Ok(())
    }

    /// Currently persisted record, if any.
    #[must_use]
    pub const fn stored(&self) -> Option<&PrepairingRecord> {
        self.stored.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Envelope, FriendlyNameChunk, PrepairingSession, ReportKind, ERR_NOT_ALLOWED,
        LONG_REPORT_LEN, SHORT_REPORT_LEN,
    };
    use crate::error::HidppError;

    #[test]
    fn short_frame_layout_is_bit_exact() {
        let envelope = Envelope {
            kind: ReportKind::Short,
            device_index: 0x02,
            feature_index: 0x08,
            function_id: 0x3,
            software_id: 0xA,
        };
        let frame = envelope.to_frame(&[0xDE, 0xAD]).unwrap();
        assert_eq!(frame.len(), SHORT_REPORT_LEN);
        assert_eq!(frame, vec![0x10, 0x02, 0x08, 0x3A, 0xDE, 0xAD, 0x00]);

        let (parsed, payload) = Envelope::parse(&frame).unwrap();
        assert_eq!(parsed, envelope);
        assert_eq!(payload, &[0xDE, 0xAD, 0x00]);
    }

    #[test]
    fn long_frame_carries_sixteen_payload_bytes() {
        let envelope = Envelope {
            kind: ReportKind::Long,
            device_index: 0xFF,
            feature_index: 0x00,
            function_id: 0x1,
            software_id: 0x1,
        };
        let payload: Vec<u8> = (0..16).collect();
        let frame = envelope.to_frame(&payload).unwrap();
        assert_eq!(frame.len(), LONG_REPORT_LEN);
        assert_eq!(frame[0], 0x11);
        assert_eq!(&frame[4..], payload.as_slice());
    }

    #[test]
    fn oversized_payload_and_wide_nibbles_are_rejected() {
        let envelope = Envelope {
            kind: ReportKind::Short,
            device_index: 0,
            feature_index: 0,
            function_id: 0,
            software_id: 0,
        };
        assert_eq!(
            envelope.to_frame(&[0; 4]),
            Err(HidppError::PayloadOverflow { len: 4, kind: "short" })
        );

        let wide = Envelope { function_id: 0x10, ..envelope };
        assert_eq!(wide.to_frame(&[]), Err(HidppError::NibbleOverflow(0x10)));
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert_eq!(Envelope::parse(&[]), Err(HidppError::MalformedFrame));
        assert_eq!(Envelope::parse(&[0x12, 0, 0, 0, 0, 0, 0]), Err(HidppError::MalformedFrame));
        assert_eq!(Envelope::parse(&[0x10, 0, 0]), Err(HidppError::MalformedFrame));
    }

    #[test]
    fn friendly_name_chunks_are_null_padded_ascii() {
        let chunk = FriendlyNameChunk::write(1, 0, "Keyboard K380").unwrap();
        assert_eq!(chunk.name_bytes(), b"Keyboard K380");
        assert_eq!(chunk.chunk[13..], [0, 0, 0]);

        let payload = chunk.to_payload();
        assert_eq!(payload[0], 1);
        assert_eq!(payload[1], 0);
        let parsed = FriendlyNameChunk::parse(&payload).unwrap();
        assert_eq!(parsed, chunk);
    }

    #[test]
    fn friendly_name_chunking_continues_mid_name() {
        let name = "A very long workstation name";
        let chunk = FriendlyNameChunk::write(0, 16, name).unwrap();
        assert_eq!(chunk.name_bytes(), &name.as_bytes()[16..]);
    }

    #[test]
    fn non_ascii_names_are_rejected() {
        assert_eq!(
            FriendlyNameChunk::write(0, 0, "Clé"),
            Err(HidppError::InvalidNameChunk)
        );
    }

    #[test]
    fn store_requires_all_three_pieces() {
        let mut session = PrepairingSession::new();
        session.start();
        session.set_pairing_address([1, 2, 3, 4, 5, 6]).unwrap();
        session.set_equad_attributes([7, 8]).unwrap();

        // LTK missing: NOT_ALLOWED, nothing persisted.
        assert_eq!(session.store(), Err(HidppError::NotAllowed));
        assert!(session.stored().is_none());

        session.set_ltk([9; 16]).unwrap();
        session.store().unwrap();
        let record = session.stored().unwrap();
        assert_eq!(record.address, [1, 2, 3, 4, 5, 6]);
        assert_eq!(record.equad_attributes, [7, 8]);
        assert_eq!(record.ltk, [9; 16]);
    }

    #[test]
    fn setters_outside_a_session_are_not_allowed() {
        let mut session = PrepairingSession::new();
        assert_eq!(session.set_pairing_address([0; 6]), Err(HidppError::NotAllowed));
        assert_eq!(session.set_ltk([0; 16]), Err(HidppError::NotAllowed));
    }

    #[test]
    fn restart_discards_staged_data_but_keeps_the_stored_record() {
        let mut session = PrepairingSession::new();
        session.start();
        session.set_pairing_address([1; 6]).unwrap();
        session.set_equad_attributes([2; 2]).unwrap();
        session.set_ltk([3; 16]).unwrap();
        session.store().unwrap();

        session.start();
        session.set_pairing_address([4; 6]).unwrap();
        assert_eq!(session.store(), Err(HidppError::NotAllowed));
        assert_eq!(session.stored().unwrap().address, [1; 6]);
    }

    #[test]
    fn not_allowed_maps_to_the_wire_error_code() {
        assert_eq!(ERR_NOT_ALLOWED, 0x05);
    }
}
