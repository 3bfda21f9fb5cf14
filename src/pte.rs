use std::fmt;

use bitfield_struct::bitfield;

use crate::constants::*;
use crate::error::{DatError, Result};
use crate::io::parse_hex;
use crate::memory::frame_base;

/// A 16-bit DAT page table entry in its raw bitfield form.
///
/// | Bits  | Name      | Meaning |
/// |-------|-----------|---------|
/// | 0–1   | reserved  | always 0 when built by this crate |
/// | 2     | `I`       | invalid: 0 = page present, 1 = page fault |
/// | 3–15  | `frame`   | frame ("cell") number when `I` = 0 |
#[bitfield(u16)]
#[derive(PartialEq, Eq, Hash)]
pub struct PageTableEntry {
    /// Reserved (bits 0..=1).
    #[bits(2)]
    pub reserved: u8,

    /// Invalid bit `I` (bit 2).
    pub invalid: bool,

    /// Frame number (bits 3..=15). Meaningless while `invalid` is set.
    #[bits(13)]
    pub frame: u16,
}

impl PageTableEntry {
    /// Parse the four hex digit form, e.g. `05E8`
    pub fn parse_hex(text: &str) -> Result<Self> {
        let raw = parse_hex("page table entry", text, 4)?;
        Ok(PageTableEntry::from_bits(raw as u16))
    }

    /// Entry for a page that is now resident in `frame` (`I` = 0).
    pub fn present(frame: u16) -> Self {
        PageTableEntry::new().with_frame(frame & FRAME_MASK)
    }

    /// Entry for a page that left `frame` (`I` = 1, frame bits kept).
    pub fn faulted(frame: u16) -> Self {
        Self::present(frame).with_invalid(true)
    }

    pub fn analyze(self) -> PteAnalysis {
        let raw = self.into_bits();
        let invalid_bit = ((raw >> INVALID_BIT_SHIFT) & 1) as u8;
        let state = if invalid_bit == 1 {
            EntryState::Fault
        } else {
            EntryState::Present {
                frame: raw >> (INVALID_BIT_SHIFT + 1),
            }
        };
        log::debug!("PTE {:04X}: I={invalid_bit}", raw);
        PteAnalysis {
            entry: self,
            invalid_bit,
            state,
        }
    }

    pub fn to_hex(self) -> String {
        format!("{:04X}", self.into_bits())
    }

    pub fn to_binary(self) -> String {
        format!("{:016b}", self.into_bits())
    }
}

impl fmt::Display for PageTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.into_bits())
    }
}

/// Whether the entry maps a resident page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Present { frame: u16 },
    Fault,
}

/// Decoded view of a page table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PteAnalysis {
    pub entry: PageTableEntry,
    pub invalid_bit: u8,
    pub state: EntryState,
}

impl PteAnalysis {
    #[inline]
    pub fn is_fault(&self) -> bool {
        self.state == EntryState::Fault
    }

    /// Frame holding the page; only defined when the entry is present.
    pub fn frame_number(&self) -> Result<u16> {
        match self.state {
            EntryState::Present { frame } => Ok(frame),
            EntryState::Fault => Err(DatError::IllegalState(
                "page table entry is faulted and carries no frame number",
            )),
        }
    }

    /// Start address (DC) of the frame holding the page.
    pub fn frame_base(&self) -> Result<u32> {
        self.frame_number().map(frame_base)
    }
}

/// The two entries rewritten after a replacement.
///
/// Both share the victim frame as payload: the incoming page's entry becomes
/// valid and the evicted page's entry becomes invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuiltEntries {
    pub frame: u16,
    pub incoming: PageTableEntry,
    pub outgoing: PageTableEntry,
}

impl RebuiltEntries {
    pub fn for_frame(frame: u16) -> Self {
        RebuiltEntries {
            frame,
            incoming: PageTableEntry::present(frame),
            outgoing: PageTableEntry::faulted(frame),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_present_entry() {
        // 05E8 = 0000010111101 0 00
        let analysis = PageTableEntry::parse_hex("05E8").unwrap().analyze();
        assert_eq!(analysis.invalid_bit, 0);
        assert!(!analysis.is_fault());
        assert_eq!(analysis.frame_number(), Ok(189));
        assert_eq!(analysis.frame_base(), Ok(387_072));
        assert_eq!(analysis.entry.to_binary(), "0000010111101000");
    }

    #[test]
    fn test_analyze_faulted_entry() {
        let analysis = PageTableEntry::parse_hex("103c").unwrap().analyze();
        assert_eq!(analysis.invalid_bit, 1);
        assert!(analysis.is_fault());
        assert_eq!(analysis.state, EntryState::Fault);
        assert!(matches!(
            analysis.frame_number(),
            Err(DatError::IllegalState(_))
        ));
        assert!(analysis.frame_base().is_err());
    }

    #[test]
    fn test_reserved_bits_do_not_affect_validity() {
        // 1033: I=0 even though the low bits are set
        let analysis = PageTableEntry::parse_hex("1033").unwrap().analyze();
        assert!(!analysis.is_fault());
        assert_eq!(analysis.frame_number(), Ok(0x1033 >> 3));
        assert_eq!(analysis.entry.reserved(), 0b11);
    }

    #[test]
    fn test_bitfield_matches_shift_arithmetic() {
        for raw in [0x0000u16, 0x05E8, 0x103C, 0x2565, 0x5484, 0xFFFF] {
            let entry = PageTableEntry::from_bits(raw);
            assert_eq!(entry.invalid(), (raw >> 2) & 1 == 1);
            assert_eq!(entry.frame(), raw >> 3);
        }
    }

    #[test]
    fn test_rebuilt_entries() {
        let rebuilt = RebuiltEntries::for_frame(17);
        assert_eq!(rebuilt.incoming.to_hex(), "0088");
        assert_eq!(rebuilt.outgoing.to_hex(), "008C");
        assert_eq!(rebuilt.incoming.reserved(), 0);
        assert_eq!(rebuilt.outgoing.reserved(), 0);
    }

    #[test]
    fn test_rebuilt_entries_truncate_to_13_bits() {
        let rebuilt = RebuiltEntries::for_frame(0x2000 | 5);
        assert_eq!(rebuilt.incoming.frame(), 5);
        assert_eq!(rebuilt.incoming.into_bits(), 5 << 3);
    }

    #[test]
    fn test_builder_round_trips_with_analyzer() {
        for frame in (0..=FRAME_MASK).step_by(37).chain([FRAME_MASK]) {
            let rebuilt = RebuiltEntries::for_frame(frame);
            let incoming = rebuilt.incoming.analyze();
            assert!(!incoming.is_fault());
            assert_eq!(incoming.frame_number(), Ok(frame));
            assert!(rebuilt.outgoing.analyze().is_fault());
        }
    }

    #[test]
    fn test_parse_rejects_wrong_width() {
        assert!(PageTableEntry::parse_hex("5E8").is_err());
        assert!(PageTableEntry::parse_hex("005E8").is_err());
    }
}
