use std::fmt;

use crate::constants::*;
use crate::error::{DatError, Result};

/// Calculate the starting address (DC) of a frame
#[inline]
pub fn frame_base(frame: u16) -> u32 {
    frame as u32 * PAGE_SIZE
}

/// Number of frames ("cells") in a real storage of `real_memory_kb` kilobytes
#[inline]
pub fn cell_count(real_memory_kb: u32) -> u32 {
    real_memory_kb / KB_PER_CELL
}

/// A real address (DR): frame start plus the displacement within the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealAddress {
    pub frame: u16,
    pub offset: u32,
    pub base: u32,
    pub value: u32,
}

impl RealAddress {
    /// DR = DC + d
    pub fn assemble(frame: u16, offset: u32) -> Result<Self> {
        if offset >= PAGE_SIZE {
            return Err(DatError::invalid(format!(
                "offset {offset} exceeds the page size of {PAGE_SIZE} bytes"
            )));
        }

        let base = frame_base(frame);
        Ok(RealAddress {
            frame,
            offset,
            base,
            value: base + offset,
        })
    }

    pub fn to_hex(&self) -> String {
        format!("{:06X}", self.value)
    }

    pub fn to_binary(&self) -> String {
        format!("{:024b}", self.value)
    }

    pub fn base_hex(&self) -> String {
        format!("{:06X}", self.base)
    }
}

impl fmt::Display for RealAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DR {:06X} ({})", self.value, self.value)
    }
}
