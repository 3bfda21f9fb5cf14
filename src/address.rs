use std::fmt;

use crate::constants::*;
use crate::error::{DatError, Result};
use crate::io::parse_hex;

/// Represents the decomposed components of a 24-bit virtual address (dV)
///
/// Layout, most significant first: `S` (8 bits) | `P` (5 bits) | `d` (11 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VirtualAddress {
    pub raw: u32,
    pub segment: u32,
    pub page: u32,
    pub offset: u32,
}

impl VirtualAddress {
    /// Decompose a raw dV into its components
    pub fn from_raw(raw: u32) -> Result<Self> {
        if raw > MAX_ADDRESS {
            log::warn!("rejecting virtual address {raw:#X}");
            return Err(DatError::invalid(format!(
                "virtual address {raw:#X} does not fit in {ADDRESS_BITS} bits"
            )));
        }

        Ok(VirtualAddress {
            raw,
            segment: (raw >> SEGMENT_SHIFT) & SEGMENT_MASK,
            page: (raw >> PAGE_SHIFT) & PAGE_MASK,
            offset: raw & OFFSET_MASK,
        })
    }

    /// Parse the canonical six hex digit form, e.g. `03FFA3`
    pub fn parse_hex(text: &str) -> Result<Self> {
        Self::from_raw(parse_hex("virtual address", text, 6)?)
    }

    /// Page number unique across the whole virtual space: `S * 32 + P`
    #[inline]
    pub fn absolute_page(&self) -> AbsolutePage {
        AbsolutePage::from_parts(self.segment, self.page)
    }

    pub fn to_hex(&self) -> String {
        format!("{:06X}", self.raw)
    }

    pub fn to_binary(&self) -> String {
        format!("{:024b}", self.raw)
    }

    pub fn offset_binary(&self) -> String {
        format!("{:011b}", self.offset)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dV {:06X} = (S={}, P={}, d={})",
            self.raw, self.segment, self.page, self.offset
        )
    }
}

/// Absolute page number (`S * 32 + P`), as stored in a page frame table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AbsolutePage(u16);

impl AbsolutePage {
    pub const fn new(value: u16) -> Self {
        AbsolutePage(value)
    }

    pub fn from_parts(segment: u32, page: u32) -> Self {
        let value = (segment & SEGMENT_MASK) * PAGES_PER_SEGMENT + (page & PAGE_MASK);
        AbsolutePage(value as u16)
    }

    /// Parse the four hex digit locator form, e.g. `05A2`
    pub fn parse_hex(text: &str) -> Result<Self> {
        let value = parse_hex("page locator", text, 4)?;
        Ok(AbsolutePage(value as u16))
    }

    #[inline]
    pub const fn value(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    pub const fn segment(self) -> u32 {
        self.0 as u32 / PAGES_PER_SEGMENT
    }

    #[inline]
    pub const fn page(self) -> u32 {
        self.0 as u32 % PAGES_PER_SEGMENT
    }

    pub fn to_hex(self) -> String {
        format!("{:04X}", self.0)
    }
}

impl fmt::Display for AbsolutePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The page that occupied a frame before the frame was chosen as victim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictedPage {
    pub locator: AbsolutePage,
    pub segment: u32,
    pub page: u32,
}

impl EvictedPage {
    /// Recover segment and page from the stored absolute page number.
    ///
    /// Locators above the 13-bit page space are passed through unchanged;
    /// the segment then simply exceeds 255.
    pub fn resolve(locator: AbsolutePage) -> Self {
        EvictedPage {
            locator,
            segment: locator.segment(),
            page: locator.page(),
        }
    }
}

impl fmt::Display for EvictedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page {} ({}) = (S={}, P={})",
            self.locator,
            self.locator.to_hex(),
            self.segment,
            self.page
        )
    }
}
