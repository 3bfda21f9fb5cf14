pub const SEGMENT_BITS: u32 = 8;
pub const PAGE_BITS: u32 = 5;
pub const OFFSET_BITS: u32 = 11;

pub const ADDRESS_BITS: u32 = SEGMENT_BITS + PAGE_BITS + OFFSET_BITS;
pub const MAX_ADDRESS: u32 = (1 << ADDRESS_BITS) - 1;

pub const PAGE_SIZE: u32 = 1 << OFFSET_BITS;
pub const PAGES_PER_SEGMENT: u32 = 1 << PAGE_BITS;
pub const MAX_SEGMENTS: u32 = 1 << SEGMENT_BITS;

pub const OFFSET_MASK: u32 = (1 << OFFSET_BITS) - 1;
pub const PAGE_MASK: u32 = (1 << PAGE_BITS) - 1;
pub const SEGMENT_MASK: u32 = (1 << SEGMENT_BITS) - 1;

pub const PAGE_SHIFT: u32 = OFFSET_BITS;
pub const SEGMENT_SHIFT: u32 = PAGE_BITS + OFFSET_BITS;

// page table entry: [13 bits frame | I | 2 reserved]
pub const FRAME_BITS: u32 = 13;
pub const FRAME_MASK: u16 = (1 << FRAME_BITS) - 1;
pub const INVALID_BIT_SHIFT: u32 = 2;

/// Kilobytes of real storage backing one frame ("cell").
pub const KB_PER_CELL: u32 = PAGE_SIZE / 1024;

/// Upper bound on evictor iterations before the queue input is declared malformed.
pub const MAX_EVICTION_STEPS: usize = 1000;
