// PLT archive format implementation.
//
// A PLT archive is one XOR-encrypted base frame followed by zero or more
// delta frames. Each delta is a band-interleaved run-length encoding of the
// per-byte difference against the previously reconstructed frame.
//
// # Modules
//
// - `header`    : Packed archive header, base descriptor and entry descriptor
// - `keystream` : Repeating-key XOR used on the base frame
// - `rle`       : Band-interleaved run-length decoder
// - `accumulate`: Wrapping byte-wise addition of deltas onto the previous frame
// - `decoder`   : Archive pipeline: header, base frame, delta frames
// - `pixel`     : Bottom-up reversed-channel buffer to top-down RGB(A)

pub mod accumulate;
pub mod decoder;
pub mod header;
pub mod keystream;
pub mod pixel;
pub mod rle;

use std::fmt;

// Re-export key types for convenience.
pub use accumulate::{FrameAccumulator, LengthMismatch, accumulate};
pub use decoder::{ArchiveDecoder, ArchiveIndex, DecodeError, Frame, decode_all, read_index};
pub use header::{ArchiveHeader, BaseFrameDescriptor, DeltaEntry, FrameLayout};
pub use keystream::{KeyError, KeyStream};

// ---------------------------------------------------------------------------
// Format errors
// ---------------------------------------------------------------------------

/// Part of the archive being read when a format violation was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Header,
    BaseDescriptor,
    BaseFrame,
    EntryDescriptor,
    EntryPayload,
    /// RLE input for one interleaved band.
    Band(usize),
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => f.write_str("archive header"),
            Self::BaseDescriptor => f.write_str("base frame descriptor"),
            Self::BaseFrame => f.write_str("base frame"),
            Self::EntryDescriptor => f.write_str("delta entry descriptor"),
            Self::EntryPayload => f.write_str("delta entry payload"),
            Self::Band(k) => write!(f, "RLE band {k}"),
        }
    }
}

/// A violation of the archive format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// The input ended before a section was complete.
    #[error("unexpected end of input in {section}: needed {needed} bytes, got {available}")]
    Truncated {
        section: Section,
        needed: u64,
        available: u64,
    },

    /// Only 3- and 4-channel interleaved layouts can be emitted.
    #[error("unsupported pixel format: {} bpp ({channels} channels)", .channels.saturating_mul(8))]
    UnsupportedLayout { channels: u32 },

    /// The band count cannot be used as an interleave stride for this frame.
    #[error("invalid band count {bands} for a {size}-byte frame")]
    InvalidBands { bands: usize, size: usize },

    /// A frame buffer does not have the size its layout requires.
    #[error("frame buffer is {actual} bytes, layout requires {expected}")]
    FrameSize { expected: usize, actual: usize },

    /// `w * h * c` does not fit in memory addressing.
    #[error("frame dimensions {width}x{height}x{channels} overflow")]
    FrameTooLarge {
        width: u32,
        height: u32,
        channels: u32,
    },
}

impl FormatError {
    /// Is this a truncation (as opposed to a layout problem)?
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}
