// PLT fixed-size structures: archive header, base frame descriptor and
// per-frame delta entry descriptor.
//
// All structures are packed (no padding) and little-endian.

use super::FormatError;

/// Fetch `N` bytes at `at` from a fixed-size record. Callers pass offsets
/// that are within their own `SIZE`, so the slice is always in range.
fn field<const N: usize>(buf: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[at..at + N]);
    out
}

fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(field(buf, at))
}

// ---------------------------------------------------------------------------
// Archive header
// ---------------------------------------------------------------------------

/// Parsed archive header.
///
/// The `x`, `y`, `w`, `h` window is archive-level metadata. It is not used to
/// decode pixels and need not match the base frame descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveHeader {
    /// Format identifier (not validated).
    pub magic: i32,
    /// Number of frames declared in the archive, base frame included.
    pub file_count: u16,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl ArchiveHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 22;

    /// Parse a header from its packed representation.
    pub fn from_bytes(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            magic: i32::from_le_bytes(field(buf, 0)),
            file_count: u16::from_le_bytes(field(buf, 4)),
            x: u32_at(buf, 6),
            y: u32_at(buf, 10),
            w: u32_at(buf, 14),
            h: u32_at(buf, 18),
        }
    }

    /// Packed representation of this header.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..6].copy_from_slice(&self.file_count.to_le_bytes());
        buf[6..10].copy_from_slice(&self.x.to_le_bytes());
        buf[10..14].copy_from_slice(&self.y.to_le_bytes());
        buf[14..18].copy_from_slice(&self.w.to_le_bytes());
        buf[18..22].copy_from_slice(&self.h.to_le_bytes());
        buf
    }

    /// Number of delta entries following the base frame.
    #[inline]
    pub fn delta_count(&self) -> u16 {
        self.file_count.saturating_sub(1)
    }
}

// ---------------------------------------------------------------------------
// Base frame descriptor
// ---------------------------------------------------------------------------

/// Geometry of the base frame. Every frame in the archive shares it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaseFrameDescriptor {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    /// Bytes per pixel: 3 (stored B,G,R) or 4 (stored fully reversed).
    pub c: u32,
}

impl BaseFrameDescriptor {
    /// Encoded size in bytes.
    pub const SIZE: usize = 20;

    pub fn from_bytes(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            x: u32_at(buf, 0),
            y: u32_at(buf, 4),
            w: u32_at(buf, 8),
            h: u32_at(buf, 12),
            c: u32_at(buf, 16),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        for (i, v) in [self.x, self.y, self.w, self.h, self.c].into_iter().enumerate() {
            buf[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
        buf
    }

    /// Pixel layout described by this descriptor.
    #[inline]
    pub fn layout(&self) -> FrameLayout {
        FrameLayout {
            width: self.w,
            height: self.h,
            channels: self.c,
        }
    }
}

// ---------------------------------------------------------------------------
// Delta entry descriptor
// ---------------------------------------------------------------------------

/// Descriptor preceding each delta payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaEntry {
    /// Interleave stride of the RLE payload. Normally equal to the channel
    /// count, but the decoder uses whatever is declared.
    pub bands: u8,
    /// Compressed payload length in bytes.
    pub length: u32,
}

impl DeltaEntry {
    /// Encoded size in bytes.
    pub const SIZE: usize = 5;

    pub fn from_bytes(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            bands: buf[0],
            length: u32_at(buf, 1),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = self.bands;
        buf[1..5].copy_from_slice(&self.length.to_le_bytes());
        buf
    }
}

// ---------------------------------------------------------------------------
// Frame layout
// ---------------------------------------------------------------------------

/// Width, height and bytes per pixel of every frame in an archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

impl FrameLayout {
    /// Canonical frame size, `width * height * channels` bytes.
    pub fn canonical_size(&self) -> Result<usize, FormatError> {
        let too_large = || FormatError::FrameTooLarge {
            width: self.width,
            height: self.height,
            channels: self.channels,
        };
        let w = usize::try_from(self.width).map_err(|_| too_large())?;
        let h = usize::try_from(self.height).map_err(|_| too_large())?;
        let c = usize::try_from(self.channels).map_err(|_| too_large())?;
        w.checked_mul(h)
            .and_then(|n| n.checked_mul(c))
            .ok_or_else(too_large)
    }

    /// Is this a layout the pixel adapter can emit?
    #[inline]
    pub fn is_supported(&self) -> bool {
        matches!(self.channels, 3 | 4)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_field_offsets() {
        let mut buf = [0u8; ArchiveHeader::SIZE];
        buf[0..4].copy_from_slice(&(-2i32).to_le_bytes());
        buf[4..6].copy_from_slice(&7u16.to_le_bytes());
        buf[6..10].copy_from_slice(&1u32.to_le_bytes());
        buf[10..14].copy_from_slice(&2u32.to_le_bytes());
        buf[14..18].copy_from_slice(&640u32.to_le_bytes());
        buf[18..22].copy_from_slice(&480u32.to_le_bytes());

        let hdr = ArchiveHeader::from_bytes(&buf);
        assert_eq!(hdr.magic, -2);
        assert_eq!(hdr.file_count, 7);
        assert_eq!((hdr.x, hdr.y, hdr.w, hdr.h), (1, 2, 640, 480));
        assert_eq!(hdr.delta_count(), 6);
        assert_eq!(hdr.to_bytes(), buf);
    }

    #[test]
    fn zero_file_count_has_no_deltas() {
        let hdr = ArchiveHeader::default();
        assert_eq!(hdr.delta_count(), 0);
    }

    #[test]
    fn base_descriptor_is_little_endian() {
        let base = BaseFrameDescriptor {
            x: 0,
            y: 0,
            w: 0x0102,
            h: 3,
            c: 4,
        };
        let buf = base.to_bytes();
        assert_eq!(&buf[8..12], &[0x02, 0x01, 0x00, 0x00]);
        assert_eq!(BaseFrameDescriptor::from_bytes(&buf), base);
    }

    #[test]
    fn delta_entry_is_packed() {
        let entry = DeltaEntry {
            bands: 3,
            length: 0xAABBCCDD,
        };
        let buf = entry.to_bytes();
        assert_eq!(buf, [3, 0xDD, 0xCC, 0xBB, 0xAA]);
        assert_eq!(DeltaEntry::from_bytes(&buf), entry);
    }

    #[test]
    fn canonical_size_multiplies_dimensions() {
        let layout = FrameLayout {
            width: 2,
            height: 1,
            channels: 3,
        };
        assert_eq!(layout.canonical_size().unwrap(), 6);
        assert!(layout.is_supported());
    }

    #[test]
    fn canonical_size_overflow_is_rejected() {
        let layout = FrameLayout {
            width: u32::MAX,
            height: u32::MAX,
            channels: u32::MAX,
        };
        assert!(matches!(
            layout.canonical_size(),
            Err(FormatError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn two_channel_layout_is_unsupported() {
        let layout = FrameLayout {
            width: 1,
            height: 1,
            channels: 2,
        };
        assert!(!layout.is_supported());
    }
}
