// Pixel layout adapter for image encoders.
//
// Decoded frames are stored bottom row first, with each pixel's channels in
// reverse order (B,G,R for 3 channels; all four bytes reversed for 4).
// Encoders expect top row first in R,G,B[,A] order.

use super::header::FrameLayout;
use super::FormatError;

/// Convert a decoded frame to top-down R,G,B[,A] rows.
///
/// Rejects layouts other than 3 or 4 channels, and buffers whose length does
/// not match the layout.
pub fn to_rgb_top_down(data: &[u8], layout: &FrameLayout) -> Result<Vec<u8>, FormatError> {
    if !layout.is_supported() {
        return Err(FormatError::UnsupportedLayout {
            channels: layout.channels,
        });
    }
    let size = layout.canonical_size()?;
    if data.len() != size {
        return Err(FormatError::FrameSize {
            expected: size,
            actual: data.len(),
        });
    }
    if size == 0 {
        return Ok(Vec::new());
    }

    let channels = layout.channels as usize;
    let stride = layout.width as usize * channels;

    let mut out = Vec::with_capacity(size);
    for row in data.chunks_exact(stride).rev() {
        for px in row.chunks_exact(channels) {
            out.extend(px.iter().rev());
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
