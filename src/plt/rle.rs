// Band-interleaved run-length decoder for delta payloads.
//
// The output frame is split into `bands` interleaved channels: band k owns
// offsets k, k + bands, k + 2*bands, ... Bands are encoded one after another
// in the payload and share a single input cursor.
//
// Within a band, a byte equal to the previous one signals a run. It is
// followed by a count of further repetitions:
//   - 0xxxxxxx            count = x                      (0..=127)
//   - 1xxxxxxx yyyyyyyy   count = (x << 8 | y) + 0x80     (128..=32895)
// and, if the band still has room, by one literal that restarts matching.

use super::{FormatError, Section};

/// Counts below this use the single-byte form.
pub const SHORT_RUN_LIMIT: usize = 0x80;

/// Largest count representable by the two-byte escape.
pub const MAX_RUN: usize = 0x7FFF + SHORT_RUN_LIMIT;

// ---------------------------------------------------------------------------
// Input cursor
// ---------------------------------------------------------------------------

/// Bounds-checked reader over the compressed payload.
struct Input<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    fn next(&mut self, band: usize) -> Result<u8, FormatError> {
        let b = *self.data.get(self.pos).ok_or(FormatError::Truncated {
            section: Section::Band(band),
            needed: self.pos as u64 + 1,
            available: self.data.len() as u64,
        })?;
        self.pos += 1;
        Ok(b)
    }

    fn run_length(&mut self, band: usize) -> Result<usize, FormatError> {
        let r0 = usize::from(self.next(band)?);
        if r0 < SHORT_RUN_LIMIT {
            return Ok(r0);
        }
        let r1 = usize::from(self.next(band)?);
        Ok((((r0 & 0x7F) << 8) | r1) + SHORT_RUN_LIMIT)
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Expand `input` into a buffer of exactly `size` bytes over `bands`
/// interleaved channels.
///
/// With zero bands nothing is read and the result is all zeros, so the
/// delta leaves the previous frame unchanged.
///
/// Fails with [`FormatError::Truncated`] if the payload ends before every
/// band is filled, and with [`FormatError::InvalidBands`] if `bands` is
/// larger than `size`. Bytes left over after the last band are ignored.
pub fn decode(input: &[u8], size: usize, bands: usize) -> Result<Vec<u8>, FormatError> {
    if bands == 0 {
        log::debug!("rle: zero bands, empty delta of {size} bytes");
        return Ok(vec![0u8; size]);
    }
    if bands > size {
        return Err(FormatError::InvalidBands { bands, size });
    }

    let mut output = vec![0u8; size];
    let mut input = Input::new(input);

    for band in 0..bands {
        decode_band(&mut input, &mut output, band, bands)?;
        log::trace!("rle: band {band} done at input offset {}", input.pos);
    }

    if input.pos < input.data.len() {
        log::debug!(
            "rle: {} trailing payload bytes ignored",
            input.data.len() - input.pos
        );
    }

    Ok(output)
}

fn decode_band(
    input: &mut Input<'_>,
    output: &mut [u8],
    band: usize,
    stride: usize,
) -> Result<(), FormatError> {
    let end = output.len();
    let mut out = band;

    let mut last = input.next(band)?;
    output[out] = last;
    out += stride;

    while out < end {
        let mut b = input.next(band)?;
        output[out] = b;
        out += stride;

        if b == last {
            let mut count = input.run_length(band)?;
            while count > 0 && out < end {
                output[out] = b;
                out += stride;
                count -= 1;
            }

            if out < end {
                b = input.next(band)?;
                output[out] = b;
                out += stride;
            }
        }
        last = b;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
