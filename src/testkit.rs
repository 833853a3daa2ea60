//! Fixture builders for tests, benchmarks and fuzzing.
//!
//! Provides a reference run-length encoder matching [`crate::plt::rle`], the
//! inverse of delta accumulation, and an [`ArchiveBuilder`] that writes
//! well-formed archives. None of this is needed to decode archives.

use crate::plt::header::{ArchiveHeader, BaseFrameDescriptor, DeltaEntry};
use crate::plt::keystream::KeyStream;
use crate::plt::rle::{MAX_RUN, SHORT_RUN_LIMIT};

/// Byte-wise `a - b (mod 256)`.
///
/// # Panics
///
/// Panics if the slices differ in length.
pub fn difference(a: &[u8], b: &[u8]) -> Vec<u8> {
    assert_eq!(a.len(), b.len(), "difference of unequal buffers");
    a.iter().zip(b).map(|(&x, &y)| x.wrapping_sub(y)).collect()
}

fn push_count(out: &mut Vec<u8>, count: usize) {
    debug_assert!(count <= MAX_RUN);
    if count < SHORT_RUN_LIMIT {
        out.push(count as u8);
    } else {
        let c = count - SHORT_RUN_LIMIT;
        out.push(0x80 | (c >> 8) as u8);
        out.push((c & 0xFF) as u8);
    }
}

/// Encode one band (already de-interleaved).
fn encode_band(values: &[u8], out: &mut Vec<u8>) {
    let Some((&first, rest)) = values.split_first() else {
        return;
    };
    out.push(first);
    let mut last = first;
    let mut i = 0;
    while i < rest.len() {
        let b = rest[i];
        out.push(b);
        i += 1;
        if b == last {
            let run = rest[i..]
                .iter()
                .take(MAX_RUN)
                .take_while(|&&v| v == b)
                .count();
            push_count(out, run);
            i += run;
            if i < rest.len() {
                out.push(rest[i]);
                last = rest[i];
                i += 1;
                continue;
            }
        }
        last = b;
    }
}

/// Reference run-length encoder: `rle::decode(&encode(data, bands),
/// data.len(), bands)` returns `data` for any `bands` in `1..=data.len()`.
pub fn rle_encode(data: &[u8], bands: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2 + bands);
    for band in 0..bands {
        let values: Vec<u8> = data.iter().skip(band).step_by(bands).copied().collect();
        encode_band(&values, &mut out);
    }
    out
}

// ---------------------------------------------------------------------------
// ArchiveBuilder
// ---------------------------------------------------------------------------

enum Entry {
    /// A full frame; stored as the RLE of its difference to the previous one.
    Frame(Vec<u8>),
    /// Pre-encoded payload with an explicit band count.
    Raw { bands: u8, payload: Vec<u8> },
}

/// Writes PLT archives from plaintext frames.
pub struct ArchiveBuilder {
    header: ArchiveHeader,
    base: BaseFrameDescriptor,
    base_frame: Vec<u8>,
    entries: Vec<Entry>,
    file_count: Option<u16>,
}

impl ArchiveBuilder {
    pub fn new(w: u32, h: u32, c: u32) -> Self {
        Self {
            header: ArchiveHeader {
                magic: 0x00544C50,
                w,
                h,
                ..Default::default()
            },
            base: BaseFrameDescriptor { x: 0, y: 0, w, h, c },
            base_frame: Vec::new(),
            entries: Vec::new(),
            file_count: None,
        }
    }

    /// Set the header's metadata window.
    pub fn window(mut self, x: u32, y: u32, w: u32, h: u32) -> Self {
        self.header.x = x;
        self.header.y = y;
        self.header.w = w;
        self.header.h = h;
        self
    }

    /// Override the declared frame count.
    pub fn file_count(mut self, count: u16) -> Self {
        self.file_count = Some(count);
        self
    }

    /// Plaintext base frame, encrypted on [`build`](Self::build).
    pub fn base(mut self, frame: &[u8]) -> Self {
        self.base_frame = frame.to_vec();
        self
    }

    /// Append the next full frame.
    pub fn delta(mut self, frame: &[u8]) -> Self {
        self.entries.push(Entry::Frame(frame.to_vec()));
        self
    }

    /// Append a pre-encoded delta payload.
    pub fn raw_delta(mut self, bands: u8, payload: &[u8]) -> Self {
        self.entries.push(Entry::Raw {
            bands,
            payload: payload.to_vec(),
        });
        self
    }

    /// Serialize the archive, encrypting the base frame with `keys`.
    pub fn build(&self, keys: &KeyStream) -> Vec<u8> {
        let count = self
            .file_count
            .unwrap_or((self.entries.len() + 1) as u16);
        let header = ArchiveHeader {
            file_count: count,
            ..self.header
        };

        let mut out = header.to_bytes().to_vec();
        out.extend_from_slice(&self.base.to_bytes());
        let mut encrypted = self.base_frame.clone();
        keys.decrypt(&mut encrypted);
        out.extend_from_slice(&encrypted);

        let bands = self.base.c as u8;
        let mut previous = self.base_frame.clone();
        for entry in &self.entries {
            let (bands, payload) = match entry {
                Entry::Frame(frame) => {
                    let payload = rle_encode(&difference(frame, &previous), usize::from(bands));
                    previous = frame.clone();
                    (bands, payload)
                }
                Entry::Raw { bands, payload } => (*bands, payload.clone()),
            };
            let desc = DeltaEntry {
                bands,
                length: payload.len() as u32,
            };
            out.extend_from_slice(&desc.to_bytes());
            out.extend_from_slice(&payload);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
