// PLT archive decoder: header parsing and frame reconstruction.
//
// Follows a fixed state progression:
//   Start -> HeaderRead -> BaseFrameReady -> DeltaFrame(1) -> ... -> Done
//
// Frame 0 is the decrypted base payload. Frame i > 0 is the RLE-decoded
// delta of entry i added to frame i-1. Every frame depends on all earlier
// ones, so any failure ends the decode; there is no per-frame recovery.

use std::fmt;
use std::io::{self, Read};

use super::accumulate::{FrameAccumulator, LengthMismatch};
use super::header::{ArchiveHeader, BaseFrameDescriptor, DeltaEntry, FrameLayout};
use super::keystream::KeyStream;
use super::{FormatError, Section, pixel, rle};

// ---------------------------------------------------------------------------
// Decoder error
// ---------------------------------------------------------------------------

/// Where in the archive an error was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Archive header or base frame descriptor.
    Header,
    /// Reconstruction of the frame with this index.
    Frame(u16),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => f.write_str("archive header"),
            Self::Frame(i) => write!(f, "frame {i}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{stage}: {source}")]
    Format {
        stage: Stage,
        #[source]
        source: FormatError,
    },

    #[error("{stage}: {source}")]
    Accumulate {
        stage: Stage,
        #[source]
        source: LengthMismatch,
    },
}

impl DecodeError {
    /// The format violation behind this error, if any.
    pub fn format_error(&self) -> Option<&FormatError> {
        match self {
            Self::Format { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Did the archive end early?
    pub fn is_truncation(&self) -> bool {
        self.format_error().is_some_and(FormatError::is_truncation)
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Io(_) => None,
            Self::Format { stage, .. } | Self::Accumulate { stage, .. } => Some(*stage),
        }
    }
}

// ---------------------------------------------------------------------------
// Reading helpers
// ---------------------------------------------------------------------------

/// Read until `buf` is full or the reader is exhausted. Returns bytes read.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn truncated(stage: Stage, section: Section, needed: u64, available: u64) -> DecodeError {
    DecodeError::Format {
        stage,
        source: FormatError::Truncated {
            section,
            needed,
            available,
        },
    }
}

/// Read one fixed-size record.
fn read_record<R: Read, const N: usize>(
    r: &mut R,
    stage: Stage,
    section: Section,
) -> Result<[u8; N], DecodeError> {
    let mut buf = [0u8; N];
    let got = read_full(r, &mut buf)?;
    if got < N {
        return Err(truncated(stage, section, N as u64, got as u64));
    }
    Ok(buf)
}

/// Read exactly `len` bytes. The buffer grows with the data actually present,
/// so a bogus length in a damaged archive cannot force a huge allocation.
fn read_payload<R: Read>(
    r: &mut R,
    len: usize,
    stage: Stage,
    section: Section,
) -> Result<Vec<u8>, DecodeError> {
    let mut buf = Vec::with_capacity(len.min(1 << 20));
    r.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() < len {
        return Err(truncated(stage, section, len as u64, buf.len() as u64));
    }
    Ok(buf)
}

/// Discard exactly `len` bytes.
fn skip_payload<R: Read>(
    r: &mut R,
    len: u64,
    stage: Stage,
    section: Section,
) -> Result<(), DecodeError> {
    let skipped = io::copy(&mut r.by_ref().take(len), &mut io::sink())?;
    if skipped < len {
        return Err(truncated(stage, section, len, skipped));
    }
    Ok(())
}

fn read_preamble<R: Read>(
    r: &mut R,
) -> Result<(ArchiveHeader, BaseFrameDescriptor, usize), DecodeError> {
    let header = ArchiveHeader::from_bytes(&read_record(r, Stage::Header, Section::Header)?);
    let base = BaseFrameDescriptor::from_bytes(&read_record(
        r,
        Stage::Header,
        Section::BaseDescriptor,
    )?);
    let frame_size = base
        .layout()
        .canonical_size()
        .map_err(|source| DecodeError::Format {
            stage: Stage::Header,
            source,
        })?;
    Ok((header, base, frame_size))
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// A reconstructed frame, borrowed from the decoder until the next frame is
/// requested.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub index: u16,
    pub layout: FrameLayout,
    /// Raw reconstructed bytes: bottom row first, channels reversed.
    pub data: &'a [u8],
}

impl Frame<'_> {
    /// Pixels in top-down R,G,B[,A] order, ready for an image encoder.
    pub fn to_rgb(&self) -> Result<Vec<u8>, FormatError> {
        pixel::to_rgb_top_down(self.data, &self.layout)
    }
}

// ---------------------------------------------------------------------------
// ArchiveDecoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    HeaderRead,
    BaseFrameReady,
    /// Frame `i` (i >= 1) was the last one produced.
    DeltaFrame(u16),
    Done,
}

/// Streaming archive decoder.
///
/// Only the most recent frame is held in memory. The key stream is borrowed,
/// so one key can serve many decoders.
pub struct ArchiveDecoder<'k, R: Read> {
    reader: R,
    keys: &'k KeyStream,
    state: State,
    preamble: Option<Preamble>,
    accumulator: Option<FrameAccumulator>,
    frames_decoded: u64,
}

#[derive(Debug, Clone, Copy)]
struct Preamble {
    header: ArchiveHeader,
    base: BaseFrameDescriptor,
    frame_size: usize,
}

impl<'k, R: Read> ArchiveDecoder<'k, R> {
    pub fn new(reader: R, keys: &'k KeyStream) -> Self {
        Self {
            reader,
            keys,
            state: State::Start,
            preamble: None,
            accumulator: None,
            frames_decoded: 0,
        }
    }

    /// Parse the archive header and base frame descriptor.
    ///
    /// Called implicitly by [`next_frame`](Self::next_frame); calling it
    /// again after the first time returns the cached values.
    pub fn read_header(&mut self) -> Result<(ArchiveHeader, BaseFrameDescriptor), DecodeError> {
        if let Some(p) = &self.preamble {
            return Ok((p.header, p.base));
        }
        let (header, base, frame_size) = match read_preamble(&mut self.reader) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.state = State::Done;
                return Err(e);
            }
        };
        log::debug!(
            "plt: header magic={:#010x} frames={} window=({}, {}, {}x{}); base {}x{}x{}",
            header.magic,
            header.file_count,
            header.x,
            header.y,
            header.w,
            header.h,
            base.w,
            base.h,
            base.c
        );
        self.preamble = Some(Preamble {
            header,
            base,
            frame_size,
        });
        self.state = State::HeaderRead;
        Ok((header, base))
    }

    /// Decode the next frame.
    ///
    /// Returns `Ok(None)` once every declared frame has been produced. The
    /// base frame is always produced, even if the header declares zero frames.
    /// After an error the decoder is finished and yields no further frames.
    pub fn next_frame(&mut self) -> Result<Option<Frame<'_>>, DecodeError> {
        let index = match self.advance() {
            Ok(Some(index)) => index,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.state = State::Done;
                return Err(e);
            }
        };
        self.frames_decoded += 1;

        let data = self
            .accumulator
            .as_ref()
            .map(FrameAccumulator::current)
            .unwrap_or_default();
        Ok(Some(Frame {
            index,
            layout: self.layout().unwrap_or_default(),
            data,
        }))
    }

    fn advance(&mut self) -> Result<Option<u16>, DecodeError> {
        let next = match self.state {
            State::Start => {
                self.read_header()?;
                return self.advance();
            }
            State::HeaderRead => {
                self.decode_base()?;
                self.state = State::BaseFrameReady;
                return Ok(Some(0));
            }
            State::BaseFrameReady => 1,
            State::DeltaFrame(last) => last + 1,
            State::Done => return Ok(None),
        };

        let file_count = self.preamble.map_or(0, |p| p.header.file_count);
        if next >= file_count {
            log::debug!("plt: all {} frames decoded", self.frames_decoded);
            self.state = State::Done;
            return Ok(None);
        }

        self.decode_delta(next)?;
        self.state = State::DeltaFrame(next);
        Ok(Some(next))
    }

    fn decode_base(&mut self) -> Result<(), DecodeError> {
        let stage = Stage::Frame(0);
        let size = self.frame_size();
        let mut image = read_payload(&mut self.reader, size, stage, Section::BaseFrame)?;
        self.keys.decrypt(&mut image);
        log::debug!("plt: frame 0: base frame, {} bytes", image.len());
        self.accumulator = Some(FrameAccumulator::new(image));
        Ok(())
    }

    fn decode_delta(&mut self, index: u16) -> Result<(), DecodeError> {
        let stage = Stage::Frame(index);
        let entry = DeltaEntry::from_bytes(&read_record(
            &mut self.reader,
            stage,
            Section::EntryDescriptor,
        )?);
        let payload = read_payload(
            &mut self.reader,
            entry.length as usize,
            stage,
            Section::EntryPayload,
        )?;

        let delta = rle::decode(&payload, self.frame_size(), usize::from(entry.bands))
            .map_err(|source| DecodeError::Format { stage, source })?;

        let acc = self
            .accumulator
            .as_mut()
            .ok_or(DecodeError::Accumulate {
                stage,
                source: LengthMismatch {
                    expected: 0,
                    actual: delta.len(),
                },
            })?;
        acc.apply(delta)
            .map_err(|source| DecodeError::Accumulate { stage, source })?;

        log::debug!(
            "plt: frame {index}: {} bands, {} compressed bytes",
            entry.bands,
            entry.length
        );
        Ok(())
    }

    /// Parsed header, once [`read_header`](Self::read_header) has succeeded.
    pub fn header(&self) -> Option<&ArchiveHeader> {
        self.preamble.as_ref().map(|p| &p.header)
    }

    /// Pixel layout shared by every frame, once the header has been read.
    pub fn layout(&self) -> Option<FrameLayout> {
        self.preamble.map(|p| p.base.layout())
    }

    /// Canonical frame size in bytes (0 before the header is read).
    #[inline]
    pub fn frame_size(&self) -> usize {
        self.preamble.map_or(0, |p| p.frame_size)
    }

    /// Number of frames produced so far.
    #[inline]
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Has the decoder finished, either normally or after an error?
    #[inline]
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

// ---------------------------------------------------------------------------
// Convenience function
// ---------------------------------------------------------------------------

/// Decode every frame of an in-memory archive.
///
/// Frames are returned in their raw reconstructed layout (see [`Frame::data`]).
pub fn decode_all(archive: &[u8], keys: &KeyStream) -> Result<Vec<Vec<u8>>, DecodeError> {
    let mut decoder = ArchiveDecoder::new(archive, keys);
    let mut frames = Vec::new();
    while let Some(frame) = decoder.next_frame()? {
        frames.push(frame.data.to_vec());
    }
    Ok(frames)
}

// ---------------------------------------------------------------------------
// Archive index
// ---------------------------------------------------------------------------

/// Location of one delta entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub index: u16,
    /// Byte offset of the entry descriptor from the start of the archive.
    pub offset: u64,
    pub entry: DeltaEntry,
}

/// Archive structure without any decoding or decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveIndex {
    pub header: ArchiveHeader,
    pub base: BaseFrameDescriptor,
    pub frame_size: usize,
    pub entries: Vec<IndexEntry>,
    /// Total bytes covered by the header, base frame and declared entries.
    pub archive_len: u64,
}

/// Walk the archive structure, skipping over frame data.
///
/// No key is needed. Truncated sections are reported exactly as the
/// decoder would report them.
pub fn read_index<R: Read>(mut reader: R) -> Result<ArchiveIndex, DecodeError> {
    let (header, base, frame_size) = read_preamble(&mut reader)?;
    let mut offset = (ArchiveHeader::SIZE + BaseFrameDescriptor::SIZE) as u64;

    skip_payload(
        &mut reader,
        frame_size as u64,
        Stage::Frame(0),
        Section::BaseFrame,
    )?;
    offset += frame_size as u64;

    let mut entries = Vec::with_capacity(usize::from(header.delta_count()));
    for index in 1..header.file_count {
        let stage = Stage::Frame(index);
        let entry = DeltaEntry::from_bytes(&read_record(
            &mut reader,
            stage,
            Section::EntryDescriptor,
        )?);
        skip_payload(
            &mut reader,
            u64::from(entry.length),
            stage,
            Section::EntryPayload,
        )?;
        entries.push(IndexEntry {
            index,
            offset,
            entry,
        });
        offset += DeltaEntry::SIZE as u64 + u64::from(entry.length);
    }

    Ok(ArchiveIndex {
        header,
        base,
        frame_size,
        entries,
        archive_len: offset,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::ArchiveBuilder;

    fn keys() -> KeyStream {
        KeyStream::new(vec![0xFF]).unwrap()
    }

    fn two_frame_archive() -> Vec<u8> {
        // Base [10 20 30 40 50 60] under key FF is stored as [EF DF CF BF AF 9F].
        let mut archive = ArchiveHeader {
            magic: 0x544C50,
            file_count: 2,
            ..Default::default()
        }
        .to_bytes()
        .to_vec();
        archive.extend_from_slice(
            &BaseFrameDescriptor {
                x: 0,
                y: 0,
                w: 2,
                h: 1,
                c: 3,
            }
            .to_bytes(),
        );
        archive.extend_from_slice(&[0xEF, 0xDF, 0xCF, 0xBF, 0xAF, 0x9F]);
        // bands=3, each band is "1 1 <0>" -> two ones per band.
        let payload = [1, 1, 0, 1, 1, 0, 1, 1, 0];
        archive.extend_from_slice(
            &DeltaEntry {
                bands: 3,
                length: payload.len() as u32,
            }
            .to_bytes(),
        );
        archive.extend_from_slice(&payload);
        archive
    }

    #[test]
    fn end_to_end_two_frames() {
        let frames = decode_all(&two_frame_archive(), &keys()).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], [0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);
        assert_eq!(frames[1], [0x11, 0x21, 0x31, 0x41, 0x51, 0x61]);
    }

    #[test]
    fn streaming_frames_carry_index_and_layout() {
        let archive = two_frame_archive();
        let keys = keys();
        let mut decoder = ArchiveDecoder::new(archive.as_slice(), &keys);

        let (header, base) = decoder.read_header().unwrap();
        assert_eq!(header.file_count, 2);
        assert_eq!(base.c, 3);
        assert_eq!(decoder.frame_size(), 6);

        let f0 = decoder.next_frame().unwrap().unwrap();
        assert_eq!(f0.index, 0);
        assert_eq!(f0.layout.channels, 3);
        let f1 = decoder.next_frame().unwrap().unwrap();
        assert_eq!(f1.index, 1);
        assert!(decoder.next_frame().unwrap().is_none());
        assert!(decoder.is_done());
        assert_eq!(decoder.frames_decoded(), 2);
    }

    #[test]
    fn zero_file_count_still_yields_base() {
        let mut archive = two_frame_archive();
        archive[4..6].copy_from_slice(&0u16.to_le_bytes());
        let frames = decode_all(&archive, &keys()).unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn truncated_header() {
        let archive = two_frame_archive();
        let err = decode_all(&archive[..10], &keys()).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Header));
        assert_eq!(
            err.format_error(),
            Some(&FormatError::Truncated {
                section: Section::Header,
                needed: 22,
                available: 10,
            })
        );
    }

    #[test]
    fn truncated_base_frame() {
        let archive = two_frame_archive();
        let err = decode_all(&archive[..45], &keys()).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Frame(0)));
        assert!(err.is_truncation());
    }

    #[test]
    fn truncated_entry_payload() {
        let archive = two_frame_archive();
        let err = decode_all(&archive[..archive.len() - 1], &keys()).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Frame(1)));
        assert!(matches!(
            err.format_error(),
            Some(FormatError::Truncated {
                section: Section::EntryPayload,
                ..
            })
        ));
    }

    #[test]
    fn missing_entry_descriptor() {
        let mut archive = two_frame_archive();
        archive[4..6].copy_from_slice(&3u16.to_le_bytes());
        let err = decode_all(&archive, &keys()).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Frame(2)));
        assert!(err.is_truncation());
    }

    #[test]
    fn error_finishes_decoder() {
        let archive = two_frame_archive();
        let keys = keys();
        let short = &archive[..archive.len() - 1];
        let mut decoder = ArchiveDecoder::new(short, &keys);
        assert!(decoder.next_frame().unwrap().is_some());
        assert!(decoder.next_frame().is_err());
        assert!(decoder.is_done());
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[test]
    fn short_rle_payload_is_truncation() {
        let archive = ArchiveBuilder::new(2, 1, 3)
            .base(&[0; 6])
            .raw_delta(3, &[1, 2, 3])
            .build(&keys());
        let err = decode_all(&archive, &keys()).unwrap_err();
        assert!(matches!(
            err.format_error(),
            Some(FormatError::Truncated {
                section: Section::Band(_),
                ..
            })
        ));
    }

    #[test]
    fn zero_band_entry_repeats_previous_frame() {
        let archive = ArchiveBuilder::new(2, 1, 3)
            .base(&[1, 2, 3, 4, 5, 6])
            .raw_delta(0, &[])
            .build(&keys());
        let frames = decode_all(&archive, &keys()).unwrap();
        assert_eq!(frames, [[1, 2, 3, 4, 5, 6], [1, 2, 3, 4, 5, 6]]);
    }

    #[test]
    fn header_window_is_not_used_for_decoding() {
        let mut archive = two_frame_archive();
        // Header w/h claim a huge window; only the base descriptor matters.
        archive[14..18].copy_from_slice(&9999u32.to_le_bytes());
        archive[18..22].copy_from_slice(&9999u32.to_le_bytes());
        let frames = decode_all(&archive, &keys()).unwrap();
        assert_eq!(frames[1], [0x11, 0x21, 0x31, 0x41, 0x51, 0x61]);
    }

    #[test]
    fn index_lists_entries() {
        let archive = ArchiveBuilder::new(2, 2, 4)
            .base(&[7; 16])
            .delta(&[1; 16])
            .delta(&[2; 16])
            .build(&keys());
        let index = read_index(archive.as_slice()).unwrap();
        assert_eq!(index.header.file_count, 3);
        assert_eq!(index.frame_size, 16);
        assert_eq!(index.entries.len(), 2);
        assert_eq!(index.entries[0].offset, 22 + 20 + 16);
        assert_eq!(index.entries[1].index, 2);
        assert_eq!(index.archive_len, archive.len() as u64);
    }

    #[test]
    fn index_reports_truncation() {
        let archive = two_frame_archive();
        let err = read_index(&archive[..archive.len() - 2]).unwrap_err();
        assert!(err.is_truncation());
    }
}
