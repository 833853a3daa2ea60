// File-level helpers for decoding archives to image files.
//
// Provides key loading, archive opening, output path construction and a
// pluggable `FrameWriter` for the final image encoding step. Optionally
// computes SHA-256 digests of each reconstructed frame (feature-gated behind
// `file-io`).

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::plt::decoder::{ArchiveDecoder, DecodeError};
use crate::plt::header::FrameLayout;
use crate::plt::keystream::KeyStream;
use crate::plt::FormatError;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Key file looked up when none is given.
pub const DEFAULT_KEY_FILE: &str = "keys.bin";

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for a file-to-images decode session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The key source could not be read.
    #[error("failed to load key file {}: {source}", .path.display())]
    KeyFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("key file {} is empty", .path.display())]
    EmptyKey { path: PathBuf },

    /// The archive could not be opened.
    #[error("could not open file {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The frame layout cannot be handed to an image encoder.
    #[error("frame {index}: {source}")]
    Layout {
        index: u16,
        #[source]
        source: FormatError,
    },

    #[cfg(feature = "png")]
    #[error("frame {index}: image encoding failed: {source}")]
    Image {
        index: u16,
        #[source]
        source: image::ImageError,
    },

    #[error("output file exists (--no-clobber): {}", .path.display())]
    OutputExists { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SessionError {
    /// Did the session fail before any decoding started?
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            Self::KeyFile { .. } | Self::EmptyKey { .. } | Self::Archive { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Session startup
// ---------------------------------------------------------------------------

/// Read the whole key file.
pub fn load_keys(path: &Path) -> Result<KeyStream, SessionError> {
    let bytes = std::fs::read(path).map_err(|source| SessionError::KeyFile {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("keys: loaded {} bytes from {}", bytes.len(), path.display());
    KeyStream::new(bytes).map_err(|_| SessionError::EmptyKey {
        path: path.to_path_buf(),
    })
}

/// Open an archive for buffered reading.
pub fn open_archive(path: &Path) -> Result<BufReader<File>, SessionError> {
    let file = File::open(path).map_err(|source| SessionError::Archive {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::with_capacity(BUF_SIZE, file))
}

/// Output path of frame `index`.
///
/// The archive's extension is replaced by `_NN.png`, with the index padded
/// to at least two digits: `dir/a.plt` gives `dir/a_00.png`, `dir/a_01.png`.
/// With `output_dir`, the same file name is placed in that directory.
pub fn frame_path(archive: &Path, output_dir: Option<&Path>, index: u16) -> PathBuf {
    let mut name = archive.with_extension("").into_os_string();
    name.push(format!("_{index:02}.png"));
    let path = PathBuf::from(name);
    match (output_dir, path.file_name()) {
        (Some(dir), Some(file)) => dir.join(file),
        _ => path,
    }
}

// ---------------------------------------------------------------------------
// Frame writers
// ---------------------------------------------------------------------------

/// Final encoding step for a reconstructed frame.
///
/// `pixels` are top-down rows in R,G,B[,A] order, `layout.channels` is 3 or 4.
pub trait FrameWriter {
    fn write_frame(
        &mut self,
        index: u16,
        path: &Path,
        pixels: &[u8],
        layout: &FrameLayout,
    ) -> Result<(), SessionError>;
}

/// Writes each frame as a PNG file.
#[cfg(feature = "png")]
#[derive(Debug, Clone, Default)]
pub struct PngWriter {
    /// Replace existing files instead of failing.
    pub overwrite: bool,
}

#[cfg(feature = "png")]
impl PngWriter {
    pub fn new(overwrite: bool) -> Self {
        Self { overwrite }
    }
}

#[cfg(feature = "png")]
impl FrameWriter for PngWriter {
    fn write_frame(
        &mut self,
        index: u16,
        path: &Path,
        pixels: &[u8],
        layout: &FrameLayout,
    ) -> Result<(), SessionError> {
        if !self.overwrite && path.exists() {
            return Err(SessionError::OutputExists {
                path: path.to_path_buf(),
            });
        }
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }
        let color = match layout.channels {
            3 => image::ColorType::Rgb8,
            4 => image::ColorType::Rgba8,
            channels => {
                return Err(SessionError::Layout {
                    index,
                    source: FormatError::UnsupportedLayout { channels },
                });
            }
        };
        image::save_buffer_with_format(
            path,
            pixels,
            layout.width,
            layout.height,
            color,
            image::ImageFormat::Png,
        )
        .map_err(|source| SessionError::Image { index, source })
    }
}

/// Discards frames. Used to verify an archive without writing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullWriter;

impl FrameWriter for NullWriter {
    fn write_frame(
        &mut self,
        _index: u16,
        _path: &Path,
        _pixels: &[u8],
        _layout: &FrameLayout,
    ) -> Result<(), SessionError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// One emitted frame.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    pub index: u16,
    pub path: PathBuf,
    /// SHA-256 of the reconstructed frame bytes (if `file-io` is enabled).
    pub sha256: Option<[u8; 32]>,
}

/// Statistics returned by `decode_file()`.
#[derive(Debug, Clone, Default)]
pub struct DecodeStats {
    /// Frames declared in the archive header.
    pub declared_frames: u16,
    /// Frame geometry shared by every frame.
    pub layout: FrameLayout,
    /// Canonical frame size in bytes.
    pub frame_size: usize,
    pub frames: Vec<FrameRecord>,
}

impl DecodeStats {
    /// Total reconstructed bytes across all frames.
    pub fn output_size(&self) -> u64 {
        self.frame_size as u64 * self.frames.len() as u64
    }
}

// ---------------------------------------------------------------------------
// Output options
// ---------------------------------------------------------------------------

/// Where decoded frames go.
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    /// Directory for output images; next to the archive when `None`.
    pub output_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// decode_file
// ---------------------------------------------------------------------------

/// Decode every frame of the archive at `archive_path`, handing each to
/// `writer`.
pub fn decode_file<W: FrameWriter>(
    archive_path: &Path,
    keys: &KeyStream,
    opts: &OutputOptions,
    writer: &mut W,
) -> Result<DecodeStats, SessionError> {
    let reader = open_archive(archive_path)?;
    decode_reader(reader, archive_path, keys, opts, writer)
}

/// Like [`decode_file`], with the archive already opened. `archive_path`
/// is only used to name the output files.
pub fn decode_reader<R: Read, W: FrameWriter>(
    reader: R,
    archive_path: &Path,
    keys: &KeyStream,
    opts: &OutputOptions,
    writer: &mut W,
) -> Result<DecodeStats, SessionError> {
    let mut decoder = ArchiveDecoder::new(reader, keys);
    let (header, base) = decoder.read_header()?;
    let mut stats = DecodeStats {
        declared_frames: header.file_count,
        layout: base.layout(),
        frame_size: decoder.frame_size(),
        frames: Vec::with_capacity(usize::from(header.file_count.max(1))),
    };

    while let Some(frame) = decoder.next_frame()? {
        let index = frame.index;
        let path = frame_path(archive_path, opts.output_dir.as_deref(), index);
        let pixels = frame
            .to_rgb()
            .map_err(|source| SessionError::Layout { index, source })?;

        #[cfg(feature = "file-io")]
        let sha256 = Some(sha2::Sha256::digest(frame.data).into());
        #[cfg(not(feature = "file-io"))]
        let sha256: Option<[u8; 32]> = None;

        writer.write_frame(index, &path, &pixels, &frame.layout)?;
        log::debug!("frame {index}: wrote {}", path.display());
        stats.frames.push(FrameRecord {
            index,
            path,
            sha256,
        });
    }

    log::info!(
        "{}: decoded {} frames ({}x{}x{})",
        archive_path.display(),
        stats.frames.len(),
        base.w,
        base.h,
        base.c
    );
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
