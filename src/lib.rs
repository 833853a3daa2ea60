//! Pltdecode: decoder for PLT encrypted, delta-compressed image archives.
//!
//! The crate provides:
//! - The archive format and decode pipeline (`plt`)
//! - File-oriented helpers and PNG output (`io`)
//! - Fixture builders for tests and benchmarks (`testkit` feature)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use pltdecode::plt::{KeyStream, decode_all};
//!
//! let keys = KeyStream::new(std::fs::read("keys.bin").unwrap()).unwrap();
//! let archive = std::fs::read("anim.plt").unwrap();
//! for frame in decode_all(&archive, &keys).unwrap() {
//!     println!("{} bytes", frame.len());
//! }
//! ```

pub mod io;
pub mod plt;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

#[cfg(feature = "cli")]
pub mod cli;
