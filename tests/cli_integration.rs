#![cfg(all(feature = "cli", feature = "png"))]

use std::path::Path;
use std::process::Command;

use pltdecode::plt::KeyStream;
use pltdecode::testkit::ArchiveBuilder;
use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_pltdecode").to_string()
}

const KEY: [u8; 3] = [0x13, 0x57, 0x9B];

// 2x2 BGR, bottom row first.
const BASE: [u8; 12] = [
    10, 20, 30, 40, 50, 60, //
    70, 80, 90, 100, 110, 120,
];
const NEXT: [u8; 12] = [
    11, 20, 30, 40, 50, 60, //
    70, 80, 90, 100, 110, 255,
];

/// Write `anim.plt` and `keys.bin` into `dir`.
fn write_fixture(dir: &Path) {
    let keys = KeyStream::new(KEY.to_vec()).unwrap();
    let archive = ArchiveBuilder::new(2, 2, 3)
        .base(&BASE)
        .delta(&NEXT)
        .build(&keys);
    std::fs::write(dir.join("anim.plt"), archive).unwrap();
    std::fs::write(dir.join("keys.bin"), KEY).unwrap();
}

fn decode_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(bin());
    cmd.arg("--keys")
        .arg(dir.join("keys.bin"))
        .arg(dir.join("anim.plt"));
    cmd
}

/// Pixel (x, y) of a top-down RGB image built from a bottom-up BGR frame.
fn expected_rgb(frame: &[u8], x: usize, y: usize) -> [u8; 3] {
    let (w, h) = (2, 2);
    let row = h - 1 - y;
    let at = (row * w + x) * 3;
    [frame[at + 2], frame[at + 1], frame[at]]
}

fn assert_png_matches(path: &Path, frame: &[u8]) {
    let img = image::open(path).unwrap().to_rgb8();
    assert_eq!(img.dimensions(), (2, 2));
    for y in 0..2u32 {
        for x in 0..2u32 {
            assert_eq!(
                img.get_pixel(x, y).0,
                expected_rgb(frame, x as usize, y as usize),
                "pixel ({x}, {y}) of {}",
                path.display()
            );
        }
    }
}

#[test]
fn cli_decodes_every_frame_to_png() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());

    let st = decode_cmd(dir.path()).status().unwrap();
    assert!(st.success());

    assert_png_matches(&dir.path().join("anim_00.png"), &BASE);
    assert_png_matches(&dir.path().join("anim_01.png"), &NEXT);
    assert!(!dir.path().join("anim_02.png").exists());
}

#[test]
fn cli_output_dir() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());
    let out = dir.path().join("frames");

    let st = decode_cmd(dir.path())
        .arg("--output-dir")
        .arg(&out)
        .status()
        .unwrap();
    assert!(st.success());

    assert_png_matches(&out.join("anim_00.png"), &BASE);
    assert_png_matches(&out.join("anim_01.png"), &NEXT);
    assert!(!dir.path().join("anim_00.png").exists());
}

#[test]
fn cli_check_only_writes_nothing() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());
    let out = dir.path().join("frames");

    let st = decode_cmd(dir.path())
        .arg("--check-only")
        .arg("-o")
        .arg(&out)
        .status()
        .unwrap();
    assert!(st.success());
    assert!(!out.exists());
    assert!(!dir.path().join("anim_00.png").exists());
}

#[test]
fn cli_second_run_overwrites_outputs() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());
    std::fs::write(dir.path().join("anim_00.png"), b"stale").unwrap();

    assert!(decode_cmd(dir.path()).status().unwrap().success());
    assert!(decode_cmd(dir.path()).status().unwrap().success());
    assert_png_matches(&dir.path().join("anim_00.png"), &BASE);
    assert_png_matches(&dir.path().join("anim_01.png"), &NEXT);
}

#[test]
fn cli_no_clobber_keeps_existing_outputs() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());
    std::fs::write(dir.path().join("anim_00.png"), b"keep").unwrap();

    let out = decode_cmd(dir.path()).arg("--no-clobber").output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(
        std::fs::read(dir.path().join("anim_00.png")).unwrap(),
        b"keep"
    );
}

#[test]
fn cli_json_stats() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());

    let out = decode_cmd(dir.path())
        .args(["--check-only", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(json["command"], "decode");
    assert_eq!(json["declared_frames"], 2);
    assert_eq!(json["channels"], 3);
    assert_eq!(json["output_size"], 24);
    assert_eq!(json["frames"].as_array().unwrap().len(), 2);
    assert!(json["frames"][0]["path"].is_null());
}

#[test]
fn cli_info() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());

    let out = Command::new(bin())
        .arg("--info")
        .arg(dir.path().join("anim.plt"))
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("PLT frame count:              2"), "{stdout}");
    assert!(!dir.path().join("anim_00.png").exists());
}

#[test]
fn cli_without_arguments_fails() {
    let out = Command::new(bin()).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn cli_help_succeeds() {
    let out = Command::new(bin()).arg("--help").output().unwrap();
    assert!(out.status.success());
}

#[test]
fn cli_missing_key_file_fails() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());

    let out = Command::new(bin())
        .arg("--keys")
        .arg(dir.path().join("absent.bin"))
        .arg(dir.path().join("anim.plt"))
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(!dir.path().join("anim_00.png").exists());
}

#[test]
fn cli_missing_archive_fails() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());

    let out = Command::new(bin())
        .arg("--keys")
        .arg(dir.path().join("keys.bin"))
        .arg(dir.path().join("absent.plt"))
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn cli_truncated_archive_fails() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());
    let path = dir.path().join("anim.plt");
    let mut archive = std::fs::read(&path).unwrap();
    archive.truncate(archive.len() - 1);
    std::fs::write(&path, archive).unwrap();

    let out = decode_cmd(dir.path()).arg("--check-only").output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("frame 1"), "{stderr}");
}
