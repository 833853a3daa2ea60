// Command-line front end for pltdecode.
//
// Decodes one archive into one PNG per frame, named `<archive>_NN.png`.

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, ValueHint, error::ErrorKind};

use crate::io::{self, DEFAULT_KEY_FILE, DecodeStats, NullWriter, OutputOptions, SessionError};
use crate::plt::decoder::read_index;

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Decode a PLT image archive into one PNG per frame.
#[derive(Parser, Debug)]
#[command(name = "pltdecode", version, about = "PLT image archive decoder")]
struct Cli {
    /// Archive to decode.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Key database used to decrypt the base frame.
    #[arg(long, short = 'k', value_hint = ValueHint::FilePath, default_value = DEFAULT_KEY_FILE)]
    keys: PathBuf,

    /// Directory for output images (default: next to the archive).
    #[arg(long, short = 'o', value_hint = ValueHint::DirPath)]
    output_dir: Option<PathBuf>,

    /// Fail instead of overwriting existing output files.
    #[arg(short = 'n', long = "no-clobber")]
    no_clobber: bool,

    /// Decode and verify only (do not write images).
    #[arg(long = "check-only", conflicts_with = "info")]
    no_output: bool,

    /// Print the archive structure without decoding.
    #[arg(long)]
    info: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json")]
    json_output: bool,
}

// ---------------------------------------------------------------------------
// Resolved options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Decode,
    Info,
}

#[derive(Debug)]
struct Options {
    command: Command,
    input_file: PathBuf,
    key_file: PathBuf,
    output_dir: Option<PathBuf>,
    no_clobber: bool,
    quiet: bool,
    verbose: u8,
    no_output: bool,
    json_output: bool,
}

fn resolve_options(cli: Cli) -> Options {
    Options {
        command: if cli.info {
            Command::Info
        } else {
            Command::Decode
        },
        input_file: cli.input,
        key_file: cli.keys,
        output_dir: cli.output_dir,
        no_clobber: cli.no_clobber,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        no_output: cli.no_output,
        json_output: cli.json_output,
    }
}

fn log_filter(opts: &Options) -> &'static str {
    if opts.quiet {
        return "error";
    }
    match opts.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("pltdecode".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

// ---------------------------------------------------------------------------
// Info command
// ---------------------------------------------------------------------------

fn cmd_info(opts: &Options) -> i32 {
    let reader = match io::open_archive(&opts.input_file) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("pltdecode: {e}");
            return 1;
        }
    };
    let index = match read_index(reader) {
        Ok(index) => index,
        Err(e) => {
            eprintln!("pltdecode: {}: {e}", opts.input_file.display());
            return 1;
        }
    };

    let hdr = &index.header;
    let base = &index.base;
    println!("PLT magic:                    {:#010x}", hdr.magic);
    println!("PLT frame count:              {}", hdr.file_count);
    println!(
        "PLT window:                   x={} y={} w={} h={}",
        hdr.x, hdr.y, hdr.w, hdr.h
    );
    println!(
        "Base frame:                   x={} y={} {}x{}, {} bpp",
        base.x,
        base.y,
        base.w,
        base.h,
        u64::from(base.c) * 8
    );
    println!("Frame size:                   {}", index.frame_size);
    for e in &index.entries {
        println!(
            "  frame {:5}  offset {:10}  bands {:3}  length {:10}",
            e.index, e.offset, e.entry.bands, e.entry.length
        );
    }
    println!("Archive length:               {}", index.archive_len);

    if opts.json_output {
        let entries: Vec<_> = index
            .entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "index": e.index,
                    "offset": e.offset,
                    "bands": e.entry.bands,
                    "length": e.entry.length,
                })
            })
            .collect();
        let json = serde_json::json!({
            "command": "info",
            "magic": hdr.magic,
            "frames": hdr.file_count,
            "width": base.w,
            "height": base.h,
            "channels": base.c,
            "frame_size": index.frame_size,
            "entries": entries,
        });
        print_json(&json);
    }
    0
}

fn print_json(json: &serde_json::Value) {
    match serde_json::to_string_pretty(json) {
        Ok(s) => eprintln!("{s}"),
        Err(e) => log::warn!("failed to render JSON stats: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Decode command
// ---------------------------------------------------------------------------

fn decode_with_writer(opts: &Options) -> Result<DecodeStats, SessionError> {
    // The archive is checked before the key file, then nothing is decoded
    // until both are available.
    let reader = io::open_archive(&opts.input_file)?;
    let keys = io::load_keys(&opts.key_file)?;
    let out = OutputOptions {
        output_dir: opts.output_dir.clone(),
    };

    if opts.no_output {
        return io::decode_reader(reader, &opts.input_file, &keys, &out, &mut NullWriter);
    }

    #[cfg(feature = "png")]
    {
        let mut writer = io::PngWriter::new(!opts.no_clobber);
        io::decode_reader(reader, &opts.input_file, &keys, &out, &mut writer)
    }
    #[cfg(not(feature = "png"))]
    {
        let _ = reader;
        Err(SessionError::Io(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "PNG output not enabled. Rebuild with `--features png` or use --check-only",
        )))
    }
}

fn cmd_decode(opts: &Options) -> i32 {
    let stats = match decode_with_writer(opts) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("pltdecode: {e}");
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        let layout = stats.layout;
        eprintln!(
            "pltdecode: decoder: frames: {}, size: {}x{}x{}, output size: {}",
            stats.frames.len(),
            layout.width,
            layout.height,
            layout.channels,
            stats.output_size()
        );
        if !opts.no_output {
            for frame in &stats.frames {
                eprintln!("pltdecode: wrote {}", frame.path.display());
            }
        }
    }

    if opts.json_output {
        print_json(&stats_json(&opts.input_file, &stats, opts.no_output));
    }

    0
}

fn stats_json(input: &Path, stats: &DecodeStats, no_output: bool) -> serde_json::Value {
    let frames: Vec<_> = stats
        .frames
        .iter()
        .map(|f| {
            let path = (!no_output).then(|| f.path.display().to_string());
            serde_json::json!({
                "index": f.index,
                "path": path,
                "sha256": f.sha256.map(|d| hex_digest(&d)),
            })
        })
        .collect();
    serde_json::json!({
        "command": "decode",
        "input": input.display().to_string(),
        "declared_frames": stats.declared_frames,
        "width": stats.layout.width,
        "height": stats.layout.height,
        "channels": stats.layout.channels,
        "output_size": stats.output_size(),
        "frames": frames,
    })
}

fn hex_digest(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run() -> ! {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version are not usage errors.
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            process::exit(code);
        }
    };
    let opts = resolve_options(cli);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(&opts)))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match opts.command {
        Command::Decode => cmd_decode(&opts),
        Command::Info => cmd_info(&opts),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
