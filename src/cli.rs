// Command-line interface for resdelta.
//
// Subcommands wrap the directory helpers in `io`: `diff` writes a diff file
// for two trees, `restore` rebuilds the base tree from the derived tree and a
// diff file, `show` lists the records of a diff file.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};

use crate::diff::compare::DEFAULT_CHUNK_SIZE;
use crate::diff::generator::{DiffOptions, DuplicatePolicy};
use crate::diff::record::{DiffKind, DiffSummary};
use crate::format::codec::{DiffReader, ReadOptions, WriteOptions};
use crate::format::compression::PayloadCompression;
use crate::io::{diff_dirs, restore_dir};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const DEFAULT_LEVEL: u32 = 6;
const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Resource-level diff between a base tree and its transformed derivative.
#[derive(Parser, Debug)]
#[command(
    name = "resdelta",
    version,
    about = "Resource diff generator/restorer",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compute the diff between a base and a derived tree.
    Diff(DiffArgs),
    /// Rebuild the base tree from the derived tree and a diff file.
    Restore(RestoreArgs),
    /// List the records of a diff file.
    Show(ShowArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CompressionArg {
    None,
    Lzma,
    Zlib,
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Unmodified base tree.
    #[arg(long, short = 'b', value_hint = ValueHint::DirPath)]
    base: PathBuf,

    /// Transformed tree derived from the base.
    #[arg(long, short = 'd', value_hint = ValueHint::DirPath)]
    derived: PathBuf,

    /// Diff output file.
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Payload compression for stored base bytes.
    #[arg(long, value_enum, default_value_t = CompressionArg::None)]
    compression: CompressionArg,

    /// Compression level (0-9).
    #[arg(long, short = 'l', value_parser = clap::value_parser!(u32).range(0..=9), default_value_t = DEFAULT_LEVEL)]
    level: u32,

    /// Content comparison chunk size (supports K/M/G suffix, clamped to 8M).
    #[arg(long = "chunk-size", value_parser = parse_byte_size, default_value_t = DEFAULT_CHUNK_SIZE as u64)]
    chunk_size: u64,

    /// Disable per-record Adler-32 checksums.
    #[arg(long = "no-checksum")]
    no_checksum: bool,

    /// Accept repeated base names (later occurrences count as removed).
    #[arg(long = "allow-duplicates")]
    allow_duplicates: bool,

    /// Diff output file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RestoreArgs {
    /// Transformed tree the diff was computed against.
    #[arg(long, short = 'd', value_hint = ValueHint::DirPath)]
    derived: PathBuf,

    /// Diff file.
    #[arg(long, value_hint = ValueHint::FilePath)]
    diff: PathBuf,

    /// Output directory for the restored base tree.
    #[arg(long, value_hint = ValueHint::DirPath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Output directory (positional form).
    #[arg(value_hint = ValueHint::DirPath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Diff file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Skip checksum verification.
    #[arg(long = "no-checksum")]
    no_checksum: bool,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Diff,
    Restore,
    Show,
    Config,
}

struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    base_dir: Option<PathBuf>,
    derived_dir: Option<PathBuf>,
    input_file: Option<PathBuf>,
    output: Option<PathBuf>,
    compression: CompressionArg,
    level: u32,
    chunk_size: usize,
    no_checksum: bool,
    allow_duplicates: bool,
}

impl Options {
    fn base(command: Command, cli: &Cli) -> Self {
        Self {
            command,
            force: cli.force,
            quiet: cli.quiet,
            verbose: cli.verbose.min(2),
            json_output: cli.json_output,
            base_dir: None,
            derived_dir: None,
            input_file: None,
            output: None,
            compression: CompressionArg::None,
            level: DEFAULT_LEVEL,
            chunk_size: DEFAULT_CHUNK_SIZE,
            no_checksum: false,
            allow_duplicates: false,
        }
    }
}

fn resolve_options(cli: Cli) -> Options {
    match &cli.command {
        Cmd::Diff(args) => Options {
            base_dir: Some(args.base.clone()),
            derived_dir: Some(args.derived.clone()),
            output: args.output.clone().or_else(|| args.output_pos.clone()),
            compression: args.compression,
            level: args.level,
            chunk_size: usize::try_from(args.chunk_size).unwrap_or(usize::MAX),
            no_checksum: args.no_checksum,
            allow_duplicates: args.allow_duplicates,
            ..Options::base(Command::Diff, &cli)
        },
        Cmd::Restore(args) => Options {
            derived_dir: Some(args.derived.clone()),
            input_file: Some(args.diff.clone()),
            output: args.output.clone().or_else(|| args.output_pos.clone()),
            ..Options::base(Command::Restore, &cli)
        },
        Cmd::Show(args) => Options {
            input_file: Some(args.input.clone()),
            no_checksum: args.no_checksum,
            ..Options::base(Command::Show, &cli)
        },
        Cmd::Config => Options::base(Command::Config, &cli),
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("resdelta".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

// ---------------------------------------------------------------------------
// Option mapping
// ---------------------------------------------------------------------------

fn build_diff_options(opts: &Options) -> DiffOptions {
    DiffOptions {
        chunk_size: opts.chunk_size,
        duplicates: if opts.allow_duplicates {
            DuplicatePolicy::FirstWins
        } else {
            DuplicatePolicy::Reject
        },
    }
}

fn build_write_options(opts: &Options) -> WriteOptions {
    let compression = match opts.compression {
        CompressionArg::None => PayloadCompression::None,
        #[cfg(feature = "lzma-payload")]
        CompressionArg::Lzma => PayloadCompression::Lzma,
        #[cfg(feature = "zlib-payload")]
        CompressionArg::Zlib => PayloadCompression::Zlib { level: opts.level },
        #[allow(unreachable_patterns)]
        other => {
            eprintln!("resdelta: warning: {other:?} compression not compiled in, using none");
            PayloadCompression::None
        }
    };
    WriteOptions {
        compression,
        checksum: !opts.no_checksum,
    }
}

fn hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => eprintln!("{s}"),
        Err(e) => eprintln!("resdelta: json: {e}"),
    }
}

/// Refuse to clobber `path` unless `--force` was given.
fn check_overwrite(path: &Path, opts: &Options) -> bool {
    if opts.force || !path.exists() {
        return true;
    }
    let non_empty_dir = path
        .read_dir()
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(true);
    if path.is_dir() && !non_empty_dir {
        return true;
    }
    eprintln!(
        "resdelta: to overwrite output {}, use --force",
        path.display()
    );
    false
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("resdelta version {version} (Rust)");

    let lzma = cfg!(feature = "lzma-payload") as u8;
    let zlib = cfg!(feature = "zlib-payload") as u8;
    let adler32 = cfg!(feature = "adler32") as u8;
    let file_io = cfg!(feature = "file-io") as u8;

    eprintln!("PAYLOAD_LZMA={lzma}");
    eprintln!("PAYLOAD_ZLIB={zlib}");
    eprintln!("ADLER32={adler32}");
    eprintln!("FILE_IO={file_io}");
    eprintln!("DEFAULT_LEVEL={DEFAULT_LEVEL}");
    eprintln!("DEFAULT_CHUNK_SIZE={DEFAULT_CHUNK_SIZE}");
    eprintln!("MAX_NAME_LEN={}", crate::format::codec::MAX_NAME_LEN);

    0
}

// ---------------------------------------------------------------------------
// Diff command
// ---------------------------------------------------------------------------

fn cmd_diff(opts: &Options) -> i32 {
    let (Some(base), Some(derived)) = (&opts.base_dir, &opts.derived_dir) else {
        eprintln!("resdelta: diff requires --base and --derived");
        return 1;
    };
    let Some(output) = &opts.output else {
        eprintln!("resdelta: diff requires an output file");
        return 1;
    };
    if !check_overwrite(output, opts) {
        return 1;
    }

    let stats = match diff_dirs(
        base,
        derived,
        output,
        build_diff_options(opts),
        &build_write_options(opts),
    ) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("resdelta: diff error: {e}");
            return 1;
        }
    };

    let s = stats.summary;
    if !opts.quiet {
        eprintln!(
            "resdelta: {} added, {} removed, {} modified ({} base / {} derived resources)",
            s.added, s.removed, s.modified, stats.base_resources, stats.derived_resources
        );
    }
    if opts.verbose > 0 {
        eprintln!(
            "resdelta: payload {} bytes, stored {} bytes ({} compressed), diff size {}",
            stats.write.payload_bytes,
            stats.write.stored_bytes,
            stats.write.compressed_payloads,
            stats.diff_size
        );
        if let Some(sha) = &stats.diff_sha256 {
            eprintln!("resdelta: diff sha256 {}", hex(sha));
        }
    }
    if opts.json_output {
        print_json(&serde_json::json!({
            "base_resources": stats.base_resources,
            "derived_resources": stats.derived_resources,
            "added": s.added,
            "removed": s.removed,
            "modified": s.modified,
            "payload_bytes": stats.write.payload_bytes,
            "stored_bytes": stats.write.stored_bytes,
            "diff_size": stats.diff_size,
            "diff_sha256": stats.diff_sha256.as_ref().map(|d| hex(d)),
        }));
    }
    0
}

// ---------------------------------------------------------------------------
// Restore command
// ---------------------------------------------------------------------------

fn cmd_restore(opts: &Options) -> i32 {
    let (Some(derived), Some(diff)) = (&opts.derived_dir, &opts.input_file) else {
        eprintln!("resdelta: restore requires --derived and --diff");
        return 1;
    };
    let Some(output) = &opts.output else {
        eprintln!("resdelta: restore requires an output directory");
        return 1;
    };
    if !check_overwrite(output, opts) {
        return 1;
    }

    match restore_dir(derived, diff, output) {
        Ok(stats) => {
            if !opts.quiet {
                eprintln!(
                    "resdelta: restored {} files ({} copied, {} from diff), {} bytes",
                    stats.copied + stats.restored,
                    stats.copied,
                    stats.restored,
                    stats.output_size
                );
            }
            if opts.json_output {
                print_json(&serde_json::json!({
                    "records": stats.records,
                    "copied": stats.copied,
                    "restored": stats.restored,
                    "skipped": stats.skipped,
                    "output_size": stats.output_size,
                }));
            }
            0
        }
        Err(e) => {
            eprintln!("resdelta: restore error: {e}");
            1
        }
    }
}

// ---------------------------------------------------------------------------
// Show command
// ---------------------------------------------------------------------------

fn cmd_show(opts: &Options) -> i32 {
    let Some(input) = &opts.input_file else {
        eprintln!("resdelta: show requires an input file");
        return 1;
    };
    let file = match File::open(input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("resdelta: {}: {e}", input.display());
            return 1;
        }
    };
    let read_opts = ReadOptions {
        verify_checksum: !opts.no_checksum,
        ..Default::default()
    };
    let mut reader = match DiffReader::with_options(BufReader::with_capacity(BUF_SIZE, file), read_opts) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("resdelta: invalid diff header: {e}");
            return 1;
        }
    };

    let header = reader.header().clone();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if opts.verbose > 0 {
        let _ = writeln!(out, "records:     {}", header.record_count);
        let _ = writeln!(out, "checksums:   {}", header.has_checksum());
        let _ = writeln!(out, "codec:       {}", header.codec_id.map_or("none".to_string(), |id| id.to_string()));
    }

    let mut s = DiffSummary::default();
    let mut names = HashSet::new();
    let mut entries = Vec::new();
    loop {
        match reader.next_record() {
            Ok(Some(diff)) => {
                if !names.insert(diff.name().to_owned()) {
                    eprintln!("resdelta: duplicate record for {}", diff.name());
                    return 1;
                }
                let size = diff.bytes().map(<[u8]>::len);
                if !opts.json_output {
                    let size = size.map_or("-".to_string(), |n| n.to_string());
                    let _ = writeln!(out, "{:<9} {:>10}  {}", diff.kind(), size, diff.name());
                } else {
                    entries.push(serde_json::json!({
                        "kind": diff.kind().as_str(),
                        "name": diff.name(),
                        "bytes": size,
                    }));
                }
                s.record(&diff);
            }
            Ok(None) => break,
            Err(e) => {
                eprintln!("resdelta: record {}: {e}", s.total());
                return 1;
            }
        }
    }
    if let Err(e) = reader.finish() {
        eprintln!("resdelta: {e}");
        return 1;
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "records": entries,
            "added": s.added,
            "removed": s.removed,
            "modified": s.modified,
            "retained_bytes": s.retained_bytes,
        }));
    } else if !opts.quiet {
        eprintln!(
            "resdelta: {} records: {} {}, {} {}, {} {}",
            s.total(),
            s.added,
            DiffKind::Added,
            s.removed,
            DiffKind::Removed,
            s.modified,
            DiffKind::Modified
        );
    }
    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    let default_filter = match (opts.quiet, opts.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match opts.command {
        Command::Diff => cmd_diff(&opts),
        Command::Restore => cmd_restore(&opts),
        Command::Show => cmd_show(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_opts(args: &[&str]) -> Options {
        let argv: Vec<String> = std::iter::once("resdelta".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        let cli = Cli::try_parse_from(argv).expect("cli parse failed");
        resolve_options(cli)
    }

    #[test]
    fn parse_byte_size_suffixes() {
        assert_eq!(parse_byte_size("1").unwrap(), 1);
        assert_eq!(parse_byte_size("2K").unwrap(), 2 * 1024);
        assert_eq!(parse_byte_size("3m").unwrap(), 3 * 1024 * 1024);
        assert_eq!(parse_byte_size("4G").unwrap(), 4 * 1024 * 1024 * 1024);
        assert!(parse_byte_size("").is_err());
        assert!(parse_byte_size("x").is_err());
    }

    #[test]
    fn diff_subcommand_maps_correctly() {
        let opts = parse_opts(&[
            "diff",
            "--base",
            "jmods",
            "--derived",
            "image",
            "--chunk-size",
            "4K",
            "--compression",
            "zlib",
            "--level",
            "9",
            "out.rsdf",
        ]);
        assert_eq!(opts.command, Command::Diff);
        assert_eq!(opts.base_dir, Some(PathBuf::from("jmods")));
        assert_eq!(opts.derived_dir, Some(PathBuf::from("image")));
        assert_eq!(opts.output, Some(PathBuf::from("out.rsdf")));
        assert_eq!(opts.chunk_size, 4096);
        assert_eq!(opts.compression, CompressionArg::Zlib);
        assert_eq!(opts.level, 9);
        assert!(!opts.allow_duplicates);
    }

    #[test]
    fn restore_subcommand_maps_correctly() {
        let opts = parse_opts(&[
            "--quiet",
            "restore",
            "--derived",
            "image",
            "--diff",
            "d.rsdf",
            "--output",
            "restored",
        ]);
        assert_eq!(opts.command, Command::Restore);
        assert!(opts.quiet);
        assert_eq!(opts.derived_dir, Some(PathBuf::from("image")));
        assert_eq!(opts.input_file, Some(PathBuf::from("d.rsdf")));
        assert_eq!(opts.output, Some(PathBuf::from("restored")));
    }

    #[test]
    fn show_and_config_map() {
        let opts = parse_opts(&["--json", "show", "--no-checksum", "d.rsdf"]);
        assert_eq!(opts.command, Command::Show);
        assert!(opts.json_output);
        assert!(opts.no_checksum);
        assert_eq!(parse_opts(&["config"]).command, Command::Config);
    }

    #[test]
    fn verbose_is_capped() {
        let opts = parse_opts(&["-vvv", "show", "d.rsdf"]);
        assert_eq!(opts.verbose, 2);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let argv = ["resdelta", "-q", "-v", "config"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn diff_requires_base_and_derived() {
        assert!(Cli::try_parse_from(["resdelta", "diff", "--base", "a", "out"]).is_err());
    }

    #[test]
    fn option_mapping() {
        let opts = parse_opts(&[
            "diff",
            "-b",
            "a",
            "-d",
            "b",
            "--no-checksum",
            "--allow-duplicates",
            "--chunk-size",
            "0",
            "out",
        ]);
        let d = build_diff_options(&opts);
        assert_eq!(d.duplicates, DuplicatePolicy::FirstWins);
        assert_eq!(d.chunk_size, 0);
        let w = build_write_options(&opts);
        assert!(!w.checksum);
        assert!(!w.compression.is_enabled());
    }

    #[test]
    fn fuzz_parse_never_panics_on_garbage() {
        fuzz_try_parse_args(&["diff".into(), "--chunk-size".into(), "99999999999G".into()]);
        fuzz_try_parse_args(&["--bogus".into()]);
    }
}
