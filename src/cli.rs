// Command-line shell for phdiff.
//
// Subcommands map one-to-one onto the file helpers in `crate::io`:
// `create` writes a patch, `apply` rebuilds a target, `info` prints the
// container framing and `config` prints build defaults.

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::buffer::ReadStrategy;
use crate::codec::heatshrink::{MAX_WINDOW_SZ2, MIN_LOOKAHEAD_SZ2, MIN_WINDOW_SZ2};
use crate::codec::{CodecOptions, CodecParameters, Compression, HeatshrinkParams};
use crate::container::{ApplyOptions, CreateOptions};
use crate::engine::DeltaParams;
use crate::error::Result;
use crate::io::{self, hex_digest};

// ---------------------------------------------------------------------------
// Argument parsing helpers
// ---------------------------------------------------------------------------

fn parse_compression(s: &str) -> std::result::Result<Compression, String> {
    s.parse::<Compression>().map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Binary patch creation and application.
#[derive(Parser, Debug)]
#[command(
    name = "phdiff",
    version,
    about = "Create and apply compressed binary patches",
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
    /// Create a patch turning FROM into TO.
    Create(CreateArgs),
    /// Apply a patch to FROM, writing TO.
    Apply(ApplyArgs),
    /// Print patch container information.
    Info(InfoArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct HeatshrinkArgs {
    /// Heatshrink window size as a power of two.
    #[arg(
        long = "heatshrink-window-sz2",
        value_parser = clap::value_parser!(u8).range(i64::from(MIN_WINDOW_SZ2)..=i64::from(MAX_WINDOW_SZ2)),
        default_value_t = HeatshrinkParams::default().window_sz2
    )]
    window_sz2: u8,

    /// Heatshrink lookahead size as a power of two.
    #[arg(
        long = "heatshrink-lookahead-sz2",
        value_parser = clap::value_parser!(u8).range(i64::from(MIN_LOOKAHEAD_SZ2)..i64::from(MAX_WINDOW_SZ2)),
        default_value_t = HeatshrinkParams::default().lookahead_sz2
    )]
    lookahead_sz2: u8,
}

#[derive(Args, Debug)]
struct CreateArgs {
    /// Source file.
    #[arg(value_hint = ValueHint::FilePath)]
    from_file: PathBuf,

    /// Target file.
    #[arg(value_hint = ValueHint::FilePath)]
    to_file: PathBuf,

    /// Patch file to write.
    #[arg(value_hint = ValueHint::FilePath)]
    patch_file: PathBuf,

    /// Payload compression.
    #[arg(short = 'c', long, value_parser = parse_compression, default_value_t = Compression::default())]
    compression: Compression,

    /// Source block size used for match lookup.
    #[arg(long = "match-block-size", default_value_t = DeltaParams::default().match_block_size)]
    match_block_size: usize,

    /// Minimum match score (equal minus differing bytes).
    #[arg(long = "match-score", default_value_t = DeltaParams::default().match_score)]
    match_score: u32,

    /// Memory-map the input files instead of reading them.
    #[arg(long = "use-mmap")]
    use_mmap: bool,

    #[command(flatten)]
    heatshrink: HeatshrinkArgs,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Source file.
    #[arg(value_hint = ValueHint::FilePath)]
    from_file: PathBuf,

    /// Patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    patch_file: PathBuf,

    /// Output file.
    #[arg(value_hint = ValueHint::FilePath)]
    to_file: PathBuf,

    #[command(flatten)]
    heatshrink: HeatshrinkArgs,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    patch_file: PathBuf,

    #[command(flatten)]
    heatshrink: HeatshrinkArgs,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Create,
    Apply,
    Info,
    Config,
}

struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    compression: Compression,
    match_block_size: usize,
    match_score: u32,
    use_mmap: bool,
    heatshrink_window_sz2: u8,
    heatshrink_lookahead_sz2: u8,
    from_file: Option<PathBuf>,
    to_file: Option<PathBuf>,
    patch_file: Option<PathBuf>,
}

impl Options {
    fn base(cli: &Cli, command: Command) -> Self {
        let params = DeltaParams::default();
        let heatshrink = HeatshrinkParams::default();
        Options {
            command,
            force: cli.force,
            quiet: cli.quiet,
            verbose: cli.verbose.min(2),
            json_output: cli.json_output,
            compression: Compression::default(),
            match_block_size: params.match_block_size,
            match_score: params.match_score,
            use_mmap: false,
            heatshrink_window_sz2: heatshrink.window_sz2,
            heatshrink_lookahead_sz2: heatshrink.lookahead_sz2,
            from_file: None,
            to_file: None,
            patch_file: None,
        }
    }

    fn with_heatshrink(mut self, args: &HeatshrinkArgs) -> Self {
        self.heatshrink_window_sz2 = args.window_sz2;
        self.heatshrink_lookahead_sz2 = args.lookahead_sz2;
        self
    }
}

fn resolve_options(cli: Cli) -> Options {
    match &cli.command {
        Cmd::Create(args) => Options {
            compression: args.compression,
            match_block_size: args.match_block_size,
            match_score: args.match_score,
            use_mmap: args.use_mmap,
            from_file: Some(args.from_file.clone()),
            to_file: Some(args.to_file.clone()),
            patch_file: Some(args.patch_file.clone()),
            ..Options::base(&cli, Command::Create)
        }
        .with_heatshrink(&args.heatshrink),
        Cmd::Apply(args) => Options {
            from_file: Some(args.from_file.clone()),
            to_file: Some(args.to_file.clone()),
            patch_file: Some(args.patch_file.clone()),
            ..Options::base(&cli, Command::Apply)
        }
        .with_heatshrink(&args.heatshrink),
        Cmd::Info(args) => Options {
            patch_file: Some(args.patch_file.clone()),
            ..Options::base(&cli, Command::Info)
        }
        .with_heatshrink(&args.heatshrink),
        Cmd::Config => Options::base(&cli, Command::Config),
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("phdiff".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let opts = resolve_options(cli);
        let _ = build_codec_options(&opts);
    }
}

// ---------------------------------------------------------------------------
// Build library options from CLI options
// ---------------------------------------------------------------------------

fn build_codec_options(opts: &Options) -> Result<CodecOptions> {
    Ok(CodecOptions {
        heatshrink: HeatshrinkParams::new(opts.heatshrink_window_sz2, opts.heatshrink_lookahead_sz2)?,
        ..CodecOptions::default()
    })
}

fn build_create_options(opts: &Options) -> Result<CreateOptions> {
    Ok(CreateOptions {
        compression: opts.compression,
        match_score: opts.match_score,
        match_block_size: opts.match_block_size,
        codec: build_codec_options(opts)?,
    })
}

fn required<'a>(path: &'a Option<PathBuf>, what: &str) -> std::result::Result<&'a Path, String> {
    path.as_deref().ok_or_else(|| format!("missing {what} file"))
}

/// Refuse to clobber an existing file unless `-f` was given.
fn check_output(path: &Path, force: bool) -> bool {
    if path.exists() && !force {
        eprintln!(
            "phdiff: output file exists, use -f to overwrite: {}",
            path.display()
        );
        return false;
    }
    true
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("phdiff version {version} (Rust)");
    eprintln!("Licensed under the MIT License");

    let file_io = cfg!(feature = "file-io") as u8;
    let codec = CodecOptions::default();
    let params = DeltaParams::default();
    let names: Vec<&str> = Compression::ALL.iter().map(|c| c.name()).collect();

    eprintln!("FILE_IO={file_io}");
    eprintln!("COMPRESSIONS={}", names.join(","));
    eprintln!("DEFAULT_COMPRESSION={}", Compression::default());
    eprintln!("DEFAULT_MATCH_SCORE={}", params.match_score);
    eprintln!("DEFAULT_MATCH_BLOCK_SIZE={}", params.match_block_size);
    eprintln!("DEFAULT_HEATSHRINK_WINDOW_SZ2={}", codec.heatshrink.window_sz2);
    eprintln!("DEFAULT_HEATSHRINK_LOOKAHEAD_SZ2={}", codec.heatshrink.lookahead_sz2);
    eprintln!("LZMA_PRESET={}", codec.lzma_preset);
    eprintln!("BZ2_LEVEL={}", codec.bz2_level);
    eprintln!("ZSTD_LEVEL={}", codec.zstd_level);

    0
}

// ---------------------------------------------------------------------------
// Create command
// ---------------------------------------------------------------------------

fn cmd_create(opts: &Options) -> i32 {
    let (from, to, patch) = match (
        required(&opts.from_file, "from"),
        required(&opts.to_file, "to"),
        required(&opts.patch_file, "patch"),
    ) {
        (Ok(from), Ok(to), Ok(patch)) => (from, to, patch),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
            eprintln!("phdiff: {e}");
            return 1;
        }
    };
    if !check_output(patch, opts.force) {
        return 1;
    }

    let create_opts = match build_create_options(opts) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("phdiff: {e}");
            return 1;
        }
    };
    let strategy = if opts.use_mmap {
        ReadStrategy::Mmap
    } else {
        ReadStrategy::Buffered
    };

    let stats = match io::create_patch_file(from, to, patch, &create_opts, strategy) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("phdiff: {e}");
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "phdiff: create: source size: {}, target size: {}, raw patch size: {}, \
             patch size: {}",
            stats.source_size, stats.target_size, stats.raw_patch_size, stats.patch_size
        );
    }

    if opts.json_output {
        let json = serde_json::json!({
            "command": "create",
            "compression": create_opts.compression.name(),
            "source_size": stats.source_size,
            "target_size": stats.target_size,
            "raw_patch_size": stats.raw_patch_size,
            "patch_size": stats.patch_size,
            "target_sha256": stats.target_sha256.as_ref().map(hex_digest),
        });
        eprintln!("{json:#}");
    }

    0
}

// ---------------------------------------------------------------------------
// Apply command
// ---------------------------------------------------------------------------

fn cmd_apply(opts: &Options) -> i32 {
    let (from, patch, to) = match (
        required(&opts.from_file, "from"),
        required(&opts.patch_file, "patch"),
        required(&opts.to_file, "to"),
    ) {
        (Ok(from), Ok(patch), Ok(to)) => (from, patch, to),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
            eprintln!("phdiff: {e}");
            return 1;
        }
    };
    if !check_output(to, opts.force) {
        return 1;
    }

    let apply_opts = match build_codec_options(opts) {
        Ok(codec) => ApplyOptions { codec },
        Err(e) => {
            eprintln!("phdiff: {e}");
            return 1;
        }
    };

    let stats = match io::apply_patch_file(from, patch, to, &apply_opts) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("phdiff: {e}");
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "phdiff: apply: source size: {}, patch size: {}, output size: {}",
            stats.source_size, stats.patch_size, stats.output_size
        );
    }

    if opts.json_output {
        let json = serde_json::json!({
            "command": "apply",
            "source_size": stats.source_size,
            "patch_size": stats.patch_size,
            "output_size": stats.output_size,
            "output_sha256": stats.output_sha256.as_ref().map(hex_digest),
        });
        eprintln!("{json:#}");
    }

    0
}

// ---------------------------------------------------------------------------
// Info command
// ---------------------------------------------------------------------------

fn cmd_info(opts: &Options) -> i32 {
    let patch = match required(&opts.patch_file, "patch") {
        Ok(p) => p,
        Err(e) => {
            eprintln!("phdiff: {e}");
            return 1;
        }
    };
    let codec = match build_codec_options(opts) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("phdiff: {e}");
            return 1;
        }
    };

    let info = match io::patch_info_file(patch, &codec) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("phdiff: {e}");
            return 1;
        }
    };

    if !opts.quiet {
        print!("{info}");
    }

    if opts.json_output {
        let parameters: serde_json::Map<String, serde_json::Value> = info
            .compression_info
            .as_ref()
            .map(CodecParameters::entries)
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value.into()))
            .collect();
        let json = serde_json::json!({
            "command": "info",
            "format": info.format_name(),
            "compression": info.compression.name(),
            "patch_size": info.patch_size,
            "target_size": info.target_size,
            "raw_patch_size": info.raw_patch_size,
            "payload_size": info.payload_size,
            "compression_parameters": parameters,
        });
        eprintln!("{json:#}");
    }

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn default_log_filter(quiet: bool, verbose: u8) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    }
}

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_log_filter(opts.quiet, opts.verbose)),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();

    let exit_code = match opts.command {
        Command::Create => cmd_create(&opts),
        Command::Apply => cmd_apply(&opts),
        Command::Info => cmd_info(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
