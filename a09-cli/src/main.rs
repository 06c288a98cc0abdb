//! Command-line front end for the `a09` assembler: argument scanning, include-path/environment
//! resolution, dependency printing, and the `-l` listing file. The hard engineering lives in the
//! `a09` library; this binary is thin glue around `a09::driver::assemble`.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use a09::driver::{AssembleError, AssembleOptions};

mod listing;

/// Two-pass assembler for the Motorola 6809.
#[derive(Parser, Debug)]
#[command(name = "a09", version, about)]
struct Cli {
    /// Source file to assemble.
    file: PathBuf,

    /// Add a directory to the `INCLUDE`/`INCBIN` search path.
    #[arg(short = 'I', value_name = "DIR")]
    include: Vec<PathBuf>,

    /// Print a Make-format dependency line to stdout and exit.
    #[arg(short = 'M')]
    deps: bool,

    /// Run embedded `.TEST` units and report results as TAP version 14.
    #[arg(short = 'T')]
    tap: bool,

    /// Write a core dump of the emulator's final register/memory state after testing.
    #[arg(short = 'c', value_name = "FILE")]
    core: Option<PathBuf>,

    /// Emit debug diagnostics.
    #[arg(short = 'd')]
    debug: bool,

    /// Listing detail flags: any of `c` (cycles), `d` (detailed), `f` (flags), `t` (totals).
    #[arg(short = 'e', value_name = "CHARS")]
    listing_opts: Option<String>,

    /// Output container format.
    #[arg(short = 'f', value_name = "FMT", default_value = "bin")]
    format: String,

    /// Path to a listing file.
    #[arg(short = 'l', value_name = "FILE")]
    listing: Option<PathBuf>,

    /// Comma-separated warning tags to suppress, e.g. `W0012,W0003`.
    #[arg(short = 'n', value_delimiter = ',', value_name = "Wxxxx")]
    no_warn: Vec<String>,

    /// Output file path.
    #[arg(short = 'o', value_name = "FILE", default_value = "a09.obj")]
    output: PathBuf,

    /// Randomize `.TEST` unit execution order.
    #[arg(short = 'r')]
    randomize: bool,

    /// Run embedded `.TEST` units and report results as plain text.
    #[arg(short = 't')]
    test: bool,

    /// Treat any warning as a fatal error.
    #[arg(short = 'w')]
    fail_on_warning: bool,

    /// Back-end-specific flags, forwarded verbatim (e.g. `-X recsize=32`); unrecognized by this
    /// front end on purpose, mirroring the original's "unknown flags fall through to the active
    /// back-end" policy.
    #[arg(short = 'X', value_name = "KEY=VALUE")]
    backend_flag: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(msg) => {
            eprintln!("a09: {msg}");
            ExitCode::FAILURE
        }
    }
}

/// Assembling failed. A fatal [`AssembleError::Diagnostic`] was already printed by the
/// assembler's own diagnostic channel as it happened, so only `Io`/`Internal` need to be
/// surfaced again here.
fn handle_assemble_error(e: AssembleError) -> ExitCode {
    if let AssembleError::Diagnostic(_) = &e {
        return ExitCode::FAILURE;
    }
    eprintln!("a09: {e}");
    ExitCode::FAILURE
}

fn include_dirs(cli: &Cli) -> Vec<PathBuf> {
    let mut dirs = cli.include.clone();
    if let Ok(path) = std::env::var("A09_INCLUDE_PATH") {
        let sep = if cfg!(windows) { ';' } else { ':' };
        dirs.extend(path.split(sep).filter(|s| !s.is_empty()).map(PathBuf::from));
    }
    dirs
}

fn parse_warning_tags(tags: &[String]) -> Result<Vec<u16>, String> {
    tags.iter()
        .filter(|s| !s.is_empty())
        .map(|s| {
            let digits = s.strip_prefix(['W', 'w']).unwrap_or(s);
            digits
                .parse::<u16>()
                .map_err(|_| format!("invalid warning tag '{s}'"))
        })
        .collect()
}

fn parse_backend_flags(flags: &[String]) -> Vec<(String, Option<String>)> {
    flags
        .iter()
        .map(|f| match f.split_once('=') {
            Some((k, v)) => (k.to_string(), Some(v.to_string())),
            None => (f.clone(), None),
        })
        .collect()
}

fn run(cli: Cli) -> Result<ExitCode, String> {
    let source = std::fs::read_to_string(&cli.file)
        .map_err(|e| format!("can't read '{}': {e}", cli.file.display()))?;
    let entry_file = cli.file.display().to_string();

    let options = AssembleOptions {
        entry_file: entry_file.clone(),
        entry_source: source,
        include_dirs: include_dirs(&cli),
        virtual_files: HashMap::new(),
        backend: cli.format.clone(),
        backend_flags: parse_backend_flags(&cli.backend_flag),
        debug: cli.debug,
        fail_on_warning: cli.fail_on_warning,
        disabled_warnings: parse_warning_tags(&cli.no_warn)?,
        run_tests: cli.test || cli.tap,
        tap_output: cli.tap,
        shuffle_tests: cli.randomize,
        corefile: cli.core.clone(),
    };

    if cli.deps {
        let outcome = match a09::driver::assemble(&options) {
            Ok(o) => o,
            Err(e) => return Ok(handle_assemble_error(e)),
        };
        print!("{}:", cli.output.display());
        for dep in &outcome.dependencies {
            print!(" {dep}");
        }
        println!();
        return Ok(ExitCode::SUCCESS);
    }

    let outcome = match a09::driver::assemble(&options) {
        Ok(o) => o,
        Err(e) => return Ok(handle_assemble_error(e)),
    };

    std::fs::write(&cli.output, &outcome.image)
        .map_err(|e| format!("can't write '{}': {e}", cli.output.display()))?;

    if let Some(listing_path) = &cli.listing {
        write_listing(listing_path, &entry_file, &outcome, cli.listing_opts.as_deref())?;
    }

    let mut failed = outcome.warnings_failed;

    if let Some(report) = &outcome.test_report {
        let text = if cli.tap { report.to_tap() } else { report.to_text() };
        print!("{text}");
        if !report.all_passed() {
            failed = true;
        }
        if let Some(core_path) = &cli.core {
            if let Some(core) = &report.core {
                write_core_dump(core_path, core)?;
            }
        }
    }

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn write_listing(
    path: &std::path::Path,
    entry_file: &str,
    outcome: &a09::driver::AssembleOutcome,
    opts: Option<&str>,
) -> Result<(), String> {
    let mut f = std::fs::File::create(path).map_err(|e| format!("can't write listing '{}': {e}", path.display()))?;

    let mut header = listing::ListingFormatter::new(0);
    header.add("source", entry_file);
    header.add("bytes emitted", outcome.image.len());
    header.add("dependencies", outcome.dependencies.join(", "));
    write!(f, "{header}").map_err(|e| e.to_string())?;
    writeln!(f).map_err(|e| e.to_string())?;

    if opts.map(|o| o.contains('t')).unwrap_or(true) {
        writeln!(f, "Symbol table:").map_err(|e| e.to_string())?;
        writeln!(f, "{}", listing::symbol_table(&outcome.symbols)).map_err(|e| e.to_string())?;
    }

    Ok(())
}

fn write_core_dump(path: &std::path::Path, core: &a09::testrunner::CoreDump) -> Result<(), String> {
    let mut f = std::fs::File::create(path).map_err(|e| format!("can't write core '{}': {e}", path.display()))?;
    writeln!(
        f,
        "A={:02X} B={:02X} DP={:02X} CC={:02X} X={:04X} Y={:04X} U={:04X} S={:04X} PC={:04X} cycles={}",
        core.cpu.a, core.cpu.b, core.cpu.dp, core.cpu.cc, core.cpu.x, core.cpu.y, core.cpu.u, core.cpu.s, core.cpu.pc, core.cpu.cycles
    )
    .map_err(|e| e.to_string())?;
    f.write_all(core.memory.as_slice()).map_err(|e| e.to_string())?;
    Ok(())
}
