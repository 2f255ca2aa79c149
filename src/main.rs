use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use codecbench::io_utils::{harness_cli_error, io_cli_error, simple_cli_error};
use codecbench::{
    ActionKind, BenchmarkRunner, CompiledProgram, Direction, HalfTripVerifier, HarnessConfig,
    HarnessError, LargeInputCheck, ObservationWriter, RoundTripVerifier, RunStatistics, Timer,
    VerificationReport,
};

/// Verify and time external stream codecs that encode with `-` and decode with `+`.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// JSON configuration file (toolchain, equality policy, extensions)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory the program is built and run in
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,
    /// Kill any single invocation running longer than this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a program against a reference corpus
    Test {
        /// Program id, e.g. MoveToFront
        program: String,
        /// Directory holding `<case>` and `<case>.<ext>` files
        corpus: PathBuf,
        /// Encoded-file extension; defaults to the one registered for the program
        #[arg(long)]
        ext: Option<String>,
        /// Checks to run (all by default)
        #[arg(long, value_enum)]
        only: Vec<Check>,
        /// Largest expected output compared byte by byte with a detailed report
        #[arg(long)]
        diff_limit: Option<usize>,
        /// Accept any non-empty output above the diff limit
        #[arg(long)]
        lenient_large: bool,
    },
    /// Time repeated invocations and print one CSV row per run
    Bench {
        /// Program id, e.g. MoveToFront
        program: String,
        /// Runs per file and action
        repeat: usize,
        /// Input files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Action to time: `-` encode, `+` decode, `-+` both (repeatable)
        #[arg(long = "action", allow_hyphen_values = true)]
        actions: Vec<ActionKind>,
        /// Write CSV here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Hide progress bars
        #[arg(long)]
        quiet: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Check {
    Encode,
    Decode,
    Roundtrip,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::load(path).map_err(|e| harness_cli_error("loading config", e))?,
        None => HarnessConfig::default(),
    };
    if let Some(dir) = cli.work_dir {
        config.toolchain.work_dir = dir;
    }
    if cli.timeout.is_some() {
        config.timeout_secs = cli.timeout;
    }

    match cli.command {
        Commands::Test {
            program,
            corpus,
            ext,
            only,
            diff_limit,
            lenient_large,
        } => {
            if let Some(limit) = diff_limit {
                config.equality.diff_limit = limit;
            }
            if lenient_large {
                config.equality.large = LargeInputCheck::Lenient;
            }
            let ext = match ext {
                Some(ext) => ext,
                None => config
                    .extension_for(&program)
                    .map_err(|e| harness_cli_error("resolving extension", e))?
                    .to_string(),
            };
            run_tests(&config, &program, &corpus, &ext, &only)
        }
        Commands::Bench {
            program,
            repeat,
            files,
            actions,
            output,
            quiet,
        } => run_bench(&config, &program, repeat, &files, actions, output.as_deref(), quiet),
    }
}

fn run_tests(
    config: &HarnessConfig,
    program: &str,
    corpus: &Path,
    ext: &str,
    only: &[Check],
) -> Result<(), Box<dyn std::error::Error>> {
    let checks: &[Check] = if only.is_empty() {
        &[Check::Encode, Check::Decode, Check::Roundtrip]
    } else {
        only
    };

    let mut compiled = CompiledProgram::acquire(program, &config.toolchain)
        .map_err(|e| harness_cli_error("building", e))?;
    let outcome = (|| -> Result<Vec<VerificationReport>, HarnessError> {
        let half = HalfTripVerifier::new(&compiled, config.equality, config.timeout());
        let round = RoundTripVerifier::new(&compiled, config.equality, config.timeout());
        let mut reports = Vec::new();
        for check in checks {
            let report = match check {
                Check::Encode => half.verify(corpus, ext, Direction::Encode)?,
                Check::Decode => half.verify(corpus, ext, Direction::Decode)?,
                Check::Roundtrip => round.verify(corpus)?,
            };
            eprintln!("{} {}:", program, report.check);
            for case in &report.cases {
                eprintln!("  {case}");
            }
            reports.push(report);
        }
        Ok(reports)
    })();
    let released = compiled.release();
    let reports = outcome.map_err(|e| harness_cli_error("testing", e))?;
    released.map_err(|e| harness_cli_error("cleaning up", e))?;

    let total: usize = reports.iter().map(|r| r.cases.len()).sum();
    let failed: usize = reports.iter().map(|r| r.failures().count()).sum();
    eprintln!("{program}: {} passed, {failed} failed", total - failed);
    if failed > 0 {
        return Err(simple_cli_error(&format!("{failed} of {total} case(s) failed")).into());
    }
    Ok(())
}

fn run_bench(
    config: &HarnessConfig,
    program: &str,
    repeat: usize,
    files: &[PathBuf],
    actions: Vec<ActionKind>,
    output: Option<&Path>,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut compiled = CompiledProgram::acquire(program, &config.toolchain)
        .map_err(|e| harness_cli_error("building", e))?;
    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).map_err(|e| io_cli_error("creating output file", path, e))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = ObservationWriter::new(sink);
    eprintln!("Running {program} {repeat} times");
    let outcome = BenchmarkRunner::new(&compiled, Timer::new(config.timeout()), repeat)
        .map(|runner| runner.with_actions(actions).with_progress(!quiet))
        .and_then(|runner| runner.run(files, &mut writer));
    let released = compiled.release();
    let groups = outcome.map_err(|e| harness_cli_error("benchmarking", e))?;
    released.map_err(|e| harness_cli_error("cleaning up", e))?;

    for group in &groups {
        eprintln!("{} {}:", group.action, group.file.display());
        match RunStatistics::from_durations(&group.durations) {
            Ok(stats) => eprint!("{stats}"),
            Err(e) => eprintln!("  {e}"),
        }
    }
    Ok(())
}
