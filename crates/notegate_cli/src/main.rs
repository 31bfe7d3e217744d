//! Batch validator for note JSON files.
//!
//! # Responsibility
//! - Run every input file through one `NoteValidator` with a shared monitor.
//! - Print one verdict line per note, then the monitor summary.
//!
//! Exit codes: `0` all accepted, `1` at least one rejection, `2` usage or IO
//! failure.

use clap::Parser;
use log::{error, info};
use notegate_core::{
    core_version, init_logging, CandidateNote, LogConfig, NoteValidator, SecurityMonitor,
    ViolationSummary,
};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "notegate_cli")]
#[command(version, about = "Validate note JSON files against the content security gate")]
struct Cli {
    /// Note files to check, one JSON object each.
    #[arg(required = true, value_name = "NOTE_JSON")]
    files: Vec<PathBuf>,

    /// Check without recording violations in the audit monitor.
    #[arg(long)]
    dry_run: bool,

    /// Absolute directory for rotating log files.
    #[arg(long, value_name = "ABS_PATH")]
    log_dir: Option<PathBuf>,
}

#[derive(Debug)]
enum CliError {
    Logging(String),
    Io { path: PathBuf, message: String },
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Logging(message) => write!(f, "logging setup failed: {message}"),
            Self::Io { path, message } => write!(f, "{}: {message}", path.display()),
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // --help and --version also arrive here and are not failures.
            return if err.use_stderr() {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("{err}");
            ExitCode::from(2)
        }
    }
}

/// Returns `Ok(true)` when every note was accepted.
fn run(cli: &Cli) -> Result<bool, CliError> {
    if let Some(log_dir) = &cli.log_dir {
        init_logging(&LogConfig::new(log_dir)).map_err(|err| CliError::Logging(err.to_string()))?;
    }

    let monitor = Arc::new(SecurityMonitor::default());
    let validator = NoteValidator::with_default_limits(Arc::clone(&monitor));
    let mut all_accepted = true;

    for path in &cli.files {
        let note = read_note(path)?;
        let verdict = if cli.dry_run {
            validator.check_note(&note)
        } else {
            validator.validate_note(&note)
        };
        match verdict {
            Ok(()) => println!("accepted id={}", note.id),
            Err(err) => {
                all_accepted = false;
                println!(
                    "rejected id={} category={} field={}",
                    note.id, err.category, err.field
                );
            }
        }
    }

    print_summary(&monitor.summary());
    info!(
        "event=cli_run module=cli status=ok files={} dry_run={} version={}",
        cli.files.len(),
        cli.dry_run,
        core_version()
    );
    Ok(all_accepted)
}

fn read_note(path: &Path) -> Result<CandidateNote, CliError> {
    let io_error = |message: String| CliError::Io {
        path: path.to_path_buf(),
        message,
    };
    let text = std::fs::read_to_string(path).map_err(|err| io_error(err.to_string()))?;
    serde_json::from_str(&text).map_err(|err| io_error(format!("invalid note json: {err}")))
}

fn print_summary(summary: &ViolationSummary) {
    match serde_json::to_string_pretty(summary) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("summary unavailable: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::{run, Cli, CliError};
    use clap::error::ErrorKind;
    use clap::Parser;
    use std::io::Write;
    use std::path::Path;

    fn cli_for(files: &[&Path]) -> Cli {
        let mut argv = vec!["notegate_cli".to_string()];
        argv.extend(files.iter().map(|path| path.to_string_lossy().to_string()));
        Cli::try_parse_from(argv).expect("file list should parse")
    }

    #[test]
    fn cli_collects_files_and_flags() {
        let cli = Cli::try_parse_from(["notegate_cli", "a.json", "--dry-run", "b.json"])
            .expect("valid args should parse");
        assert!(cli.dry_run);
        assert_eq!(cli.files.len(), 2);
        assert!(cli.log_dir.is_none());

        let cli = Cli::try_parse_from(["notegate_cli", "--log-dir", "/tmp/notegate", "a.json"])
            .expect("log dir should parse");
        assert_eq!(cli.log_dir.as_deref(), Some(Path::new("/tmp/notegate")));
    }

    #[test]
    fn cli_rejects_missing_files_and_unknown_flags_as_usage_errors() {
        let err = Cli::try_parse_from(["notegate_cli"]).expect_err("no files should fail");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(err.use_stderr());

        let err = Cli::try_parse_from(["notegate_cli", "a.json", "--loud"])
            .expect_err("unknown flag should fail");
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
        assert!(err.use_stderr());

        let err = Cli::try_parse_from(["notegate_cli", "a.json", "--log-dir"])
            .expect_err("log dir without value should fail");
        assert!(err.use_stderr());
    }

    #[test]
    fn help_is_not_a_usage_error() {
        let err = Cli::try_parse_from(["notegate_cli", "--help"]).expect_err("help short-circuits");
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert!(!err.use_stderr());
    }

    #[test]
    fn run_reports_rejection_and_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let benign = dir.path().join("benign.json");
        let hostile = dir.path().join("hostile.json");
        std::fs::File::create(&benign)
            .and_then(|mut file| file.write_all(br#"{"id":"n1","title":"List","body":"eggs"}"#))
            .expect("benign note should be written");
        std::fs::File::create(&hostile)
            .and_then(|mut file| {
                file.write_all(br#"{"id":"n2","title":"x","body":"1' OR '1'='1"}"#)
            })
            .expect("hostile note should be written");

        assert!(run(&cli_for(&[&benign])).expect("benign run should succeed"));
        let mixed = run(&cli_for(&[&benign, &hostile])).expect("run should complete");
        assert!(!mixed);

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            run(&cli_for(&[&missing])),
            Err(CliError::Io { .. })
        ));
    }
}
