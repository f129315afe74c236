use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use dialoguer::Confirm;
use indoc::indoc;
use log::{LevelFilter, debug, warn};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use wdi_trace::err::ReportError;
use wdi_trace::{DEFAULT_CHUNK_SIZE, ReportSettings, TraceReport};

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ReportOutputFormat {
    Html,
    JsonLines,
}

struct WdiReport {
    input: PathBuf,
    settings: ReportSettings,
    output_format: ReportOutputFormat,
    verbosity_level: Option<LevelFilter>,
}

impl WdiReport {
    pub fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let input = matches
            .get_one::<PathBuf>("file")
            .context("--file is a required argument")?
            .clone();

        let chunk_size = match matches.get_one::<u64>("chunk") {
            Some(&chunk) => usize::try_from(chunk).context("--chunk does not fit in memory")?,
            None => DEFAULT_CHUNK_SIZE,
        };

        let output_dir = matches
            .get_one::<PathBuf>("output-dir")
            .cloned()
            .unwrap_or_else(|| PathBuf::from("."));

        let output_format = match matches.get_one::<String>("output-format").map(String::as_str) {
            Some("jsonl") => ReportOutputFormat::JsonLines,
            _ => ReportOutputFormat::Html,
        };

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(LevelFilter::Info),
            2 => Some(LevelFilter::Debug),
            3 => Some(LevelFilter::Trace),
            _ => {
                eprintln!("using more than -vvv does not affect verbosity level");
                Some(LevelFilter::Trace)
            }
        };

        Ok(WdiReport {
            input,
            settings: ReportSettings::new()
                .chunk_size(chunk_size)
                .output_dir(output_dir)
                .confirm_overwrite(!matches.get_flag("no-confirm-overwrite")),
            output_format,
            verbosity_level,
        })
    }

    /// Main entry point for `WdiReport`
    pub fn run(&self) -> Result<()> {
        self.try_to_initialize_logging();

        let show_progress = self.output_format == ReportOutputFormat::Html;

        if show_progress {
            println!("[*] Reading file: {}", self.input.display());
            println!("[*] Parsing XML Data (Images, Threads, Processes, Disk/Reg I/O)...");
        }

        let report = match TraceReport::from_path(&self.input, self.settings.clone()) {
            Ok(report) => report,
            Err(e) => {
                eprintln!("[!] Critical Error: {e}");
                exit(1)
            }
        };

        let stats = report.trace.stats();
        debug!(
            "{} events without a sub-record, {} uncategorized",
            stats.skipped, stats.uncategorized
        );

        match self.output_format {
            ReportOutputFormat::JsonLines => self.dump_records(&report),
            ReportOutputFormat::Html => self.write_report(&report),
        }
    }

    fn write_report(&self, report: &TraceReport) -> Result<()> {
        let pagination = report.pagination()?;

        if pagination.is_empty() {
            println!("[!] Data not found.");
            return Ok(());
        }

        let trace = &report.trace;
        println!(
            "\n[+] Analysis Complete: {}",
            self.input
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        println!("    - Processes : {}", trace.processes.len());
        println!("    - Threads   : {}", trace.threads.len());
        println!("    - Images    : {}", trace.images.len());
        println!("    - Disk/Reg  : {}", trace.disk_io.len());
        println!(
            "    - Total     : Generating {} HTML Parts...",
            pagination.total_pages()
        );

        let analyzed_at = jiff::Zoned::now().datetime();

        let written = match report.write_pages(analyzed_at, confirm_overwrite) {
            Ok(written) => written,
            Err(e @ ReportError::OverwriteDeclined { .. }) => return Err(e.into()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!(
                        "Failed to write reports into {}",
                        report.settings().get_output_dir().display()
                    )
                });
            }
        };

        for path in written {
            println!("    [+] Report Generated: {}", path.display());
        }

        Ok(())
    }

    fn dump_records(&self, report: &TraceReport) -> Result<()> {
        let stdout = io::stdout();
        let mut out = BufWriter::new(stdout.lock());

        for record in report.trace.records() {
            serde_json::to_writer(&mut out, &record)?;
            writeln!(out)?;
        }

        out.flush()?;
        Ok(())
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            if let Err(e) = TermLogger::init(
                level,
                Config::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            ) {
                eprintln!("Failed to initialize logging: {e}");
            }
        }
    }
}

/// Asks before overwriting an existing page, a failed prompt counts as a refusal.
fn confirm_overwrite(path: &Path) -> bool {
    match Confirm::new()
        .with_prompt(format!(
            "Are you sure you want to overwrite output file at {}",
            path.display()
        ))
        .default(false)
        .interact()
    {
        Ok(answer) => answer,
        Err(e) => {
            warn!("Failed to write confirmation prompt to term: {e}");
            false
        }
    }
}

fn command() -> Command {
    Command::new("wdi_report")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Classifies a Windows diagnostics (ETW/WDI) XML trace into paginated HTML reports")
        .long_about(indoc!(r#"
            Classifies a Windows diagnostics (ETW/WDI) XML trace into paginated HTML reports.

            Events are sorted into disk/file/registry I/O, image loads, threads and processes.
            I/O, thread and image tables are split into pages of `--chunk` rows, written as
            `<name>_Part_<n>.html`. Every page carries the full process list.
        "#))
        .arg(
            Arg::new("file")
                .long("file")
                .short('f')
                .required(true)
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Path to the source trace."),
        )
        .arg(
            Arg::new("chunk")
                .long("chunk")
                .short('c')
                .value_name("N")
                .default_value("15000")
                .value_parser(clap::value_parser!(u64).range(1..))
                .help("Number of rows per page for the I/O, thread and image tables."),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .short('d')
                .value_name("DIR")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Directory to write pages into, created if missing. Defaults to the current directory."),
        )
        .arg(
            Arg::new("output-format")
                .long("format")
                .short('o')
                .value_parser(["html", "jsonl"])
                .default_value("html")
                .help("Sets the output format")
                .long_help(indoc!(r#"
                    Sets the output format:
                        "html"  - writes paginated HTML reports.
                        "jsonl" - prints one JSON object per classified event to stdout.
                "#)),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("-v - info, -vv - debug, -vvv - trace"),
        )
}

fn main() -> Result<()> {
    let matches = command().get_matches();

    let app = WdiReport::from_cli_matches(&matches)?;
    if let Err(e) = app.run() {
        eprintln!("{e:#}");
        exit(1)
    }

    Ok(())
}
