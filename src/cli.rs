use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::io::remote::{fetch_snapshot, RemoteSheetClient};
use crate::io::writer::{output_path, write_snapshot_xlsx, SheetStyle};
use crate::logging;
use crate::pipeline::{merge_file, process_file, process_snapshot, ProcessReport, RunOptions};
use crate::server;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

#[derive(Debug, Parser)]
#[command(
    name = "delivery-plan",
    version,
    about = "Normalize delivery-plan workbooks into a 60-day upload schedule"
)]
pub struct Cli {
    /// YAML config file; built-in defaults when omitted.
    #[arg(long, global = true, env = "DELIVERY_PLAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert a local workbook.
    Process {
        input: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Fetch sheets from the collaborative-sheet service and convert them.
    Fetch {
        #[arg(required = true)]
        urls: Vec<String>,
        #[command(flatten)]
        run: RunArgs,
        /// Also save the fetched sheets as a workbook.
        #[arg(long)]
        save_raw: bool,
    },
    /// Collapse duplicate SKUs in an existing summary or upload workbook.
    Merge {
        input: PathBuf,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Serve the HTTP API.
    Serve {
        #[arg(long, env = "DELIVERY_PLAN_BIND", default_value = DEFAULT_BIND)]
        bind: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Reference date (YYYY-MM-DD); defaults to the local date.
    #[arg(long, value_parser = parse_today)]
    pub today: Option<NaiveDate>,
    /// Also write the upload table as CSV.
    #[arg(long)]
    pub csv: bool,
    /// Also write the per-date summary workbook.
    #[arg(long)]
    pub summary: bool,
}

impl RunArgs {
    pub fn to_options(&self) -> RunOptions {
        let mut options = match self.today {
            Some(today) => RunOptions::new(today),
            None => RunOptions::for_today(),
        };
        options.output_dir = self.output_dir.clone();
        options.write_csv = self.csv;
        options.write_summary = self.summary;
        options
    }
}

pub fn parse_today(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

pub fn run_with_args(args: &[String]) -> i32 {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return err.exit_code();
        }
    };
    logging::init(cli.verbose);

    let config = match PipelineConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return 2;
        }
    };

    match cli.command {
        Command::Process { input, run } => emit(process_file(&input, &run.to_options(), &config)),
        Command::Fetch { urls, run, save_raw } => emit(handle_fetch(&urls, &run, save_raw, &config)),
        Command::Merge { input, output_dir } => emit(merge_file(&input, output_dir.as_deref(), &config)),
        Command::Serve { bind } => handle_serve(&bind, config),
    }
}

fn handle_fetch(
    urls: &[String],
    run: &RunArgs,
    save_raw: bool,
    config: &PipelineConfig,
) -> Result<ProcessReport, PipelineError> {
    let mut client = RemoteSheetClient::from_env(&config.remote)?;
    let snapshot = fetch_snapshot(&mut client, urls, &config.sheets)?;
    let options = run.to_options();
    if save_raw {
        let dir = options
            .output_dir
            .clone()
            .unwrap_or_else(|| config.output.directory.clone());
        let path = output_path("remote_sheets", &dir, "raw", chrono::Local::now().naive_local());
        write_snapshot_xlsx(&snapshot, &path, &SheetStyle::from_config(config)?)?;
        eprintln!("saved fetched sheets to {}", path.display());
    }
    process_snapshot(&snapshot, &urls.join(" "), "remote_sheets", &options, config)
}

fn handle_serve(bind: &str, config: PipelineConfig) -> i32 {
    match server::run_server(bind, config) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("server error: {err}");
            1
        }
    }
}

fn emit<T: Serialize>(result: Result<T, PipelineError>) -> i32 {
    match result {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(payload) => {
                println!("{payload}");
                0
            }
            Err(err) => {
                eprintln!("failed to serialize report: {err}");
                1
            }
        },
        Err(err) => {
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}
