use clap::Parser;
use pagefork::args::{is_child, ArgumentSource, ShellArgs};
use pagefork::config::{ARG_CONFIG, ARG_LOG_TO, LOG_LEVEL_ENV};
use pagefork::logging::{debug, init_logger};
use pagefork::sample::SampleWorker;
use pagefork::{DispatchOptions, DispatchSettings, Dispatcher, Entrypoint, TracingSink, WorkRange};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// Split a page range across worker processes and wait for all of them.
#[derive(Parser, Debug)]
#[command(name = "pagefork", version)]
struct Cli {
    /// First page to process (inclusive)
    #[arg(long)]
    first_page: Option<i64>,

    /// Last page to process (inclusive)
    #[arg(long)]
    last_page: Option<i64>,

    /// Number of worker processes
    #[arg(short = 'n', long)]
    processes: Option<usize>,

    /// Worker log files are named <prefix><index>.log
    #[arg(long)]
    log_prefix: Option<String>,

    /// Log the worker commands without starting them
    #[arg(long)]
    dry_run: bool,

    /// Terminate a worker that prints nothing for this many seconds
    #[arg(long, value_name = "SECS")]
    stall_timeout: Option<u64>,

    /// Settings file (TOML); also handed to every worker
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "info" or "debug"
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = ShellArgs::from_env();

    // Workers are started with -name value flags clap does not understand
    if is_child(&args) {
        return run_child(args).await;
    }

    let cli = Cli::parse();
    match run_parent(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::from(1)
        }
    }
}

async fn run_parent(cli: Cli) -> Result<ExitCode, String> {
    let mut settings = DispatchSettings::load(cli.config.as_deref()).map_err(|e| e.to_string())?;
    if let Some(first_page) = cli.first_page {
        settings.first_page = first_page;
    }
    if let Some(last_page) = cli.last_page {
        settings.last_page = Some(last_page);
    }
    if let Some(processes) = cli.processes {
        settings.processes = processes;
    }
    if let Some(log_prefix) = cli.log_prefix {
        settings.log_prefix = log_prefix;
    }
    if let Some(secs) = cli.stall_timeout {
        settings.stall_timeout_secs = Some(secs);
    }
    settings.dry_run |= cli.dry_run;
    settings.validate().map_err(|e| e.to_string())?;

    let last_page = settings
        .last_page
        .ok_or_else(|| "No page range: pass --last-page or set last_page in the settings".to_string())?;

    let level = cli.log_level.or_else(|| std::env::var(LOG_LEVEL_ENV).ok());
    if let Err(err) = init_logger(level.as_deref(), None) {
        eprintln!("Failed to initialize logging: {}", err);
    }

    let options = dispatch_options(&settings, cli.config.as_deref()).map_err(|e| e.to_string())?;
    let dispatcher = Dispatcher::new(
        ShellArgs::default(),
        sample_worker(&settings),
        options,
        Arc::new(TracingSink),
    );

    let range = WorkRange::new(settings.first_page, last_page);
    let ok = dispatcher
        .init_multiprocess(range, settings.processes, &settings.log_prefix)
        .await;

    Ok(exit_code(ok))
}

async fn run_child(args: ShellArgs) -> ExitCode {
    let config_path = args.get_arg(ARG_CONFIG).map(PathBuf::from);
    let log_to = args.get_arg(ARG_LOG_TO).filter(|p| !p.is_empty()).map(PathBuf::from);

    let level = std::env::var(LOG_LEVEL_ENV).ok();
    if let Err(err) = init_logger(level.as_deref(), log_to) {
        eprintln!("Failed to initialize logging: {}", err);
    }

    let settings = match DispatchSettings::load(config_path.as_deref()).and_then(|s| s.validate_worker().map(|()| s)) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Sub-process failed: {}", err);
            return ExitCode::from(1);
        }
    };

    let options = match dispatch_options(&settings, config_path.as_deref()) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("Sub-process failed: {}", err);
            return ExitCode::from(1);
        }
    };

    debug(format!("Worker pid={} starting", std::process::id()));

    let dispatcher = Dispatcher::new(args, sample_worker(&settings), options, Arc::new(TracingSink));
    let range = WorkRange::new(settings.first_page, settings.last_page.unwrap_or(settings.first_page));
    let ok = dispatcher
        .init_multiprocess(range, settings.processes, &settings.log_prefix)
        .await;

    exit_code(ok)
}

fn dispatch_options(settings: &DispatchSettings, config: Option<&Path>) -> std::io::Result<DispatchOptions> {
    let mut entrypoint = match &settings.program {
        Some(program) => Entrypoint::new(program),
        None => Entrypoint::current()?,
    };
    if let Some(config) = config {
        entrypoint = entrypoint.args([format!("--{ARG_CONFIG}"), config.to_string_lossy().into_owned()]);
    }

    Ok(DispatchOptions::new(entrypoint)
        .dry_run(settings.dry_run)
        .stall_timeout(settings.stall_timeout()))
}

fn sample_worker(settings: &DispatchSettings) -> SampleWorker {
    let worker = SampleWorker::new(settings.page_size);
    match settings.pause_max() {
        Some(max) => worker.with_pause(Some((Duration::ZERO, max))),
        None => worker,
    }
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
