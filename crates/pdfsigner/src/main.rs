use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use pdf_signer::{
    AppState, BatchRunner, Config, FailurePolicy, ObjectStore, ProcessEngine, S3Store,
    SigningOrchestrator, StorageResolver, batch, init_tracing, run,
};
use tracing::{error, info};

/// PDF signer: signs documents from a file list, a directory, or over HTTP.
///
///   pdfsigner file_list.txt      one `input.pdf|output.pdf|password` entry per line
///   pdfsigner input_dir output_dir
///   pdfsigner --server           or `server = true` in the config
#[derive(Parser)]
#[command(verbatim_doc_comment)]
struct Args {
    #[clap(long, env = "PDFSIGNER_CONFIG", default_value = "config.ini")]
    config: PathBuf,
    /// Start the HTTP server regardless of the config.
    #[clap(long)]
    server: bool,
    /// Keep signing the remaining entries after a failure.
    #[clap(long)]
    continue_on_error: bool,
    /// LIST_FILE, or SRC_DIR DST_DIR.
    #[clap(num_args = 0..=2)]
    inputs: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_tracing(&config.log_level) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(config.workers)
        .thread_keep_alive(config.worker_keep_alive())
        .build();
    let runtime = match runtime {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(start(args, config)) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn start(args: Args, config: Config) -> Result<ExitCode> {
    let server_mode = args.server || config.server;
    if !server_mode && args.inputs.is_empty() {
        Args::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    }

    let key_material = Arc::new(config.load_key_material()?);

    let store: Option<Arc<dyn ObjectStore>> = match config.s3_settings() {
        Some(settings) => Some(Arc::new(S3Store::connect(&settings).await?)),
        None => None,
    };

    let engine_command = config
        .engine_command
        .as_deref()
        .context("engine_command is not configured")?;
    let engine = Arc::new(ProcessEngine::new(engine_command, config.engine_argv()));

    let orchestrator = SigningOrchestrator::new(StorageResolver::new(store), engine);
    let defaults = config.signature_defaults(Some(key_material));

    if server_mode {
        info!(workers = config.workers, "Starting server");
        let mut state = AppState::new(orchestrator, defaults);
        state.max_body_bytes = config.max_body_bytes;
        run(config.server_addr()?, state).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let entries = match args.inputs.as_slice() {
        [list] => batch::list_from_file(list)?,
        [source_dir, target_dir] => batch::list_from_directory(source_dir, target_dir)?,
        _ => bail!("expected LIST_FILE or SRC_DIR DST_DIR"),
    };
    let policy = if args.continue_on_error {
        FailurePolicy::Continue
    } else {
        FailurePolicy::Halt
    };

    let outcome = tokio::task::spawn_blocking(move || {
        BatchRunner::new(&orchestrator, &defaults, policy).run(&entries)
    })
    .await
    .context("batch worker panicked")?;

    match outcome {
        Ok(report) if report.is_success() => Ok(ExitCode::SUCCESS),
        Ok(report) => {
            for failure in &report.failures {
                error!(error = %failure, "Failed");
            }
            error!(
                signed = report.signed,
                failed = report.failures.len(),
                "Batch finished with failures"
            );
            Ok(ExitCode::FAILURE)
        }
        Err(failure) => {
            error!(
                index = failure.index,
                source = %failure.source_address,
                destination = %failure.destination,
                "Batch halted: {}",
                failure.error
            );
            Ok(ExitCode::FAILURE)
        }
    }
}
