mod request;

use anyhow::Context;
use codexec_core::{evaluate, Executor, WorkerConfig};
use request::RequestEnvelope;
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{error, info, instrument, warn};

/// One line of worker output: the report plus its evaluation.
#[derive(Serialize)]
struct WorkerOutput<'a> {
    #[serde(flatten)]
    report: &'a codexec_common::types::ExecutionReport,
    evaluation: codexec_core::EvaluationSummary,
}

/// stdout carries reports, so logs go to stderr. `CODEXEC_LOG_FORMAT=json`
/// switches to one JSON object per event.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true);

    match std::env::var("CODEXEC_LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("codexec worker booting...");

    let config = WorkerConfig::from_env().context("invalid CODEXEC_* configuration")?;
    let executor = Executor::from_config(&config).context("failed to build toolchain registry")?;

    info!(
        workspace_root = %config.workspace_root.display(),
        timeout_ms = config.timeout.as_millis() as u64,
        cleanup = %config.cleanup_policy,
        scaffold_root = %config.scaffold_root.display(),
        languages = ?executor.registry().language_ids(),
        "Worker configured"
    );

    // A path argument runs one request from that file; otherwise stdin is
    // read as JSON lines, one request per line.
    if let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) {
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read request file {}", path.display()))?;
        let line = handle_request(&executor, &config, &raw).await?;
        println!("{}", line);
        return Ok(());
    }

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
        warn!("Received shutdown signal, abandoning in-flight request...");
    };

    tokio::select! {
        result = worker_loop(&executor, &config) => result?,
        _ = shutdown => {},
    }

    info!("Worker shutdown complete");
    Ok(())
}

#[instrument(skip_all)]
async fn worker_loop(executor: &Executor, config: &WorkerConfig) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(raw) = lines.next_line().await.context("failed to read stdin")? {
        if raw.trim().is_empty() {
            continue;
        }
        match handle_request(executor, config, &raw).await {
            Ok(line) => {
                stdout.write_all(line.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            // A bad request must not take the worker down.
            Err(e) => error!(error = %format!("{:#}", e), "Request failed"),
        }
    }
    Ok(())
}

async fn handle_request(executor: &Executor, config: &WorkerConfig, raw: &str) -> anyhow::Result<String> {
    let envelope: RequestEnvelope = serde_json::from_str(raw).context("malformed request JSON")?;
    let request = envelope.into_request(config)?;
    let cases = request.test_cases.clone();

    info!(
        request_id = %request.id,
        language = %request.language,
        test_cases = cases.len(),
        source_size = request.solution_source.len(),
        timeout_ms = request.timeout.as_millis() as u64,
        "Received request"
    );

    let report = executor
        .run(request)
        .await
        .context("execution harness failed")?;
    let evaluation = evaluate(&report, &cases);

    info!(
        request_id = %report.request_id,
        phase = %report.phase,
        exit_code = ?report.exit_code,
        passed = evaluation.passed,
        total = evaluation.total,
        "Request complete"
    );

    let output = WorkerOutput {
        report: &report,
        evaluation,
    };
    serde_json::to_string(&output).context("failed to serialize report")
}
