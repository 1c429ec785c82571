use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use maestro::backend::{ExecutionBackend, InProcessBackend, ProcessBackend};
use maestro::cli::{Cli, Command};
use maestro::config::MaestroConfig;
use maestro::orchestrator::Orchestrator;
use maestro::state_machine::{JobInput, RunnerConfig};
use maestro::ui::BatchProgress;
use maestro::worker;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { jobs, isolated } => {
            let config = MaestroConfig::load()?;
            let count = jobs.unwrap_or(config.default_jobs);
            run_batch(count, isolated, &config).await
        }
        Command::Worker {
            work_delay_ms,
            stage2_max_polls,
            inject_fault,
        } => {
            let config = RunnerConfig {
                work_delay: Duration::from_millis(work_delay_ms),
                stage2_max_polls,
            };
            worker::run(config, inject_fault).await?;
            Ok(())
        }
    }
}

async fn run_batch(count: usize, isolated: bool, config: &MaestroConfig) -> Result<()> {
    let runner_config = config.runner_config();
    if isolated {
        let program = std::env::current_exe()?;
        let backend = ProcessBackend::new(program, runner_config);
        drive(Orchestrator::new(backend), count, isolated).await
    } else {
        let backend = InProcessBackend::new(runner_config);
        drive(Orchestrator::new(backend), count, isolated).await
    }
}

async fn drive<B: ExecutionBackend>(
    orchestrator: Orchestrator<B>,
    count: usize,
    isolated: bool,
) -> Result<()> {
    let mut progress = BatchProgress::start(count, isolated);

    // Fire-and-forget fan-out: every job starts before any is awaited.
    let handles: Vec<_> = generate_inputs(count)
        .into_iter()
        .map(|input| orchestrator.submit(input))
        .collect();

    for handle in handles {
        let outcome = handle.wait().await;
        progress.record(&outcome);
    }
    progress.finish();
    Ok(())
}

/// Batch generator: opaque payloads, with every odd-indexed job flagged to
/// fail at its late stage.
fn generate_inputs(count: usize) -> Vec<JobInput> {
    (0..count)
        .map(|step| JobInput::new(format!("data{step}"), step % 2 == 1))
        .collect()
}
