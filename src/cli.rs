//! Interface de linha de comando do maestro baseada em clap.
//!
//! Define a struct [`Cli`] com o subcomando [`Command::Run`] (lote de jobs)
//! e o subcomando oculto [`Command::Worker`], usado apenas pelo backend de
//! processos isolados para iniciar o bootstrap do worker.

use clap::{Parser, Subcommand};

/// maestro — orquestrador concorrente de ciclos de vida de jobs.
#[derive(Debug, Parser)]
#[command(name = "maestro", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Executa um lote de jobs.
    Run {
        /// Quantidade de jobs a gerar (padrão vem de maestro.toml).
        jobs: Option<usize>,

        /// Executa cada job em um processo worker isolado.
        #[arg(long)]
        isolated: bool,
    },

    /// Ponto de entrada interno do processo worker.
    #[command(hide = true)]
    Worker {
        /// Atraso de trabalho simulado, em milissegundos.
        #[arg(long, default_value_t = 500)]
        work_delay_ms: u64,

        /// Limite de repetições do laço de espera em STAGE2.
        #[arg(long, default_value_t = 60)]
        stage2_max_polls: u32,

        /// Provoca um pânico na tarefa do job em vez de executá-lo;
        /// usado para exercitar o relato de falhas do worker.
        #[arg(long, hide = true)]
        inject_fault: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from(["maestro", "run", "4", "--isolated"]);
        match cli.command {
            Command::Run { jobs, isolated } => {
                assert_eq!(jobs, Some(4));
                assert!(isolated);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_worker_subcommand() {
        let cli = Cli::parse_from([
            "maestro",
            "worker",
            "--work-delay-ms",
            "20",
            "--stage2-max-polls",
            "5",
        ]);
        match cli.command {
            Command::Worker {
                work_delay_ms,
                stage2_max_polls,
                inject_fault,
            } => {
                assert_eq!(work_delay_ms, 20);
                assert_eq!(stage2_max_polls, 5);
                assert!(!inject_fault);
            }
            _ => panic!("expected Worker command"),
        }
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
