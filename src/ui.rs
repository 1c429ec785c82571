//! Interface de terminal do maestro — spinner e resumo colorido do lote.
//!
//! Usa as crates `indicatif` para o spinner de progresso e `console` para
//! estilização com cores. O [`BatchProgress`] acompanha visualmente a
//! execução de um lote de jobs no terminal.

use chrono::{DateTime, Utc};
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

/// Indicador visual de progresso para um lote de jobs.
///
/// Exibe um spinner animado enquanto o lote roda e um resumo final com a
/// contagem de sucessos (verde) e falhas (vermelho).
pub struct BatchProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para sucessos.
    green: Style,
    // Estilo vermelho para falhas.
    red: Style,
    started_at: DateTime<Utc>,
    succeeded: usize,
    failed: usize,
}

impl BatchProgress {
    /// Inicia o spinner para um lote de `total` jobs.
    pub fn start(total: usize, isolated: bool) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        let mode = if isolated { "isolated workers" } else { "in-process" };
        pb.set_message(format!("Running {total} jobs ({mode})"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            started_at: Utc::now(),
            succeeded: 0,
            failed: 0,
        }
    }

    /// Registra o desfecho de um job individual.
    pub fn record(&mut self, outcome: &Result<(), crate::error::JobError>) {
        match outcome {
            Ok(()) => self.succeeded += 1,
            Err(err) => {
                self.failed += 1;
                self.pb
                    .println(format!("  {} {err}", self.red.apply_to("✗")));
            }
        }
    }

    /// Finaliza o spinner e imprime o resumo do lote.
    pub fn finish(self) {
        self.pb.finish_and_clear();
        let elapsed = Utc::now() - self.started_at;
        println!(
            "  {} {} succeeded, {} {} failed ({} ms)",
            self.green.apply_to("✓"),
            self.succeeded,
            self.red.apply_to("✗"),
            self.failed,
            elapsed.num_milliseconds()
        );
    }
}
