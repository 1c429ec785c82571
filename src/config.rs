//! Configuração do maestro carregada a partir de `maestro.toml`.
//!
//! A struct [`MaestroConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::state_machine::RunnerConfig;

/// Configuração de nível superior carregada de `maestro.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct MaestroConfig {
    /// Atraso de trabalho simulado entre transições de estado, em milissegundos.
    #[serde(default = "default_work_delay_ms")]
    pub work_delay_ms: u64,

    /// Limite de repetições do laço de espera em STAGE2 antes de falhar.
    #[serde(default = "default_stage2_max_polls")]
    pub stage2_max_polls: u32,

    /// Quantidade de jobs gerados quando nenhuma é passada na CLI.
    #[serde(default = "default_jobs")]
    pub default_jobs: usize,
}

// Valor padrão para o atraso de trabalho: 500ms.
fn default_work_delay_ms() -> u64 {
    500
}

// Valor padrão para o limite de espera em STAGE2: 60 repetições.
fn default_stage2_max_polls() -> u32 {
    60
}

// Valor padrão para a quantidade de jobs: 10.
fn default_jobs() -> usize {
    10
}

impl Default for MaestroConfig {
    fn default() -> Self {
        Self {
            work_delay_ms: default_work_delay_ms(),
            stage2_max_polls: default_stage2_max_polls(),
            default_jobs: default_jobs(),
        }
    }
}

impl MaestroConfig {
    /// Carrega a configuração de `maestro.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        let path = Path::new("maestro.toml");
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<MaestroConfig>(&contents)?
        } else {
            Self::default()
        };
        Ok(config)
    }

    /// Converte os campos de tempo para a configuração do runner.
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            work_delay: Duration::from_millis(self.work_delay_ms),
            stage2_max_polls: self.stage2_max_polls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = MaestroConfig::default();
        assert_eq!(config.work_delay_ms, 500);
        assert_eq!(config.stage2_max_polls, 60);
        assert_eq!(config.default_jobs, 10);
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            work_delay_ms = 50
            default_jobs = 4
        "#;
        let config: MaestroConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.work_delay_ms, 50);
        assert_eq!(config.default_jobs, 4);
        assert_eq!(config.stage2_max_polls, 60);
    }

    #[test]
    fn runner_config_conversion() {
        let config = MaestroConfig {
            work_delay_ms: 25,
            stage2_max_polls: 8,
            default_jobs: 1,
        };
        let runner = config.runner_config();
        assert_eq!(runner.work_delay, Duration::from_millis(25));
        assert_eq!(runner.stage2_max_polls, 8);
    }
}
