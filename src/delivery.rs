//! Entrega dos documentos baixados: impressão, abertura ou gravação em disco.
//!
//! Impressão e abertura são delegadas a comandos externos do sistema
//! (`lp`, `xdg-open`, ...). Cada modo tem um caminho de fallback:
//! impressão → abrir → salvar em disco; abrir → salvar em disco.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Tempo máximo para um comando de impressão/abertura concluir.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(8);

/// Modo de saída escolhido pelo operador.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Imprime um documento por vez, na ordem da listagem.
    Print,
    /// Abre cada documento no visualizador padrão.
    Open,
    /// Salva cada documento no diretório de saída.
    Download,
}

impl std::fmt::Display for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputMode::Print => write!(f, "print"),
            OutputMode::Open => write!(f, "open"),
            OutputMode::Download => write!(f, "download"),
        }
    }
}

/// Erros de entrega de um documento.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("`{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` exited with {status}")]
    CommandFailed { command: String, status: String },

    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Como um documento acabou sendo entregue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "via", content = "path")]
pub enum Delivered {
    Printed,
    Opened(PathBuf),
    Saved(PathBuf),
}

/// Configuração dos destinos de entrega.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Diretório dos arquivos salvos (modo download e fallback final).
    pub out_dir: PathBuf,
    /// Diretório temporário dos arquivos enviados para impressão/abertura.
    pub staging_dir: PathBuf,
    pub print_command: String,
    pub open_command: String,
    pub command_timeout: Duration,
}

impl std::fmt::Display for Delivered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delivered::Printed => write!(f, "printed"),
            Delivered::Opened(path) => write!(f, "opened {}", path.display()),
            Delivered::Saved(path) => write!(f, "saved to {}", path.display()),
        }
    }
}

impl Delivery {
    pub fn new(out_dir: PathBuf, print_command: String, open_command: String) -> Self {
        Self {
            out_dir,
            staging_dir: std::env::temp_dir().join("sidim-autoprint"),
            print_command,
            open_command,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Entrega `bytes` conforme `mode`, caindo para os modos seguintes em caso de falha.
    pub async fn deliver(
        &self,
        mode: OutputMode,
        bytes: &[u8],
        name: &str,
    ) -> Result<Delivered, DeliveryError> {
        match mode {
            OutputMode::Download => Ok(Delivered::Saved(self.save(bytes, name).await?)),
            OutputMode::Open => self.open_or_save(bytes, name).await,
            OutputMode::Print => match self.print(bytes, name).await {
                Ok(()) => Ok(Delivered::Printed),
                Err(e) => {
                    warn!(file = name, error = %e, "print failed, opening instead");
                    self.open_or_save(bytes, name).await
                }
            },
        }
    }

    /// Grava o documento em `out_dir`, criando o diretório se necessário.
    pub async fn save(&self, bytes: &[u8], name: &str) -> Result<PathBuf, DeliveryError> {
        let path = write_file(&self.out_dir, bytes, name).await?;
        info!(path = %path.display(), "document saved");
        Ok(path)
    }

    /// Envia o documento para a impressora e espera o comando concluir.
    pub async fn print(&self, bytes: &[u8], name: &str) -> Result<(), DeliveryError> {
        let path = write_file(&self.staging_dir, bytes, name).await?;
        self.run(&self.print_command, &path).await?;
        info!(file = name, "document sent to printer");
        Ok(())
    }

    /// Abre o documento no visualizador padrão.
    pub async fn open(&self, bytes: &[u8], name: &str) -> Result<PathBuf, DeliveryError> {
        let path = write_file(&self.staging_dir, bytes, name).await?;
        self.run(&self.open_command, &path).await?;
        info!(file = name, "document opened");
        Ok(path)
    }

    async fn open_or_save(&self, bytes: &[u8], name: &str) -> Result<Delivered, DeliveryError> {
        match self.open(bytes, name).await {
            Ok(path) => Ok(Delivered::Opened(path)),
            Err(e) => {
                warn!(file = name, error = %e, "open failed, saving to disk");
                Ok(Delivered::Saved(self.save(bytes, name).await?))
            }
        }
    }

    // Runs `command <path>` with a ceiling on how long it may take.
    async fn run(&self, command: &str, path: &Path) -> Result<(), DeliveryError> {
        debug!(command, path = %path.display(), "running delivery command");
        let mut child = Command::new(command)
            .arg(path)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DeliveryError::Launch {
                command: command.to_string(),
                source,
            })?;

        let status = match timeout(self.command_timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                return Err(DeliveryError::Timeout {
                    command: command.to_string(),
                    timeout: self.command_timeout,
                });
            }
        };

        if status.success() {
            Ok(())
        } else {
            Err(DeliveryError::CommandFailed {
                command: command.to_string(),
                status: status.to_string(),
            })
        }
    }
}

async fn write_file(dir: &Path, bytes: &[u8], name: &str) -> Result<PathBuf, DeliveryError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

/// Comando padrão para abrir um arquivo na plataforma atual.
pub fn default_open_command() -> String {
    if cfg!(target_os = "macos") {
        "open".to_string()
    } else if cfg!(target_os = "windows") {
        "explorer".to_string()
    } else {
        "xdg-open".to_string()
    }
}
