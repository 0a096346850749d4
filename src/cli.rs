//! Interface de linha de comando do sidim-autoprint baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, route, cid)
//! e flags globais (--config, --token, --verbose).

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use crate::delivery::OutputMode;

/// Impressão em lote das fichas SOAP do SIDIM.
#[derive(Debug, Parser)]
#[command(name = "sidim-autoprint", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Arquivo de configuração (padrão: `autoprint.toml` no diretório atual).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Token JWT, ou um texto que contenha um (ex.: `Bearer eyJ...`).
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Modo de saída aceito pela CLI, mapeado para [`OutputMode`] internamente.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Imprime uma ficha por vez, na ordem da listagem.
    Print,
    /// Abre cada ficha no visualizador padrão.
    Open,
    /// Salva cada ficha no diretório de saída.
    Download,
}

impl From<ModeArg> for OutputMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Print => OutputMode::Print,
            ModeArg::Open => OutputMode::Open,
            ModeArg::Download => OutputMode::Download,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Baixa e entrega as fichas dos atendimentos realizados no dia.
    Run {
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Downloads simultâneos (modos open e download).
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..=10))]
        concurrency: Option<u64>,

        /// Intervalo entre impressões, em milissegundos.
        #[arg(long)]
        print_gap_ms: Option<u64>,

        /// Dia dos atendimentos (YYYY-MM-DD). Padrão: hoje.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Diretório das fichas salvas.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Mostra como um caminho da aplicação é classificado.
    Route {
        /// Caminho, ex.: /prontuarioeletronico_mariana/atendimento/123/primaria
        path: String,
    },

    /// Consulta a busca de CID e imprime o JSON retornado.
    Cid {
        query: String,
    },
}
