//! Configuração do sidim-autoprint carregada a partir de `autoprint.toml`.
//!
//! A struct [`AutoprintConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam os defaults da implantação de Mariana.
//! A variável de ambiente `SIDIM_TOKEN` tem precedência sobre o arquivo.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate, Utc};
use serde::Deserialize;

use crate::api::client::{DEFAULT_APP_BASE, DEFAULT_BASE_URL};
use crate::automation::{ActionSettings, EngineSettings, option_pattern_for};
use crate::delivery::{Delivery, OutputMode, default_open_command};

/// Arquivo procurado no diretório atual quando `--config` não é informado.
pub const DEFAULT_CONFIG_FILE: &str = "autoprint.toml";

/// Variável de ambiente com o token (ou um blob que o contenha).
pub const TOKEN_ENV: &str = "SIDIM_TOKEN";

/// Configuração de nível superior carregada de `autoprint.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AutoprintConfig {
    /// Origem do servidor SIDIM.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Prefixo da aplicação de prontuário.
    #[serde(default = "default_app_base")]
    pub app_base: String,

    /// Token JWT, ou qualquer texto que contenha um.
    #[serde(default)]
    pub token: String,

    #[serde(default = "default_staff_id")]
    pub staff_id: u64,

    #[serde(default = "default_facility_id")]
    pub facility_id: u64,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Modo de saída padrão.
    #[serde(default = "default_mode")]
    pub mode: OutputMode,

    /// Downloads simultâneos nos modos open/download.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Intervalo entre impressões, em milissegundos.
    #[serde(default = "default_print_gap_ms")]
    pub print_gap_ms: u64,

    /// Fuso usado para decidir qual é "hoje".
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,

    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    #[serde(default = "default_print_command")]
    pub print_command: String,

    #[serde(default = "default_open_command")]
    pub open_command: String,

    /// Palavra que marca um atendimento como concluído na descrição do estado.
    #[serde(default = "default_done_marker")]
    pub done_marker: String,

    #[serde(default)]
    pub automation: AutomationConfig,
}

/// Parâmetros do motor de automação de telas (`[automation]`).
#[derive(Debug, Clone, Deserialize)]
pub struct AutomationConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_automation_retries")]
    pub max_retries: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_element_timeout_ms")]
    pub element_timeout_ms: u64,

    #[serde(default = "default_option_timeout_ms")]
    pub option_timeout_ms: u64,

    #[serde(default = "default_label_marker")]
    pub label_marker: String,

    #[serde(default = "default_query")]
    pub query: String,

    #[serde(default = "default_target_code")]
    pub target_code: String,

    /// Regex do texto da opção a escolher. Sem ele, o padrão é derivado de
    /// `target_code`.
    #[serde(default)]
    pub option_pattern: Option<String>,

    /// Buscas de CID disparadas ao entrar na tela primária.
    #[serde(default = "default_prewarm_queries")]
    pub prewarm_queries: Vec<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_app_base() -> String {
    DEFAULT_APP_BASE.to_string()
}

// Funcionário da implantação de Mariana.
fn default_staff_id() -> u64 {
    1512
}

fn default_facility_id() -> u64 {
    58
}

fn default_page_size() -> u32 {
    200
}

fn default_mode() -> OutputMode {
    OutputMode::Print
}

fn default_concurrency() -> usize {
    4
}

fn default_print_gap_ms() -> u64 {
    3500
}

// Horário de Brasília.
fn default_utc_offset_hours() -> i32 {
    -3
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("fichas")
}

fn default_print_command() -> String {
    "lp".to_string()
}

fn default_done_marker() -> String {
    "realizado".to_string()
}

fn default_debounce_ms() -> u64 {
    150
}

fn default_cooldown_ms() -> u64 {
    1200
}

fn default_retry_delay_ms() -> u64 {
    800
}

fn default_automation_retries() -> u32 {
    3
}

fn default_poll_interval_ms() -> u64 {
    2500
}

fn default_element_timeout_ms() -> u64 {
    12_000
}

fn default_option_timeout_ms() -> u64 {
    4000
}

fn default_label_marker() -> String {
    "CID10-01".to_string()
}

fn default_query() -> String {
    "Z00".to_string()
}

fn default_target_code() -> String {
    "Z00.0".to_string()
}

fn default_prewarm_queries() -> Vec<String> {
    vec!["Z000".to_string(), "Z00.0 EXAME MEDICO GERAL".to_string()]
}

impl Default for AutoprintConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            app_base: default_app_base(),
            token: String::new(),
            staff_id: default_staff_id(),
            facility_id: default_facility_id(),
            page_size: default_page_size(),
            mode: default_mode(),
            concurrency: default_concurrency(),
            print_gap_ms: default_print_gap_ms(),
            utc_offset_hours: default_utc_offset_hours(),
            out_dir: default_out_dir(),
            print_command: default_print_command(),
            open_command: default_open_command(),
            done_marker: default_done_marker(),
            automation: AutomationConfig::default(),
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            cooldown_ms: default_cooldown_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retries: default_automation_retries(),
            poll_interval_ms: default_poll_interval_ms(),
            element_timeout_ms: default_element_timeout_ms(),
            option_timeout_ms: default_option_timeout_ms(),
            label_marker: default_label_marker(),
            query: default_query(),
            target_code: default_target_code(),
            option_pattern: None,
            prewarm_queries: default_prewarm_queries(),
        }
    }
}

impl AutoprintConfig {
    /// Carrega a configuração de `path`, ou de `autoprint.toml` no diretório
    /// atual. Um arquivo explícito precisa existir; o padrão é opcional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.override_token(std::env::var(TOKEN_ENV).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Um token não vazio vindo do ambiente substitui o do arquivo.
    pub fn override_token(&mut self, token: Option<String>) {
        if let Some(token) = token
            && !token.trim().is_empty()
        {
            self.token = token;
        }
    }

    /// Data de hoje no fuso configurado.
    pub fn today(&self) -> Result<NaiveDate> {
        let offset = FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .with_context(|| format!("invalid utc_offset_hours {}", self.utc_offset_hours))?;
        Ok(Utc::now().with_timezone(&offset).date_naive())
    }

    pub fn print_gap(&self) -> Duration {
        Duration::from_millis(self.print_gap_ms)
    }

    pub fn delivery(&self) -> Delivery {
        Delivery::new(
            self.out_dir.clone(),
            self.print_command.clone(),
            self.open_command.clone(),
        )
    }
}

impl AutomationConfig {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            debounce: Duration::from_millis(self.debounce_ms),
            cooldown: Duration::from_millis(self.cooldown_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            max_retries: self.max_retries,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn action_settings(&self) -> ActionSettings {
        ActionSettings {
            element_timeout: Duration::from_millis(self.element_timeout_ms),
            option_timeout: Duration::from_millis(self.option_timeout_ms),
            label_marker: self.label_marker.clone(),
            query: self.query.clone(),
            target_code: self.target_code.clone(),
            option_pattern: self
                .option_pattern
                .clone()
                .unwrap_or_else(|| option_pattern_for(&self.target_code)),
            ..ActionSettings::default()
        }
    }
}
