//! Credencial bearer usada em todas as chamadas autenticadas ao SIDIM.
//!
//! O token é fornecido pelo ambiente hospedeiro (variável `SIDIM_TOKEN`,
//! flag `--token` ou o arquivo de configuração). Qualquer uma dessas fontes
//! pode conter o JWT puro ou um texto maior (um header `Bearer ...`, um dump
//! de storage do navegador) do qual o primeiro JWT é extraído.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::AutoprintError;

static BEARER_PREFIXED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Bearer\s+([A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+)")
        .expect("bearer pattern is valid")
});

static JWT_SHAPED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(eyJ[A-Za-z0-9_\-]+?\.[A-Za-z0-9_\-]+?\.[A-Za-z0-9_\-]+)")
        .expect("jwt pattern is valid")
});

/// Extrai o primeiro token com formato JWT (três segmentos base64url) de `s`.
///
/// Um token precedido de `Bearer` tem prioridade sobre um JWT solto.
pub fn extract_bearer(s: &str) -> Option<&str> {
    if let Some(caps) = BEARER_PREFIXED.captures(s) {
        return caps.get(1).map(|m| m.as_str());
    }
    JWT_SHAPED
        .captures(s)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Token bearer obtido uma única vez na inicialização.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials(String);

impl Credentials {
    /// Procura um JWT no texto fornecido.
    pub fn discover(blob: &str) -> Option<Self> {
        extract_bearer(blob).map(|t| Self(t.to_string()))
    }

    /// Retorna a primeira credencial encontrada entre as fontes, em ordem.
    pub fn from_sources<'a>(sources: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        sources.into_iter().find_map(Self::discover)
    }

    /// Como [`from_sources`](Self::from_sources), mas a ausência é um erro terminal.
    pub fn require<'a>(
        sources: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, AutoprintError> {
        Self::from_sources(sources).ok_or(AutoprintError::CredentialMissing)
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

// O token nunca aparece em logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(***)")
    }
}
