//! Tipos de dados das respostas da API de atendimentos do SIDIM.
//!
//! A API não é consistente nos tipos: identificadores e códigos de estado
//! chegam ora como número, ora como string. Os campos afetados passam por
//! [`lenient_string`], que normaliza ambos para `String`.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Código de `estadoMarcacao` para atendimentos realizados.
pub const STATUS_DONE: &str = "4";

/// Resumo de um atendimento retornado por `/api/atendimento/atendimentos`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentSummary {
    /// Identificador do atendimento, usado para buscar o relatório SOAP.
    #[serde(deserialize_with = "required_lenient_string")]
    pub id: String,
    /// Identificador do cidadão; compõe o nome de fallback.
    #[serde(default, deserialize_with = "lenient_string")]
    pub id_cidadao: Option<String>,
    #[serde(default)]
    pub cidadao: Option<Citizen>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub estado_marcacao: Option<String>,
    #[serde(default)]
    pub descricao_estado_marcacao: Option<String>,
}

/// Dados do cidadão embutidos no resumo do atendimento.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Citizen {
    #[serde(default)]
    pub nome: Option<String>,
}

impl AppointmentSummary {
    /// Verdadeiro se o atendimento está finalizado: pelo código de estado ou
    /// pela descrição contendo `done_marker` (sem diferenciar maiúsculas).
    ///
    /// O servidor já filtra por status, mas nem sempre de forma confiável.
    pub fn is_done(&self, done_marker: &str) -> bool {
        if self.estado_marcacao.as_deref() == Some(STATUS_DONE) {
            return true;
        }
        let marker = done_marker.to_lowercase();
        !marker.is_empty()
            && self
                .descricao_estado_marcacao
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&marker))
    }

    /// Nome exibido: o nome do cidadão, ou `cidadao_<idCidadao>` quando ausente.
    pub fn display_name(&self) -> String {
        match self.cidadao.as_ref().and_then(|c| c.nome.as_deref()) {
            Some(nome) if !nome.trim().is_empty() => nome.trim().to_string(),
            _ => format!(
                "cidadao_{}",
                self.id_cidadao.as_deref().unwrap_or("sID")
            ),
        }
    }
}

/// Parâmetros da listagem de atendimentos de um dia.
#[derive(Debug, Clone)]
pub struct ListingQuery {
    pub date: NaiveDate,
    pub staff_id: u64,
    pub facility_id: u64,
    pub page_size: u32,
    /// Palavra que identifica um atendimento realizado na descrição do estado.
    pub done_marker: String,
}

impl ListingQuery {
    /// Data no formato esperado pela API (`dd/mm/yyyy`).
    pub fn api_date(&self) -> String {
        self.date.format("%d/%m/%Y").to_string()
    }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        let date = self.api_date();
        vec![
            ("startDate", date.clone()),
            ("endDate", date),
            ("idFuncionario", self.staff_id.to_string()),
            ("idEstabelecimento", self.facility_id.to_string()),
            ("orderBy", "acrescente".to_string()),
            ("status", STATUS_DONE.to_string()),
            ("pageSize", self.page_size.to_string()),
        ]
    }
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(value_to_string))
}

fn required_lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    value_to_string(Value::deserialize(deserializer)?)
        .ok_or_else(|| serde::de::Error::custom("identifier must not be null"))
}
