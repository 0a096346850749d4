//! Tipos de erro para o cliente da API do SIDIM.
//!
//! Define [`ApiError`] com variantes para respostas HTTP de erro e falhas de
//! rede. Usa `thiserror` para derivar `Display` e `Error` a partir dos
//! atributos `#[error(...)]`.

use thiserror::Error;

/// Quantos caracteres do corpo de uma resposta de erro são preservados.
pub const ERROR_BODY_LIMIT: usize = 200;

/// Erros que podem ocorrer ao interagir com a API do SIDIM.
///
/// - [`Status`](ApiError::Status): o servidor respondeu com status fora de 2xx
/// - [`Network`](ApiError::Network): falha na camada de rede ou no corpo
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resposta não-2xx. Contém o status, a URL requisitada e o início do corpo.
    #[error("HTTP {status} at {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout, corpo inválido).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ApiError {
    /// Monta um [`ApiError::Status`] truncando o corpo em [`ERROR_BODY_LIMIT`] caracteres.
    pub fn status(status: u16, url: impl Into<String>, body: &str) -> Self {
        ApiError::Status {
            status,
            url: url.into(),
            body: body.chars().take(ERROR_BODY_LIMIT).collect(),
        }
    }
}
