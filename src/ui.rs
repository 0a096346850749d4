//! Interface de terminal do sidim-autoprint: spinner, barra e saída colorida.
//!
//! Usa as crates `indicatif` para o progresso e `console` para as cores. O
//! [`BatchProgress`] acompanha visualmente um lote de fichas no terminal.

use std::time::Duration;

use chrono::NaiveDate;
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::batch::BatchReport;
use crate::delivery::{Delivered, OutputMode};
use crate::error::AutoprintError;
use crate::runner::Job;

/// Indicador visual de progresso de um lote.
///
/// Começa como spinner durante a listagem e vira uma barra quando o total de
/// fichas é conhecido. Sucesso sai em verde, falha em vermelho.
pub struct BatchProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl BatchProgress {
    pub fn start(mode: OutputMode, date: NaiveDate) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Listing appointments of {} ({mode})", date.format("%d/%m/%Y")));
        pb.enable_steady_tick(Duration::from_millis(100));
        Self::with_bar(pb)
    }

    /// Sem saída nenhuma; usado nos testes e quando o terminal não é interativo.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(pb: ProgressBar) -> Self {
        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Troca o spinner por uma barra com `total` fichas.
    pub fn set_total(&self, total: usize) {
        self.pb.set_length(total as u64);
        self.pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        self.pb.set_message("");
    }

    pub fn job_settled(&self, job: &Job, result: &Result<Delivered, AutoprintError>) {
        match result {
            Ok(delivered) => self.pb.println(format!(
                "  {} {} {}",
                self.green.apply_to("✓"),
                job.artifact_name(),
                self.yellow.apply_to(delivered)
            )),
            Err(e) => self.pb.println(format!(
                "  {} {}: {e}",
                self.red.apply_to("✗"),
                job.artifact_name()
            )),
        }
        self.pb.inc(1);
    }

    /// Finaliza o progresso e exibe o resumo do lote.
    pub fn finish(&self, report: &BatchReport) {
        self.pb.finish_and_clear();
        let style = if report.failures.is_empty() {
            &self.green
        } else {
            &self.yellow
        };
        println!(
            "{}",
            style.apply_to(format!(
                "{}/{} fichas delivered ({})",
                report.succeeded(),
                report.total,
                report.mode
            ))
        );
        for failure in &report.failures {
            println!("  {} {}: {}", self.red.apply_to("✗"), failure.job, failure.reason);
        }
    }

    /// Interrompe o progresso com uma mensagem de erro.
    pub fn abort(&self, err: &AutoprintError) {
        self.pb.finish_and_clear();
        if err.is_batch_precondition() {
            println!("{}", self.yellow.apply_to(err));
        } else {
            println!("{} {err}", self.red.apply_to("✗"));
        }
    }
}
