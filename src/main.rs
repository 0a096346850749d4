use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use sidim_autoprint::api::SidimClient;
use sidim_autoprint::automation::RouteMatcher;
use sidim_autoprint::batch::{BatchOptions, BatchRunner};
use sidim_autoprint::cli::{Cli, Command};
use sidim_autoprint::config::AutoprintConfig;
use sidim_autoprint::credentials::Credentials;
use sidim_autoprint::delivery::OutputMode;
use sidim_autoprint::ui::BatchProgress;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = AutoprintConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            mode,
            concurrency,
            print_gap_ms,
            date,
            out_dir,
        } => {
            if let Some(out_dir) = out_dir {
                config.out_dir = out_dir;
            }
            let options = BatchOptions {
                date: match date {
                    Some(date) => date,
                    None => config.today()?,
                },
                mode: mode.map(OutputMode::from).unwrap_or(config.mode),
                concurrency: concurrency.map_or(config.concurrency, |n| n as usize),
                print_gap: print_gap_ms.map_or(config.print_gap(), std::time::Duration::from_millis),
                staff_id: config.staff_id,
                facility_id: config.facility_id,
                page_size: config.page_size,
                done_marker: config.done_marker.clone(),
            };
            let client = client(&config, cli.token.as_deref())?;
            let runner = BatchRunner::new(client, config.delivery());

            let progress = BatchProgress::start(options.mode, options.date);
            match runner.run(&options, &progress).await {
                Ok(report) => {
                    progress.finish(&report);
                    tracing::debug!(
                        report = %serde_json::to_string(&report).unwrap_or_default(),
                        "batch report"
                    );
                }
                Err(e) if e.is_batch_precondition() => progress.abort(&e),
                Err(e) => {
                    progress.abort(&e);
                    return Err(e.into());
                }
            }
        }
        Command::Route { path } => {
            let routes = RouteMatcher::new(&config.app_base).context("building route matcher")?;
            match routes.classify(&path) {
                Some(screen) => println!(
                    "{screen} (record {})",
                    routes.record_id(&path).unwrap_or("?")
                ),
                None => println!("not a known screen"),
            }
        }
        Command::Cid { query } => {
            let client = client(&config, cli.token.as_deref())?;
            let value = client
                .lookup_code(&query)
                .await
                .with_context(|| format!("looking up {query}"))?;
            match value {
                Some(json) => println!("{}", serde_json::to_string_pretty(&json)?),
                None => println!("(response was not JSON)"),
            }
        }
    }

    Ok(())
}

// `--token` first, then `SIDIM_TOKEN` or the config file.
fn client(config: &AutoprintConfig, token_flag: Option<&str>) -> Result<SidimClient> {
    let sources = token_flag.into_iter().chain([config.token.as_str()]);
    let credentials = Credentials::require(sources)?;
    let client = SidimClient::with_base_url(
        credentials,
        config.base_url.clone(),
        config.app_base.clone(),
    )?;
    Ok(client)
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
