//! Reactive engine: watches the host application and runs the screen actions.
//!
//! The engine owns a single loop task. Every piece of mutable state (the
//! [`Scheduler`], the per-record bookkeeping of [`ScreenActions`]) lives inside
//! that task, so nothing is shared or locked. The host feeds change
//! notifications through a [`ChangeSource`]; a periodic safety tick covers
//! hosts that switch screens without notifying.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::actions::{ActionSettings, ScreenActions};
use super::page::Page;
use super::route::{RouteMatcher, Screen};
use super::scheduler::{EngineSettings, Scheduler, Wake};
use crate::api::CodeLookup;
use crate::config::AutoprintConfig;

const CHANGE_BUFFER: usize = 64;

/// What the host observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Subtree mutation of the document body.
    Mutation,
    HistoryPush,
    HistoryReplace,
    PopState,
}

/// Sending side of the engine's change stream.
///
/// Cheap to clone. When every clone is dropped the engine loop ends.
#[derive(Debug, Clone)]
pub struct ChangeSource {
    tx: mpsc::Sender<Trigger>,
}

impl ChangeSource {
    /// Never blocks. Notifications are coalesced by the engine anyway, so one
    /// dropped while the buffer is full is harmless.
    pub fn notify(&self, trigger: Trigger) {
        if let Err(mpsc::error::TrySendError::Closed(_)) = self.tx.try_send(trigger) {
            trace!(?trigger, "engine is gone, notification dropped");
        }
    }
}

/// Handle returned by [`ReactiveEngine::start`].
#[derive(Debug, Clone)]
pub struct EngineHandle {
    cancel: CancellationToken,
}

impl EngineHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

pub struct ReactiveEngine {
    pending: Option<EngineLoop>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ReactiveEngine {
    pub fn new(
        page: Arc<dyn Page>,
        routes: RouteMatcher,
        actions: ActionSettings,
        settings: EngineSettings,
    ) -> Result<(Self, ChangeSource), regex::Error> {
        let (tx, rx) = mpsc::channel(CHANGE_BUFFER);
        let screen_actions = ScreenActions::new(page.clone(), routes.clone(), actions)?;
        let engine_loop = EngineLoop {
            page,
            routes,
            actions: screen_actions,
            scheduler: Scheduler::new(settings),
            changes: rx,
            lookup: None,
            prewarm_queries: Vec::new(),
            prewarmed: HashSet::new(),
        };
        let engine = Self {
            pending: Some(engine_loop),
            cancel: CancellationToken::new(),
            task: None,
        };
        Ok((engine, ChangeSource { tx }))
    }

    /// Build the engine from the `[automation]` table of `config`, with the
    /// routes rooted at its `app_base`. With a `lookup`, the configured
    /// prewarm queries fire on each record's first primary screen.
    pub fn from_config(
        page: Arc<dyn Page>,
        config: &AutoprintConfig,
        lookup: Option<Arc<dyn CodeLookup>>,
    ) -> Result<(Self, ChangeSource), regex::Error> {
        let routes = RouteMatcher::new(&config.app_base)?;
        let automation = &config.automation;
        let (engine, source) = Self::new(
            page,
            routes,
            automation.action_settings(),
            automation.engine_settings(),
        )?;
        let engine = match lookup {
            Some(lookup) => engine.with_code_lookup(lookup, automation.prewarm_queries.clone()),
            None => engine,
        };
        Ok((engine, source))
    }

    /// Fire `queries` through `lookup` the first time each record reaches
    /// the primary screen. Has no effect once the engine was started.
    pub fn with_code_lookup(mut self, lookup: Arc<dyn CodeLookup>, queries: Vec<String>) -> Self {
        if let Some(engine_loop) = self.pending.as_mut() {
            engine_loop.lookup = Some(lookup);
            engine_loop.prewarm_queries = queries;
        }
        self
    }

    /// Spawn the loop. Calling it again returns a handle to the same loop.
    pub fn start(&mut self) -> EngineHandle {
        if let Some(engine_loop) = self.pending.take() {
            let cancel = self.cancel.clone();
            self.task = Some(tokio::spawn(engine_loop.run(cancel)));
        }
        EngineHandle {
            cancel: self.cancel.clone(),
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Wait for the loop to end (after [`stop`](Self::stop) or once the
    /// change source is gone).
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "engine task ended abnormally");
        }
    }
}

struct EngineLoop {
    page: Arc<dyn Page>,
    routes: RouteMatcher,
    actions: ScreenActions,
    scheduler: Scheduler,
    changes: mpsc::Receiver<Trigger>,
    lookup: Option<Arc<dyn CodeLookup>>,
    prewarm_queries: Vec<String>,
    prewarmed: HashSet<String>,
}

impl EngineLoop {
    async fn run(mut self, cancel: CancellationToken) {
        let poll = self.scheduler.settings().poll_interval;
        let mut tick = interval_at(Instant::now() + poll, poll);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(?poll, "engine started");

        'events: loop {
            let deadline = self.scheduler.next_deadline();
            tokio::select! {
                _ = cancel.cancelled() => break,
                trigger = self.changes.recv() => match trigger {
                    Some(trigger) => {
                        trace!(?trigger, "change observed");
                        self.scheduler.notify(Instant::now());
                    }
                    None => {
                        debug!("change source closed");
                        break;
                    }
                },
                _ = tick.tick() => self.scheduler.notify(Instant::now()),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let now = Instant::now();
                    while let Some(wake) = self.scheduler.take_due(now) {
                        // A pass can sit in element waits for seconds.
                        tokio::select! {
                            _ = cancel.cancelled() => break 'events,
                            _ = self.react(wake) => {}
                        }
                    }
                }
            }
        }
        info!("engine stopped");
    }

    async fn react(&mut self, wake: Wake) {
        let path = match self.page.current_path().await {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "could not read the current path");
                return;
            }
        };
        let record = self.routes.record_id(&path).map(str::to_string);
        if !self.scheduler.admit(record.as_deref(), Instant::now(), wake) {
            trace!(record_id = ?record, "within cooldown, skipped");
            return;
        }
        let (Some(screen), Some(record)) = (self.routes.classify(&path), record) else {
            return;
        };

        debug!(%screen, record_id = %record, ?wake, "reacting");
        if screen == Screen::Primary {
            self.prewarm(&record);
        }
        let outcome = self.actions.apply_actions(screen, &record).await;
        if let Some(at) = self.scheduler.settle(outcome, Instant::now()) {
            debug!(%screen, record_id = %record, retry_in = ?at.saturating_duration_since(Instant::now()), "incomplete, retry scheduled");
        }
    }

    // Fire-and-log: lookups never block or fail the reaction.
    fn prewarm(&mut self, record: &str) {
        let Some(lookup) = self.lookup.clone() else {
            return;
        };
        if !self.prewarmed.insert(record.to_string()) {
            return;
        }
        let queries = self.prewarm_queries.clone();
        let record = record.to_string();
        tokio::spawn(async move {
            for query in &queries {
                match lookup.lookup_code(query).await {
                    Ok(found) => {
                        debug!(record_id = %record, query = %query, found = found.is_some(), "code lookup warmed")
                    }
                    Err(e) => warn!(record_id = %record, query = %query, error = %e, "code lookup failed"),
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::time::sleep;

    use super::*;
    use crate::api::ApiError;
    use crate::automation::fake::FakePage;

    const PRIMARY: &str = "/prontuarioeletronico_mariana/atendimento/4242/primaria";
    const FINALIZE: &str = "/prontuarioeletronico_mariana/atendimento/4242/finalizar";
    const SUMMARY: &str = "/prontuarioeletronico_mariana/atendimento/4242/folhaderosto";
    const OPTION: &str = "Z00.0 EXAME MEDICO GERAL";

    fn quiet() -> EngineSettings {
        EngineSettings {
            poll_interval: Duration::from_secs(3600),
            ..EngineSettings::default()
        }
    }

    fn engine(page: &Arc<FakePage>, settings: EngineSettings) -> (ReactiveEngine, ChangeSource) {
        let actions = ActionSettings {
            element_timeout: Duration::from_millis(500),
            option_timeout: Duration::from_millis(300),
            ..ActionSettings::default()
        };
        let routes = RouteMatcher::new("/prontuarioeletronico_mariana").unwrap();
        ReactiveEngine::new(page.clone(), routes, actions, settings).unwrap()
    }

    fn finalize_done() -> Arc<FakePage> {
        Arc::new(
            FakePage::at(FINALIZE)
                .with_checkbox("_cbConduta_1", true)
                .with_radio("desfecho0", "desfecho", true),
        )
    }

    #[derive(Default)]
    struct RecordingLookup {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CodeLookup for RecordingLookup {
        async fn lookup_code(&self, query: &str) -> Result<Option<Value>, ApiError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_triggers_runs_one_pass() {
        let page = finalize_done();
        let (mut engine, source) = engine(&page, quiet());
        engine.start();

        for _ in 0..10 {
            source.notify(Trigger::Mutation);
            sleep(Duration::from_millis(10)).await;
        }
        sleep(Duration::from_secs(1)).await;

        assert_eq!(page.path_reads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_trigger_within_cooldown_is_skipped() {
        let page = finalize_done();
        let (mut engine, source) = engine(&page, quiet());
        engine.start();

        source.notify(Trigger::HistoryPush);
        sleep(Duration::from_millis(300)).await;
        let after_first = page.query_count();
        assert!(after_first > 0);

        source.notify(Trigger::Mutation);
        sleep(Duration::from_millis(300)).await;
        assert_eq!(page.path_reads(), 2);
        assert_eq!(page.query_count(), after_first);

        sleep(Duration::from_secs(2)).await;
        source.notify(Trigger::PopState);
        sleep(Duration::from_millis(300)).await;
        assert!(page.query_count() > after_first);
    }

    #[tokio::test(start_paused = true)]
    async fn incomplete_pass_is_retried_a_bounded_number_of_times() {
        let page = Arc::new(FakePage::at(PRIMARY).with_label("CID10-01"));
        let (mut engine, source) = engine(&page, quiet());
        engine.start();

        source.notify(Trigger::Mutation);
        sleep(Duration::from_secs(30)).await;

        // One natural pass plus three re-attempts.
        assert_eq!(page.path_reads(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn safety_tick_runs_without_triggers() {
        let page = finalize_done();
        let (mut engine, _source) = engine(&page, EngineSettings::default());
        engine.start();

        sleep(Duration::from_secs(10)).await;

        assert!(page.path_reads() >= 3);
        assert!(page.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn walks_summary_then_fills_primary_screen() {
        let page = Arc::new(
            FakePage::at(SUMMARY)
                .with_nav_link(PRIMARY)
                .with_code_field("CID10-01", "")
                .with_options("Z00", &[OPTION]),
        );
        let lookup = Arc::new(RecordingLookup::default());
        let (engine, source) = engine(&page, EngineSettings::default());
        let mut engine = engine.with_code_lookup(
            lookup.clone(),
            vec!["Z000".to_string(), "Z00.0 EXAME MEDICO GERAL".to_string()],
        );
        engine.start();

        source.notify(Trigger::Mutation);
        sleep(Duration::from_secs(6)).await;

        assert_eq!(page.current(), PRIMARY);
        assert_eq!(page.code_value(), OPTION);
        assert_eq!(
            *lookup.queries.lock().unwrap(),
            vec!["Z000".to_string(), "Z00.0 EXAME MEDICO GERAL".to_string()]
        );
        assert_eq!(page.clicks(), vec!["link-0".to_string(), "option-0".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent() {
        let page = finalize_done();
        let (mut engine, source) = engine(&page, quiet());
        let first = engine.start();
        let second = engine.start();
        assert!(engine.is_running());

        source.notify(Trigger::Mutation);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(page.path_reads(), 1);

        second.stop();
        assert!(first.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_loop() {
        let page = finalize_done();
        let (mut engine, source) = engine(&page, quiet());
        engine.start();
        engine.stop();
        engine.join().await;
        assert!(!engine.is_running());

        source.notify(Trigger::Mutation);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(page.path_reads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_a_pass_waiting_for_elements() {
        let page = Arc::new(FakePage::at(FINALIZE));
        let actions = ActionSettings {
            element_timeout: Duration::from_secs(30),
            ..ActionSettings::default()
        };
        let routes = RouteMatcher::new("/prontuarioeletronico_mariana").unwrap();
        let (mut engine, source) =
            ReactiveEngine::new(page.clone(), routes, actions, quiet()).unwrap();
        engine.start();

        source.notify(Trigger::Mutation);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(page.path_reads(), 1);

        engine.stop();
        let joined = tokio::time::timeout(Duration::from_secs(1), engine.join()).await;
        assert!(joined.is_ok());
        assert!(!engine.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn engine_follows_automation_config() {
        let config: AutoprintConfig = toml::from_str(
            r#"
            app_base = "/prontuario_ouro_preto"

            [automation]
            poll_interval_ms = 3600000
            element_timeout_ms = 500
            option_timeout_ms = 300
            prewarm_queries = ["Z000"]
        "#,
        )
        .unwrap();
        let page = Arc::new(
            FakePage::at("/prontuario_ouro_preto/atendimento/7/primaria")
                .with_code_field("CID10-01", "")
                .with_options("Z00", &[OPTION]),
        );
        let lookup = Arc::new(RecordingLookup::default());
        let (mut engine, source) =
            ReactiveEngine::from_config(page.clone(), &config, Some(lookup.clone())).unwrap();
        engine.start();

        source.notify(Trigger::Mutation);
        sleep(Duration::from_secs(2)).await;

        assert_eq!(page.code_value(), OPTION);
        assert_eq!(*lookup.queries.lock().unwrap(), vec!["Z000".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_source_ends_the_loop() {
        let page = finalize_done();
        let (mut engine, source) = engine(&page, quiet());
        engine.start();
        drop(source);
        engine.join().await;
        assert_eq!(page.path_reads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn satisfied_finalize_screen_is_left_alone() {
        let page = finalize_done();
        let (mut engine, source) = engine(&page, quiet());
        engine.start();

        source.notify(Trigger::HistoryReplace);
        sleep(Duration::from_secs(1)).await;

        assert_eq!(page.path_reads(), 1);
        assert!(page.clicks().is_empty());
        assert!(page.is_checked_now("_cbConduta_1"));
        assert!(page.is_checked_now("desfecho0"));
    }
}
