//! Mode & aggregation manager
//!
//! A single actor owns the [`MarketState`] and processes every event in arrival
//! order: selection changes, history results, stream frames, synthetic ticks,
//! reconnect timers and finished evaluations. Each selection starts a new cycle;
//! the cycle's tasks are aborted when the next one starts and any event they still
//! deliver is dropped by cycle id.

use crate::{
    bar::{Bar, Subscription},
    config::EngineConfig,
    error::{ConfigError, FeedError, ManagerError},
    feed::{HistorySource, LiveSource, parse_kline_message},
    signal::{self, AnalysisResult},
    synthetic::SyntheticFeed,
    window::WindowChange,
};
use chrono::Utc;
use futures::{FutureExt, StreamExt};
use std::{panic::AssertUnwindSafe, sync::Arc};
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};

pub mod state;
pub mod update;

pub use state::{Marker, MarketState, Mode};
pub use update::{ConnectionStatus, MarketUpdate, MarketView};

#[derive(Debug)]
enum Command {
    Select(Subscription),
    Shutdown,
}

/// Completions of cycle-scoped tasks.
#[derive(Debug)]
enum Event {
    History {
        cycle: u64,
        result: Result<Vec<Bar>, FeedError>,
    },
    Connected {
        cycle: u64,
    },
    Frame {
        cycle: u64,
        text: String,
    },
    StreamError {
        cycle: u64,
        error: FeedError,
    },
    StreamClosed {
        cycle: u64,
    },
    ReconnectDue {
        cycle: u64,
    },
    Tick {
        cycle: u64,
    },
    AnalysisDone {
        cycle: u64,
        result: AnalysisResult,
    },
}

impl Event {
    fn cycle(&self) -> u64 {
        match self {
            Event::History { cycle, .. }
            | Event::Connected { cycle }
            | Event::Frame { cycle, .. }
            | Event::StreamError { cycle, .. }
            | Event::StreamClosed { cycle }
            | Event::ReconnectDue { cycle }
            | Event::Tick { cycle }
            | Event::AnalysisDone { cycle, .. } => *cycle,
        }
    }
}

/// Handles of the tasks spawned for the current cycle.
#[derive(Debug, Default)]
struct CycleTasks {
    history: Option<JoinHandle<()>>,
    stream: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
    analysis: Option<JoinHandle<()>>,
}

impl CycleTasks {
    /// Cancel in-flight history, close the stream, clear the reconnect timer and
    /// stop the simulation ticker and any pending evaluation.
    fn abort_all(&mut self) {
        for task in [
            self.history.take(),
            self.stream.take(),
            self.reconnect.take(),
            self.ticker.take(),
            self.analysis.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }
}

/// Client side of a running [`MarketManager`].
#[derive(Debug)]
pub struct ManagerHandle {
    command_tx: mpsc::Sender<Command>,
    view_rx: watch::Receiver<MarketView>,
    update_tx: broadcast::Sender<MarketUpdate>,
    task: JoinHandle<()>,
}

impl ManagerHandle {
    /// Switch instrument and/or timeframe, starting a new load cycle.
    pub async fn select(&self, subscription: Subscription) -> Result<(), ManagerError> {
        self.command_tx
            .send(Command::Select(subscription))
            .await
            .map_err(|_| ManagerError::Terminated)
    }

    /// Receiver of the latest [`MarketView`].
    pub fn view(&self) -> watch::Receiver<MarketView> {
        self.view_rx.clone()
    }

    /// Stream of [`MarketView`]s, starting with the current one. Intermediate views
    /// are skipped if the consumer falls behind.
    pub fn view_stream(&self) -> WatchStream<MarketView> {
        WatchStream::new(self.view_rx.clone())
    }

    /// Latest [`MarketView`].
    pub fn snapshot(&self) -> MarketView {
        self.view_rx.borrow().clone()
    }

    /// Subscribe to typed [`MarketUpdate`]s published from now on.
    pub fn updates(&self) -> broadcast::Receiver<MarketUpdate> {
        self.update_tx.subscribe()
    }

    /// Stop the manager, tearing down every task of the current cycle.
    pub async fn shutdown(self) {
        let _ = self.command_tx.send(Command::Shutdown).await;
        if let Err(error) = self.task.await {
            warn!(%error, "market manager task failed during shutdown");
        }
    }
}

pub struct MarketManager<H, L> {
    config: EngineConfig,
    history: Arc<H>,
    live: Arc<L>,
    state: MarketState,
    feed: SyntheticFeed,
    subscription: Option<Subscription>,
    connection: ConnectionStatus,
    cycle: u64,
    tasks: CycleTasks,
    event_tx: mpsc::Sender<Event>,
    view_tx: watch::Sender<MarketView>,
    update_tx: broadcast::Sender<MarketUpdate>,
}

impl<H, L> MarketManager<H, L>
where
    H: HistorySource,
    L: LiveSource,
{
    /// Validate `config` and spawn the manager loop on the current tokio runtime.
    ///
    /// The manager idles until the first [`ManagerHandle::select`].
    pub fn spawn(config: EngineConfig, history: H, live: L) -> Result<ManagerHandle, ConfigError> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(config.channel_buffer_size);
        let (view_tx, view_rx) = watch::channel(MarketView::default());
        let (update_tx, _) = broadcast::channel(config.channel_buffer_size);

        let manager = Self {
            state: MarketState::new(config.max_bars, config.min_bars_for_indicators),
            feed: SyntheticFeed::new(config.rng_seed),
            history: Arc::new(history),
            live: Arc::new(live),
            subscription: None,
            connection: ConnectionStatus::Disconnected,
            cycle: 0,
            tasks: CycleTasks::default(),
            event_tx,
            view_tx,
            update_tx: update_tx.clone(),
            config,
        };

        let task = tokio::spawn(manager.run(command_rx, event_rx));

        Ok(ManagerHandle {
            command_tx,
            view_rx,
            update_tx,
            task,
        })
    }

    async fn run(mut self, mut command_rx: mpsc::Receiver<Command>, mut event_rx: mpsc::Receiver<Event>) {
        info!("market manager started");

        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(Command::Select(subscription)) => self.select(subscription),
                    Some(Command::Shutdown) | None => break,
                },
                Some(event) = event_rx.recv() => self.handle(event),
            }
        }

        self.tasks.abort_all();
        info!(cycle = self.cycle, "market manager stopped");
    }

    fn select(&mut self, subscription: Subscription) {
        self.cycle += 1;
        self.tasks.abort_all();
        self.state.reset();
        self.subscription = Some(subscription.clone());
        self.set_connection(ConnectionStatus::Disconnected);

        info!(
            symbol = subscription.symbol(),
            timeframe = %subscription.timeframe,
            cycle = self.cycle,
            "loading history"
        );
        self.publish(MarketUpdate::Loading {
            cycle: self.cycle,
            subscription: subscription.clone(),
        });
        self.publish(MarketUpdate::ModeChanged(Mode::Loading));

        let cycle = self.cycle;
        let history = Arc::clone(&self.history);
        let event_tx = self.event_tx.clone();
        self.tasks.history = Some(tokio::spawn(async move {
            // A panicking source still settles the cycle as a failed fetch
            let result = AssertUnwindSafe(history.fetch(&subscription))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(FeedError::Http("history source panicked".to_string())));
            let _ = event_tx.send(Event::History { cycle, result }).await;
        }));

        self.publish_view();
    }

    fn handle(&mut self, event: Event) {
        if event.cycle() != self.cycle {
            debug!(event_cycle = event.cycle(), cycle = self.cycle, "dropping stale event");
            return;
        }

        match event {
            Event::History { result, .. } => self.on_history(result),
            Event::Connected { .. } => {
                info!(cycle = self.cycle, "live stream attached");
                self.set_connection(ConnectionStatus::Connected);
            }
            Event::Frame { text, .. } => match parse_kline_message(&text) {
                Ok(Some(bar)) => self.on_bars(&[bar]),
                Ok(None) => {}
                Err(error) => debug!(%error, "dropping malformed stream payload"),
            },
            Event::StreamError { error, .. } => {
                error!(%error, cycle = self.cycle, "live stream error");
            }
            Event::StreamClosed { .. } => self.on_stream_closed(),
            Event::ReconnectDue { .. } => {
                self.tasks.reconnect = None;
                info!(cycle = self.cycle, "reconnecting live stream");
                self.attach_stream();
            }
            Event::Tick { .. } => self.on_tick(),
            Event::AnalysisDone { result, .. } => self.on_analysis(result),
        }

        self.publish_view();
    }

    fn on_history(&mut self, result: Result<Vec<Bar>, FeedError>) {
        self.tasks.history = None;

        match result {
            Ok(bars) => {
                let loaded = self.state.load(bars, Mode::Live);
                info!(cycle = self.cycle, bars = loaded, mode = %Mode::Live, "history loaded");
                self.after_load();
                self.attach_stream();
            }
            Err(error) => {
                warn!(%error, cycle = self.cycle, "history unavailable, switching to simulation");
                let bars = self.feed.history(
                    self.config.history_fallback_bars,
                    self.config.simulation_seed_price,
                    Utc::now().timestamp_millis(),
                );
                let loaded = self.state.load(bars, Mode::Simulation);
                info!(cycle = self.cycle, bars = loaded, mode = %Mode::Simulation, "synthetic history generated");
                self.after_load();
                self.start_ticker();
            }
        }
    }

    fn after_load(&mut self) {
        self.publish(MarketUpdate::HistoryLoaded {
            cycle: self.cycle,
            mode: self.state.mode,
            bars: self.state.window.to_vec(),
        });
        self.publish(MarketUpdate::ModeChanged(self.state.mode));
        self.after_mutation();
    }

    fn on_bars(&mut self, bars: &[Bar]) {
        let mut mutated = false;
        for bar in bars {
            match self.state.apply(*bar) {
                WindowChange::Updated(bar) => {
                    mutated = true;
                    self.publish(MarketUpdate::BarUpdated(bar));
                }
                WindowChange::Appended { bar, evicted } => {
                    mutated = true;
                    self.publish(MarketUpdate::BarAppended { bar, evicted });
                }
                WindowChange::Discarded => {
                    debug!(time = bar.time, "discarding out-of-order bar");
                }
            }
        }

        if mutated {
            self.after_mutation();
        }
    }

    /// Recompute indicators and, if the debounce allows it, start an evaluation.
    fn after_mutation(&mut self) {
        let Some(snapshot) = self.state.recompute() else {
            return;
        };
        self.publish(MarketUpdate::IndicatorsUpdated(snapshot));

        let probability = self.config.simulation_eval_probability;
        let feed = &mut self.feed;
        if self.state.should_evaluate(|| feed.chance(probability)) {
            self.start_analysis();
        }
    }

    fn start_analysis(&mut self) {
        let Some((snapshot, bar)) = self.state.begin_analysis() else {
            return;
        };
        debug!(cycle = self.cycle, time = bar.time, "evaluating signal");

        let cycle = self.cycle;
        let latency = self.config.analysis_latency;
        let event_tx = self.event_tx.clone();
        self.tasks.analysis = Some(tokio::spawn(async move {
            let result = signal::evaluate(snapshot, bar, latency).await;
            let _ = event_tx.send(Event::AnalysisDone { cycle, result }).await;
        }));
    }

    fn on_analysis(&mut self, result: AnalysisResult) {
        self.tasks.analysis = None;
        info!(
            cycle = self.cycle,
            signal = %result.signal,
            confidence = result.confidence,
            "analysis updated"
        );

        let marker = self.state.finish_analysis(result.clone());
        self.publish(MarketUpdate::AnalysisUpdated(result));
        if let Some(marker) = marker {
            info!(time = marker.time, signal = %marker.signal, "marker added");
            self.publish(MarketUpdate::MarkerAdded(marker));
        }
    }

    fn attach_stream(&mut self) {
        let Some(subscription) = self.subscription.clone() else {
            return;
        };
        self.set_connection(ConnectionStatus::Connecting);

        let cycle = self.cycle;
        let live = Arc::clone(&self.live);
        let event_tx = self.event_tx.clone();
        self.tasks.stream = Some(tokio::spawn(async move {
            match live.connect(&subscription).await {
                Ok(mut frames) => {
                    if event_tx.send(Event::Connected { cycle }).await.is_err() {
                        return;
                    }
                    while let Some(frame) = frames.next().await {
                        let event = match frame {
                            Ok(text) => Event::Frame { cycle, text },
                            Err(error) => Event::StreamError { cycle, error },
                        };
                        if event_tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }
                Err(error) => {
                    let _ = event_tx.send(Event::StreamError { cycle, error }).await;
                }
            }
            let _ = event_tx.send(Event::StreamClosed { cycle }).await;
        }));
    }

    /// Stream ended: keep the mode and the window, retry after the fixed delay.
    fn on_stream_closed(&mut self) {
        self.tasks.stream = None;
        if self.state.mode != Mode::Live {
            return;
        }

        warn!(
            cycle = self.cycle,
            delay_ms = self.config.reconnect_delay.as_millis() as u64,
            "live stream closed, scheduling reconnect"
        );
        self.set_connection(ConnectionStatus::Reconnecting);

        let cycle = self.cycle;
        let delay = self.config.reconnect_delay;
        let event_tx = self.event_tx.clone();
        self.tasks.reconnect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = event_tx.send(Event::ReconnectDue { cycle }).await;
        }));
    }

    fn start_ticker(&mut self) {
        let cycle = self.cycle;
        let period = self.config.tick_interval;
        let event_tx = self.event_tx.clone();
        self.tasks.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if event_tx.send(Event::Tick { cycle }).await.is_err() {
                    break;
                }
            }
        }));
    }

    fn on_tick(&mut self) {
        if self.state.mode != Mode::Simulation {
            return;
        }
        let Some(last) = self.state.window.last().copied() else {
            return;
        };

        let close_after_ms = self.config.simulated_bar_close.as_millis() as i64;
        let bars = self.feed.tick(&last, Utc::now().timestamp_millis(), close_after_ms);
        self.on_bars(&bars);
    }

    fn set_connection(&mut self, status: ConnectionStatus) {
        if self.connection != status {
            self.connection = status;
            self.publish(MarketUpdate::ConnectionChanged(status));
        }
    }

    fn publish(&self, update: MarketUpdate) {
        // No subscribers is not an error
        let _ = self.update_tx.send(update);
    }

    fn publish_view(&self) {
        self.view_tx.send_replace(MarketView::new(
            &self.state,
            self.subscription.clone(),
            self.connection,
        ));
    }
}
