use quantflow::{
    ApiHistory, Bar, BinanceHistory, BinanceKlineStream, EndpointConfig, EngineConfig,
    HistorySource, Instrument, MarketManager, MarketUpdate, Subscription, Timeframe,
    indicators::confluence_report,
};
use chrono::DateTime;
use rustls::crypto::ring::default_provider;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    init_logging();

    // Both reqwest and tokio-tungstenite need a process-level crypto provider
    let _ = default_provider().install_default();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            error!(%error, "invalid engine configuration");
            return;
        }
    };
    let endpoints = match EndpointConfig::from_env() {
        Ok(endpoints) => endpoints,
        Err(error) => {
            error!(%error, "invalid endpoint configuration");
            return;
        }
    };

    let subscription = selected_subscription();
    info!(%subscription, "starting quantflow monitor");

    // QF_HISTORY_SOURCE=proxy uses the /api/history backend, anything else Binance REST
    let proxy = std::env::var("QF_HISTORY_SOURCE").is_ok_and(|source| source == "proxy");
    let result = if proxy {
        match ApiHistory::new(&endpoints) {
            Ok(history) => run(config, endpoints, history, subscription).await,
            Err(error) => Err(error.to_string()),
        }
    } else {
        match BinanceHistory::new(&endpoints) {
            Ok(history) => run(config, endpoints, history, subscription).await,
            Err(error) => Err(error.to_string()),
        }
    };

    if let Err(error) = result {
        error!(%error, "quantflow monitor failed");
    }
}

async fn run<H: HistorySource>(
    config: EngineConfig,
    endpoints: EndpointConfig,
    history: H,
    subscription: Subscription,
) -> Result<(), String> {
    let live = BinanceKlineStream::new(&endpoints, &config);
    let handle = MarketManager::spawn(config, history, live).map_err(|error| error.to_string())?;

    let mut updates = handle.updates();
    handle
        .select(subscription)
        .await
        .map_err(|error| error.to_string())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, shutting down");
                break;
            }
            update = updates.recv() => match update {
                Ok(update) => {
                    log_update(&update);
                    if matches!(update, MarketUpdate::IndicatorsUpdated(_)) {
                        log_confluence(&handle.snapshot().bars);
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "update receiver lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn log_update(update: &MarketUpdate) {
    match update {
        MarketUpdate::Loading { cycle, subscription } => {
            info!(cycle, %subscription, "loading");
        }
        MarketUpdate::HistoryLoaded { cycle, mode, bars } => {
            info!(cycle, %mode, bars = bars.len(), "history loaded");
        }
        MarketUpdate::BarAppended { bar, .. } => {
            info!(time = %bar_time(bar.time), close = bar.close, "bar opened");
        }
        MarketUpdate::ModeChanged(mode) => info!(%mode, "mode changed"),
        MarketUpdate::IndicatorsUpdated(snapshot) => {
            tracing::debug!(
                rsi = snapshot.rsi,
                histogram = snapshot.macd.histogram,
                aroon_up = snapshot.aroon.up,
                aroon_down = snapshot.aroon.down,
                volatility = snapshot.volatility,
                trend = %snapshot.trend,
                "indicators"
            );
        }
        MarketUpdate::AnalysisUpdated(analysis) => {
            info!(
                signal = %analysis.signal,
                confidence = analysis.confidence,
                stop_loss = analysis.stop_loss,
                take_profit = analysis.take_profit,
                reasoning = %analysis.reasoning,
                "analysis"
            );
        }
        MarketUpdate::MarkerAdded(marker) => {
            info!(time = %bar_time(marker.time), signal = %marker.signal, "marker");
        }
        MarketUpdate::ConnectionChanged(status) => info!(%status, "connection"),
        MarketUpdate::BarUpdated(_) => {}
    }
}

fn log_confluence(bars: &[Bar]) {
    let Some(report) = confluence_report(bars) else {
        return;
    };

    tracing::debug!(
        rsi = %report.rsi.bias,
        macd = %report.macd.bias,
        aroon = %report.aroon.bias,
        smi = %report.smi.bias,
        swing = %report.swing.trend,
        ut_bot = %report.ut_bot.bias,
        ut_stop = report.ut_bot.stop,
        "confluence"
    );
    if report.aligned_bullish() || report.aligned_bearish() {
        info!(bullish = report.aligned_bullish(), "all confluence votes aligned");
    }
}

fn bar_time(time: i64) -> String {
    DateTime::from_timestamp_millis(time)
        .map(|time| time.to_rfc3339())
        .unwrap_or_else(|| time.to_string())
}

/// `QF_SYMBOL` (default btcusdt) and `QF_TIMEFRAME` (default 1m).
fn selected_subscription() -> Subscription {
    let symbol = std::env::var("QF_SYMBOL").unwrap_or_else(|_| "btcusdt".to_string());
    let instrument = Instrument::catalogue()
        .into_iter()
        .find(|instrument| instrument.symbol.eq_ignore_ascii_case(&symbol))
        .unwrap_or_else(|| Instrument::new(&symbol, symbol.to_uppercase()));

    let timeframe = std::env::var("QF_TIMEFRAME")
        .ok()
        .and_then(|timeframe| match timeframe.parse::<Timeframe>() {
            Ok(timeframe) => Some(timeframe),
            Err(error) => {
                warn!(%error, "falling back to 1m");
                None
            }
        })
        .unwrap_or_default();

    Subscription::new(instrument, timeframe)
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
