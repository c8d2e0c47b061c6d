/// Static engine configuration
///
/// Every timing and sizing constant of the ingestion engine lives here so the
/// manager never reaches for a magic number.
use crate::error::ConfigError;
use std::{str::FromStr, time::Duration};

/// Engine configuration consumed by the [`MarketManager`](crate::manager::MarketManager).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Maximum bars kept in the rolling window
    pub max_bars: usize,
    /// Delay before re-attaching a closed live stream
    pub reconnect_delay: Duration,
    /// Interval between synthetic ticks in SIMULATION
    pub tick_interval: Duration,
    /// Age after which a synthetic forming bar is sealed
    pub simulated_bar_close: Duration,
    /// Number of synthetic bars generated when history fails
    pub history_fallback_bars: usize,
    /// Starting price of the synthetic random walk
    pub simulation_seed_price: f64,
    /// Artificial latency of one signal evaluation
    pub analysis_latency: Duration,
    /// Indicators are only computed once the window holds more bars than this
    pub min_bars_for_indicators: usize,
    /// Chance that a window mutation in SIMULATION triggers an evaluation
    pub simulation_eval_probability: f64,
    /// Seed for every random draw; `None` seeds from the OS
    pub rng_seed: Option<u64>,
    /// Buffer size of the internal event queue and update broadcast
    pub channel_buffer_size: usize,
    /// Live stream is considered dead after this long without a frame
    pub stream_idle_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_bars: 1000,
            reconnect_delay: Duration::from_millis(3000),
            tick_interval: Duration::from_millis(200),
            simulated_bar_close: Duration::from_millis(3000),
            history_fallback_bars: 500,
            simulation_seed_price: 65_000.0,
            analysis_latency: Duration::from_millis(300),
            min_bars_for_indicators: 20,
            simulation_eval_probability: 0.2,
            rng_seed: None,
            channel_buffer_size: 1000,
            stream_idle_timeout: Duration::from_secs(120),
        }
    }
}

impl EngineConfig {
    /// Set the rolling window cap
    pub fn with_max_bars(mut self, max_bars: usize) -> Self {
        self.max_bars = max_bars;
        self
    }

    /// Set the reconnect delay
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the synthetic tick interval
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the synthetic bar close interval
    pub fn with_simulated_bar_close(mut self, close: Duration) -> Self {
        self.simulated_bar_close = close;
        self
    }

    /// Set the artificial analysis latency
    pub fn with_analysis_latency(mut self, latency: Duration) -> Self {
        self.analysis_latency = latency;
        self
    }

    /// Set the SIMULATION evaluation probability
    pub fn with_simulation_eval_probability(mut self, probability: f64) -> Self {
        self.simulation_eval_probability = probability;
        self
    }

    /// Seed every random draw for reproducible runs
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Set the synthetic seed price
    pub fn with_simulation_seed_price(mut self, price: f64) -> Self {
        self.simulation_seed_price = price;
        self
    }

    /// Set the idle timeout of the live stream
    pub fn with_stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    /// Build a configuration from `QF_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| -> Result<Duration, ConfigError> {
            Ok(parse_var::<u64>(&lookup, key)?
                .map(Duration::from_millis)
                .unwrap_or(default))
        };

        let config = Self {
            max_bars: parse_var(&lookup, "QF_MAX_BARS")?.unwrap_or(defaults.max_bars),
            reconnect_delay: millis("QF_RECONNECT_DELAY_MS", defaults.reconnect_delay)?,
            tick_interval: millis("QF_TICK_INTERVAL_MS", defaults.tick_interval)?,
            simulated_bar_close: millis("QF_SIMULATED_BAR_CLOSE_MS", defaults.simulated_bar_close)?,
            history_fallback_bars: parse_var(&lookup, "QF_FALLBACK_BARS")?
                .unwrap_or(defaults.history_fallback_bars),
            simulation_seed_price: parse_var(&lookup, "QF_SEED_PRICE")?
                .unwrap_or(defaults.simulation_seed_price),
            analysis_latency: millis("QF_ANALYSIS_LATENCY_MS", defaults.analysis_latency)?,
            min_bars_for_indicators: defaults.min_bars_for_indicators,
            simulation_eval_probability: parse_var(&lookup, "QF_SIM_EVAL_PROBABILITY")?
                .unwrap_or(defaults.simulation_eval_probability),
            rng_seed: parse_var(&lookup, "QF_RNG_SEED")?,
            channel_buffer_size: parse_var(&lookup, "QF_CHANNEL_BUFFER_SIZE")?
                .unwrap_or(defaults.channel_buffer_size),
            stream_idle_timeout: millis("QF_STREAM_IDLE_TIMEOUT_MS", defaults.stream_idle_timeout)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the manager cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bars <= self.min_bars_for_indicators {
            return Err(ConfigError::Validation(format!(
                "max_bars ({}) must exceed min_bars_for_indicators ({})",
                self.max_bars, self.min_bars_for_indicators
            )));
        }
        if !(0.0..=1.0).contains(&self.simulation_eval_probability) {
            return Err(ConfigError::Validation(format!(
                "simulation_eval_probability must be within [0, 1], got {}",
                self.simulation_eval_probability
            )));
        }
        if self.tick_interval.is_zero() || self.reconnect_delay.is_zero() {
            return Err(ConfigError::Validation(
                "tick_interval and reconnect_delay must be non-zero".to_string(),
            ));
        }
        if !self.simulation_seed_price.is_finite() || self.simulation_seed_price <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "simulation_seed_price must be finite and positive, got {}",
                self.simulation_seed_price
            )));
        }
        if self.history_fallback_bars == 0 {
            return Err(ConfigError::Validation(
                "history_fallback_bars must be non-zero".to_string(),
            ));
        }
        if self.channel_buffer_size == 0 {
            return Err(ConfigError::Validation(
                "channel_buffer_size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Endpoints of the external history and stream collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Base url of the history proxy serving `/api/history`
    pub history_url: String,
    /// Base url of the Binance REST api
    pub binance_rest_url: String,
    /// Base url of the Binance kline WebSocket streams
    pub stream_url: String,
    /// Number of bars requested from Binance
    pub history_limit: u16,
    /// Timeout of one history request
    pub request_timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            history_url: "http://127.0.0.1:8000".to_string(),
            binance_rest_url: "https://api.binance.com".to_string(),
            stream_url: "wss://stream.binance.com:9443/ws".to_string(),
            history_limit: 500,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl EndpointConfig {
    /// Read endpoint overrides from `QF_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let lookup = |key: &str| std::env::var(key).ok();

        Ok(Self {
            history_url: lookup("QF_HISTORY_URL").unwrap_or(defaults.history_url),
            binance_rest_url: lookup("QF_BINANCE_REST_URL").unwrap_or(defaults.binance_rest_url),
            stream_url: lookup("QF_STREAM_URL").unwrap_or(defaults.stream_url),
            history_limit: parse_var(&lookup, "QF_HISTORY_LIMIT")?
                .unwrap_or(defaults.history_limit),
            request_timeout: parse_var::<u64>(&lookup, "QF_REQUEST_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value,
            }),
    }
}
