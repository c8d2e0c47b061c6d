//! Synthetic random-walk feed used when history is unavailable.

use crate::bar::Bar;
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Per-bar volatility of bulk history as a fraction of price.
pub const HISTORY_VOLATILITY: f64 = 0.002;
/// Per-tick volatility as a fraction of the prior close.
pub const TICK_VOLATILITY: f64 = 0.0005;
/// Spacing of bulk history bars.
pub const HISTORY_SPACING_MS: i64 = 60_000;

/// Seedable random-walk generator.
#[derive(Debug, Clone)]
pub struct SyntheticFeed {
    rng: StdRng,
}

impl SyntheticFeed {
    /// Seeded from `seed`, or from the OS when `None`.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }

    /// `count` closed one-minute bars whose last open time is one spacing before `now`.
    pub fn history(&mut self, count: usize, start_price: f64, now: i64) -> Vec<Bar> {
        let mut price = start_price;
        let mut time = now - count as i64 * HISTORY_SPACING_MS;
        let mut bars = Vec::with_capacity(count);

        for _ in 0..count {
            let volatility = price * HISTORY_VOLATILITY;
            let change = self.rng.random_range(-0.5..0.5) * volatility;
            let open = price;
            let close = open + change;
            let high = open.max(close) + self.rng.random::<f64>() * volatility * 0.5;
            let low = open.min(close) - self.rng.random::<f64>() * volatility * 0.5;
            let volume = self.rng.random::<f64>() * 1000.0;

            bars.push(Bar::new(time, open, high, low, close, volume, true));
            price = close;
            time += HISTORY_SPACING_MS;
        }

        bars
    }

    /// One simulation tick against the trailing bar.
    ///
    /// Returns the bar events to apply in order: the perturbed trailing bar, followed
    /// by a fresh forming bar when the trailing bar is sealed. A trailing bar is sealed
    /// once it is already closed or older than `close_after_ms`.
    pub fn tick(&mut self, last: &Bar, now: i64, close_after_ms: i64) -> Vec<Bar> {
        let volatility = last.close * TICK_VOLATILITY;
        let close = last.close + self.rng.random_range(-0.5..0.5) * volatility;

        let mut updated = *last;
        updated.close = close;
        updated.high = updated.high.max(close);
        updated.low = updated.low.min(close);

        if !last.is_closed && now - last.time <= close_after_ms {
            return vec![updated];
        }

        updated.is_closed = true;
        let forming = Bar::new((last.time + 1).max(now), close, close, close, close, 0.0, false);
        vec![updated, forming]
    }

    /// Bernoulli draw with success probability `probability`.
    pub fn chance(&mut self, probability: f64) -> bool {
        self.rng.random_bool(probability.clamp(0.0, 1.0))
    }
}
