use crate::bar::Bar;

/// Simple average of the last `period` true ranges.
///
/// True range of bar `i` is `max(high - low, |high - prev_close|, |low - prev_close|)`.
/// Fewer than `period + 1` bars gives 0.
pub fn calculate_atr(bars: &[Bar], period: usize) -> f64 {
    if period == 0 || bars.len() < period + 1 {
        return 0.0;
    }

    let recent = &bars[bars.len() - period - 1..];
    let sum: f64 = recent.windows(2).map(|pair| true_range(&pair[1], pair[0].close)).sum();
    sum / period as f64
}

/// True range of `bar` against the previous close.
pub fn true_range(bar: &Bar, prev_close: f64) -> f64 {
    (bar.high - bar.low)
        .max((bar.high - prev_close).abs())
        .max((bar.low - prev_close).abs())
}
