//! RSI (Relative Strength Index).
//!
//! Computed over the last `n` day-to-day close changes, the final change being
//! from the last previous close to the current close:
//!
//! RSI = 100 * avg_up / (avg_up + avg_down), rounded to two decimals.
//!
//! Averaging methods:
//! - simple: plain sums of ups and downs
//! - exponential: smoothing factor 2 / (n + 1)
//! - wilder: smoothing factor 1 / n
//!
//! A window with no movement at all yields 50.

use std::str::FromStr;

use crate::domain::error::SimError;

pub const DEFAULT_RSI_PERIOD: usize = 12;
pub const RSI_UPPER_BOUND: f64 = 80.0;
pub const RSI_LOWER_BOUND: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RsiMethod {
    #[default]
    Simple,
    Exponential,
    Wilder,
}

impl FromStr for RsiMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(RsiMethod::Simple),
            "exponential" => Ok(RsiMethod::Exponential),
            "wilder" => Ok(RsiMethod::Wilder),
            other => Err(format!(
                "unknown RSI method '{other}', expected simple, exponential or wilder"
            )),
        }
    }
}

/// RSI of `current_close` against the `n` most recent `previous_closes`
/// (oldest first). Fails when fewer than `n` previous closes are given.
pub fn rsi(
    current_close: f64,
    previous_closes: &[f64],
    n: usize,
    method: RsiMethod,
) -> Result<f64, SimError> {
    if previous_closes.len() < n {
        return Err(SimError::InsufficientPriceHistory {
            have: previous_closes.len(),
            need: n,
        });
    }

    let window = &previous_closes[previous_closes.len() - n..];
    let mut avg_up = 0.0_f64;
    let mut avg_down = 0.0_f64;

    for (i, &prev) in window.iter().enumerate() {
        let next = window.get(i + 1).copied().unwrap_or(current_close);
        let up = if next > prev { next - prev } else { 0.0 };
        let down = if prev > next { prev - next } else { 0.0 };

        match method {
            RsiMethod::Simple => {
                avg_up += up;
                avg_down += down;
            }
            RsiMethod::Exponential => {
                let alpha = 2.0 / (n as f64 + 1.0);
                smooth(&mut avg_up, up, alpha);
                smooth(&mut avg_down, down, alpha);
            }
            RsiMethod::Wilder => {
                let alpha = 1.0 / n as f64;
                smooth(&mut avg_up, up, alpha);
                smooth(&mut avg_down, down, alpha);
            }
        }
    }

    if avg_up + avg_down > 0.0 {
        Ok(round2(100.0 * avg_up / (avg_up + avg_down)))
    } else {
        Ok(50.0)
    }
}

/// Only days that moved in the averaged direction update the average.
fn smooth(avg: &mut f64, change: f64, alpha: f64) {
    if change > 0.0 {
        *avg = alpha * change + (1.0 - alpha) * *avg;
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn is_up_trend_rsi(
    current_close: f64,
    previous_closes: &[f64],
    bound: f64,
    n: usize,
    method: RsiMethod,
) -> Result<bool, SimError> {
    Ok(rsi(current_close, previous_closes, n, method)? > bound)
}

pub fn is_down_trend_rsi(
    current_close: f64,
    previous_closes: &[f64],
    bound: f64,
    n: usize,
    method: RsiMethod,
) -> Result<bool, SimError> {
    Ok(rsi(current_close, previous_closes, n, method)? < bound)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLOSES: [f64; 12] = [
        17.52, 17.8, 17.92, 17.21, 17.65, 17.2, 18.0, 18.2, 19.0, 18.5, 18.4, 17.1,
    ];

    #[test]
    fn simple_method() {
        assert_eq!(rsi(18.5, &CLOSES, 12, RsiMethod::Simple).unwrap(), 56.9);
    }

    #[test]
    fn exponential_method() {
        assert_eq!(rsi(18.5, &CLOSES, 12, RsiMethod::Exponential).unwrap(), 56.46);
    }

    #[test]
    fn wilder_method() {
        assert_eq!(rsi(18.5, &CLOSES, 12, RsiMethod::Wilder).unwrap(), 56.62);
    }

    #[test]
    fn flat_series_is_fifty() {
        let flat = [17.52; 12];
        for method in [RsiMethod::Simple, RsiMethod::Exponential, RsiMethod::Wilder] {
            assert_eq!(rsi(17.52, &flat, 12, method).unwrap(), 50.0);
        }
    }

    #[test]
    fn uses_only_the_last_n_closes() {
        let mut longer = vec![1.0, 500.0, 3.0];
        longer.extend_from_slice(&CLOSES);
        assert_eq!(rsi(18.5, &longer, 12, RsiMethod::Simple).unwrap(), 56.9);
    }

    #[test]
    fn too_few_closes_fails() {
        assert!(matches!(
            rsi(18.5, &CLOSES[..5], 12, RsiMethod::Simple),
            Err(SimError::InsufficientPriceHistory { have: 5, need: 12 })
        ));
    }

    #[test]
    fn all_gains_is_hundred() {
        let rising: Vec<f64> = (1..=12).map(f64::from).collect();
        assert_eq!(rsi(13.0, &rising, 12, RsiMethod::Simple).unwrap(), 100.0);
    }

    #[test]
    fn trend_predicates() {
        let rising: Vec<f64> = (1..=12).map(f64::from).collect();
        assert!(is_up_trend_rsi(13.0, &rising, RSI_UPPER_BOUND, 12, RsiMethod::Simple).unwrap());
        let falling: Vec<f64> = (1..=12).rev().map(f64::from).collect();
        assert!(is_down_trend_rsi(0.5, &falling, RSI_LOWER_BOUND, 12, RsiMethod::Simple).unwrap());
        assert!(!is_down_trend_rsi(18.5, &CLOSES, RSI_LOWER_BOUND, 12, RsiMethod::Simple).unwrap());
    }

    #[test]
    fn method_parses() {
        assert_eq!("Wilder".parse::<RsiMethod>().unwrap(), RsiMethod::Wilder);
        assert!("median".parse::<RsiMethod>().is_err());
    }
}
