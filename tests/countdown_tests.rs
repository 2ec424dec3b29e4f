use chrono::{DateTime, TimeDelta, Utc};

use demark_monitor::error::AppError;
use demark_monitor::indicator::{
    annotate_counts, annotate_flips, derive, CountdownSettings, FlipComparison, IndicatorSettings,
};
use demark_monitor::model::candle::{Candle, Ohlc};

fn oldest_first(closes: &[f64]) -> Vec<Candle> {
    let newest = DateTime::<Utc>::from_timestamp(1_710_000_000, 0).unwrap();
    closes
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &close)| {
            Candle::new(
                newest - TimeDelta::minutes(i as i64),
                Some(Ohlc {
                    open: close,
                    high: close,
                    low: close,
                    close,
                }),
                1.0,
            )
        })
        .collect()
}

/// (buy, sell) per candle, oldest first.
fn counts(closes: &[f64], settings: &IndicatorSettings) -> Vec<(u8, u8)> {
    derive(&oldest_first(closes), settings)
        .unwrap()
        .iter()
        .rev()
        .map(|c| (c.td_buy_count, c.td_sell_count))
        .collect()
}

fn rise_then_fall() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..9).map(|p| 100.0 + p as f64).collect();
    closes.extend((9..20).map(|p| 104.0 - (p - 9) as f64));
    closes
}

#[test]
/// Verifies the canonical buy setup:
/// nine consecutive lower closes after a bearish flip count 1..9, then counting stops.
fn buy_setup_counts_to_nine_then_stops() {
    let out = counts(&rise_then_fall(), &IndicatorSettings::default());
    let buy: Vec<u8> = out.iter().map(|c| c.0).collect();
    assert_eq!(
        buy,
        vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0, 0]
    );
}

#[test]
/// Verifies an opposite flip cancels an active count:
/// a bullish flip mid-run zeroes the buy count and starts the sell count instead.
fn bullish_flip_cancels_buy_count() {
    let mut closes: Vec<f64> = (0..9).map(|p| 100.0 + p as f64).collect();
    closes.extend([104.0, 103.0, 102.0, 110.0, 111.0, 112.0]);
    let out = counts(&closes, &IndicatorSettings::default());
    let buy: Vec<u8> = out[9..].iter().map(|c| c.0).collect();
    let sell: Vec<u8> = out[9..].iter().map(|c| c.1).collect();
    assert_eq!(buy, vec![1, 2, 3, 0, 0, 0]);
    assert_eq!(sell, vec![0, 0, 0, 1, 2, 3]);
}

#[test]
/// Verifies a configurable completion value:
/// with completion 3 the run stops after the third qualifying close.
fn completion_value_is_configurable() {
    let settings = IndicatorSettings {
        countdown_completion: 3,
        ..IndicatorSettings::default()
    };
    let out = counts(&rise_then_fall(), &settings);
    let buy: Vec<u8> = out[9..].iter().map(|c| c.0).collect();
    assert_eq!(buy, vec![1, 2, 3, 0, 0, 0, 0, 0, 0, 0, 0]);
}

#[test]
/// Verifies count bounds over a long oscillating series:
/// every count stays within 0..=9 and the five oldest entries are never counted.
fn counts_stay_bounded_on_oscillating_series() {
    let closes: Vec<f64> = (0..200)
        .map(|p| 100.0 + 10.0 * (p as f64 * 0.7).sin() + (p % 7) as f64)
        .collect();
    let out = counts(&closes, &IndicatorSettings::default());
    assert!(out.iter().all(|&(b, s)| b <= 9 && s <= 9));
    assert!(out[..5].iter().all(|&(b, s)| b == 0 && s == 0));
}

#[test]
/// Verifies the fail-fast guard:
/// counting a history that skipped the flip pass is an illegal state.
fn counting_without_flip_pass_fails() {
    let history = oldest_first(&rise_then_fall());
    let err = annotate_counts(&history, &CountdownSettings::default()).unwrap_err();
    assert!(matches!(err, AppError::IllegalState(_)));
}

#[test]
/// Verifies that a no-data candle inside the window neither counts nor breaks the pass.
fn no_data_candle_does_not_count() {
    let mut history = oldest_first(&rise_then_fall());
    // newest-first index 8 is the candle at oldest-first position 11 (count 3 normally)
    history[8].ohlc = None;
    let flipped = annotate_flips(&history, FlipComparison::Inclusive);
    let out = annotate_counts(&flipped, &CountdownSettings::default()).unwrap();
    assert_eq!(out[8].td_buy_count, 0);
    assert!(out.iter().all(|c| c.td_buy_count <= 9));
}

#[test]
/// Verifies a candle flagged both bullish and bearish ends both setups:
/// a flat run carries no counts and the first decline starts the buy count from 1.
fn double_flip_leaves_both_setups_inactive() {
    let mut closes = vec![100.0; 10];
    closes.extend([99.0, 98.0, 97.0, 96.0, 95.0]);

    let derived = derive(&oldest_first(&closes), &IndicatorSettings::default()).unwrap();
    let oldest: Vec<&Candle> = derived.iter().rev().collect();
    assert!(oldest[5..10]
        .iter()
        .all(|c| c.is_bullish_price_flip() && c.is_bearish_price_flip()));

    let out = counts(&closes, &IndicatorSettings::default());
    let buy: Vec<u8> = out.iter().map(|c| c.0).collect();
    assert_eq!(buy, vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5]);
    assert!(out.iter().all(|c| c.1 == 0));
}
