use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use demark_monitor::candle_merge::{merge_candle, MergeMode};
use demark_monitor::clock::Granularity;
use demark_monitor::error::AppError;
use demark_monitor::history::HistoryManager;
use demark_monitor::indicator::IndicatorSettings;
use demark_monitor::model::candle::{Candle, Ohlc, PriceFlip};
use demark_monitor::model::tick::Tick;

fn boundary() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 5, 16, 30, 0).unwrap()
}

#[test]
/// Verifies the empty fresh period: no ticks yields a candle without prices and zero volume.
fn fresh_period_without_ticks_has_no_data() {
    let merged = merge_candle(boundary(), None, &[]);
    assert_eq!(merged.mode, MergeMode::Fresh);
    assert_eq!(merged.candle.time, boundary());
    assert!(!merged.candle.has_data());
    assert_eq!(merged.candle.volume, 0.0);
}

#[test]
/// Verifies an empty merge keeps the head's prices and volume as they were.
fn merge_without_ticks_is_noop() {
    let head = Candle::new(
        boundary(),
        Some(Ohlc {
            open: 5.0,
            high: 6.0,
            low: 4.0,
            close: 5.5,
        }),
        3.0,
    );
    let merged = merge_candle(boundary(), Some(&head), &[]);
    assert_eq!(merged.mode, MergeMode::Merged);
    assert_eq!(merged.candle.ohlc, head.ohlc);
    assert_eq!(merged.candle.volume, 3.0);
}

#[test]
/// Verifies merge mode requires an exact timestamp match, without tolerance.
fn merge_requires_exact_time_match() {
    for offset_ms in [-1, 1] {
        let head = Candle::new(boundary() + TimeDelta::milliseconds(offset_ms), None, 0.0);
        let merged = merge_candle(boundary(), Some(&head), &[Tick::new(1.0, 1.0, boundary())]);
        assert_eq!(merged.mode, MergeMode::Fresh, "head offset {}ms", offset_ms);
    }
}

#[test]
/// Verifies the history side of the exact match:
/// boundaries one millisecond either side of the head are refused and nothing changes.
fn history_refuses_boundary_one_millisecond_off_head() {
    let mut manager = HistoryManager::new(Granularity::OneMinute, 10, IndicatorSettings::default());
    manager.on_tick(Tick::new(1.0, 1.0, boundary()));
    manager.on_boundary_closed(boundary()).unwrap();
    manager.on_tick(Tick::new(2.0, 1.0, boundary()));
    let before = manager.current_window().to_vec();

    for offset_ms in [-1, 1] {
        let err = manager
            .on_boundary_closed(boundary() + TimeDelta::milliseconds(offset_ms))
            .unwrap_err();
        assert!(matches!(err, AppError::IllegalState(_)), "offset {}ms", offset_ms);
        assert_eq!(manager.current_window(), &before[..]);
        assert_eq!(manager.pending_ticks().len(), 1);
    }
}

#[test]
/// Verifies derived annotations of the head do not leak into the merged candle.
fn merged_candle_has_no_annotations() {
    let mut head = Candle::new(
        boundary(),
        Some(Ohlc {
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
        }),
        1.0,
    );
    head.flip = Some(PriceFlip {
        bullish: true,
        bearish: false,
    });
    head.td_sell_count = 4;
    let merged = merge_candle(boundary(), Some(&head), &[Tick::new(2.0, 1.0, boundary())]);
    assert_eq!(merged.candle.flip, None);
    assert_eq!(merged.candle.td_sell_count, 0);
}
