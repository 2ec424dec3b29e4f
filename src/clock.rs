use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::pipeline::PipelineInput;

/// Candle period length. Only the periods the exchange serves historic rates for are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    SixHours,
    OneDay,
}

impl Granularity {
    pub const ALL: [Granularity; 6] = [
        Granularity::OneMinute,
        Granularity::FiveMinutes,
        Granularity::FifteenMinutes,
        Granularity::OneHour,
        Granularity::SixHours,
        Granularity::OneDay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::OneMinute => "1m",
            Granularity::FiveMinutes => "5m",
            Granularity::FifteenMinutes => "15m",
            Granularity::OneHour => "1h",
            Granularity::SixHours => "6h",
            Granularity::OneDay => "1d",
        }
    }

    pub fn as_secs(&self) -> i64 {
        match self {
            Granularity::OneMinute => 60,
            Granularity::FiveMinutes => 300,
            Granularity::FifteenMinutes => 900,
            Granularity::OneHour => 3_600,
            Granularity::SixHours => 21_600,
            Granularity::OneDay => 86_400,
        }
    }

    pub fn as_millis(&self) -> i64 {
        self.as_secs() * 1_000
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.as_secs() as u64)
    }

    pub fn time_delta(&self) -> TimeDelta {
        TimeDelta::seconds(self.as_secs())
    }
}

impl FromStr for Granularity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Granularity::ALL
            .into_iter()
            .find(|g| g.as_str() == s.trim())
            .ok_or_else(|| AppError::InvalidGranularity(s.to_string()))
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Start of the period containing `instant`, floored in UTC.
pub fn boundary_of(granularity: Granularity, instant: DateTime<Utc>) -> DateTime<Utc> {
    let ms = instant.timestamp_millis();
    let floored = ms - ms.rem_euclid(granularity.as_millis());
    DateTime::<Utc>::from_timestamp_millis(floored).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Time left until the period containing `instant` closes. An instant sitting exactly on a
/// boundary is the start of a fresh period, so the full period length is returned.
pub fn time_until_next_boundary(granularity: Granularity, instant: DateTime<Utc>) -> Duration {
    let next = boundary_of(granularity, instant) + granularity.time_delta();
    (next - instant).to_std().unwrap_or(Duration::ZERO)
}

pub fn is_aligned(granularity: Granularity, instant: DateTime<Utc>) -> bool {
    boundary_of(granularity, instant) == instant
}

/// How the boundary timer picks its next delay after firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    /// Recompute the delay against the wall clock after every fire.
    #[default]
    Reanchor,
    /// Re-arm with the fixed period length. Drifts by whatever latency each fire accumulates.
    FixedPeriod,
}

pub trait WallClock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Self-rescheduling single timer that reports every closed period to the pipeline.
pub struct BoundaryScheduler<C: WallClock = SystemClock> {
    granularity: Granularity,
    mode: TimerMode,
    clock: C,
}

impl<C: WallClock> BoundaryScheduler<C> {
    pub fn new(granularity: Granularity, mode: TimerMode, clock: C) -> Self {
        Self {
            granularity,
            mode,
            clock,
        }
    }

    pub fn spawn(
        self,
        boundary_tx: mpsc::Sender<PipelineInput>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(boundary_tx, shutdown))
    }

    /// Sleep until the open period closes, emit `BoundaryClosed(period_start)`, re-arm.
    /// Returns on shutdown or when the pipeline has gone away.
    pub async fn run(
        self,
        boundary_tx: mpsc::Sender<PipelineInput>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let armed_at = self.clock.now();
        let mut period_start = boundary_of(self.granularity, armed_at);
        let mut delay = time_until_next_boundary(self.granularity, armed_at);
        tracing::info!(
            granularity = %self.granularity,
            mode = ?self.mode,
            first_delay_ms = delay.as_millis() as u64,
            "Boundary timer armed"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {
                    tracing::info!("Boundary timer cancelled");
                    return;
                }
            }

            let closed = period_start;
            let next_start = closed + self.granularity.time_delta();
            tracing::debug!(boundary = %closed, "Period closed");
            if boundary_tx
                .send(PipelineInput::BoundaryClosed(closed))
                .await
                .is_err()
            {
                tracing::info!("Pipeline channel closed, boundary timer exiting");
                return;
            }

            match self.mode {
                TimerMode::FixedPeriod => {
                    period_start = next_start;
                    delay = self.granularity.duration();
                }
                TimerMode::Reanchor => {
                    let wall = self.clock.now();
                    let anchored = boundary_of(self.granularity, wall.max(next_start));
                    if anchored > next_start {
                        tracing::warn!(
                            expected = %next_start,
                            resumed_at = %anchored,
                            "Boundary timer fired late, skipping missed period"
                        );
                    }
                    period_start = anchored;
                    delay = (anchored + self.granularity.time_delta() - wall)
                        .to_std()
                        .unwrap_or(Duration::ZERO);
                }
            }
        }
    }
}
