// Render scheduling
//
// The capture engine draws its viewports only when asked. The RenderScheduler
// produces a fixed-period tick; on each tick the session renders every viewport
// and flushes the display surface once. Ticks are ordinary events on the
// session's event loop, so they never overlap engine calls.

use crate::engine::{CaptureEngine, SurfaceSize};
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Where the engine's rendered frames end up.
pub trait DisplaySurface {
    fn size(&self) -> SurfaceSize;

    /// Present whatever the engine drew since the last flush.
    fn flush(&mut self);
}

/// Surface without a window, used by the console binary.
#[derive(Debug)]
pub struct HeadlessSurface {
    size: SurfaceSize,
    flushes: u64,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: SurfaceSize { width, height },
            flushes: 0,
        }
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }
}

impl DisplaySurface for HeadlessSurface {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn flush(&mut self) {
        self.flushes += 1;
        tracing::trace!("Surface flushed ({} frames)", self.flushes);
    }
}

/// Render every viewport the engine knows about, then flush the surface once.
pub fn render_frame<E, S>(engine: &mut E, surface: &mut S)
where
    E: CaptureEngine + ?Sized,
    S: DisplaySurface + ?Sized,
{
    for viewport in engine.viewports() {
        engine.render_viewport(viewport);
    }
    surface.flush();
}

/// Fixed-period render ticker.
///
/// Disarmed until [`arm`](Self::arm) is called. While disarmed,
/// [`tick`](Self::tick) never resolves, so it can sit in a `select!` next to
/// other event sources without special casing.
#[derive(Debug)]
pub struct RenderScheduler {
    period: Duration,
    ticker: Option<Interval>,
    ticks: u64,
}

impl RenderScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            ticker: None,
            ticks: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_armed(&self) -> bool {
        self.ticker.is_some()
    }

    /// Ticks delivered since construction.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Start ticking every `period`, first tick one period from now.
    ///
    /// Replaces any ticker that is already running. Must be called from within
    /// a tokio runtime.
    pub fn arm(&mut self, period: Duration) {
        if self.disarm() {
            tracing::debug!("Render scheduler re-armed, previous ticker dropped");
        }

        let mut ticker = interval_at(Instant::now() + period, period);
        // A slow frame pushes the schedule back instead of bursting to catch up
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.period = period;
        self.ticker = Some(ticker);
        tracing::info!("Render scheduler armed ({:?} period)", period);
    }

    /// Stop ticking. Returns whether a ticker was running.
    pub fn disarm(&mut self) -> bool {
        let was_armed = self.ticker.take().is_some();
        if was_armed {
            tracing::info!("Render scheduler disarmed after {} ticks", self.ticks);
        }
        was_armed
    }

    /// Wait for the next tick.
    pub async fn tick(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
                self.ticks += 1;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
