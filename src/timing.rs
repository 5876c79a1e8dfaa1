use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};

/// Raised once by the interrupt handler; the loop polls it between steps and
/// races it against the cadence sleep.
pub type Shutdown = Signal<CriticalSectionRawMutex, ()>;

/// Monotonic millisecond clock with a suspend primitive.
pub trait Clock {
    /// Milliseconds since the epoch set at init. Never decreases.
    fn get_millis(&self) -> u64;

    /// Suspends for at least `ms` milliseconds.
    async fn delay(&mut self, ms: u64);
}

/// Clock backed by the embassy time driver.
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn init() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn get_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis()
    }

    async fn delay(&mut self, ms: u64) {
        Timer::after(Duration::from_millis(ms)).await;
    }
}
