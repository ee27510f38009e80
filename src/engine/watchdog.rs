use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// How often the controller wakes to check for exit and forward tailed lines.
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Source of the engine log's current byte size. `None` means the log does not exist yet.
pub trait LogSizeProbe {
    fn size(&self) -> Option<u64>;
}

impl<F> LogSizeProbe for F
where
    F: Fn() -> Option<u64>,
{
    fn size(&self) -> Option<u64> {
        self()
    }
}

#[derive(Debug, Clone)]
pub struct FileSizeProbe {
    pub path: PathBuf,
}

impl LogSizeProbe for FileSizeProbe {
    fn size(&self) -> Option<u64> {
        std::fs::metadata(&self.path).ok().map(|meta| meta.len())
    }
}

/// The engine process as seen by the sampling loop.
pub trait SupervisedChild {
    /// `Ok(Some(code))` once exited; the code is `None` when the process died by signal.
    fn try_exit(&mut self) -> io::Result<Option<Option<i32>>>;
    /// Best-effort forced termination followed by reaping.
    fn terminate(&mut self) -> io::Result<Option<i32>>;
}

impl SupervisedChild for std::process::Child {
    fn try_exit(&mut self) -> io::Result<Option<Option<i32>>> {
        Ok(self.try_wait()?.map(|status| status.code()))
    }

    fn terminate(&mut self) -> io::Result<Option<i32>> {
        let _ = self.kill();
        Ok(self.wait()?.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogSettings {
    pub idle_timeout: Duration,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogState {
    pub last_size: u64,
    pub last_growth: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogVerdict {
    Progressing,
    Idle(Duration),
    Expired(Duration),
}

/// Idle timer driven by log-size samples. Growth resets the timer; anything else lets
/// it run.
#[derive(Debug, Clone)]
pub struct Watchdog {
    idle_timeout: Duration,
    state: WatchdogState,
}

impl Watchdog {
    pub fn new(idle_timeout: Duration, baseline_size: u64, now: Instant) -> Self {
        Self {
            idle_timeout,
            state: WatchdogState {
                last_size: baseline_size,
                last_growth: now,
            },
        }
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    pub fn observe(&mut self, size: u64, now: Instant) -> WatchdogVerdict {
        if size > self.state.last_size {
            self.state = WatchdogState {
                last_size: size,
                last_growth: now,
            };
            return WatchdogVerdict::Progressing;
        }
        let idle = now.saturating_duration_since(self.state.last_growth);
        if idle > self.idle_timeout {
            WatchdogVerdict::Expired(idle)
        } else {
            WatchdogVerdict::Idle(idle)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    Exited { code: Option<i32> },
    IdleTimeout { idle: Duration, code: Option<i32> },
}

/// Polls `child` until it exits, sampling the log size every `poll_interval` when a
/// watchdog is configured and terminating the child once it has been idle for longer
/// than the timeout. `on_tick` runs on every wake-up so the caller can forward output.
pub fn monitor(
    child: &mut dyn SupervisedChild,
    clock: &dyn Clock,
    probe: &dyn LogSizeProbe,
    watchdog: Option<WatchdogSettings>,
    on_tick: &mut dyn FnMut(),
) -> io::Result<MonitorOutcome> {
    let start = clock.now();
    let baseline = probe.size().unwrap_or(0);
    let mut timer = watchdog
        .map(|settings| (settings, Watchdog::new(settings.idle_timeout, baseline, start)));
    let mut next_sample = watchdog.map(|settings| start + settings.poll_interval);
    let tick = watchdog
        .map(|settings| settings.poll_interval.min(EXIT_POLL_INTERVAL))
        .unwrap_or(EXIT_POLL_INTERVAL);

    loop {
        on_tick();
        if let Some(code) = child.try_exit()? {
            return Ok(MonitorOutcome::Exited { code });
        }

        if let (Some((settings, timer)), Some(due)) = (timer.as_mut(), next_sample.as_mut()) {
            let now = clock.now();
            if now >= *due {
                *due = now + settings.poll_interval;
                let size = probe.size().unwrap_or(0);
                if let WatchdogVerdict::Expired(idle) = timer.observe(size, now) {
                    let code = child.terminate()?;
                    return Ok(MonitorOutcome::IdleTimeout { idle, code });
                }
            }
        }

        clock.sleep(tick);
    }
}
