//! CPU and memory utilisation readings.
//!
//! CPU is derived from two consecutive samples of this process's consumed
//! CPU time: `(Δuser + Δsystem) / Δwall / cores * 100`. Memory comes from
//! the OS free/total figures via `sysinfo`.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sysinfo::System;

/// Below this wall-clock delta the CPU ratio is too noisy to publish.
const MIN_SAMPLE_WINDOW: Duration = Duration::from_millis(10);

/// Reads raw figures from the operating system.
pub trait SystemProbe: Send + Sync {
    /// Total user + system CPU time consumed by this process, if known.
    fn process_cpu_time(&self) -> Option<Duration>;
    /// `(total, free)` memory in bytes.
    fn memory(&self) -> (u64, u64);
    /// One-minute load average.
    fn load_average_one(&self) -> f64;
    fn logical_cores(&self) -> usize;
}

/// Probe backed by `/proc` (CPU time), `sysinfo` and `num_cpus`.
pub struct OsProbe {
    system: Mutex<System>,
}

impl OsProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for OsProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbe for OsProbe {
    #[cfg(target_os = "linux")]
    fn process_cpu_time(&self) -> Option<Duration> {
        // USER_HZ is fixed at 100 by the Linux ABI.
        const CLOCK_TICKS_PER_SEC: u64 = 100;

        let stat = std::fs::read_to_string("/proc/self/stat").ok()?;
        // The command name may contain spaces; fields resume after ')'.
        let rest = &stat[stat.rfind(')')? + 1..];
        let fields: Vec<&str> = rest.split_whitespace().collect();
        // utime and stime are fields 14 and 15 of the full line.
        let utime: u64 = fields.get(11)?.parse().ok()?;
        let stime: u64 = fields.get(12)?.parse().ok()?;
        let ticks = utime + stime;
        Some(Duration::from_millis(ticks * 1000 / CLOCK_TICKS_PER_SEC))
    }

    #[cfg(not(target_os = "linux"))]
    fn process_cpu_time(&self) -> Option<Duration> {
        None
    }

    fn memory(&self) -> (u64, u64) {
        let mut system = self.system.lock();
        system.refresh_memory();
        (system.total_memory(), system.free_memory())
    }

    fn load_average_one(&self) -> f64 {
        System::load_average().one
    }

    fn logical_cores(&self) -> usize {
        num_cpus::get()
    }
}

#[derive(Debug, Clone, Copy)]
struct CpuBaseline {
    cpu_time: Option<Duration>,
    at: Instant,
}

/// Turns probe readings into rounded utilisation percentages.
///
/// Holds the previous CPU sample; every call to
/// [`ResourceSampler::sample_cpu_percent`] replaces it.
pub struct ResourceSampler {
    probe: Box<dyn SystemProbe>,
    baseline: Mutex<CpuBaseline>,
}

impl ResourceSampler {
    pub fn new(probe: impl SystemProbe + 'static) -> Self {
        let baseline = CpuBaseline {
            cpu_time: probe.process_cpu_time(),
            at: Instant::now(),
        };
        Self {
            probe: Box::new(probe),
            baseline: Mutex::new(baseline),
        }
    }

    pub fn from_os() -> Self {
        Self::new(OsProbe::new())
    }

    /// Average utilisation of one logical core since the previous call.
    ///
    /// Returns 0 when called again within 10 ms; falls back to the load
    /// average when the ratio is not finite.
    pub fn sample_cpu_percent(&self) -> f64 {
        self.sample_cpu_percent_at(Instant::now())
    }

    fn sample_cpu_percent_at(&self, now: Instant) -> f64 {
        let cpu_time = self.probe.process_cpu_time();
        let previous = {
            let mut baseline = self.baseline.lock();
            std::mem::replace(&mut *baseline, CpuBaseline { cpu_time, at: now })
        };

        let wall = now.saturating_duration_since(previous.at);
        if wall < MIN_SAMPLE_WINDOW {
            return 0.0;
        }

        let cores = self.probe.logical_cores().max(1) as f64;
        let ratio = match (cpu_time, previous.cpu_time) {
            (Some(current), Some(before)) => {
                let used = current.saturating_sub(before).as_secs_f64();
                used / wall.as_secs_f64() / cores * 100.0
            }
            _ => f64::NAN,
        };

        if ratio.is_finite() {
            round2(ratio)
        } else {
            round2(self.probe.load_average_one() / cores * 100.0)
        }
    }

    /// Share of physical memory in use.
    pub fn sample_memory_percent(&self) -> f64 {
        let (total, free) = self.probe.memory();
        if total == 0 {
            return 0.0;
        }
        let used = total.saturating_sub(free) as f64;
        round2(used / total as f64 * 100.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;

    /// Probe with scripted readings.
    #[derive(Clone, Default)]
    pub(crate) struct FakeProbe {
        pub cpu_time: Arc<Mutex<Option<Duration>>>,
        pub memory: (u64, u64),
        pub load_one: f64,
        pub cores: usize,
    }

    impl SystemProbe for FakeProbe {
        fn process_cpu_time(&self) -> Option<Duration> {
            *self.cpu_time.lock()
        }
        fn memory(&self) -> (u64, u64) {
            self.memory
        }
        fn load_average_one(&self) -> f64 {
            self.load_one
        }
        fn logical_cores(&self) -> usize {
            self.cores
        }
    }

    fn probe(cores: usize) -> FakeProbe {
        FakeProbe {
            cpu_time: Arc::new(Mutex::new(Some(Duration::ZERO))),
            memory: (1000, 250),
            load_one: 0.5,
            cores,
        }
    }

    #[test]
    fn back_to_back_samples_return_zero() {
        let sampler = ResourceSampler::from_os();
        let _ = sampler.sample_cpu_percent();
        assert_eq!(sampler.sample_cpu_percent(), 0.0);
    }

    #[test]
    fn short_window_still_moves_baseline() {
        let fake = probe(1);
        let sampler = ResourceSampler::new(fake.clone());
        let start = sampler.baseline.lock().at;

        *fake.cpu_time.lock() = Some(Duration::from_millis(5));
        assert_eq!(sampler.sample_cpu_percent_at(start + Duration::from_millis(5)), 0.0);

        // 100ms of CPU over the 1s since the *moved* baseline
        *fake.cpu_time.lock() = Some(Duration::from_millis(105));
        let pct = sampler.sample_cpu_percent_at(start + Duration::from_millis(1005));
        assert_eq!(pct, 10.0);
    }

    #[test]
    fn cpu_is_averaged_across_cores() {
        let fake = probe(4);
        let sampler = ResourceSampler::new(fake.clone());
        let start = sampler.baseline.lock().at;

        *fake.cpu_time.lock() = Some(Duration::from_millis(2000));
        let pct = sampler.sample_cpu_percent_at(start + Duration::from_secs(1));
        assert_eq!(pct, 50.0);
    }

    #[test]
    fn cpu_is_rounded_to_two_decimals() {
        let fake = probe(3);
        let sampler = ResourceSampler::new(fake.clone());
        let start = sampler.baseline.lock().at;

        *fake.cpu_time.lock() = Some(Duration::from_millis(100));
        let pct = sampler.sample_cpu_percent_at(start + Duration::from_secs(1));
        assert_eq!(pct, 3.33);
    }

    #[test]
    fn missing_cpu_time_falls_back_to_load_average() {
        let fake = probe(2);
        *fake.cpu_time.lock() = None;
        let sampler = ResourceSampler::new(fake);
        let start = sampler.baseline.lock().at;

        let pct = sampler.sample_cpu_percent_at(start + Duration::from_secs(1));
        assert_eq!(pct, 25.0);
    }

    #[test]
    fn memory_percent_uses_total_minus_free() {
        let sampler = ResourceSampler::new(probe(1));
        assert_eq!(sampler.sample_memory_percent(), 75.0);
    }

    #[test]
    fn zero_total_memory_reads_as_zero() {
        let mut fake = probe(1);
        fake.memory = (0, 0);
        let sampler = ResourceSampler::new(fake);
        assert_eq!(sampler.sample_memory_percent(), 0.0);
    }

    #[test]
    fn os_memory_reading_is_a_percentage() {
        let pct = ResourceSampler::from_os().sample_memory_percent();
        assert!((0.0..=100.0).contains(&pct));
    }
}
