//! Remote-build parallelism

use std::thread;

/// Jobs per host CPU when no core count is given
const CORES_PER_CPU: u32 = 50;

/// Load limit per host CPU when no load is given
const LOAD_PER_CPU: u32 = 2;

/// Number of CPUs on this machine, at least 1
pub fn host_cpu_count() -> u32 {
    thread::available_parallelism()
        .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

/// Resolves ninja `-j` and `-l` values. Each override is independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GomaPolicy {
    cores: Option<u32>,
    load: Option<u32>,
    cpu_count: u32,
}

impl GomaPolicy {
    pub fn new(cores: Option<u32>, load: Option<u32>) -> Self {
        Self::with_cpu_count(cores, load, host_cpu_count())
    }

    pub fn with_cpu_count(cores: Option<u32>, load: Option<u32>, cpu_count: u32) -> Self {
        Self {
            cores,
            load,
            cpu_count,
        }
    }

    pub fn cores(&self) -> u32 {
        self.cores
            .unwrap_or_else(|| self.cpu_count.saturating_mul(CORES_PER_CPU))
    }

    pub fn load(&self) -> u32 {
        self.load
            .unwrap_or_else(|| self.cpu_count.saturating_mul(LOAD_PER_CPU))
    }
}
