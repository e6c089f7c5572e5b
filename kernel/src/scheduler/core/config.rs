//! Scheduler configuration
//!
//! Boot-time constants consumed by the scheduler core. The policy is chosen
//! once, when the configuration is built, and never re-parsed on the hot path.

use core::str::FromStr;

use super::error::{SchedulerError, SchedulerResult};

/// Default number of priority levels
pub const DEFAULT_LEVELS: usize = 3;

/// Default shared budget of one level (ticks)
pub const DEFAULT_LEVEL_QUANTUM: i32 = 10;

/// Default budget of one process (ticks)
pub const DEFAULT_PROC_QUANTUM: i32 = 4;

/// Level a plain `fork` starts from
pub const DEFAULT_STARTING_LEVEL: usize = 0;

/// Process table size
pub const NPROC: usize = 64;

/// Maximum number of CPUs
pub const NCPU: usize = 8;

/// Scheduling policy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum SchedulingPolicy {
    /// Plain scan over the process table, no run queues
    Fifo = 0,
    /// Single run queue, quantum reset on every requeue
    RoundRobin = 1,
    /// Multi-level feedback with active and expired sets
    #[default]
    Mqss = 2,
}

impl SchedulingPolicy {
    /// Does this policy keep run queues?
    pub fn uses_queues(&self) -> bool {
        !matches!(self, Self::Fifo)
    }

    /// Short name used in dumps and logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fifo => "FIFO",
            Self::RoundRobin => "RR",
            Self::Mqss => "MQSS",
        }
    }
}

impl FromStr for SchedulingPolicy {
    type Err = SchedulerError;

    /// Prefix match: `MQSS...` and `RR...` select the queue policies,
    /// anything else falls back to the table scan.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with("MQSS") {
            Ok(Self::Mqss)
        } else if s.starts_with("RR") {
            Ok(Self::RoundRobin)
        } else {
            Ok(Self::Fifo)
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedConfig {
    /// Scheduling policy
    pub policy: SchedulingPolicy,

    /// Number of priority levels (1 = round robin)
    pub levels: usize,

    /// Budget shared by all active occupants of one level
    pub level_quantum: i32,

    /// Budget of one process per dispatch
    pub proc_quantum: i32,

    /// Home level of processes created without explicit priority
    pub starting_level: usize,

    /// Process table size
    pub max_procs: usize,

    /// Number of CPUs running a dispatch loop
    pub ncpu: usize,
}

impl SchedConfig {
    /// Multi-level feedback defaults
    pub const fn mqss() -> Self {
        Self {
            policy: SchedulingPolicy::Mqss,
            levels: DEFAULT_LEVELS,
            level_quantum: DEFAULT_LEVEL_QUANTUM,
            proc_quantum: DEFAULT_PROC_QUANTUM,
            starting_level: DEFAULT_STARTING_LEVEL,
            max_procs: NPROC,
            ncpu: NCPU,
        }
    }

    /// Single-queue round robin
    pub const fn round_robin() -> Self {
        Self {
            policy: SchedulingPolicy::RoundRobin,
            levels: 1,
            starting_level: 0,
            ..Self::mqss()
        }
    }

    /// Table scan without queues
    pub const fn fifo() -> Self {
        Self {
            policy: SchedulingPolicy::Fifo,
            levels: 1,
            starting_level: 0,
            ..Self::mqss()
        }
    }

    /// Builder-style level count
    pub const fn with_levels(mut self, levels: usize) -> Self {
        self.levels = levels;
        self
    }

    /// Builder-style quantums
    pub const fn with_quantums(mut self, level_quantum: i32, proc_quantum: i32) -> Self {
        self.level_quantum = level_quantum;
        self.proc_quantum = proc_quantum;
        self
    }

    /// Builder-style starting level
    pub const fn with_starting_level(mut self, level: usize) -> Self {
        self.starting_level = level;
        self
    }

    /// Builder-style table and CPU sizes
    pub const fn with_capacity(mut self, max_procs: usize, ncpu: usize) -> Self {
        self.max_procs = max_procs;
        self.ncpu = ncpu;
        self
    }

    /// Policy actually executed: MQSS with a single level degenerates to
    /// round robin.
    pub fn effective_policy(&self) -> SchedulingPolicy {
        match self.policy {
            SchedulingPolicy::Mqss if self.levels == 1 => SchedulingPolicy::RoundRobin,
            policy => policy,
        }
    }

    /// Validate parameters
    pub fn validate(&self) -> SchedulerResult<()> {
        let reason = if self.levels == 0 {
            Some("levels must be at least 1")
        } else if self.level_quantum <= 0 {
            Some("level quantum must be positive")
        } else if self.proc_quantum <= 0 {
            Some("process quantum must be positive")
        } else if self.starting_level >= self.levels {
            Some("starting level must be below levels")
        } else if self.max_procs == 0 {
            Some("process table cannot be empty")
        } else if self.ncpu == 0 {
            Some("at least one CPU is required")
        } else if self.policy == SchedulingPolicy::RoundRobin && self.levels != 1 {
            Some("round robin runs on a single level")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(SchedulerError::InvalidConfig { reason }),
            None => Ok(()),
        }
    }

    /// Parse `key=value` boot arguments on top of the MQSS defaults.
    ///
    /// Recognized keys: `sched`, `levels`, `level_quantum`, `proc_quantum`,
    /// `start_level`, `nproc`, `ncpu`. Unknown keys belong to other
    /// subsystems and are ignored. Selecting `sched=RR` or `sched=FIFO`
    /// forces a single level unless `levels` is given explicitly.
    pub fn from_boot_args(args: &str) -> SchedulerResult<Self> {
        let mut config = Self::mqss();
        let mut levels_given = false;

        for arg in args.split_whitespace() {
            let Some((key, value)) = arg.split_once('=') else {
                continue;
            };
            match key {
                "sched" => config.policy = value.parse()?,
                "levels" => {
                    config.levels = parse_number(value)?;
                    levels_given = true;
                }
                "level_quantum" => config.level_quantum = parse_number(value)?,
                "proc_quantum" => config.proc_quantum = parse_number(value)?,
                "start_level" => config.starting_level = parse_number(value)?,
                "nproc" => config.max_procs = parse_number(value)?,
                "ncpu" => config.ncpu = parse_number(value)?,
                _ => {}
            }
        }

        if !levels_given && config.policy != SchedulingPolicy::Mqss {
            config.levels = 1;
            config.starting_level = 0;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self::mqss()
    }
}

fn parse_number<T: FromStr>(value: &str) -> SchedulerResult<T> {
    value
        .parse()
        .map_err(|_| SchedulerError::InvalidConfig { reason: "malformed number in boot arguments" })
}
