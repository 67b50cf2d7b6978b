/*!
 * Kernel Configuration
 * Boot-time settings for the memory and process subsystems
 *
 * Settings come from three places, later ones winning:
 * - built-in defaults (see `limits`)
 * - a JSON document (`KernelConfig::from_json`)
 * - `CEREBRO_*` environment variables (`KernelConfig::apply_env`)
 */

use super::errors::ConfigError;
use super::limits;
use super::types::checked_align_up;
use crate::memory::{AllocationStrategy, PoolClassId};
use serde::{Deserialize, Serialize};

/// One pool size class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolClassConfig {
    pub block_size: usize,
    pub capacity: usize,
}

impl PoolClassConfig {
    pub const fn new(block_size: usize, capacity: usize) -> Self {
        Self {
            block_size,
            capacity,
        }
    }

    /// Bytes reserved for this class, `None` on overflow
    pub const fn reserved(&self) -> Option<usize> {
        self.block_size.checked_mul(self.capacity)
    }
}

/// Usage ratios at which pressure levels begin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressureThresholds {
    pub moderate: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for PressureThresholds {
    fn default() -> Self {
        Self {
            moderate: limits::PRESSURE_MODERATE_RATIO,
            high: limits::PRESSURE_HIGH_RATIO,
            critical: limits::PRESSURE_CRITICAL_RATIO,
        }
    }
}

/// Memory manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub total_memory: usize,
    pub base_address: usize,
    pub strategy: AllocationStrategy,
    pub pools_enabled: bool,
    /// Tiny, small and medium classes, ascending block size
    pub pools: [PoolClassConfig; 3],
    pub enable_compression: bool,
    pub compression_threshold: usize,
    /// Fragmentation percentage that triggers an optimize pass after a free
    pub defrag_threshold: f64,
    pub pressure: PressureThresholds,
    pub min_block_size: usize,
    /// Whether trailing free heap space may be released back to the platform
    pub allow_trim: bool,
    /// System memory reserved at boot (0 = none)
    pub system_reserve: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            total_memory: limits::DEFAULT_TOTAL_MEMORY,
            base_address: limits::DEFAULT_BASE_ADDRESS,
            strategy: AllocationStrategy::BestFit,
            pools_enabled: true,
            pools: [
                PoolClassConfig::new(limits::TINY_BLOCK_SIZE, limits::TINY_POOL_CAPACITY),
                PoolClassConfig::new(limits::SMALL_BLOCK_SIZE, limits::SMALL_POOL_CAPACITY),
                PoolClassConfig::new(limits::MEDIUM_BLOCK_SIZE, limits::MEDIUM_POOL_CAPACITY),
            ],
            enable_compression: true,
            compression_threshold: limits::COMPRESSION_THRESHOLD,
            defrag_threshold: limits::DEFAULT_DEFRAG_THRESHOLD,
            pressure: PressureThresholds::default(),
            min_block_size: limits::MIN_BLOCK_SIZE,
            allow_trim: false,
            system_reserve: 0,
        }
    }
}

impl MemoryConfig {
    /// Default configuration with a different memory size
    pub fn with_total(total_memory: usize) -> Self {
        Self {
            total_memory,
            ..Self::default()
        }
    }

    /// Plain first-fit heap: no pools, no compression
    pub fn first_fit_only(total_memory: usize) -> Self {
        Self {
            total_memory,
            strategy: AllocationStrategy::FirstFit,
            pools_enabled: false,
            enable_compression: false,
            ..Self::default()
        }
    }

    pub fn without_pools(mut self) -> Self {
        self.pools_enabled = false;
        self
    }

    pub fn with_strategy(mut self, strategy: AllocationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Bytes carved out of `total_memory` for the pools (saturating)
    pub fn pool_reserve(&self) -> usize {
        self.checked_pool_reserve().unwrap_or(usize::MAX)
    }

    /// Bytes carved out for the pools, `None` when the sum overflows
    pub fn checked_pool_reserve(&self) -> Option<usize> {
        if !self.pools_enabled {
            return Some(0);
        }
        self.pools
            .iter()
            .try_fold(0usize, |acc, class| acc.checked_add(class.reserved()?))
    }

    /// One past the last heap byte once the layout is placed at `base_address`
    ///
    /// `None` when pools plus heap do not fit in the address space.
    pub fn address_space_end(&self) -> Option<usize> {
        let reserve = self.checked_pool_reserve()?;
        let base = checked_align_up(self.base_address.max(limits::GRAIN), limits::HEAP_ALIGNMENT)?;
        let heap_start = checked_align_up(base.checked_add(reserve)?, limits::HEAP_ALIGNMENT)?;
        heap_start.checked_add(self.total_memory.checked_sub(reserve)?)
    }

    pub fn pool_class(&self, class: PoolClassId) -> PoolClassConfig {
        self.pools[class.index()]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_memory == 0 {
            return Err(ConfigError::Invalid("total_memory must be non-zero".into()));
        }
        if self.min_block_size == 0 || self.min_block_size % limits::GRAIN != 0 {
            return Err(ConfigError::Invalid(format!(
                "min_block_size {} must be a non-zero multiple of {}",
                self.min_block_size,
                limits::GRAIN
            )));
        }
        if self.pools_enabled {
            let mut previous = 0;
            for class in &self.pools {
                if class.block_size <= previous || class.block_size % limits::GRAIN != 0 {
                    return Err(ConfigError::Invalid(format!(
                        "pool block sizes must be ascending multiples of {} (got {})",
                        limits::GRAIN,
                        class.block_size
                    )));
                }
                if class.capacity == 0 {
                    return Err(ConfigError::Invalid(format!(
                        "pool class of {} bytes has zero capacity",
                        class.block_size
                    )));
                }
                previous = class.block_size;
            }
        }
        let reserve = self.checked_pool_reserve().ok_or_else(|| {
            ConfigError::Invalid("pool reservation overflows the address space".into())
        })?;
        let heap = self.total_memory.saturating_sub(reserve);
        if heap < limits::HEADER_SIZE + self.min_block_size {
            return Err(ConfigError::Invalid(format!(
                "pools reserve {} of {} bytes, leaving no room for the heap",
                reserve, self.total_memory
            )));
        }
        if self.address_space_end().is_none() {
            return Err(ConfigError::Invalid(format!(
                "{} bytes at base 0x{:x} overflow the address space",
                self.total_memory, self.base_address
            )));
        }
        let p = &self.pressure;
        if !(0.0 < p.moderate && p.moderate < p.high && p.high < p.critical && p.critical <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "pressure thresholds must satisfy 0 < moderate < high < critical <= 1 (got {} / {} / {})",
                p.moderate, p.high, p.critical
            )));
        }
        if !(0.0..=100.0).contains(&self.defrag_threshold) {
            return Err(ConfigError::Invalid(format!(
                "defrag_threshold {} is not a percentage",
                self.defrag_threshold
            )));
        }
        if self.system_reserve >= heap {
            return Err(ConfigError::Invalid(format!(
                "system_reserve {} does not fit in a {} byte heap",
                self.system_reserve, heap
            )));
        }
        Ok(())
    }
}

/// Process subsystem configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Process table capacity, fixed at boot
    pub capacity: usize,
    pub default_stack_size: usize,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            capacity: limits::MAX_PROCESSES,
            default_stack_size: limits::DEFAULT_STACK_SIZE,
        }
    }
}

impl ProcessConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 || self.capacity > u32::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "process capacity {} out of range",
                self.capacity
            )));
        }
        if self.default_stack_size == 0 {
            return Err(ConfigError::Invalid("default_stack_size must be non-zero".into()));
        }
        Ok(())
    }
}

/// Complete boot configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub memory: MemoryConfig,
    pub process: ProcessConfig,
}

impl KernelConfig {
    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `CEREBRO_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CEREBRO_*` environment overrides on top of the current values
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(total) = env_var("CEREBRO_TOTAL_MEMORY") {
            self.memory.total_memory = parse_number("CEREBRO_TOTAL_MEMORY", &total)?;
        }
        if let Some(strategy) = env_var("CEREBRO_STRATEGY") {
            self.memory.strategy = AllocationStrategy::from_str(&strategy).ok_or_else(|| {
                ConfigError::Env {
                    key: "CEREBRO_STRATEGY".into(),
                    value: strategy.clone(),
                }
            })?;
        }
        if let Some(pools) = env_var("CEREBRO_POOLS") {
            self.memory.pools_enabled = parse_flag("CEREBRO_POOLS", &pools)?;
        }
        if let Some(compression) = env_var("CEREBRO_COMPRESSION") {
            self.memory.enable_compression = parse_flag("CEREBRO_COMPRESSION", &compression)?;
        }
        if let Some(capacity) = env_var("CEREBRO_MAX_PROCESSES") {
            self.process.capacity = parse_number("CEREBRO_MAX_PROCESSES", &capacity)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.memory.validate()?;
        self.process.validate()
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_number(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        key: key.into(),
        value: value.into(),
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::Env {
            key: key.into(),
            value: value.into(),
        }),
    }
}
