/*!
 * Error Types
 * Centralized error handling with thiserror and miette diagnostics
 */

use miette::Diagnostic;
use thiserror::Error;

// Re-export subsystem errors
pub use crate::memory::MemoryError;
pub use crate::process::ProcessError;

/// Configuration errors
#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(config::invalid),
        help("Check pool sizes, thresholds and memory size against each other.")
    )]
    Invalid(String),

    #[error("Malformed configuration document: {0}")]
    #[diagnostic(code(config::parse), help("The configuration must be valid JSON."))]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value {value:?} for environment variable {key}")]
    #[diagnostic(
        code(config::env),
        help("Numbers must be decimal; flags accept 1/0, true/false, on/off.")
    )]
    Env { key: String, value: String },
}

/// Unified kernel error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum KernelError {
    #[error("Memory error: {0}")]
    #[diagnostic(
        code(kernel::memory),
        help("Memory allocation or deallocation failed. Check system memory usage.")
    )]
    Memory(#[from] MemoryError),

    #[error("Process error: {0}")]
    #[diagnostic(
        code(kernel::process),
        help("Process operation failed. Check the process table and PID validity.")
    )]
    Process(#[from] ProcessError),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(kernel::config))]
    Config(#[from] ConfigError),
}

impl KernelError {
    /// True when the underlying cause is memory exhaustion
    pub fn is_out_of_memory(&self) -> bool {
        match self {
            KernelError::Memory(err) => err.is_exhaustion(),
            KernelError::Process(err) => err.is_out_of_memory(),
            KernelError::Config(_) => false,
        }
    }
}
