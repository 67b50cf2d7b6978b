/*!
 * Process Types
 * Common types for process management
 */

use crate::core::limits::SAVED_REGISTERS;
use crate::core::types::{Address, Pid, Size};
use crate::memory::MemoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Process operation result
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Process errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Process table full: all {capacity} slots in use")]
    NoFreeSlot { capacity: usize },

    #[error("Stack allocation of {stack_size} bytes failed: {source}")]
    StackAllocationFailed {
        stack_size: Size,
        #[source]
        source: MemoryError,
    },

    #[error("Invalid process id: {0}")]
    InvalidPid(Pid),

    #[error("Process {0} already terminated")]
    AlreadyTerminated(Pid),

    #[error("Invalid stack size: {0}")]
    InvalidStackSize(Size),
}

impl ProcessError {
    /// True when process creation failed for lack of memory
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::StackAllocationFailed { source, .. } if source.is_exhaustion())
    }
}

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Slot is unused or being set up
    #[default]
    New,
    /// Process is ready to run
    Ready,
    /// Process is currently running
    Running,
    /// Reserved for blocking I/O; nothing enters it yet
    Waiting,
    /// Process has terminated, slot is reusable
    Terminated,
}

impl ProcessState {
    /// Whether a slot in this state can take a new process
    #[inline]
    pub fn is_vacant(self) -> bool {
        matches!(self, Self::New | Self::Terminated)
    }

    /// Whether a process in this state still owns its stack
    #[inline]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Ready | Self::Running | Self::Waiting)
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ProcessState::New => write!(f, "NEW"),
            ProcessState::Ready => write!(f, "READY"),
            ProcessState::Running => write!(f, "RUNNING"),
            ProcessState::Waiting => write!(f, "WAITING"),
            ProcessState::Terminated => write!(f, "TERMINATED"),
        }
    }
}

/// What a process asks for after one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Give up the CPU; the scheduler picks the next process
    Yield,
    /// Keep the CPU until the timer preempts
    Continue,
    /// Process finished; its stack is released
    Exit,
}

/// Saved register file of a process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub program_counter: u64,
    pub stack_pointer: Address,
    /// General purpose registers; register 0 carries the entry argument
    pub registers: [u64; SAVED_REGISTERS],
    pub stack_base: Address,
    pub stack_size: Size,
    /// Steps executed so far
    pub steps: u64,
}

impl ExecutionContext {
    /// Fresh context: empty stack, argument bound into register 0
    pub fn initial(stack_base: Address, stack_size: Size, argument: u64) -> Self {
        let mut registers = [0; SAVED_REGISTERS];
        registers[0] = argument;
        Self {
            program_counter: 0,
            // stacks grow down from the top of the block
            stack_pointer: stack_base + stack_size,
            registers,
            stack_base,
            stack_size,
            steps: 0,
        }
    }

    /// The argument the process was created with
    #[inline]
    pub fn argument(&self) -> u64 {
        self.registers[0]
    }
}

/// Process metadata snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub name: String,
    pub state: ProcessState,
    pub privileged: bool,
    pub stack_base: Address,
    pub stack_size: Size,
    pub dispatches: u64,
    pub steps: u64,
}
