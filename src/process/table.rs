/*!
 * Process Table
 * Fixed-capacity array of process control blocks
 *
 * The pid of a process is its slot index. Slots in state New or Terminated
 * are vacant and are reused lowest-index first.
 */

use super::traits::ProcessEntry;
use super::types::{ExecutionContext, ProcessError, ProcessInfo, ProcessResult, ProcessState};
use crate::core::types::{Address, Pid, Size};
use std::sync::Arc;

/// Stack memory owned by a live process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackBlock {
    pub base: Address,
    pub size: Size,
}

/// Process control block
#[derive(Default)]
pub struct ProcessControlBlock {
    pub pid: Pid,
    pub state: ProcessState,
    pub privileged: bool,
    pub entry: Option<Arc<dyn ProcessEntry>>,
    pub context: ExecutionContext,
    /// Released exactly once, on termination
    pub stack: Option<StackBlock>,
    /// Times this process was switched onto the CPU
    pub dispatches: u64,
}

impl ProcessControlBlock {
    fn vacant(pid: Pid) -> Self {
        Self {
            pid,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        self.entry.as_deref().map_or("", |e| e.name())
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            name: self.name().to_string(),
            state: self.state,
            privileged: self.privileged,
            stack_base: self.stack.map_or(0, |s| s.base),
            stack_size: self.stack.map_or(0, |s| s.size),
            dispatches: self.dispatches,
            steps: self.context.steps,
        }
    }
}

impl std::fmt::Debug for ProcessControlBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessControlBlock")
            .field("pid", &self.pid)
            .field("name", &self.name())
            .field("state", &self.state)
            .field("stack", &self.stack)
            .field("dispatches", &self.dispatches)
            .finish()
    }
}

#[derive(Debug)]
pub struct ProcessTable {
    slots: Vec<ProcessControlBlock>,
    current: Option<Pid>,
}

impl ProcessTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity as Pid).map(ProcessControlBlock::vacant).collect(),
            current: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Pid of the Running process
    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    pub(super) fn set_current(&mut self, pid: Option<Pid>) {
        self.current = pid;
    }

    pub fn get(&self, pid: Pid) -> Option<&ProcessControlBlock> {
        self.slots.get(pid as usize)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut ProcessControlBlock> {
        self.slots.get_mut(pid as usize)
    }

    /// Block of a pid that currently names a live process
    pub fn live(&self, pid: Pid) -> ProcessResult<&ProcessControlBlock> {
        let pcb = self.get(pid).ok_or(ProcessError::InvalidPid(pid))?;
        match pcb.state {
            ProcessState::Terminated => Err(ProcessError::AlreadyTerminated(pid)),
            ProcessState::New => Err(ProcessError::InvalidPid(pid)),
            _ => Ok(pcb),
        }
    }

    /// Lowest vacant slot
    pub fn free_slot(&self) -> Option<Pid> {
        self.slots
            .iter()
            .find(|pcb| pcb.state.is_vacant())
            .map(|pcb| pcb.pid)
    }

    /// Reset slot `pid` for a new process and mark it Ready
    pub(super) fn install(
        &mut self,
        pid: Pid,
        entry: Arc<dyn ProcessEntry>,
        stack: StackBlock,
        argument: u64,
        privileged: bool,
    ) -> Option<&ProcessControlBlock> {
        let pcb = self.slots.get_mut(pid as usize)?;
        *pcb = ProcessControlBlock {
            pid,
            state: ProcessState::Ready,
            privileged,
            entry: Some(entry),
            context: ExecutionContext::initial(stack.base, stack.size, argument),
            stack: Some(stack),
            dispatches: 0,
        };
        Some(pcb)
    }

    pub fn count_in(&self, state: ProcessState) -> usize {
        self.slots.iter().filter(|pcb| pcb.state == state).count()
    }

    /// Processes that still own a stack
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|pcb| pcb.state.is_live()).count()
    }

    pub fn info(&self, pid: Pid) -> Option<ProcessInfo> {
        self.get(pid)
            .filter(|pcb| pcb.state != ProcessState::New)
            .map(ProcessControlBlock::info)
    }

    /// Snapshots of every non-vacant slot
    pub fn list(&self) -> Vec<ProcessInfo> {
        self.slots
            .iter()
            .filter(|pcb| pcb.state.is_live())
            .map(ProcessControlBlock::info)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessControlBlock> {
        self.slots.iter()
    }
}
