/*!
 * Scheduler Core Operations
 * Create, terminate, schedule and run operations
 */

use super::{ScheduleOutcome, Scheduler};
use crate::core::limits::STACK_ALIGNMENT;
use crate::core::types::{align_up, Pid, Size};
use crate::memory::{AllocationRequest, Allocator, BlockKind};
use crate::process::table::StackBlock;
use crate::process::traits::ProcessEntry;
use crate::process::types::{ProcessError, ProcessResult, ProcessState, StepOutcome};
use log::{debug, error, info, warn};
use std::sync::Arc;

impl Scheduler {
    /// Create a process in the lowest vacant slot
    ///
    /// The stack is pinned memory from `mem`: System kind for privileged
    /// processes, Application otherwise.
    pub fn create_process<A, E>(
        &mut self,
        mem: &mut A,
        entry: E,
        argument: u64,
        stack_size: Size,
        privileged: bool,
    ) -> ProcessResult<Pid>
    where
        A: Allocator + ?Sized,
        E: ProcessEntry + 'static,
    {
        if stack_size == 0 {
            return Err(ProcessError::InvalidStackSize(stack_size));
        }
        let Some(pid) = self.table.free_slot() else {
            warn!(
                "Process table full ({} slots), rejecting {}",
                self.table.capacity(),
                entry.name()
            );
            return Err(ProcessError::NoFreeSlot {
                capacity: self.table.capacity(),
            });
        };

        let kind = if privileged {
            BlockKind::System
        } else {
            BlockKind::Application
        };
        let request = AllocationRequest::new(stack_size)
            .with_kind(kind)
            .with_alignment(STACK_ALIGNMENT)
            .pinned();
        let base = mem.allocate(request).map_err(|source| {
            error!(
                "Stack allocation of {} bytes for {} failed: {}",
                stack_size,
                entry.name(),
                source
            );
            ProcessError::StackAllocationFailed { stack_size, source }
        })?;

        let stack = StackBlock {
            base,
            size: align_up(stack_size, STACK_ALIGNMENT),
        };
        let entry: Arc<dyn ProcessEntry> = Arc::new(entry);
        let name = entry.name().to_string();
        if self
            .table
            .install(pid, entry, stack, argument, privileged)
            .is_none()
        {
            // free_slot only returns in-range pids
            if let Err(e) = mem.free(base) {
                error!(
                    "Releasing stack 0x{:x} of uninstalled process {} failed: {}",
                    base, pid, e
                );
            }
            return Err(ProcessError::InvalidPid(pid));
        }

        self.stats.created += 1;
        info!(
            "Created process {} ({}) with {} byte stack at 0x{:x}{}",
            pid,
            name,
            stack.size,
            base,
            if privileged { " [privileged]" } else { "" }
        );
        Ok(pid)
    }

    /// Terminate `pid`, releasing its stack exactly once
    ///
    /// A Running process is replaced by the next Ready one.
    pub fn terminate<A>(&mut self, mem: &mut A, pid: Pid) -> ProcessResult<()>
    where
        A: Allocator + ?Sized,
    {
        self.table.live(pid)?;
        let pcb = self
            .table
            .get_mut(pid)
            .ok_or(ProcessError::InvalidPid(pid))?;
        let was_running = pcb.state == ProcessState::Running;
        pcb.state = ProcessState::Terminated;

        if let Some(stack) = pcb.stack.take() {
            if let Err(e) = mem.free(stack.base) {
                error!(
                    "Releasing stack 0x{:x} of process {} failed: {}",
                    stack.base, pid, e
                );
            }
        }
        self.stats.terminated += 1;
        info!("Terminated process {} ({})", pid, pcb.name());

        if was_running {
            self.table.set_current(None);
            self.schedule();
        }
        Ok(())
    }

    /// Pick the next Ready process after the last dispatched one
    pub fn schedule(&mut self) -> ScheduleOutcome {
        self.stats.schedule_calls += 1;
        let previous = self.table.current();

        if let Some(pid) = previous {
            if let Some(pcb) = self.table.get_mut(pid) {
                if pcb.state == ProcessState::Running {
                    pcb.state = ProcessState::Ready;
                }
            }
        }

        let capacity = self.table.capacity();
        let start = self.last.map_or(0, |pid| (pid as usize + 1) % capacity.max(1));
        let next = (0..capacity)
            .map(|i| ((start + i) % capacity) as Pid)
            .find(|&pid| {
                self.table
                    .get(pid)
                    .is_some_and(|pcb| pcb.state == ProcessState::Ready)
            });

        let Some(next) = next else {
            self.table.set_current(None);
            self.stats.idle_ticks += 1;
            debug!("No process ready, CPU idle");
            return ScheduleOutcome::Idle;
        };

        if previous == Some(next) {
            if let Some(pcb) = self.table.get_mut(next) {
                pcb.state = ProcessState::Running;
            }
            return ScheduleOutcome::Continued(next);
        }

        // save the outgoing context if its owner is still alive
        if let Some(pcb) = previous.and_then(|pid| self.table.get_mut(pid)) {
            if pcb.state.is_live() {
                pcb.context = self.cpu;
            }
        }
        if let Some(pcb) = self.table.get_mut(next) {
            pcb.state = ProcessState::Running;
            pcb.dispatches += 1;
            self.cpu = pcb.context;
        }
        self.table.set_current(Some(next));
        self.last = Some(next);
        self.stats.dispatches += 1;
        self.stats.context_switches += 1;

        debug!("Context switch {:?} -> {}", previous, next);
        ScheduleOutcome::Switched {
            from: previous,
            to: next,
        }
    }

    /// Execute one step of the Running process on the CPU
    ///
    /// `Yield` reschedules, `Exit` terminates the process. Returns `None`
    /// when nothing is Running.
    pub fn run_current<A>(&mut self, mem: &mut A) -> ProcessResult<Option<(Pid, StepOutcome)>>
    where
        A: Allocator + ?Sized,
    {
        let Some(pid) = self.table.current() else {
            return Ok(None);
        };
        let entry = self
            .table
            .get(pid)
            .and_then(|pcb| pcb.entry.clone())
            .ok_or(ProcessError::InvalidPid(pid))?;

        self.cpu.program_counter += 1;
        self.cpu.steps += 1;
        self.stats.steps += 1;
        let outcome = entry.step(&mut self.cpu);

        match outcome {
            StepOutcome::Exit => {
                debug!("Process {} exited after {} steps", pid, self.cpu.steps);
                if let Some(pcb) = self.table.get_mut(pid) {
                    pcb.context = self.cpu;
                }
                self.terminate(mem, pid)?;
            }
            StepOutcome::Yield => {
                self.schedule();
            }
            StepOutcome::Continue => {}
        }
        Ok(Some((pid, outcome)))
    }
}
