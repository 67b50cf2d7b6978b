/*!
 * Kernel Context
 * Boot-time owner of the memory manager and the scheduler
 *
 * All subsystem state hangs off one `Kernel` value created at boot and
 * passed explicitly; tests simply boot as many kernels as they need.
 *
 * ## Driving models
 *
 * - Cooperative: the main loop calls `schedule()` / `tick()` directly
 * - Preemptive: an interrupt context holds a `TimerHandle` and only calls
 *   `fire()`; the main loop consumes the request in `service_timer()`
 *
 * Nothing here is reentrant. Hosts with real threads share the kernel as a
 * `SharedKernel` and hold the lock across each whole call.
 */

use crate::core::config::KernelConfig;
use crate::core::types::{Address, KernelResult, Pid, Size, Tick};
use crate::memory::{BlockKind, Compressor, MemoryManager, MemoryPressure, MemoryStats};
use crate::monitoring::span_operation;
use crate::process::{ProcessEntry, ProcessInfo, ScheduleOutcome, Scheduler, StepOutcome};
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Kernel shared between host threads; the lock covers entire calls
pub type SharedKernel = Arc<Mutex<Kernel>>;

/// Interrupt-side view of the kernel timer
///
/// Cloning is cheap and every clone refers to the same flag. `fire` never
/// touches the allocator or the process table.
#[derive(Debug, Clone, Default)]
pub struct TimerHandle {
    pending: Arc<AtomicBool>,
    fired: Arc<AtomicU64>,
}

impl TimerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a reschedule at the next kernel loop iteration
    pub fn fire(&self) {
        self.fired.fetch_add(1, Ordering::Relaxed);
        self.pending.store(true, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Total interrupts delivered
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }
}

/// The kernel
pub struct Kernel {
    config: KernelConfig,
    memory: MemoryManager,
    scheduler: Scheduler,
    timer: TimerHandle,
    ticks: Tick,
}

impl Kernel {
    /// Boot with the default (non-compressing) cache compressor
    pub fn boot(config: KernelConfig) -> KernelResult<Self> {
        let span = span_operation("kernel_boot");
        let _guard = span.enter();

        if let Err(e) = config.validate() {
            span.record_error(&e.to_string());
            return Err(e.into());
        }
        let memory = match MemoryManager::with_config(config.memory.clone()) {
            Ok(memory) => memory,
            Err(e) => {
                span.record_error(&e.to_string());
                return Err(e.into());
            }
        };
        let scheduler = Scheduler::new(config.process.capacity);

        info!(
            "Kernel booted: {} bytes of memory, {} process slots",
            config.memory.total_memory, config.process.capacity
        );
        span.record_result(true);
        Ok(Self {
            config,
            memory,
            scheduler,
            timer: TimerHandle::new(),
            ticks: 0,
        })
    }

    /// Boot with a specific cache compressor
    pub fn boot_with_compressor(
        config: KernelConfig,
        compressor: Box<dyn Compressor>,
    ) -> KernelResult<Self> {
        let mut kernel = Self::boot(config)?;
        kernel.memory = kernel.memory.with_compressor(compressor);
        Ok(kernel)
    }

    pub fn into_shared(self) -> SharedKernel {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut MemoryManager {
        &mut self.memory
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Handle for interrupt contexts
    pub fn timer(&self) -> TimerHandle {
        self.timer.clone()
    }

    /// Kernel loop iterations so far
    pub fn ticks(&self) -> Tick {
        self.ticks
    }

    // =========================================================================
    // Boundary operations
    // =========================================================================

    pub fn allocate(
        &mut self,
        size: Size,
        kind: BlockKind,
        alignment: Size,
        relocatable: bool,
    ) -> KernelResult<Address> {
        Ok(self.memory.allocate(size, kind, alignment, relocatable)?)
    }

    pub fn free(&mut self, address: Address) -> KernelResult<()> {
        Ok(self.memory.free(address)?)
    }

    pub fn pressure_level(&self) -> MemoryPressure {
        self.memory.pressure_level()
    }

    pub fn get_stats(&self) -> MemoryStats {
        self.memory.get_stats()
    }

    /// Create an unprivileged process
    pub fn create_process<E>(&mut self, entry: E, argument: u64, stack_size: Size) -> KernelResult<Pid>
    where
        E: ProcessEntry + 'static,
    {
        Ok(self
            .scheduler
            .create_process(&mut self.memory, entry, argument, stack_size, false)?)
    }

    /// Create a process whose stack is System memory
    pub fn create_privileged_process<E>(
        &mut self,
        entry: E,
        argument: u64,
        stack_size: Size,
    ) -> KernelResult<Pid>
    where
        E: ProcessEntry + 'static,
    {
        Ok(self
            .scheduler
            .create_process(&mut self.memory, entry, argument, stack_size, true)?)
    }

    /// Create an unprivileged process with the configured default stack size
    pub fn spawn<E>(&mut self, entry: E, argument: u64) -> KernelResult<Pid>
    where
        E: ProcessEntry + 'static,
    {
        let stack_size = self.config.process.default_stack_size;
        self.create_process(entry, argument, stack_size)
    }

    pub fn terminate(&mut self, pid: Pid) -> KernelResult<()> {
        Ok(self.scheduler.terminate(&mut self.memory, pid)?)
    }

    pub fn schedule(&mut self) -> ScheduleOutcome {
        self.scheduler.schedule()
    }

    pub fn process_info(&self, pid: Pid) -> Option<ProcessInfo> {
        self.scheduler.process_info(pid)
    }

    pub fn processes(&self) -> Vec<ProcessInfo> {
        self.scheduler.processes()
    }

    // =========================================================================
    // Main loop
    // =========================================================================

    /// Consume a pending timer interrupt by rescheduling
    pub fn service_timer(&mut self) -> Option<ScheduleOutcome> {
        if !self.timer.take() {
            return None;
        }
        let outcome = self.scheduler.schedule();
        debug!("Timer reschedule: {:?}", outcome);
        Some(outcome)
    }

    /// One kernel loop iteration: advance the clock, service the timer and
    /// run one step of the current process
    pub fn tick(&mut self) -> KernelResult<Option<(Pid, StepOutcome)>> {
        self.ticks += 1;
        self.memory.advance_tick();
        let serviced = self.service_timer().is_some();
        if !serviced && self.scheduler.current().is_none() {
            self.scheduler.schedule();
        }
        Ok(self.scheduler.run_current(&mut self.memory)?)
    }

    /// Cooperative main loop
    ///
    /// Stops after `max_ticks` iterations or once no process is left.
    /// Returns the number of iterations run.
    pub fn run(&mut self, max_ticks: u64) -> KernelResult<u64> {
        let span = span_operation("kernel_run");
        let _guard = span.enter();

        let mut ran = 0;
        while ran < max_ticks {
            let step = self.tick()?;
            ran += 1;
            if step.is_none() && self.scheduler.table().live_count() == 0 {
                debug!("No processes left after {} ticks", ran);
                break;
            }
        }
        span.record_items_processed(ran);
        Ok(ran)
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("ticks", &self.ticks)
            .field("memory", &self.memory)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
