/*!
 * Kernel Main Loop Test
 * Processes, memory and the timer driven together
 */

use cerebro_kernel::process::Named;
use cerebro_kernel::{
    BlockKind, ExecutionContext, Kernel, KernelConfig, MemoryConfig, ProcessState,
    RunLengthCompressor, StepOutcome,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn kernel() -> Kernel {
    let mut config = KernelConfig::default();
    config.memory = MemoryConfig::with_total(512 * 1024);
    config.process.capacity = 8;
    config.process.default_stack_size = 2048;
    Kernel::boot_with_compressor(config, Box::new(RunLengthCompressor)).expect("kernel boots")
}

#[test]
fn test_run_drains_all_processes() {
    let mut kernel = kernel();
    let finished = Arc::new(AtomicUsize::new(0));

    for steps in [2u64, 5, 9] {
        let finished = Arc::clone(&finished);
        kernel
            .spawn(
                Named::new(format!("count-{}", steps), move |ctx: &mut ExecutionContext| {
                    if ctx.steps >= ctx.argument() {
                        finished.fetch_add(1, Ordering::SeqCst);
                        StepOutcome::Exit
                    } else {
                        StepOutcome::Yield
                    }
                }),
                steps,
            )
            .unwrap();
    }

    let ran = kernel.run(1000).unwrap();
    assert!(ran < 1000);
    assert_eq!(finished.load(Ordering::SeqCst), 3);
    assert_eq!(kernel.scheduler().stats().terminated, 3);
    assert_eq!(kernel.scheduler().stats().steps, 2 + 5 + 9);
    assert_eq!(kernel.get_stats().used_memory, 0);
    assert!(kernel.processes().is_empty());
}

#[test]
fn test_process_names_are_reported() {
    let mut kernel = kernel();
    let pid = kernel
        .spawn(Named::new("dialer", |_: &mut ExecutionContext| StepOutcome::Yield), 0)
        .unwrap();
    let info = kernel.process_info(pid).unwrap();
    assert_eq!(info.name, "dialer");
    assert_eq!(info.state, ProcessState::Ready);
}

#[test]
fn test_cache_survives_scheduling() {
    let mut kernel = kernel();
    let picture = vec![0xABu8; 16 * 1024];
    let address = kernel.memory_mut().cache_alloc(&picture).unwrap();
    let scratch = kernel
        .allocate(1000, BlockKind::Temporary, 8, true)
        .unwrap();

    let yielder = |_: &mut ExecutionContext| StepOutcome::Yield;
    kernel.spawn(yielder, 0).unwrap();
    kernel.spawn(yielder, 0).unwrap();
    for _ in 0..10 {
        kernel.tick().unwrap();
    }
    assert_eq!(kernel.ticks(), 10);
    assert_eq!(kernel.memory().tick(), 10);

    kernel.memory_mut().optimize();
    assert_eq!(kernel.memory_mut().cache_read(address).unwrap(), picture);
    kernel.free(scratch).unwrap();
    kernel.memory().verify().unwrap();
}

#[test]
fn test_timer_thread_only_raises_flag() {
    let shared = kernel().into_shared();
    let timer = shared.lock().timer();
    let busy = |_: &mut ExecutionContext| StepOutcome::Continue;
    shared.lock().spawn(busy, 0).unwrap();
    shared.lock().spawn(busy, 0).unwrap();

    let interrupts = std::thread::spawn(move || {
        for _ in 0..50 {
            timer.fire();
        }
        timer
    });
    let timer = interrupts.join().unwrap();
    assert_eq!(timer.fired(), 50);
    assert_eq!(shared.lock().scheduler().stats().schedule_calls, 0);

    // Many interrupts collapse into one pending reschedule
    let mut kernel = shared.lock();
    kernel.tick().unwrap();
    assert!(!timer.is_pending());
    assert_eq!(kernel.scheduler().stats().schedule_calls, 1);
}
