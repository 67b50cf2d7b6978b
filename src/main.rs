/*!
 * Cerebro Kernel - Main Entry Point
 *
 * Boots the kernel from `CEREBRO_*` environment settings and runs a short
 * demonstration workload:
 * - a clock process that yields every step
 * - a worker that fills the cache and exits
 * - a timer thread that requests preemption
 */

use cerebro_kernel::{
    init_tracing, BlockKind, ExecutionContext, Kernel, KernelConfig, RunLengthCompressor,
    StepOutcome,
};
use cerebro_kernel::process::Named;
use miette::IntoDiagnostic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const DEMO_TICKS: u64 = 200;

fn main() -> miette::Result<()> {
    init_tracing();

    info!("Cerebro kernel starting...");
    info!("================================================");

    let config = KernelConfig::from_env()?;
    info!(
        total_memory = config.memory.total_memory,
        strategy = config.memory.strategy.as_str(),
        pools = config.memory.pools_enabled,
        compression = config.memory.enable_compression,
        "Configuration loaded"
    );

    let shared = Kernel::boot_with_compressor(config, Box::new(RunLengthCompressor))?.into_shared();

    {
        let mut kernel = shared.lock();
        kernel.create_privileged_process(
            Named::new("clock", |_: &mut ExecutionContext| StepOutcome::Yield),
            0,
            1024,
        )?;
        kernel.spawn(
            Named::new("worker", |ctx: &mut ExecutionContext| {
                if ctx.steps >= ctx.argument() {
                    StepOutcome::Exit
                } else {
                    StepOutcome::Continue
                }
            }),
            50,
        )?;

        let memory = kernel.memory_mut();
        for i in 0..8u8 {
            memory.cache_alloc(&vec![i; 8 * 1024]).into_diagnostic()?;
        }
        let scratch = kernel.allocate(2048, BlockKind::Temporary, 8, true)?;
        kernel.free(scratch)?;
    }

    // interrupt context: only ever raises the reschedule flag
    let timer = shared.lock().timer();
    let stop = Arc::new(AtomicBool::new(false));
    let ticker = {
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                timer.fire();
                std::thread::sleep(Duration::from_millis(1));
            }
        })
    };

    info!("Kernel entering main loop...");
    for _ in 0..DEMO_TICKS {
        shared.lock().tick()?;
    }
    stop.store(true, Ordering::Relaxed);
    ticker
        .join()
        .map_err(|_| miette::miette!("timer thread panicked"))?;

    let mut kernel = shared.lock();
    let report = kernel.memory_mut().optimize();
    info!(?report, "Final optimize pass");
    kernel.memory().dump_chain();

    let stats = kernel.get_stats();
    let summary = serde_json::to_string_pretty(&stats).into_diagnostic()?;
    info!("Memory statistics:\n{}", summary);
    info!(
        pressure = %kernel.pressure_level(),
        scheduler = ?kernel.scheduler().stats(),
        processes = kernel.processes().len(),
        "Kernel shutting down"
    );
    Ok(())
}
