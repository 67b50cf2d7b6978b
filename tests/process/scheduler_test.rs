/*!
 * Scheduler Test
 * Round-robin fairness, idling and context switching
 */

use cerebro_kernel::process::IdleLoop;
use cerebro_kernel::{
    ExecutionContext, Kernel, KernelConfig, MemoryConfig, ProcessState, ScheduleOutcome,
    StepOutcome,
};
use pretty_assertions::assert_eq;

fn kernel(capacity: usize) -> Kernel {
    let mut config = KernelConfig::default();
    config.memory = MemoryConfig::with_total(256 * 1024);
    config.process.capacity = capacity;
    config.process.default_stack_size = 2048;
    Kernel::boot(config).expect("kernel boots")
}

#[test]
fn test_round_robin_visits_every_process_once() {
    let mut kernel = kernel(8);
    let pids: Vec<_> = (0..5).map(|_| kernel.spawn(IdleLoop, 0).unwrap()).collect();
    assert_eq!(pids, vec![0, 1, 2, 3, 4]);

    let order: Vec<_> = (0..pids.len())
        .map(|_| kernel.schedule().running().expect("a process is ready"))
        .collect();
    assert_eq!(order, pids);

    for pid in &pids {
        assert_eq!(kernel.process_info(*pid).unwrap().dispatches, 1);
    }
    let running: Vec<_> = kernel
        .processes()
        .into_iter()
        .filter(|p| p.state == ProcessState::Running)
        .collect();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].pid, 4);

    // The scan wraps around to the lowest slot
    assert_eq!(
        kernel.schedule(),
        ScheduleOutcome::Switched { from: Some(4), to: 0 }
    );
}

#[test]
fn test_empty_table_idles() {
    let mut kernel = kernel(4);
    assert_eq!(kernel.schedule(), ScheduleOutcome::Idle);
    assert_eq!(kernel.tick().unwrap(), None);
    assert_eq!(kernel.scheduler().stats().idle_ticks, 2);
    assert_eq!(kernel.scheduler().current(), None);
}

#[test]
fn test_lone_process_keeps_cpu() {
    let mut kernel = kernel(4);
    let pid = kernel.spawn(IdleLoop, 0).unwrap();
    assert_eq!(kernel.schedule(), ScheduleOutcome::Switched { from: None, to: pid });
    assert_eq!(kernel.schedule(), ScheduleOutcome::Continued(pid));
    assert_eq!(kernel.scheduler().stats().context_switches, 1);
}

#[test]
fn test_context_survives_switches() {
    let mut kernel = kernel(4);
    // Each process counts its own steps in a scratch register
    let counter = |ctx: &mut ExecutionContext| {
        ctx.registers[1] += ctx.argument();
        StepOutcome::Yield
    };
    let a = kernel.spawn(counter, 1).unwrap();
    let b = kernel.spawn(counter, 100).unwrap();

    for _ in 0..6 {
        kernel.tick().unwrap();
    }

    let info_a = kernel.process_info(a).unwrap();
    let info_b = kernel.process_info(b).unwrap();
    assert_eq!(info_a.steps, 3);
    assert_eq!(info_b.steps, 3);
    let saved_a = &kernel.scheduler().table().get(a).unwrap().context;
    let saved_b = &kernel.scheduler().table().get(b).unwrap().context;
    assert_eq!(saved_a.registers[1], 3);
    assert_eq!(saved_b.registers[1], 300);
}

#[test]
fn test_timer_preempts_continuing_processes() {
    let mut kernel = kernel(4);
    let busy = |_: &mut ExecutionContext| StepOutcome::Continue;
    let a = kernel.spawn(busy, 0).unwrap();
    let b = kernel.spawn(busy, 0).unwrap();
    let timer = kernel.timer();

    // Without interrupts the first process keeps running
    let mut ran = Vec::new();
    for _ in 0..3 {
        ran.push(kernel.tick().unwrap().unwrap().0);
    }
    assert_eq!(ran, vec![a, a, a]);

    ran.clear();
    for _ in 0..4 {
        timer.fire();
        ran.push(kernel.tick().unwrap().unwrap().0);
    }
    assert_eq!(ran, vec![b, a, b, a]);
    assert_eq!(timer.fired(), 4);
}
