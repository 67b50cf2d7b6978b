/*!
 * Process Lifecycle Test
 * Stack ownership across create, terminate and slot reuse
 */

use cerebro_kernel::process::IdleLoop;
use cerebro_kernel::{
    BlockKind, ExecutionContext, Kernel, KernelConfig, KernelError, MemoryConfig, ProcessError,
    ProcessState, StepOutcome,
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
fn test_terminate_releases_stack_and_slot_is_reused() {
    let mut kernel = kernel(4);
    for _ in 0..3 {
        kernel.spawn(IdleLoop, 0).unwrap();
    }
    let used_with_three = kernel.get_stats().used_memory;

    let old_stack = kernel.process_info(1).unwrap().stack_base;
    assert_eq!(kernel.memory().allocation_size(old_stack), Some(2048));

    kernel.terminate(1).unwrap();
    assert_eq!(kernel.process_info(1).unwrap().state, ProcessState::Terminated);
    assert_eq!(kernel.memory().allocation_size(old_stack), None);
    assert_eq!(kernel.get_stats().used_memory, used_with_three - 2048);

    let pid = kernel.spawn(IdleLoop, 7).unwrap();
    assert_eq!(pid, 1, "lowest vacant slot is reused");
    let info = kernel.process_info(pid).unwrap();
    assert_eq!(info.state, ProcessState::Ready);
    assert_eq!(info.dispatches, 0);
    assert_eq!(kernel.get_stats().used_memory, used_with_three);
    assert_eq!(kernel.get_stats().invalid_frees, 0);
    kernel.memory().verify().unwrap();
}

#[test]
fn test_terminate_twice_is_rejected() {
    let mut kernel = kernel(2);
    let pid = kernel.spawn(IdleLoop, 0).unwrap();
    kernel.terminate(pid).unwrap();
    let used = kernel.get_stats().used_memory;

    let err = kernel.terminate(pid).unwrap_err();
    assert!(matches!(
        err,
        KernelError::Process(ProcessError::AlreadyTerminated(p)) if p == pid
    ));
    assert!(matches!(
        kernel.terminate(1).unwrap_err(),
        KernelError::Process(ProcessError::InvalidPid(1))
    ));
    assert_eq!(kernel.get_stats().used_memory, used);
    assert_eq!(kernel.get_stats().invalid_frees, 0);
}

#[test]
fn test_terminating_running_process_switches_to_next() {
    let mut kernel = kernel(4);
    let a = kernel.spawn(IdleLoop, 0).unwrap();
    let b = kernel.spawn(IdleLoop, 0).unwrap();
    kernel.schedule();
    assert_eq!(kernel.scheduler().current(), Some(a));

    kernel.terminate(a).unwrap();
    assert_eq!(kernel.scheduler().current(), Some(b));
    assert_eq!(kernel.process_info(b).unwrap().state, ProcessState::Running);
}

#[test]
fn test_full_table_is_rejected_without_leaking() {
    let mut kernel = kernel(2);
    kernel.spawn(IdleLoop, 0).unwrap();
    kernel.spawn(IdleLoop, 0).unwrap();
    let used = kernel.get_stats().used_memory;

    let err = kernel.spawn(IdleLoop, 0).unwrap_err();
    assert!(matches!(
        err,
        KernelError::Process(ProcessError::NoFreeSlot { capacity: 2 })
    ));
    assert_eq!(kernel.get_stats().used_memory, used);
}

#[test]
fn test_privileged_stack_is_system_memory() {
    let mut kernel = kernel(2);
    let pid = kernel.create_privileged_process(IdleLoop, 0, 1024).unwrap();
    let info = kernel.process_info(pid).unwrap();
    assert!(info.privileged);
    let block = kernel.memory().block_info(info.stack_base).unwrap();
    assert_eq!(block.kind, BlockKind::System);
    assert!(!block.can_relocate);
    assert_eq!(info.stack_base % 16, 0);
}

#[test]
fn test_exit_frees_stack() {
    let mut kernel = kernel(2);
    let once = |_: &mut ExecutionContext| StepOutcome::Exit;
    let pid = kernel.spawn(once, 0).unwrap();

    let step = kernel.tick().unwrap();
    assert_eq!(step, Some((pid, StepOutcome::Exit)));
    assert_eq!(kernel.process_info(pid).unwrap().state, ProcessState::Terminated);
    assert_eq!(kernel.get_stats().used_memory, 0);
}
