/*!
 * Kernel Boot Test
 * Configuration sources and boot-time layout
 */

use cerebro_kernel::{AllocationStrategy, Kernel, KernelConfig, MemoryPressure};
use pretty_assertions::assert_eq;
use serial_test::serial;

#[test]
fn test_boot_from_json() {
    let config = KernelConfig::from_json(
        r#"{
            "memory": { "total_memory": 524288, "strategy": "first_fit", "system_reserve": 8192 },
            "process": { "capacity": 4 }
        }"#,
    )
    .expect("valid config");
    assert_eq!(config.memory.strategy, AllocationStrategy::FirstFit);
    assert!(config.memory.pools_enabled, "unspecified fields keep defaults");

    let kernel = Kernel::boot(config).expect("kernel boots");
    let stats = kernel.get_stats();
    assert_eq!(stats.total_memory, 524288);
    assert_eq!(stats.used_memory, 8192, "system reserve is allocated at boot");
    assert_eq!(kernel.pressure_level(), MemoryPressure::Low);
    assert_eq!(kernel.scheduler().table().capacity(), 4);
}

#[test]
fn test_invalid_json_is_a_config_error() {
    assert!(KernelConfig::from_json("{ not json").is_err());
    assert!(KernelConfig::from_json(r#"{ "process": { "capacity": 0 } }"#).is_err());
}

#[test]
#[serial]
fn test_boot_from_environment() {
    std::env::set_var("CEREBRO_TOTAL_MEMORY", "262144");
    std::env::set_var("CEREBRO_POOLS", "false");
    let config = KernelConfig::from_env();
    std::env::remove_var("CEREBRO_TOTAL_MEMORY");
    std::env::remove_var("CEREBRO_POOLS");

    let kernel = Kernel::boot(config.expect("valid environment")).unwrap();
    assert_eq!(kernel.config().memory.total_memory, 262144);
    assert!(!kernel.memory().pools().is_enabled());
}
