// Memory manager integration tests

#[path = "memory/address_recycling_test.rs"]
mod address_recycling_test;

#[path = "memory/coalescing_test.rs"]
mod coalescing_test;

#[path = "memory/pool_fallback_test.rs"]
mod pool_fallback_test;

#[path = "memory/cache_compaction_test.rs"]
mod cache_compaction_test;

#[path = "memory/accounting_property_test.rs"]
mod accounting_property_test;

#[path = "memory/workload_test.rs"]
mod workload_test;
