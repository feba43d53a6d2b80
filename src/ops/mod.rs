pub mod filter;
pub mod follow;
pub mod merge;
pub mod sort;
pub mod take;
pub mod vm;

#[cfg(feature = "test-ops")]
pub mod testing;

use crate::registry::operator::OperatorRegistry;

/// Builds the frozen operator table, registering every built-in operator
/// exactly once. Called a single time during engine start-up.
pub fn build_registry() -> OperatorRegistry {
	let mut registry = OperatorRegistry::new();
	registry.register(follow::spec());
	registry.register(filter::spec());
	registry.register(sort::spec());
	registry.register(take::spec());
	registry.register(vm::spec());
	registry.register(merge::spec());

	#[cfg(feature = "test-ops")]
	{
		registry.register(testing::sleep_spec());
		registry.register(testing::busy_cpu_spec());
	}

	registry
}
