//! A stable content digest used to tie a compiled plan to the exact registry
//! tables it was validated against. Any reordering of fields does not change
//! the digest since it is computed over a canonical, key-sorted JSON encoding
//! rather than over field declaration order.

use serde::Serialize;
use std::hash::{Hash, Hasher};

/// Computes a stable hex digest for any serializable value by first
/// round-tripping it through `serde_json::to_value`, which sorts map keys
/// lexicographically (`serde_json`'s `Map` is a `BTreeMap` by default), and
/// then hashing the canonical string form.
pub fn digest_of<T: Serialize>(value: &T) -> String {
	let canonical = serde_json::to_value(value)
		.expect("digested values must be representable as JSON")
		.to_string();
	let mut hasher = std::collections::hash_map::DefaultHasher::new();
	canonical.hash(&mut hasher);
	format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde::Serialize;

	#[derive(Serialize)]
	struct Example {
		b: i32,
		a: i32,
	}

	#[test]
	fn digest_is_stable_across_field_order() {
		#[derive(Serialize)]
		struct Other {
			a: i32,
			b: i32,
		}
		let x = Example {
			b: 2,
			a: 1,
		};
		let y = Other {
			a: 1,
			b: 2,
		};
		assert_eq!(digest_of(&x), digest_of(&y));
	}

	#[test]
	fn digest_changes_with_content() {
		let x = Example {
			a: 1,
			b: 2,
		};
		let y = Example {
			a: 1,
			b: 3,
		};
		assert_ne!(digest_of(&x), digest_of(&y));
	}
}
