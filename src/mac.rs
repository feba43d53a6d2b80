/// Parses an environment variable into `$ty`, falling back to `$default` when
/// the variable is unset, empty, or fails to parse.
macro_rules! lazy_env_parse {
	($key:expr, $ty:ty, $default:expr) => {
		once_cell::sync::Lazy::new(|| -> $ty {
			match std::env::var($key) {
				Ok(v) if !v.is_empty() => v.parse::<$ty>().unwrap_or($default),
				_ => $default,
			}
		})
	};
}

pub(crate) use lazy_env_parse;
