//! The tagged runtime value type shared by column cells, expression/predicate
//! literals, parameter values and request overrides.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
	Int(i64),
	Float(f64),
	String(String),
	Bool(bool),
}

impl Value {
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Int(v) => Some(*v as f64),
			Value::Float(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(v) => Some(v.as_str()),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(v) => Some(*v),
			_ => None,
		}
	}

	pub fn type_name(&self) -> &'static str {
		match self {
			Value::Int(_) => "Int",
			Value::Float(_) => "Float",
			Value::String(_) => "String",
			Value::Bool(_) => "Bool",
		}
	}
}

impl std::fmt::Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Int(v) => write!(f, "{v}"),
			Value::Float(v) => write!(f, "{v}"),
			Value::String(v) => write!(f, "{v}"),
			Value::Bool(v) => write!(f, "{v}"),
		}
	}
}
