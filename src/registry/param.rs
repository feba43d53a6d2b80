use serde::{Deserialize, Serialize};

use crate::registry::key::KeyType;
use crate::value::Value;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParamEntry {
	pub id: u32,
	pub name: String,
	#[serde(rename = "type")]
	pub ty: KeyType,
	#[serde(default)]
	pub default_value: Option<Value>,
}
