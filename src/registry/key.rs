use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum KeyType {
	Int,
	Float,
	String,
	Bool,
	FeatureBundle,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum KeyStatus {
	Active,
	Deprecated,
	Blocked,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyEntry {
	pub id: u32,
	pub name: String,
	#[serde(rename = "type")]
	pub ty: KeyType,
	pub allow_read: bool,
	pub allow_write: bool,
	pub status: KeyStatus,
}

impl KeyEntry {
	pub fn is_readable(&self) -> bool {
		self.allow_read && self.status != KeyStatus::Blocked
	}

	pub fn is_writable(&self) -> bool {
		self.allow_write && self.status != KeyStatus::Blocked
	}
}
