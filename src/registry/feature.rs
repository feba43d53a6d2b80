use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeatureEntry {
	pub id: u32,
	pub name: String,
	pub column_layout: String,
}
