pub mod feature;
pub mod key;
pub mod operator;
pub mod param;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::digest::digest_of;
use crate::err::{Error, Result};

pub use feature::FeatureEntry;
pub use key::{KeyEntry, KeyStatus, KeyType};
pub use operator::OperatorRegistry;
pub use param::ParamEntry;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct KeyTable {
	#[serde(default, rename = "entry")]
	entries: Vec<KeyEntry>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct ParamTable {
	#[serde(default, rename = "entry")]
	entries: Vec<ParamEntry>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct FeatureTable {
	#[serde(default, rename = "entry")]
	entries: Vec<FeatureEntry>,
}

/// Digests for the three declarative tables, embedded in a compiled plan and
/// checked against the engine's own tables before execution begins.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Digests {
	pub keys: String,
	pub params: String,
	pub features: String,
}

/// The three frozen, digest-identified declarative registries. Built once at
/// engine start and shared read-only for the lifetime of the process.
#[derive(Clone, Debug)]
pub struct Registries {
	keys_by_id: HashMap<u32, KeyEntry>,
	keys_by_name: HashMap<String, u32>,
	params_by_id: HashMap<u32, ParamEntry>,
	params_by_name: HashMap<String, u32>,
	features_by_id: HashMap<u32, FeatureEntry>,
	features_by_name: HashMap<String, u32>,
	digests: Digests,
}

impl Registries {
	pub fn from_tables(
		keys: Vec<KeyEntry>,
		params: Vec<ParamEntry>,
		features: Vec<FeatureEntry>,
	) -> Self {
		let keys_digest = digest_of(&keys);
		let params_digest = digest_of(&params);
		let features_digest = digest_of(&features);

		let mut keys_by_id = HashMap::new();
		let mut keys_by_name = HashMap::new();
		for k in keys {
			keys_by_name.insert(k.name.clone(), k.id);
			keys_by_id.insert(k.id, k);
		}

		let mut params_by_id = HashMap::new();
		let mut params_by_name = HashMap::new();
		for p in params {
			params_by_name.insert(p.name.clone(), p.id);
			params_by_id.insert(p.id, p);
		}

		let mut features_by_id = HashMap::new();
		let mut features_by_name = HashMap::new();
		for f in features {
			features_by_name.insert(f.name.clone(), f.id);
			features_by_id.insert(f.id, f);
		}

		Self {
			keys_by_id,
			keys_by_name,
			params_by_id,
			params_by_name,
			features_by_id,
			features_by_name,
			digests: Digests {
				keys: keys_digest,
				params: params_digest,
				features: features_digest,
			},
		}
	}

	/// Loads the three registry tables from `<dir>/{keys,params,features}.toml`.
	pub fn from_dir(dir: &Path) -> Result<Self> {
		let keys: KeyTable = load_toml(&dir.join("keys.toml"))?;
		let params: ParamTable = load_toml(&dir.join("params.toml"))?;
		let features: FeatureTable = load_toml(&dir.join("features.toml"))?;
		Ok(Self::from_tables(keys.entries, params.entries, features.entries))
	}

	/// The small built-in registry used for bring-up when no `--registry-dir`
	/// is supplied: enough keys/params/features to run the synthetic
	/// five-candidate response and the scenario test suite.
	pub fn builtin() -> Self {
		let keys = vec![
			KeyEntry {
				id: 2,
				name: "country".into(),
				ty: KeyType::String,
				allow_read: true,
				allow_write: false,
				status: KeyStatus::Active,
			},
			KeyEntry {
				id: 3,
				name: "final_score".into(),
				ty: KeyType::Float,
				allow_read: true,
				allow_write: true,
				status: KeyStatus::Active,
			},
		];
		let params = vec![ParamEntry {
			id: 1,
			name: "media_age_penalty_weight".into(),
			ty: KeyType::Float,
			default_value: Some(crate::value::Value::Float(0.2)),
		}];
		let features = vec![];
		Self::from_tables(keys, params, features)
	}

	pub fn digests(&self) -> &Digests {
		&self.digests
	}

	pub fn key_by_id(&self, id: u32) -> Result<&KeyEntry> {
		self.keys_by_id.get(&id).ok_or(Error::UnknownKey(id))
	}

	pub fn key_by_name(&self, name: &str) -> Result<&KeyEntry> {
		let id = self
			.keys_by_name
			.get(name)
			.ok_or_else(|| Error::UnknownKeyName(name.to_string()))?;
		self.key_by_id(*id)
	}

	pub fn param_by_id(&self, id: u32) -> Result<&ParamEntry> {
		self.params_by_id.get(&id).ok_or(Error::UnknownParam(id))
	}

	pub fn param_by_name(&self, name: &str) -> Result<&ParamEntry> {
		let id = self
			.params_by_name
			.get(name)
			.ok_or_else(|| Error::UnknownParamName(name.to_string()))?;
		self.param_by_id(*id)
	}

	pub fn feature_by_id(&self, id: u32) -> Result<&FeatureEntry> {
		self.features_by_id.get(&id).ok_or(Error::UnknownFeature(id))
	}

	pub fn keys(&self) -> impl Iterator<Item = &KeyEntry> {
		self.keys_by_id.values()
	}

	pub fn params(&self) -> impl Iterator<Item = &ParamEntry> {
		self.params_by_id.values()
	}

	pub fn features(&self) -> impl Iterator<Item = &FeatureEntry> {
		self.features_by_id.values()
	}
}

fn load_toml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
	let text = std::fs::read_to_string(path)?;
	Ok(toml::from_str(&text)?)
}
