//! Durable metadata cache.
//!
//! One JSON file per `(category, chain)` under the cache folder, e.g.
//! `./.cache/token-10.json`. Each file is a single object keyed by lower-cased
//! address whose values are flat records. A file is loaded into memory on first
//! access; every write merges fields into memory and rewrites the whole file.
//!
//! The cache only memoizes chain reads. A missing or corrupt file is an empty cache.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use alloy::primitives::Address;
use eyre::Result;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheCategory {
    Token,
    GaugeToPool,
    BribeToPool,
}

impl CacheCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::GaugeToPool => "gaugeToPool",
            Self::BribeToPool => "bribeToPool",
        }
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheCategory {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "token" => Ok(Self::Token),
            "gaugeToPool" => Ok(Self::GaugeToPool),
            "bribeToPool" => Ok(Self::BribeToPool),
            other => Err(eyre::eyre!("Unsupported cache category: {other}")),
        }
    }
}

/// Cached ERC-20 metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDetails {
    pub name: String,
    pub symbol: String,
    #[serde(with = "decimal_string")]
    pub decimals: u8,
}

/// Gauge or bribe contract to pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolMapping {
    pub pool_address: Address,
}

/// A cache value, tagged by the category it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheRecord {
    Token(TokenDetails),
    GaugeToPool(PoolMapping),
    BribeToPool(PoolMapping),
}

impl CacheRecord {
    pub const fn category(&self) -> CacheCategory {
        match self {
            Self::Token(_) => CacheCategory::Token,
            Self::GaugeToPool(_) => CacheCategory::GaugeToPool,
            Self::BribeToPool(_) => CacheCategory::BribeToPool,
        }
    }

    fn to_fields(&self) -> Result<Map<String, Value>> {
        let value = match self {
            Self::Token(details) => serde_json::to_value(details)?,
            Self::GaugeToPool(mapping) | Self::BribeToPool(mapping) => {
                serde_json::to_value(mapping)?
            }
        };
        match value {
            Value::Object(fields) => Ok(fields),
            _ => Err(eyre::eyre!("Cache record is not a flat object")),
        }
    }

    fn from_fields(category: CacheCategory, fields: &Map<String, Value>) -> Option<Self> {
        let value = Value::Object(fields.clone());
        match category {
            CacheCategory::Token => serde_json::from_value(value).ok().map(Self::Token),
            CacheCategory::GaugeToPool => serde_json::from_value(value).ok().map(Self::GaugeToPool),
            CacheCategory::BribeToPool => serde_json::from_value(value).ok().map(Self::BribeToPool),
        }
    }
}

/// Integers are stored as decimal strings. Plain JSON numbers are accepted on read.
mod decimal_string {
    use super::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    pub fn serialize<S: Serializer>(value: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        let raw = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text
                .parse::<u64>()
                .map_err(serde::de::Error::custom)?,
            Raw::Number(number) => number,
        };
        u8::try_from(raw).map_err(serde::de::Error::custom)
    }
}

type Shape = BTreeMap<String, Map<String, Value>>;

/// In-memory mirror of one cache file
pub struct Entry {
    file: PathBuf,
    memory: RwLock<Shape>,
    /// Serializes merge + flush so concurrent writers never interleave on disk
    writer: Mutex<()>,
}

impl Entry {
    fn open(file: PathBuf) -> Self {
        preflight(&file);
        let memory = load(&file);
        Self {
            file,
            memory: RwLock::new(memory),
            writer: Mutex::new(()),
        }
    }

    pub fn read(&self, key: &str) -> Option<Map<String, Value>> {
        let memory = self.memory.read().unwrap_or_else(PoisonError::into_inner);
        memory.get(&key.to_lowercase()).cloned()
    }

    /// Merges `fields` into memory field by field, then rewrites the file.
    pub fn add(&self, fields: BTreeMap<String, Map<String, Value>>) {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let prepared = {
            let mut memory = self.memory.write().unwrap_or_else(PoisonError::into_inner);
            for (key, record) in fields {
                let existing = memory.entry(key.to_lowercase()).or_default();
                for (field, value) in record {
                    existing.insert(field, value);
                }
            }
            serde_json::to_string(&*memory)
        };

        match prepared {
            Ok(prepared) => {
                if let Err(e) = publish(&self.file, &prepared) {
                    log::error!(
                        "cache::publish: Failed to write {}: {}",
                        self.file.display(),
                        e
                    );
                }
            }
            Err(e) => log::error!("cache::publish: Failed to serialize cache: {}", e),
        }
    }

    pub fn len(&self) -> usize {
        self.memory.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn preflight(file: &Path) {
    if let Some(folder) = file.parent() {
        if let Err(e) = fs::create_dir_all(folder) {
            log::error!("cache::preflight: Failed to create {}: {}", folder.display(), e);
            return;
        }
    }
    if !file.exists() {
        if let Err(e) = fs::write(file, "{}") {
            log::error!("cache::preflight: Failed to create {}: {}", file.display(), e);
        }
    }
}

fn load(file: &Path) -> Shape {
    let parsed = fs::read_to_string(file)
        .map_err(eyre::Report::from)
        .and_then(|data| serde_json::from_str::<Shape>(&data).map_err(eyre::Report::from));
    match parsed {
        Ok(memory) => memory,
        Err(e) => {
            log::error!(
                "cache::load: Failed to load {}, starting empty: {}",
                file.display(),
                e
            );
            Shape::new()
        }
    }
}

fn publish(file: &Path, prepared: &str) -> Result<()> {
    let staging = file.with_extension("json.tmp");
    fs::write(&staging, prepared)?;
    fs::rename(&staging, file)?;
    Ok(())
}

/// Registry of cache files, opened lazily per `(category, chain)`
pub struct MetadataCache {
    folder: PathBuf,
    entries: Mutex<HashMap<(CacheCategory, u64), Arc<Entry>>>,
}

impl MetadataCache {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Path of the file backing a category on a chain
    pub fn resolve(&self, category: CacheCategory, chain_id: u64) -> PathBuf {
        self.folder
            .join(format!("{category}-{chain_id}.json").to_lowercase())
    }

    pub fn entry(&self, category: CacheCategory, chain_id: u64) -> Arc<Entry> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry((category, chain_id))
            .or_insert_with(|| Arc::new(Entry::open(self.resolve(category, chain_id))))
            .clone()
    }

    /// Looks up `key` and decodes it as a record of `category`. Records that don't
    /// decode are treated as misses.
    pub fn read(&self, category: CacheCategory, chain_id: u64, key: &str) -> Option<CacheRecord> {
        let fields = self.entry(category, chain_id).read(key)?;
        let record = CacheRecord::from_fields(category, &fields);
        if record.is_none() {
            log::warn!(
                "cache::read: Ignoring malformed {} record for {} on chain {}",
                category,
                key,
                chain_id
            );
        }
        record
    }

    /// Merges records into the `category` file for `chain_id` and flushes it.
    ///
    /// # Errors
    /// * If a record belongs to another category
    pub fn write(
        &self,
        category: CacheCategory,
        chain_id: u64,
        fields: impl IntoIterator<Item = (String, CacheRecord)>,
    ) -> Result<()> {
        let mut prepared = BTreeMap::new();
        for (key, record) in fields {
            if record.category() != category {
                eyre::bail!(
                    "Cannot store a {} record in the {} cache",
                    record.category(),
                    category
                );
            }
            prepared.insert(key.to_lowercase(), record.to_fields()?);
        }
        self.entry(category, chain_id).add(prepared);
        Ok(())
    }

    pub fn read_token(&self, chain_id: u64, address: Address) -> Option<TokenDetails> {
        match self.read(CacheCategory::Token, chain_id, &address.to_string()) {
            Some(CacheRecord::Token(details)) => Some(details),
            _ => None,
        }
    }

    /// # Errors
    /// * Never in practice, records always match their category here
    pub fn write_token(&self, chain_id: u64, address: Address, details: TokenDetails) -> Result<()> {
        self.write(
            CacheCategory::Token,
            chain_id,
            [(address.to_string(), CacheRecord::Token(details))],
        )
    }

    /// Pool behind a gauge or bribe contract
    pub fn read_pool_mapping(
        &self,
        category: CacheCategory,
        chain_id: u64,
        address: Address,
    ) -> Option<Address> {
        match self.read(category, chain_id, &address.to_string())? {
            CacheRecord::GaugeToPool(mapping) | CacheRecord::BribeToPool(mapping) => {
                Some(mapping.pool_address)
            }
            CacheRecord::Token(_) => None,
        }
    }
}
