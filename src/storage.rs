use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use lazy_static::lazy_static;
use regex::Regex;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;

use crate::error::GridError;
use crate::filter::FilterModel;
use crate::widget::ColumnState;

lazy_static! {
    static ref IDENTITY_REGEX: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:-]*$").unwrap();
}

/// Synchronous key/string store scoped to one browser tab.
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

impl<S: SessionStore + ?Sized> SessionStore for Rc<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: String) {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key)
    }
}

impl<S: SessionStore + ?Sized> SessionStore for &S {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: String) {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key)
    }
}

/// In-process session store.
///
/// The whole store can be written to disk with [`MemoryStore::save_snapshot`] to survive a
/// simulated tab reload.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    pub fn save_snapshot(&self, filename: impl AsRef<Path>) -> Result<(), GridError> {
        let file = File::create(filename)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut writer = std::io::BufWriter::new(encoder);

        serialize_into(&mut writer, &*self.entries.borrow())?;
        writer.flush()?;

        Ok(())
    }

    pub fn load_snapshot(filename: impl AsRef<Path>) -> Result<Self, GridError> {
        let file = File::open(filename)?;
        let decoder = GzDecoder::new(file);
        let mut reader = std::io::BufReader::new(decoder);

        let entries: BTreeMap<String, String> = deserialize_from(&mut reader)?;

        Ok(MemoryStore {
            entries: RefCell::new(entries),
        })
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries.borrow_mut().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}

/// Key that namespaces one grid instance's persisted state.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GridIdentity(String);

impl GridIdentity {
    pub fn new(key: impl Into<String>) -> Result<Self, GridError> {
        let key = key.into();
        if key.is_empty() {
            return Err(GridError::InvalidIdentity {
                key,
                reason: "must not be empty",
            });
        }
        if !IDENTITY_REGEX.is_match(&key) {
            return Err(GridError::InvalidIdentity {
                key,
                reason: "only letters, digits and _ . : - are allowed",
            });
        }
        Ok(GridIdentity(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn filter_key(&self) -> String {
        format!("{}-filter", self.0)
    }

    pub fn column_key(&self) -> String {
        format!("{}-column", self.0)
    }
}

impl std::fmt::Display for GridIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tracks which identities are mounted so two live grids never share storage slots.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    live: HashSet<String>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        IdentityRegistry::default()
    }

    pub fn claim(&mut self, key: &str) -> Result<GridIdentity, GridError> {
        let identity = GridIdentity::new(key)?;
        if !self.live.insert(identity.0.clone()) {
            return Err(GridError::IdentityInUse(identity.0));
        }
        Ok(identity)
    }

    pub fn release(&mut self, identity: &GridIdentity) {
        self.live.remove(identity.as_str());
    }

    pub fn is_mounted(&self, key: &str) -> bool {
        self.live.contains(key)
    }
}

/// Typed access to the two slots a grid owns in the session store.
///
/// Values are the raw widget shapes so the widget's own rehydration can consume them.
/// Anything that fails to parse reads back as "nothing persisted".
#[derive(Debug)]
pub struct GridStorage<S> {
    identity: GridIdentity,
    store: S,
}

impl<S: SessionStore> GridStorage<S> {
    pub fn new(identity: GridIdentity, store: S) -> Self {
        GridStorage { identity, store }
    }

    pub fn identity(&self) -> &GridIdentity {
        &self.identity
    }

    pub fn load_filter_model(&self) -> Option<FilterModel> {
        self.read_json(&self.identity.filter_key())
    }

    pub fn save_filter_model(&self, model: &FilterModel) {
        self.write_json(&self.identity.filter_key(), model);
    }

    pub fn load_column_state(&self) -> Option<Vec<ColumnState>> {
        self.read_json(&self.identity.column_key())
    }

    pub fn save_column_state(&self, state: &[ColumnState]) {
        self.write_json(&self.identity.column_key(), &state);
    }

    pub fn clear(&self) {
        self.store.remove(&self.identity.filter_key());
        self.store.remove(&self.identity.column_key());
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key)?;
        match serde_json::from_str::<Option<T>>(&raw) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("ignoring corrupt session entry {key:?}: {err}");
                None
            }
        }
    }

    fn write_json<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.store.set(key, raw),
            Err(err) => log::warn!("could not persist session entry {key:?}: {err}"),
        }
    }
}
