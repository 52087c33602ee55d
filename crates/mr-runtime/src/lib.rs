#![forbid(unsafe_code)]

//! The mock store instance.
//!
//! [`RedisMock`] owns the key-space and exposes the sorted-set commands with
//! an error-first completion handler: each command runs to completion and
//! invokes its [`Callback`] exactly once, with either the error or the
//! result, before returning. Passing `None` runs the command and drops its
//! result.

use std::collections::VecDeque;

use log::{debug, trace};
use serde::Serialize;
use serde_json::Value;

pub use mr_config::{ConfigError, MockConfig};
pub use mr_store::{EXPIRES_NEVER, Item, ItemKind, ItemValue, Keyspace, ScoredMember, stringify};
pub use mr_zset::{RangeItem, WITHSCORES, ZsetError};

/// Completion handler receiving a command's outcome.
pub type Callback<T> = Box<dyn FnOnce(Result<T, ZsetError>)>;

/// Install `env_logger` with the configured filter. Returns false when a
/// logger was already installed.
pub fn init_logging(config: &MockConfig) -> bool {
    env_logger::Builder::new()
        .parse_filters(&config.log_filter)
        .try_init()
        .is_ok()
}

/// Deliver `result` to `callback`, if there is one.
pub fn call_callback<T>(callback: Option<Callback<T>>, result: Result<T, ZsetError>) {
    match callback {
        Some(callback) => callback(result),
        None => trace!("no completion handler, result dropped"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    WrongType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    pub seq: u64,
    pub command: &'static str,
    pub key: String,
    pub outcome: Outcome,
}

/// Bounded record of the commands an instance has executed.
#[derive(Debug)]
pub struct CommandJournal {
    enabled: bool,
    capacity: usize,
    next_seq: u64,
    entries: VecDeque<JournalEntry>,
}

impl CommandJournal {
    #[must_use]
    pub fn new(config: &MockConfig) -> Self {
        Self {
            enabled: config.journal_enabled,
            capacity: config.journal_capacity,
            next_seq: 1,
            entries: VecDeque::new(),
        }
    }

    pub fn record(&mut self, command: &'static str, key: &str, outcome: Outcome) {
        if !self.enabled || self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(JournalEntry {
            seq: self.next_seq,
            command,
            key: key.to_string(),
            outcome,
        });
        self.next_seq += 1;
    }

    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.entries)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_seq = 1;
    }
}

#[derive(Debug)]
pub struct RedisMock {
    keyspace: Keyspace,
    journal: CommandJournal,
}

impl Default for RedisMock {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

impl RedisMock {
    #[must_use]
    pub fn new(config: MockConfig) -> Self {
        Self {
            keyspace: Keyspace::new(),
            journal: CommandJournal::new(&config),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(MockConfig::from_env()?))
    }

    #[must_use]
    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    pub fn keyspace_mut(&mut self) -> &mut Keyspace {
        &mut self.keyspace
    }

    #[must_use]
    pub fn journal(&self) -> &CommandJournal {
        &self.journal
    }

    /// The journal as a JSON array, oldest entry first.
    pub fn journal_json(&self) -> Result<String, serde_json::Error> {
        self.journal.to_json()
    }

    /// Drop every key and journal entry.
    pub fn reset(&mut self) {
        self.keyspace.clear();
        self.journal.clear();
    }

    /// Store a plain string, replacing whatever the key held.
    pub fn set(&mut self, key: &str, value: &Value, expires_at_ms: Option<u64>) {
        self.keyspace.insert(key, Item::string(value, expires_at_ms));
    }

    /// The string under `key`; `None` for a missing key or another kind.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        match &self.keyspace.get(key)?.value {
            ItemValue::String(text) => Some(text.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn key_type(&self, key: &str) -> Option<ItemKind> {
        self.keyspace.key_type(key)
    }

    pub fn zadd(&mut self, key: &str, pairs: &[(f64, Value)], callback: Option<Callback<usize>>) {
        let result = mr_zset::zadd(&mut self.keyspace, key, pairs);
        self.complete("zadd", key, result, callback);
    }

    pub fn zrem(&mut self, key: &str, members: &[Value], callback: Option<Callback<usize>>) {
        let result = mr_zset::zrem(&mut self.keyspace, key, members);
        self.complete("zrem", key, result, callback);
    }

    pub fn zincrby(
        &mut self,
        key: &str,
        increment: f64,
        member: &Value,
        callback: Option<Callback<f64>>,
    ) {
        let result = mr_zset::zincrby(&mut self.keyspace, key, increment, member);
        self.complete("zincrby", key, result, callback);
    }

    pub fn zrange(
        &mut self,
        key: &str,
        start: i64,
        stop: i64,
        flag: Option<&str>,
        callback: Option<Callback<Vec<RangeItem>>>,
    ) {
        let result = mr_zset::zrange(&self.keyspace, key, start, stop, flag);
        self.complete("zrange", key, result, callback);
    }

    pub fn zrevrange(
        &mut self,
        key: &str,
        start: i64,
        stop: i64,
        flag: Option<&str>,
        callback: Option<Callback<Vec<RangeItem>>>,
    ) {
        let result = mr_zset::zrevrange(&self.keyspace, key, start, stop, flag);
        self.complete("zrevrange", key, result, callback);
    }

    pub fn zcard(&mut self, key: &str, callback: Option<Callback<usize>>) {
        let result = mr_zset::zcard(&self.keyspace, key);
        self.complete("zcard", key, result, callback);
    }

    pub fn zscore(&mut self, key: &str, field: &Value, callback: Option<Callback<Option<f64>>>) {
        let result = mr_zset::zscore(&self.keyspace, key, field);
        self.complete("zscore", key, result, callback);
    }

    pub fn zrank(&mut self, key: &str, field: &Value, callback: Option<Callback<Option<usize>>>) {
        let result = mr_zset::zrank(&self.keyspace, key, field);
        self.complete("zrank", key, result, callback);
    }

    pub fn zrevrank(
        &mut self,
        key: &str,
        field: &Value,
        callback: Option<Callback<Option<usize>>>,
    ) {
        let result = mr_zset::zrevrank(&self.keyspace, key, field);
        self.complete("zrevrank", key, result, callback);
    }

    fn complete<T>(
        &mut self,
        command: &'static str,
        key: &str,
        result: Result<T, ZsetError>,
        callback: Option<Callback<T>>,
    ) {
        let outcome = match &result {
            Ok(_) => Outcome::Ok,
            Err(err) => {
                debug!("{command} key={key} failed: {err}");
                Outcome::WrongType
            }
        };
        self.journal.record(command, key, outcome);
        call_callback(callback, result);
    }
}
