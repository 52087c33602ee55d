#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::{Number, Value};

/// Expiry value meaning the key never expires.
pub const EXPIRES_NEVER: Option<u64> = None;

/// Normalize a value into the text used for storage and member equality.
///
/// Structured values (objects, arrays, null) become compact JSON; everything
/// else is coerced to its plain textual form.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number_text(number),
        Value::Null | Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Largest integer a double represents exactly.
const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

fn number_text(number: &Number) -> String {
    let exact = match (number.as_i64(), number.as_u64()) {
        (Some(int), _) => int.unsigned_abs() <= MAX_SAFE_INTEGER,
        (None, Some(uint)) => uint <= MAX_SAFE_INTEGER,
        (None, None) => false,
    };
    if exact {
        return number.to_string();
    }
    match number.as_f64() {
        Some(float) => float_text(float),
        None => number.to_string(),
    }
}

/// Shortest round-trip text, switching to exponent form (`1e+21`, `1e-7`)
/// outside `[1e-6, 1e21)`.
fn float_text(float: f64) -> String {
    // Negative zero coerces to "0".
    if float == 0.0 {
        return "0".to_string();
    }
    let magnitude = float.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return float.to_string();
    }
    let text = format!("{float:e}");
    match text.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => text,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    String,
    Hash,
    List,
    Set,
    SortedSet,
}

impl ItemKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Hash => "hash",
            Self::List => "list",
            Self::Set => "set",
            Self::SortedSet => "zset",
        }
    }
}

/// One member of a sorted set with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

impl ScoredMember {
    #[must_use]
    pub fn new(member: impl Into<String>, score: f64) -> Self {
        Self {
            member: member.into(),
            score,
        }
    }
}

/// Payload of a stored key. The variant is the item's kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemValue {
    String(String),
    Hash(HashMap<String, String>),
    List(VecDeque<String>),
    Set(HashSet<String>),
    /// Sorted set: kept ascending by score by the z-command engine.
    SortedSet(Vec<ScoredMember>),
}

/// The typed container stored under every key.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub value: ItemValue,
    /// Absolute deadline in milliseconds. Carried, never enforced.
    pub expires_at_ms: Option<u64>,
}

impl Item {
    fn with_value(value: ItemValue) -> Self {
        Self {
            value,
            expires_at_ms: EXPIRES_NEVER,
        }
    }

    #[must_use]
    pub fn string(value: &Value, expires_at_ms: Option<u64>) -> Self {
        Self {
            value: ItemValue::String(stringify(value)),
            expires_at_ms,
        }
    }

    #[must_use]
    pub fn hash() -> Self {
        Self::with_value(ItemValue::Hash(HashMap::new()))
    }

    #[must_use]
    pub fn list() -> Self {
        Self::with_value(ItemValue::List(VecDeque::new()))
    }

    #[must_use]
    pub fn set() -> Self {
        Self::with_value(ItemValue::Set(HashSet::new()))
    }

    #[must_use]
    pub fn sorted_set() -> Self {
        Self::with_value(ItemValue::SortedSet(Vec::new()))
    }

    #[must_use]
    pub fn kind(&self) -> ItemKind {
        match &self.value {
            ItemValue::String(_) => ItemKind::String,
            ItemValue::Hash(_) => ItemKind::Hash,
            ItemValue::List(_) => ItemKind::List,
            ItemValue::Set(_) => ItemKind::Set,
            ItemValue::SortedSet(_) => ItemKind::SortedSet,
        }
    }
}

/// Mapping from key to item, owned by one store instance.
#[derive(Debug, Default, Clone)]
pub struct Keyspace {
    entries: HashMap<String, Item>,
}

impl Keyspace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Item> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Item> {
        self.entries.get_mut(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Store `item` under `key`, returning the item it replaced.
    pub fn insert(&mut self, key: impl Into<String>, item: Item) -> Option<Item> {
        self.entries.insert(key.into(), item)
    }

    pub fn remove(&mut self, key: &str) -> Option<Item> {
        self.entries.remove(key)
    }

    /// Return the item under `key`, creating it with `create` when absent.
    /// An existing item is returned untouched whatever its kind.
    pub fn get_or_insert_with(&mut self, key: &str, create: impl FnOnce() -> Item) -> &mut Item {
        self.entries.entry(key.to_owned()).or_insert_with(create)
    }

    #[must_use]
    pub fn key_type(&self, key: &str) -> Option<ItemKind> {
        self.entries.get(key).map(Item::kind)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Record an absolute deadline on an existing key. Returns false when the
    /// key is missing.
    pub fn expire_at(&mut self, key: &str, deadline_ms: u64) -> bool {
        match self.entries.get_mut(key) {
            Some(item) => {
                item.expires_at_ms = Some(deadline_ms);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn expires_at(&self, key: &str) -> Option<u64> {
        self.entries.get(key).and_then(|item| item.expires_at_ms)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
