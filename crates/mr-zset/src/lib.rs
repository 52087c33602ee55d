#![forbid(unsafe_code)]

//! Sorted-set commands over a [`Keyspace`].
//!
//! Every command first checks the key's kind: a key holding anything other
//! than a sorted set fails with [`ZsetError::WrongType`] before any mutation.
//! Writes create a missing key lazily; reads treat a missing key as an empty
//! set and never create it.

use std::ops::Range;

use log::{debug, trace};
use mr_store::{Item, ItemValue, Keyspace, ScoredMember, stringify};
use serde_json::Value;
use thiserror::Error;

/// Range flag requesting scores interleaved after each member.
pub const WITHSCORES: &str = "withscores";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ZsetError {
    #[error("ERR Operation against a key holding the wrong kind of value")]
    WrongType,
}

/// One element of a flattened range reply.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeItem {
    Member(String),
    Score(f64),
}

/// Index at which `score` keeps `entries` ascending. Equal scores are placed
/// after every existing entry with that score, the usual redis-mock tie rule.
/// Unlike a search that narrows with `max = mid - 1`, a score falling strictly
/// between two neighbours always lands between them.
#[must_use]
#[allow(clippy::neg_cmp_op_on_partial_ord)]
pub fn insertion_index(entries: &[ScoredMember], score: f64) -> usize {
    // Written as "not less than" so a NaN score goes to the far right.
    entries.partition_point(|entry| !(score < entry.score))
}

/// Add or update members. Returns how many members were newly added.
pub fn zadd(
    keyspace: &mut Keyspace,
    key: &str,
    pairs: &[(f64, Value)],
) -> Result<usize, ZsetError> {
    let zs = sorted_set_or_create(keyspace, key)?;
    let mut added = 0;
    for (score, member) in pairs {
        let member = stringify(member);
        match position_of(zs, &member) {
            Some(index) => {
                zs.remove(index);
            }
            None => added += 1,
        }
        insert_ordered(zs, member, *score);
    }
    debug!("zadd key={key} pairs={} added={added}", pairs.len());
    Ok(added)
}

/// Remove members. Each argument removes at most the first matching entry.
pub fn zrem(keyspace: &mut Keyspace, key: &str, members: &[Value]) -> Result<usize, ZsetError> {
    let Some(item) = keyspace.get_mut(key) else {
        return Ok(0);
    };
    let ItemValue::SortedSet(zs) = &mut item.value else {
        return Err(ZsetError::WrongType);
    };
    let mut removed = 0;
    for member in members {
        let member = stringify(member);
        if let Some(index) = position_of(zs, &member) {
            zs.remove(index);
            removed += 1;
        }
    }
    debug!("zrem key={key} members={} removed={removed}", members.len());
    Ok(removed)
}

/// Add `increment` to a member's score, treating an absent member as zero.
pub fn zincrby(
    keyspace: &mut Keyspace,
    key: &str,
    increment: f64,
    member: &Value,
) -> Result<f64, ZsetError> {
    let zs = sorted_set_or_create(keyspace, key)?;
    let member = stringify(member);
    let score = match position_of(zs, &member) {
        Some(index) => zs.remove(index).score + increment,
        None => increment,
    };
    debug!("zincrby key={key} member={member} score={score}");
    insert_ordered(zs, member, score);
    Ok(score)
}

/// Members by ascending position over the half-open slice `[start, stop)`.
///
/// A negative `stop` is remapped to `len - (stop + 1)`, so `-1` reaches the
/// end. A negative `start` is not remapped and keeps plain slice semantics,
/// counting back from the end.
pub fn zrange(
    keyspace: &Keyspace,
    key: &str,
    start: i64,
    stop: i64,
    flag: Option<&str>,
) -> Result<Vec<RangeItem>, ZsetError> {
    let zs = sorted_set(keyspace, key)?;
    trace!("zrange key={key} start={start} stop={stop} len={}", zs.len());
    Ok(flatten(zs.iter(), slice_bounds(zs.len(), start, stop), flag))
}

/// Same as [`zrange`] over the descending order.
pub fn zrevrange(
    keyspace: &Keyspace,
    key: &str,
    start: i64,
    stop: i64,
    flag: Option<&str>,
) -> Result<Vec<RangeItem>, ZsetError> {
    let zs = sorted_set(keyspace, key)?;
    trace!("zrevrange key={key} start={start} stop={stop} len={}", zs.len());
    Ok(flatten(zs.iter().rev(), slice_bounds(zs.len(), start, stop), flag))
}

pub fn zcard(keyspace: &Keyspace, key: &str) -> Result<usize, ZsetError> {
    Ok(sorted_set(keyspace, key)?.len())
}

/// Score of `field`, compared as-is against the stored members.
///
/// Unlike the other lookups the field is not stringified, so only a text
/// field can match.
pub fn zscore(keyspace: &Keyspace, key: &str, field: &Value) -> Result<Option<f64>, ZsetError> {
    let zs = sorted_set(keyspace, key)?;
    Ok(zs
        .iter()
        .find(|entry| matches!(field, Value::String(text) if *text == entry.member))
        .map(|entry| entry.score))
}

/// Zero-based ascending position of `field`.
pub fn zrank(keyspace: &Keyspace, key: &str, field: &Value) -> Result<Option<usize>, ZsetError> {
    let zs = sorted_set(keyspace, key)?;
    Ok(position_of(zs, &stringify(field)))
}

/// Zero-based descending position of `field`.
pub fn zrevrank(
    keyspace: &Keyspace,
    key: &str,
    field: &Value,
) -> Result<Option<usize>, ZsetError> {
    let zs = sorted_set(keyspace, key)?;
    let member = stringify(field);
    Ok(zs.iter().rev().position(|entry| entry.member == member))
}

fn sorted_set<'a>(keyspace: &'a Keyspace, key: &str) -> Result<&'a [ScoredMember], ZsetError> {
    match keyspace.get(key) {
        Some(item) => match &item.value {
            ItemValue::SortedSet(zs) => Ok(zs),
            _ => Err(ZsetError::WrongType),
        },
        None => Ok(&[]),
    }
}

fn sorted_set_or_create<'a>(
    keyspace: &'a mut Keyspace,
    key: &str,
) -> Result<&'a mut Vec<ScoredMember>, ZsetError> {
    match &mut keyspace.get_or_insert_with(key, Item::sorted_set).value {
        ItemValue::SortedSet(zs) => Ok(zs),
        _ => Err(ZsetError::WrongType),
    }
}

fn position_of(zs: &[ScoredMember], member: &str) -> Option<usize> {
    zs.iter().position(|entry| entry.member == member)
}

fn insert_ordered(zs: &mut Vec<ScoredMember>, member: String, score: f64) {
    let index = insertion_index(zs, score);
    zs.insert(index, ScoredMember { member, score });
}

fn slice_bounds(len: usize, start: i64, stop: i64) -> Range<usize> {
    let len = len as i64;
    let stop = if stop < 0 {
        len.saturating_sub(stop + 1)
    } else {
        stop
    };
    let start = if start < 0 {
        len.saturating_add(start).max(0)
    } else {
        start.min(len)
    };
    let stop = stop.min(len);
    if start >= stop {
        return 0..0;
    }
    start as usize..stop as usize
}

fn flatten<'a>(
    entries: impl Iterator<Item = &'a ScoredMember>,
    bounds: Range<usize>,
    flag: Option<&str>,
) -> Vec<RangeItem> {
    let with_scores = flag == Some(WITHSCORES);
    let mut out = Vec::with_capacity(if with_scores { bounds.len() * 2 } else { bounds.len() });
    for entry in entries.skip(bounds.start).take(bounds.len()) {
        out.push(RangeItem::Member(entry.member.clone()));
        if with_scores {
            out.push(RangeItem::Score(entry.score));
        }
    }
    out
}
