use std::{cell::RefCell, collections::HashSet, rc::Rc};

use mr_runtime::{Callback, ItemKind, RangeItem, RedisMock, ZsetError};
use proptest::prelude::*;
use serde_json::{Value, json};

type Slot<T> = Rc<RefCell<Vec<Result<T, ZsetError>>>>;

fn capture<T: 'static>() -> (Option<Callback<T>>, Slot<T>) {
    let slot: Slot<T> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&slot);
    let callback: Callback<T> = Box::new(move |result| sink.borrow_mut().push(result));
    (Some(callback), slot)
}

/// Run a command and return the single result it delivered.
fn deliver<T: 'static>(run: impl FnOnce(Option<Callback<T>>)) -> Result<T, ZsetError> {
    let (callback, slot) = capture();
    run(callback);
    let mut delivered = slot.borrow_mut();
    assert_eq!(delivered.len(), 1, "callback must fire exactly once");
    delivered.remove(0)
}

fn member_list(items: Vec<RangeItem>) -> Vec<String> {
    items
        .into_iter()
        .filter_map(|item| match item {
            RangeItem::Member(member) => Some(member),
            RangeItem::Score(_) => None,
        })
        .collect()
}

fn five_member_mock() -> RedisMock {
    let mut mock = RedisMock::default();
    let added = deliver(|cb| {
        mock.zadd(
            "z",
            &[
                (40.0, json!("d")),
                (10.0, json!("a")),
                (50.0, json!("e")),
                (30.0, json!("c")),
                (20.0, json!("b")),
            ],
            cb,
        )
    });
    assert_eq!(added, Ok(5));
    mock
}

#[test]
fn add_counts_insertions_not_updates() {
    let mut mock = RedisMock::default();
    assert_eq!(deliver(|cb| mock.zadd("k", &[(5.0, json!("a"))], cb)), Ok(1));
    assert_eq!(deliver(|cb| mock.zadd("k", &[(5.0, json!("a"))], cb)), Ok(0));
    assert_eq!(deliver(|cb| mock.zcard("k", cb)), Ok(1));
}

#[test]
fn increment_round_trip() {
    let mut mock = RedisMock::default();
    assert_eq!(deliver(|cb| mock.zincrby("k", 3.0, &json!("a"), cb)), Ok(3.0));
    assert_eq!(deliver(|cb| mock.zscore("k", &json!("a"), cb)), Ok(Some(3.0)));
    assert_eq!(deliver(|cb| mock.zincrby("k", 2.0, &json!("a"), cb)), Ok(5.0));
    assert_eq!(deliver(|cb| mock.zscore("k", &json!("a"), cb)), Ok(Some(5.0)));
}

#[test]
fn full_range_in_both_directions() {
    let mut mock = five_member_mock();
    let asc = deliver(|cb| mock.zrange("z", 0, -1, None, cb)).expect("zrange");
    assert_eq!(member_list(asc), vec!["a", "b", "c", "d", "e"]);
    let desc = deliver(|cb| mock.zrevrange("z", 0, -1, None, cb)).expect("zrevrange");
    assert_eq!(member_list(desc), vec!["e", "d", "c", "b", "a"]);
}

#[test]
fn range_with_scores_pairs_each_member_with_its_score() {
    let mut mock = five_member_mock();
    let out = deliver(|cb| mock.zrange("z", 0, 2, Some("withscores"), cb)).expect("zrange");
    assert_eq!(
        out,
        vec![
            RangeItem::Member("a".to_string()),
            RangeItem::Score(10.0),
            RangeItem::Member("b".to_string()),
            RangeItem::Score(20.0),
        ]
    );
}

#[test]
fn missing_key_reads_are_empty_not_errors() {
    let mut mock = RedisMock::default();
    assert_eq!(deliver(|cb| mock.zcard("nope", cb)), Ok(0));
    assert_eq!(deliver(|cb| mock.zrange("nope", 0, -1, None, cb)), Ok(Vec::new()));
    assert_eq!(deliver(|cb| mock.zscore("nope", &json!("a"), cb)), Ok(None));
    assert_eq!(deliver(|cb| mock.zrank("nope", &json!("a"), cb)), Ok(None));
    assert_eq!(deliver(|cb| mock.zrevrank("nope", &json!("a"), cb)), Ok(None));
    assert_eq!(deliver(|cb| mock.zrem("nope", &[json!("a")], cb)), Ok(0));
    assert!(mock.keyspace().is_empty());
}

#[test]
fn wrong_type_guard_leaves_string_untouched() {
    let mut mock = RedisMock::default();
    mock.set("s", &json!("plain"), None);
    let field = json!("a");

    assert_eq!(
        deliver(|cb| mock.zadd("s", &[(1.0, field.clone())], cb)),
        Err(ZsetError::WrongType)
    );
    assert_eq!(
        deliver(|cb| mock.zrem("s", &[field.clone()], cb)),
        Err(ZsetError::WrongType)
    );
    assert_eq!(
        deliver(|cb| mock.zincrby("s", 1.0, &field, cb)),
        Err(ZsetError::WrongType)
    );
    assert_eq!(
        deliver(|cb| mock.zrange("s", 0, -1, None, cb)),
        Err(ZsetError::WrongType)
    );
    assert_eq!(
        deliver(|cb| mock.zrevrange("s", 0, -1, None, cb)),
        Err(ZsetError::WrongType)
    );
    assert_eq!(deliver(|cb| mock.zcard("s", cb)), Err(ZsetError::WrongType));
    assert_eq!(
        deliver(|cb| mock.zscore("s", &field, cb)),
        Err(ZsetError::WrongType)
    );
    assert_eq!(
        deliver(|cb| mock.zrank("s", &field, cb)),
        Err(ZsetError::WrongType)
    );
    assert_eq!(
        deliver(|cb| mock.zrevrank("s", &field, cb)),
        Err(ZsetError::WrongType)
    );

    assert_eq!(mock.get("s"), Some("plain"));
    assert_eq!(mock.key_type("s"), Some(ItemKind::String));
    assert_eq!(mock.keyspace().len(), 1);
}

#[test]
fn wrong_type_applies_to_every_other_kind() {
    use mr_runtime::Item;

    let mut mock = RedisMock::default();
    mock.keyspace_mut().insert("h", Item::hash());
    mock.keyspace_mut().insert("l", Item::list());
    mock.keyspace_mut().insert("st", Item::set());
    for key in ["h", "l", "st"] {
        assert_eq!(
            deliver(|cb| mock.zadd(key, &[(1.0, json!("a"))], cb)),
            Err(ZsetError::WrongType)
        );
    }
}

#[test]
fn error_text_identifies_wrong_kind() {
    let mut mock = RedisMock::default();
    mock.set("s", &json!(1), None);
    let err = deliver(|cb| mock.zcard("s", cb)).expect_err("wrong type");
    assert_eq!(
        err.to_string(),
        "ERR Operation against a key holding the wrong kind of value"
    );
}

#[test]
fn tied_scores_append_after_existing_block() {
    let mut mock = RedisMock::default();
    mock.zadd(
        "z",
        &[(1.0, json!("p")), (2.0, json!("q")), (2.0, json!("r"))],
        None,
    );
    mock.zadd("z", &[(2.0, json!("a"))], None);
    assert_eq!(deliver(|cb| mock.zrank("z", &json!("a"), cb)), Ok(Some(3)));
    mock.zadd("z", &[(1.0, json!("b"))], None);
    assert_eq!(deliver(|cb| mock.zrank("z", &json!("b"), cb)), Ok(Some(1)));
}

#[test]
fn numeric_members_are_stored_as_text() {
    let mut mock = RedisMock::default();
    mock.zadd("z", &[(1.0, json!(42))], None);
    assert_eq!(deliver(|cb| mock.zrank("z", &json!("42"), cb)), Ok(Some(0)));
    assert_eq!(deliver(|cb| mock.zscore("z", &json!("42"), cb)), Ok(Some(1.0)));
    // The score lookup compares the raw field, so a numeric field misses.
    assert_eq!(deliver(|cb| mock.zscore("z", &json!(42), cb)), Ok(None));
}

#[test]
fn instances_are_isolated() {
    let mut first = RedisMock::default();
    let mut second = RedisMock::default();
    first.zadd("z", &[(1.0, json!("a"))], None);
    assert_eq!(deliver(|cb| second.zcard("z", cb)), Ok(0));
}

fn ops() -> impl Strategy<Value = Vec<(u8, i8, char)>> {
    prop::collection::vec((0u8..3, -4i8..5, prop::char::range('a', 'g')), 1..80)
}

proptest! {
    #[test]
    fn invariants_hold_through_the_callback_surface(ops in ops()) {
        let mut mock = RedisMock::default();
        for (kind, score, member) in ops {
            let member = Value::from(member.to_string());
            let score = f64::from(score);
            match kind {
                0 => mock.zadd("z", &[(score, member)], None),
                1 => mock.zrem("z", &[member], None),
                _ => mock.zincrby("z", score, &member, None),
            }
        }

        let all = deliver(|cb| mock.zrange("z", 0, -1, Some("withscores"), cb))
            .expect("zrange");
        let mut names = Vec::new();
        let mut scores = Vec::new();
        for item in all {
            match item {
                RangeItem::Member(m) => names.push(m),
                RangeItem::Score(s) => scores.push(s),
            }
        }
        prop_assert_eq!(names.len(), scores.len());
        let unique: HashSet<&String> = names.iter().collect();
        prop_assert_eq!(unique.len(), names.len());
        prop_assert!(scores.windows(2).all(|w| w[0] <= w[1]));

        let count = deliver(|cb| mock.zcard("z", cb)).expect("zcard");
        prop_assert_eq!(count, names.len());
        for name in &names {
            let field = json!(name);
            let rank = deliver(|cb| mock.zrank("z", &field, cb)).expect("zrank");
            let rev = deliver(|cb| mock.zrevrank("z", &field, cb)).expect("zrevrank");
            prop_assert_eq!(rank.zip(rev).map(|(r, v)| r + v), Some(count - 1));
        }
    }
}
