#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mr_store::{Item, ItemValue, Keyspace};
use mr_zset::{zadd, zcard, zincrby, zrange, zrank, zrem, zrevrange, zrevrank, zscore};
use serde_json::Value;

#[derive(Debug, Arbitrary)]
enum Op {
    Add { score: i16, member: u8 },
    Rem { member: u8 },
    Incr { increment: i16, member: u8 },
    Range { start: i8, stop: i8, with_scores: bool, reverse: bool },
    Rank { member: u8 },
    Score { member: u8 },
    Clobber,
}

fn member(id: u8) -> Value {
    // A small alphabet keeps updates and removals hitting existing members.
    Value::from(format!("m{}", id % 16))
}

fuzz_target!(|ops: Vec<Op>| {
    let mut keyspace = Keyspace::new();
    let mut clobbered = false;
    for op in ops {
        let wrong_type = match op {
            Op::Add { score, member: id } => {
                zadd(&mut keyspace, "z", &[(f64::from(score), member(id))]).is_err()
            }
            Op::Rem { member: id } => zrem(&mut keyspace, "z", &[member(id)]).is_err(),
            Op::Incr { increment, member: id } => {
                zincrby(&mut keyspace, "z", f64::from(increment), &member(id)).is_err()
            }
            Op::Range { start, stop, with_scores, reverse } => {
                let flag = with_scores.then_some("withscores");
                let (start, stop) = (i64::from(start), i64::from(stop));
                if reverse {
                    zrevrange(&keyspace, "z", start, stop, flag).is_err()
                } else {
                    zrange(&keyspace, "z", start, stop, flag).is_err()
                }
            }
            Op::Rank { member: id } => {
                let field = member(id);
                let rank = zrank(&keyspace, "z", &field);
                let rev = zrevrank(&keyspace, "z", &field);
                match (rank, rev, zcard(&keyspace, "z")) {
                    (Ok(Some(rank)), Ok(Some(rev)), Ok(count)) => {
                        assert_eq!(rank + rev, count - 1);
                        false
                    }
                    (Ok(None), Ok(None), Ok(_)) => false,
                    (rank, rev, count) => {
                        assert!(rank.is_err() && rev.is_err() && count.is_err());
                        true
                    }
                }
            }
            Op::Score { member: id } => zscore(&keyspace, "z", &member(id)).is_err(),
            Op::Clobber => {
                keyspace.insert("z", Item::string(&Value::from("x"), None));
                clobbered = true;
                true
            }
        };
        assert_eq!(wrong_type, clobbered);

        if let Some(ItemValue::SortedSet(zs)) = keyspace.get("z").map(|item| &item.value) {
            assert!(zs.windows(2).all(|w| w[0].score <= w[1].score));
            for (i, entry) in zs.iter().enumerate() {
                assert!(zs[i + 1..].iter().all(|other| other.member != entry.member));
            }
        }
    }
});
