//! Operation catalog: maps an operation name to its generator, its read/write
//! classification and the write operation that seeds data for it.
//!
//! Write generators synthesize keys as `<op>-<index>` with the index drawn from the
//! unique-key budget, so runs with the same budget reuse the same key density. Read
//! generators never synthesize keys; they draw targets from the [`KeyCorpus`].

use rand::Rng;
use std::sync::Arc;

use super::command::Command;
use super::corpus::{KeyCorpus, KeyRecord};
use crate::error::{BenchError, Result};

/// Upper bound (exclusive) for random values, scores and list/set members
pub const MAX_VALUE: u64 = 1_000_000;

/// Upper bound (inclusive) of elements per container call
pub const MAX_FAN_OUT: usize = 10;

/// Extra random fields requested by HMGET besides the recorded one
const HMGET_EXTRA_FIELDS: usize = 2;

/// Generator behind an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Set,
    MSet,
    LPush,
    RPush,
    SAdd,
    ZAdd,
    HSet,
    HMSet,
    Get,
    MGet,
    LRange,
    SMembers,
    SCard,
    ZCard,
    ZCount,
    ZScore,
    ZRange,
    ZRangeByScore,
    ZRevRangeByScore,
    ZRank,
    HGet,
    HMGet,
    HGetAll,
}

/// One supported operation
#[derive(Debug, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub name: &'static str,
    pub kind: OpKind,
    pub is_write: bool,
    seed: usize,
}

// Catalog slots of the operations that seed others
const SET: usize = 0;
const LPUSH: usize = 2;
const SADD: usize = 4;
const ZADD: usize = 5;
const HSET: usize = 6;

const fn write(name: &'static str, kind: OpKind, seed: usize) -> OperationDescriptor {
    OperationDescriptor {
        name,
        kind,
        is_write: true,
        seed,
    }
}

const fn read(name: &'static str, kind: OpKind, seed: usize) -> OperationDescriptor {
    OperationDescriptor {
        name,
        kind,
        is_write: false,
        seed,
    }
}

static CATALOG: [OperationDescriptor; 23] = [
    write("set", OpKind::Set, SET),
    write("mset", OpKind::MSet, SET),
    write("lpush", OpKind::LPush, LPUSH),
    write("rpush", OpKind::RPush, LPUSH),
    write("sadd", OpKind::SAdd, SADD),
    write("zadd", OpKind::ZAdd, ZADD),
    write("hset", OpKind::HSet, HSET),
    write("hmset", OpKind::HMSet, HSET),
    read("get", OpKind::Get, SET),
    read("mget", OpKind::MGet, SET),
    read("lrange", OpKind::LRange, LPUSH),
    read("smembers", OpKind::SMembers, SADD),
    read("scard", OpKind::SCard, SADD),
    read("zcard", OpKind::ZCard, ZADD),
    read("zcount", OpKind::ZCount, ZADD),
    read("zscore", OpKind::ZScore, ZADD),
    read("zrange", OpKind::ZRange, ZADD),
    read("zrangebyscore", OpKind::ZRangeByScore, ZADD),
    read("zrevrangebyscore", OpKind::ZRevRangeByScore, ZADD),
    read("zrank", OpKind::ZRank, ZADD),
    read("hget", OpKind::HGet, HSET),
    read("hmget", OpKind::HMGet, HSET),
    read("hgetall", OpKind::HGetAll, HSET),
];

/// Look up an operation by name, case-insensitively
pub fn lookup(name: &str) -> Result<&'static OperationDescriptor> {
    let name = name.to_lowercase();
    CATALOG
        .iter()
        .find(|op| op.name == name)
        .ok_or(BenchError::UnknownOperation(name))
}

/// All supported operations, writes first
pub fn operations() -> &'static [OperationDescriptor] {
    &CATALOG
}

/// Everything a generator needs besides the store itself
#[derive(Debug, Clone)]
pub struct WorkloadContext {
    pub corpus: Arc<KeyCorpus>,
    pub unique_keys: usize,
    pub payload_size: usize,
}

impl WorkloadContext {
    pub fn new(corpus: Arc<KeyCorpus>, unique_keys: usize, payload_size: usize) -> Self {
        Self {
            corpus,
            unique_keys,
            payload_size,
        }
    }

    fn key(&self, op: &str, rng: &mut impl Rng) -> String {
        let index = rng.gen_range(0..self.unique_keys.max(1));
        format!("{}-{:020}", op, index)
    }

    fn value(&self, rng: &mut impl Rng) -> String {
        let n = rng.gen_range(0..MAX_VALUE);
        format!("{:0>width$}", n, width = self.payload_size)
    }

    fn sample(&self) -> Result<KeyRecord> {
        self.corpus.sample_random()
    }
}

fn fan_out(rng: &mut impl Rng) -> usize {
    rng.gen_range(1..=MAX_FAN_OUT)
}

fn bounded_member(rng: &mut impl Rng) -> String {
    format!("{:015}", rng.gen_range(0..MAX_VALUE))
}

fn unique_member() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn score_range(rng: &mut impl Rng) -> (u64, u64) {
    let a = rng.gen_range(0..MAX_VALUE);
    let b = rng.gen_range(0..MAX_VALUE);
    (a.min(b), a.max(b))
}

impl OperationDescriptor {
    /// Write operation that must populate the corpus before this one can run
    pub fn seed_operation(&self) -> &'static OperationDescriptor {
        &CATALOG[self.seed]
    }

    /// Build the next command for this operation.
    ///
    /// Writes append what they created to the corpus when `record` is set. Reads fail
    /// with [`BenchError::EmptyCorpus`] until a matching write has populated it.
    pub fn generate(&self, ctx: &WorkloadContext, record: bool) -> Result<Command> {
        let (command, records) = self.generate_with_records(ctx)?;
        if record {
            ctx.corpus.extend(records);
        }
        Ok(command)
    }

    /// Build the next command and return the corpus records it would create,
    /// leaving the corpus untouched. Reads create no records.
    pub fn generate_with_records(
        &self,
        ctx: &WorkloadContext,
    ) -> Result<(Command, Vec<KeyRecord>)> {
        if self.is_write {
            Ok(self.generate_write(ctx))
        } else {
            Ok((self.generate_read(ctx)?, Vec::new()))
        }
    }

    fn generate_write(&self, ctx: &WorkloadContext) -> (Command, Vec<KeyRecord>) {
        let mut rng = rand::thread_rng();
        let key = ctx.key(self.name, &mut rng);

        match self.kind {
            OpKind::Set => {
                let value = ctx.value(&mut rng);
                (
                    Command::Set {
                        key: key.clone(),
                        value,
                    },
                    vec![KeyRecord::key(key)],
                )
            }
            OpKind::MSet => {
                let mut pairs = vec![(key, ctx.value(&mut rng))];
                for _ in 1..fan_out(&mut rng) {
                    pairs.push((ctx.key(self.name, &mut rng), ctx.value(&mut rng)));
                }
                let records = pairs.iter().map(|(k, _)| KeyRecord::key(k.as_str())).collect();
                (Command::MSet { pairs }, records)
            }
            OpKind::LPush | OpKind::RPush => {
                let values = (0..fan_out(&mut rng))
                    .map(|_| bounded_member(&mut rng))
                    .collect();
                let record = KeyRecord::key(key.as_str());
                let command = if self.kind == OpKind::LPush {
                    Command::LPush { key, values }
                } else {
                    Command::RPush { key, values }
                };
                (command, vec![record])
            }
            OpKind::SAdd => {
                let members = (0..fan_out(&mut rng))
                    .map(|_| bounded_member(&mut rng))
                    .collect();
                let record = KeyRecord::key(key.as_str());
                (Command::SAdd { key, members }, vec![record])
            }
            OpKind::ZAdd => {
                let members: Vec<(f64, String)> = (0..fan_out(&mut rng))
                    .map(|_| (rng.gen_range(0..MAX_VALUE) as f64, unique_member()))
                    .collect();
                let record = KeyRecord::composite(&key, &members[0].1);
                (Command::ZAdd { key, members }, vec![record])
            }
            OpKind::HSet => {
                let field = unique_member();
                let record = KeyRecord::composite(&key, &field);
                let value = ctx.value(&mut rng);
                (Command::HSet { key, field, value }, vec![record])
            }
            OpKind::HMSet => {
                let fields: Vec<(String, String)> = (0..fan_out(&mut rng))
                    .map(|_| (unique_member(), ctx.value(&mut rng)))
                    .collect();
                let record = KeyRecord::composite(&key, &fields[0].0);
                (Command::HMSet { key, fields }, vec![record])
            }
            _ => unreachable!("read operation {} routed to write generator", self.name),
        }
    }

    fn generate_read(&self, ctx: &WorkloadContext) -> Result<Command> {
        let record = ctx.sample()?;
        let (key, member) = record.split();
        let key = key.to_string();
        let mut rng = rand::thread_rng();

        let command = match self.kind {
            OpKind::Get => Command::Get { key },
            OpKind::MGet => {
                let mut keys = vec![key];
                for _ in 1..fan_out(&mut rng) {
                    keys.push(ctx.sample()?.key_part().to_string());
                }
                Command::MGet { keys }
            }
            OpKind::LRange => Command::LRange {
                key,
                start: 0,
                stop: MAX_FAN_OUT as isize,
            },
            OpKind::SMembers => Command::SMembers { key },
            OpKind::SCard => Command::SCard { key },
            OpKind::ZCard => Command::ZCard { key },
            OpKind::ZCount => {
                let (min, max) = score_range(&mut rng);
                Command::ZCount { key, min, max }
            }
            OpKind::ZScore => Command::ZScore {
                key,
                member: member.map_or_else(unique_member, str::to_string),
            },
            OpKind::ZRange => Command::ZRange {
                key,
                start: 0,
                stop: MAX_FAN_OUT as isize,
            },
            OpKind::ZRangeByScore => {
                let (min, max) = score_range(&mut rng);
                Command::ZRangeByScore { key, min, max }
            }
            OpKind::ZRevRangeByScore => {
                let (min, max) = score_range(&mut rng);
                Command::ZRevRangeByScore { key, max, min }
            }
            OpKind::ZRank => Command::ZRank {
                key,
                member: member.map_or_else(unique_member, str::to_string),
            },
            OpKind::HGet => Command::HGet {
                key,
                field: member.map_or_else(unique_member, str::to_string),
            },
            OpKind::HMGet => {
                let mut fields = vec![member.map_or_else(unique_member, str::to_string)];
                fields.extend((0..HMGET_EXTRA_FIELDS).map(|_| unique_member()));
                Command::HMGet { key, fields }
            }
            OpKind::HGetAll => Command::HGetAll { key },
            _ => unreachable!("write operation {} routed to read generator", self.name),
        };

        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(unique_keys: usize) -> WorkloadContext {
        WorkloadContext::new(Arc::new(KeyCorpus::new()), unique_keys, 0)
    }

    #[test]
    fn test_lookup_case_insensitive() {
        let op = lookup("ZRangeByScore").unwrap();
        assert_eq!(op.name, "zrangebyscore");
        assert!(!op.is_write);
    }

    #[test]
    fn test_lookup_unknown() {
        match lookup("LPOP") {
            Err(BenchError::UnknownOperation(name)) => assert_eq!(name, "lpop"),
            other => panic!("expected UnknownOperation, got {:?}", other),
        }
    }

    #[test]
    fn test_seeds_are_writes() {
        for op in operations() {
            let seed = op.seed_operation();
            assert!(seed.is_write, "{} seeded by non-write {}", op.name, seed.name);
            assert_eq!(seed.seed_operation(), seed);
        }
        assert_eq!(lookup("rpush").unwrap().seed_operation().name, "lpush");
        assert_eq!(lookup("smembers").unwrap().seed_operation().name, "sadd");
        assert_eq!(lookup("hmget").unwrap().seed_operation().name, "hset");
    }

    #[test]
    fn test_write_key_format() {
        let ctx = context(5);
        let op = lookup("set").unwrap();
        for _ in 0..20 {
            match op.generate(&ctx, false).unwrap() {
                Command::Set { key, .. } => {
                    let (prefix, index) = key.split_once('-').unwrap();
                    assert_eq!(prefix, "set");
                    assert_eq!(index.len(), 20);
                    assert!(index.parse::<usize>().unwrap() < 5);
                }
                other => panic!("unexpected command {:?}", other),
            }
        }
        assert!(ctx.corpus.is_empty());
    }

    #[test]
    fn test_payload_padding() {
        let ctx = WorkloadContext::new(Arc::new(KeyCorpus::new()), 10, 64);
        match lookup("set").unwrap().generate(&ctx, false).unwrap() {
            Command::Set { value, .. } => assert_eq!(value.len(), 64),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_fan_out_bounds() {
        let ctx = context(100);
        let op = lookup("sadd").unwrap();
        for _ in 0..200 {
            match op.generate(&ctx, false).unwrap() {
                Command::SAdd { members, .. } => {
                    assert!((1..=MAX_FAN_OUT).contains(&members.len()))
                }
                other => panic!("unexpected command {:?}", other),
            }
        }
    }

    #[test]
    fn test_read_before_write_fails() {
        let ctx = context(10);
        for op in operations().iter().filter(|op| !op.is_write) {
            assert!(
                matches!(op.generate(&ctx, true), Err(BenchError::EmptyCorpus)),
                "{} should fail on empty corpus",
                op.name
            );
        }
    }

    #[test]
    fn test_reads_target_recorded_keys() {
        for op in operations().iter().filter(|op| !op.is_write) {
            let ctx = context(50);
            let seed = op.seed_operation();
            let mut written = Vec::new();
            for _ in 0..20 {
                let cmd = seed.generate(&ctx, true).unwrap();
                written.push(cmd.primary_key().unwrap().to_string());
            }
            assert!(!ctx.corpus.is_empty());

            let cmd = op.generate(&ctx, false).unwrap();
            assert!(!cmd.is_write());
            let key = cmd.primary_key().unwrap();
            assert!(
                key.starts_with(&format!("{}-", seed.name)),
                "{} read {} not produced by {}",
                op.name,
                key,
                seed.name
            );
        }
    }

    #[test]
    fn test_hash_read_reuses_recorded_field() {
        let ctx = context(1);
        let field = match lookup("hset").unwrap().generate(&ctx, true).unwrap() {
            Command::HSet { field, .. } => field,
            other => panic!("unexpected command {:?}", other),
        };
        match lookup("hget").unwrap().generate(&ctx, false).unwrap() {
            Command::HGet { field: read, .. } => assert_eq!(read, field),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_score_range_ordered() {
        let ctx = context(1);
        lookup("zadd").unwrap().generate(&ctx, true).unwrap();
        for _ in 0..50 {
            match lookup("zrevrangebyscore").unwrap().generate(&ctx, false).unwrap() {
                Command::ZRevRangeByScore { max, min, .. } => assert!(min <= max),
                other => panic!("unexpected command {:?}", other),
            }
        }
    }
}
