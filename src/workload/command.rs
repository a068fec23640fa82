//! Typed store commands produced by the operation generators.

/// One store call, fully resolved with its keys and values
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set { key: String, value: String },
    MSet { pairs: Vec<(String, String)> },
    LPush { key: String, values: Vec<String> },
    RPush { key: String, values: Vec<String> },
    SAdd { key: String, members: Vec<String> },
    ZAdd { key: String, members: Vec<(f64, String)> },
    HSet { key: String, field: String, value: String },
    HMSet { key: String, fields: Vec<(String, String)> },

    Get { key: String },
    MGet { keys: Vec<String> },
    LRange { key: String, start: isize, stop: isize },
    SMembers { key: String },
    SCard { key: String },
    ZCard { key: String },
    ZCount { key: String, min: u64, max: u64 },
    ZScore { key: String, member: String },
    ZRange { key: String, start: isize, stop: isize },
    ZRangeByScore { key: String, min: u64, max: u64 },
    ZRevRangeByScore { key: String, max: u64, min: u64 },
    ZRank { key: String, member: String },
    HGet { key: String, field: String },
    HMGet { key: String, fields: Vec<String> },
    HGetAll { key: String },
}

impl Command {
    /// Protocol verb of the command
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Set { .. } => "SET",
            Command::MSet { .. } => "MSET",
            Command::LPush { .. } => "LPUSH",
            Command::RPush { .. } => "RPUSH",
            Command::SAdd { .. } => "SADD",
            Command::ZAdd { .. } => "ZADD",
            Command::HSet { .. } => "HSET",
            Command::HMSet { .. } => "HMSET",
            Command::Get { .. } => "GET",
            Command::MGet { .. } => "MGET",
            Command::LRange { .. } => "LRANGE",
            Command::SMembers { .. } => "SMEMBERS",
            Command::SCard { .. } => "SCARD",
            Command::ZCard { .. } => "ZCARD",
            Command::ZCount { .. } => "ZCOUNT",
            Command::ZScore { .. } => "ZSCORE",
            Command::ZRange { .. } => "ZRANGE",
            Command::ZRangeByScore { .. } => "ZRANGEBYSCORE",
            Command::ZRevRangeByScore { .. } => "ZREVRANGEBYSCORE",
            Command::ZRank { .. } => "ZRANK",
            Command::HGet { .. } => "HGET",
            Command::HMGet { .. } => "HMGET",
            Command::HGetAll { .. } => "HGETALL",
        }
    }

    /// Whether the command mutates the store
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Command::Set { .. }
                | Command::MSet { .. }
                | Command::LPush { .. }
                | Command::RPush { .. }
                | Command::SAdd { .. }
                | Command::ZAdd { .. }
                | Command::HSet { .. }
                | Command::HMSet { .. }
        )
    }

    /// Primary key the command targets (first key for multi-key commands)
    pub fn primary_key(&self) -> Option<&str> {
        match self {
            Command::MSet { pairs } => pairs.first().map(|(k, _)| k.as_str()),
            Command::MGet { keys } => keys.first().map(String::as_str),
            Command::Set { key, .. }
            | Command::LPush { key, .. }
            | Command::RPush { key, .. }
            | Command::SAdd { key, .. }
            | Command::ZAdd { key, .. }
            | Command::HSet { key, .. }
            | Command::HMSet { key, .. }
            | Command::Get { key }
            | Command::LRange { key, .. }
            | Command::SMembers { key }
            | Command::SCard { key }
            | Command::ZCard { key }
            | Command::ZCount { key, .. }
            | Command::ZScore { key, .. }
            | Command::ZRange { key, .. }
            | Command::ZRangeByScore { key, .. }
            | Command::ZRevRangeByScore { key, .. }
            | Command::ZRank { key, .. }
            | Command::HGet { key, .. }
            | Command::HMGet { key, .. }
            | Command::HGetAll { key } => Some(key.as_str()),
        }
    }
}
