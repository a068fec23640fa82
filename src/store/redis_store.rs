//! Redis-backed store using a small pool of multiplexed async connections.

use redis::aio::ConnectionManager;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{Pipeline, Store, StoreTimeouts};
use crate::error::StoreError;
use crate::workload::Command;

/// Store client shared by every worker and filler
pub struct RedisStore {
    /// Multiplexed connections handed out round-robin
    connections: Vec<ConnectionManager>,
    next: AtomicUsize,
    timeouts: StoreTimeouts,
}

impl RedisStore {
    /// Connect `pool_size` multiplexed connections to `host:port`
    pub async fn connect(
        host: &str,
        port: u16,
        pool_size: usize,
        timeouts: StoreTimeouts,
    ) -> Result<Self, StoreError> {
        let client = redis::Client::open(format!("redis://{}:{}/", host, port))?;

        let mut connections = Vec::with_capacity(pool_size.max(1));
        for _ in 0..pool_size.max(1) {
            connections.push(ConnectionManager::new(client.clone()).await?);
        }

        tracing::debug!(
            host = %host,
            port = port,
            connections = connections.len(),
            "Connected to store"
        );

        Ok(Self {
            connections,
            next: AtomicUsize::new(0),
            timeouts,
        })
    }

    fn connection(&self) -> ConnectionManager {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        self.connections[idx].clone()
    }
}

/// Await a store call, failing with [`StoreError::Timeout`] once `limit` elapses
async fn bounded<F>(limit: Duration, call: F) -> Result<(), StoreError>
where
    F: std::future::Future<Output = redis::RedisResult<redis::Value>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(reply) => reply.map(|_| ()).map_err(StoreError::from),
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

impl Store for RedisStore {
    async fn execute(&self, command: Command) -> Result<(), StoreError> {
        let limit = self.timeouts.for_command(&command);
        let cmd = to_redis_cmd(&command);
        let mut conn = self.connection();
        bounded(limit, cmd.query_async::<_, redis::Value>(&mut conn)).await
    }

    async fn commit(&self, pipeline: Pipeline) -> Result<(), StoreError> {
        if pipeline.is_empty() {
            return Ok(());
        }

        let limit = self.timeouts.for_pipeline(&pipeline);
        let mut pipe = redis::pipe();
        for command in pipeline.commands() {
            pipe.add_command(to_redis_cmd(command));
        }
        let mut conn = self.connection();
        bounded(limit, pipe.query_async::<_, redis::Value>(&mut conn)).await
    }
}

/// Translate a workload command into its wire form
pub fn to_redis_cmd(command: &Command) -> redis::Cmd {
    let mut cmd = redis::cmd(command.verb());

    match command {
        Command::Set { key, value } => {
            cmd.arg(key).arg(value);
        }
        Command::MSet { pairs } => {
            for (key, value) in pairs {
                cmd.arg(key).arg(value);
            }
        }
        Command::LPush { key, values } | Command::RPush { key, values } => {
            cmd.arg(key).arg(values);
        }
        Command::SAdd { key, members } => {
            cmd.arg(key).arg(members);
        }
        Command::ZAdd { key, members } => {
            cmd.arg(key);
            for (score, member) in members {
                cmd.arg(*score).arg(member);
            }
        }
        Command::HSet { key, field, value } => {
            cmd.arg(key).arg(field).arg(value);
        }
        Command::HMSet { key, fields } => {
            cmd.arg(key);
            for (field, value) in fields {
                cmd.arg(field).arg(value);
            }
        }
        Command::MGet { keys } => {
            cmd.arg(keys);
        }
        Command::LRange { key, start, stop } | Command::ZRange { key, start, stop } => {
            cmd.arg(key).arg(*start).arg(*stop);
        }
        Command::ZCount { key, min, max } | Command::ZRangeByScore { key, min, max } => {
            cmd.arg(key).arg(*min).arg(*max);
        }
        Command::ZRevRangeByScore { key, max, min } => {
            cmd.arg(key).arg(*max).arg(*min);
        }
        Command::ZScore { key, member } | Command::ZRank { key, member } => {
            cmd.arg(key).arg(member);
        }
        Command::HGet { key, field } => {
            cmd.arg(key).arg(field);
        }
        Command::HMGet { key, fields } => {
            cmd.arg(key).arg(fields);
        }
        Command::Get { key }
        | Command::SMembers { key }
        | Command::SCard { key }
        | Command::ZCard { key }
        | Command::HGetAll { key } => {
            cmd.arg(key);
        }
    }

    cmd
}
