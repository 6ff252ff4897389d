//! Redis queue transport.
//!
//! Layout per queue name:
//! - `{prefix}:queue:{name}:{priority}` lists of serialized envelopes
//! - `{prefix}:queue:{name}:reserved` sorted set of envelopes scored by
//!   their visibility deadline in milliseconds
//! - `{prefix}:queue:{name}:stats` hash of acknowledgement counters

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use jiff::Timestamp;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Script};

use crate::config::settings::RedisConfig;
use crate::queue::{
    JobDescriptor, QueueStats, QueueTransport, ReservedTask, TaskEnvelope, TaskOutcome,
    TaskPriority, TransportError, TransportResult,
};

type RedisPool = Pool<Client>;

/// Pops the first non-empty priority list (KEYS[1..n-1]) into the reserved
/// set (KEYS[n]) in one step.
const RESERVE_SCRIPT: &str = r#"
local reserved = KEYS[#KEYS]
for i = 1, #KEYS - 1 do
    local raw = redis.call('RPOP', KEYS[i])
    if raw then
        redis.call('ZADD', reserved, ARGV[1], raw)
        return raw
    end
end
return false
"#;

/// Redis-backed queue transport.
pub struct RedisQueue {
    pool: RedisPool,
    key_prefix: String,
    reserve_script: Script,
}

impl RedisQueue {
    pub async fn new(config: &RedisConfig) -> TransportResult<Self> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(Duration::from_secs(config.connection_timeout))
            .build(client)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            key_prefix: config.key_prefix.clone(),
            reserve_script: Script::new(RESERVE_SCRIPT),
        })
    }

    fn pending_key(&self, queue: &str, priority: TaskPriority) -> String {
        format!("{}:queue:{}:{}", self.key_prefix, queue, priority.as_str())
    }

    fn reserved_key(&self, queue: &str) -> String {
        format!("{}:queue:{}:reserved", self.key_prefix, queue)
    }

    fn stats_key(&self, queue: &str) -> String {
        format!("{}:queue:{}:stats", self.key_prefix, queue)
    }

    async fn get_conn(&self) -> TransportResult<PooledConnection<'_, Client>> {
        self.pool
            .get()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))
    }
}

fn now_millis() -> i64 {
    Timestamp::now().as_millisecond()
}

/// Extract task ids from serialized envelopes, skipping anything foreign.
fn task_ids(raw_envelopes: Vec<String>) -> HashSet<String> {
    raw_envelopes
        .iter()
        .filter_map(|raw| match serde_json::from_str::<TaskEnvelope>(raw) {
            Ok(envelope) => Some(envelope.task_id),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable task envelope");
                None
            }
        })
        .collect()
}

#[async_trait]
impl QueueTransport for RedisQueue {
    async fn dispatch(
        &self,
        descriptor: &JobDescriptor,
        task_id: &str,
        queue: &str,
        priority: TaskPriority,
    ) -> TransportResult<String> {
        let envelope = TaskEnvelope {
            task_id: task_id.to_string(),
            queue: queue.to_string(),
            priority,
            descriptor: descriptor.clone(),
            enqueued_at: Timestamp::now(),
        };
        let raw = serde_json::to_string(&envelope)?;

        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let _: i64 = conn_ref
            .lpush(self.pending_key(queue, priority), raw)
            .await?;

        Ok(envelope.task_id)
    }

    async fn enqueued_task_ids(&self, queue: &str) -> TransportResult<HashSet<String>> {
        let mut conn = self.get_conn().await?;
        let mut raw_envelopes = Vec::new();

        for priority in TaskPriority::ALL {
            let conn_ref: &mut MultiplexedConnection = &mut conn;
            let batch: Vec<String> = conn_ref
                .lrange(self.pending_key(queue, priority), 0, -1)
                .await?;
            raw_envelopes.extend(batch);
        }

        Ok(task_ids(raw_envelopes))
    }

    async fn reserved_task_ids(&self, queue: &str) -> TransportResult<HashSet<String>> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let raw_envelopes: Vec<String> = redis::cmd("ZRANGE")
            .arg(self.reserved_key(queue))
            .arg(format!("({}", now_millis()))
            .arg("+inf")
            .arg("BYSCORE")
            .query_async(conn_ref)
            .await?;

        Ok(task_ids(raw_envelopes))
    }

    async fn reserve(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> TransportResult<Option<ReservedTask>> {
        let deadline = now_millis() + visibility_timeout.as_millis() as i64;

        let mut invocation = self.reserve_script.prepare_invoke();
        for priority in TaskPriority::ALL {
            invocation.key(self.pending_key(queue, priority));
        }
        invocation.key(self.reserved_key(queue)).arg(deadline);

        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let raw: Option<String> = invocation.invoke_async(conn_ref).await?;

        match raw {
            Some(raw) => {
                let envelope: TaskEnvelope = serde_json::from_str(&raw)?;
                Ok(Some(ReservedTask { envelope, raw }))
            }
            None => Ok(None),
        }
    }

    async fn ack(&self, task: &ReservedTask, outcome: TaskOutcome) -> TransportResult<()> {
        let queue = &task.envelope.queue;
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;

        let _: () = redis::pipe()
            .atomic()
            .zrem(self.reserved_key(queue), &task.raw)
            .ignore()
            .hincr(self.stats_key(queue), outcome.as_str(), 1)
            .ignore()
            .query_async(conn_ref)
            .await?;
        Ok(())
    }

    async fn restore_expired(&self, queue: &str) -> TransportResult<usize> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let expired: Vec<String> = conn_ref
            .zrangebyscore(self.reserved_key(queue), "-inf", now_millis())
            .await?;

        let mut restored = 0;
        for raw in expired {
            let removed: i64 = conn_ref.zrem(self.reserved_key(queue), &raw).await?;
            // another worker restored it first
            if removed == 0 {
                continue;
            }

            let priority = serde_json::from_str::<TaskEnvelope>(&raw)
                .map(|envelope| envelope.priority)
                .unwrap_or_default();
            let _: i64 = conn_ref
                .rpush(self.pending_key(queue, priority), &raw)
                .await?;
            restored += 1;
        }

        Ok(restored)
    }

    async fn stats(&self, queue: &str) -> TransportResult<QueueStats> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let (succeeded, failed): (Option<u64>, Option<u64>) = redis::cmd("HMGET")
            .arg(self.stats_key(queue))
            .arg(TaskOutcome::Succeeded.as_str())
            .arg(TaskOutcome::Failed.as_str())
            .query_async(conn_ref)
            .await?;

        Ok(QueueStats {
            succeeded: succeeded.unwrap_or(0),
            failed: failed.unwrap_or(0),
        })
    }
}
