//! Redis-backed [`KvStore`].
//!
//! Keys are namespaced as `{prefix}:{key}` so several deployments can share a
//! Redis database. Each command is bounded by [`RedisPolicy::timeout`]. Prefix
//! listing walks `SCAN MATCH` instead of blocking the server with `KEYS`.
//! A failed command drops the cached connection so the next call reconnects.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use elpris_core::CacheError;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::warn;

use super::traits::{ttl_secs, CacheResult, KvStore};

#[derive(Debug, Clone)]
pub struct RedisPolicy {
    /// Upper bound on connect + command time.
    pub timeout: Duration,
}

impl Default for RedisPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
        }
    }
}

pub struct RedisKvStore {
    client: redis::Client,
    prefix: String,
    policy: RedisPolicy,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl std::fmt::Debug for RedisKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKvStore")
            .field("prefix", &self.prefix)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RedisKvStore {
    /// Open a client for `url`. No connection is made until the first command.
    pub fn new(url: &str, prefix: &str, policy: RedisPolicy) -> CacheResult<Self> {
        let client = redis::Client::open(url).map_err(|e| CacheError::Unavailable {
            reason: format!("invalid redis url: {}", e),
        })?;
        Ok(Self {
            client,
            prefix: prefix.trim_end_matches(':').to_string(),
            policy,
            connection: Mutex::new(None),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    fn strip_namespace<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(&self.prefix)
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(key)
    }

    /// `SCAN MATCH` pattern for keys starting with `prefix`, taken literally.
    fn scan_pattern(&self, prefix: &str) -> String {
        format!("{}*", escape_glob(&self.namespaced(prefix)))
    }

    async fn connection(&self) -> CacheResult<MultiplexedConnection> {
        let mut cached = self.connection.lock().await;
        if let Some(conn) = cached.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Unavailable {
                reason: e.to_string(),
            })?;
        *cached = Some(conn.clone());
        Ok(conn)
    }

    async fn reset_connection(&self) {
        *self.connection.lock().await = None;
    }

    /// Run one command under the policy timeout.
    async fn run<T, F, Fut>(&self, operation: &str, command: F) -> CacheResult<T>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let attempt = async {
            let conn = self.connection().await?;
            command(conn).await.map_err(|e| CacheError::Unavailable {
                reason: e.to_string(),
            })
        };

        let result = match timeout(self.policy.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout {
                operation: operation.to_string(),
            }),
        };

        if let Err(err) = &result {
            warn!(operation, error = %err, "Redis command failed");
            self.reset_connection().await;
        }
        result
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let key = self.namespaced(key);
        self.run("get", |mut conn| async move {
            let value: Option<String> = conn.get(key).await?;
            Ok::<_, redis::RedisError>(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let key = self.namespaced(key);
        let value = value.to_string();
        let secs = ttl_secs(ttl);
        self.run("set", |mut conn| async move {
            let _: () = conn.set_ex(key, value, secs).await?;
            Ok::<_, redis::RedisError>(())
        })
        .await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let key = self.namespaced(key);
        self.run("exists", |mut conn| async move {
            let found: bool = conn.exists(key).await?;
            Ok::<_, redis::RedisError>(found)
        })
        .await
    }

    async fn keys(&self, prefix: &str) -> CacheResult<Vec<String>> {
        let pattern = self.scan_pattern(prefix);
        let raw: Vec<String> = self
            .run("scan", |mut conn| async move {
                let mut keys = Vec::new();
                let mut iter = conn.scan_match::<_, String>(pattern).await?;
                while let Some(key) = iter.next_item().await {
                    keys.push(key);
                }
                Ok::<_, redis::RedisError>(keys)
            })
            .await?;
        let mut keys: Vec<String> = raw
            .iter()
            .map(|key| self.strip_namespace(key).to_string())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> CacheResult<()> {
        let _pong: String = self
            .run("ping", |mut conn| async move {
                let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
                Ok::<_, redis::RedisError>(pong)
            })
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
