//! RedisCoordinationStore - production lock backend (`redis` feature).
//!
//! - acquire: `SET key token NX PX ttl_ms`
//! - release: compare-and-delete script, so an expired holder never deletes
//!   the lease of whoever acquired the key after it

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::domain::CoordinationError;
use crate::ports::CoordinationStore;

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

#[derive(Clone)]
pub struct RedisCoordinationStore {
    conn: ConnectionManager,
    release: redis::Script,
}

impl RedisCoordinationStore {
    /// Connect to e.g. `redis://localhost:6379/0`. The connection manager
    /// reconnects on its own after a dropped connection.
    pub async fn connect(url: &str) -> Result<Self, CoordinationError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        let conn = ConnectionManager::new(client).await.map_err(unavailable)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self {
            conn,
            release: redis::Script::new(RELEASE_SCRIPT),
        }
    }
}

fn unavailable(e: redis::RedisError) -> CoordinationError {
    CoordinationError::Unavailable(e.to_string())
}

#[async_trait]
impl CoordinationStore for RedisCoordinationStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CoordinationError> {
        // PX 0 is rejected by Redis
        let ttl_ms = (ttl.as_millis() as u64).max(1);
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(reply.is_some())
    }

    async fn delete_if_equals(&self, key: &str, value: &str) -> Result<bool, CoordinationError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .release
            .key(key)
            .arg(value)
            .invoke_async::<i64>(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(deleted == 1)
    }
}
