use async_trait::async_trait;
use redis::AsyncCommands;

use crate::models::job::ObjectId;
use crate::services::metadata::{Guard, MetadataStore, StoreError};

const DEFAULT_PREFIX: &str = "compress_relay";

/// Checks an optional guard field, then removes and writes fields of the
/// object hash while keeping per-value index sets in step. Returns 0 when the
/// guard rejects the current value and nothing was touched.
///
/// ARGV: object id, index key prefix, guard field ('' for none), or-absent flag,
/// allowed value count, allowed values, removal count, (field, indexed) pairs,
/// then (field, value, indexed) triples.
const UPDATE_SCRIPT: &str = r#"
local id = ARGV[1]
local prefix = ARGV[2]
local guard = ARGV[3]
local or_absent = ARGV[4] == '1'
local n_allowed = tonumber(ARGV[5])
local i = 6

if guard ~= '' then
  local current = redis.call('HGET', KEYS[1], guard)
  local admitted = false
  if current then
    for j = i, i + n_allowed - 1 do
      if ARGV[j] == current then
        admitted = true
      end
    end
  else
    admitted = or_absent
  end
  if not admitted then
    return 0
  end
end
i = i + n_allowed

local n_removes = tonumber(ARGV[i])
i = i + 1
for j = i, i + 2 * n_removes - 1, 2 do
  local field, indexed = ARGV[j], ARGV[j + 1]
  if indexed == '1' then
    local old = redis.call('HGET', KEYS[1], field)
    if old then
      redis.call('SREM', prefix .. field .. ':' .. old, id)
    end
  end
  redis.call('HDEL', KEYS[1], field)
end
i = i + 2 * n_removes

for j = i, #ARGV, 3 do
  local field, value, indexed = ARGV[j], ARGV[j + 1], ARGV[j + 2]
  if indexed == '1' then
    local old = redis.call('HGET', KEYS[1], field)
    if old then
      redis.call('SREM', prefix .. field .. ':' .. old, id)
    end
    redis.call('SADD', prefix .. field .. ':' .. value, id)
  end
  redis.call('HSET', KEYS[1], field, value)
end
return 1
"#;

/// Redis-backed metadata store.
///
/// Each object is a hash at `{prefix}:object:{id}`. Fields listed in
/// `indexed` also maintain a set per value at `{prefix}:index:{field}:{value}`
/// so they can be queried.
pub struct RedisMetadataStore {
    client: redis::Client,
    prefix: String,
    indexed: Vec<String>,
    script: redis::Script,
}

impl RedisMetadataStore {
    pub fn new(redis_url: &str, indexed: &[&str]) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            prefix: DEFAULT_PREFIX.to_string(),
            indexed: indexed.iter().map(|f| f.to_string()).collect(),
            script: redis::Script::new(UPDATE_SCRIPT),
        })
    }

    /// Use a different key namespace (e.g. per site or per test run).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn object_key(&self, id: ObjectId) -> String {
        format!("{}:object:{}", self.prefix, id)
    }

    fn index_prefix(&self) -> String {
        format!("{}:index:", self.prefix)
    }

    fn is_indexed(&self, field: &str) -> bool {
        self.indexed.iter().any(|f| f == field)
    }

    fn index_flag(&self, field: &str) -> &'static str {
        if self.is_indexed(field) {
            "1"
        } else {
            "0"
        }
    }

    async fn run_update(
        &self,
        id: ObjectId,
        guard: Option<Guard<'_>>,
        removes: &[&str],
        writes: &[(&str, String)],
    ) -> Result<bool, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let mut invocation = self.script.key(self.object_key(id));
        invocation.arg(id.0).arg(self.index_prefix());
        match guard {
            Some(guard) => {
                invocation
                    .arg(guard.field)
                    .arg(if guard.or_absent { "1" } else { "0" })
                    .arg(guard.one_of.len());
                for value in guard.one_of {
                    invocation.arg(*value);
                }
            }
            None => {
                invocation.arg("").arg("0").arg(0);
            }
        }
        invocation.arg(removes.len());
        for field in removes {
            invocation.arg(*field).arg(self.index_flag(field));
        }
        for (field, value) in writes {
            invocation.arg(*field).arg(value.as_str()).arg(self.index_flag(field));
        }
        let applied: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(applied == 1)
    }
}

#[async_trait]
impl MetadataStore for RedisMetadataStore {
    async fn get(&self, id: ObjectId, field: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.hget(self.object_key(id), field).await?;
        Ok(value)
    }

    async fn set(&self, id: ObjectId, field: &str, value: &str) -> Result<(), StoreError> {
        self.set_many(id, &[(field, value.to_string())]).await
    }

    async fn set_many(&self, id: ObjectId, fields: &[(&str, String)]) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }

        self.run_update(id, None, &[], fields).await?;
        Ok(())
    }

    async fn update_if(
        &self,
        id: ObjectId,
        guard: Guard<'_>,
        removes: &[&str],
        writes: &[(&str, String)],
    ) -> Result<bool, StoreError> {
        self.run_update(id, Some(guard), removes, writes).await
    }

    async fn query(
        &self,
        field: &str,
        values: &[&str],
        limit: usize,
    ) -> Result<Vec<ObjectId>, StoreError> {
        if !self.is_indexed(field) {
            return Err(StoreError::NotIndexed(field.to_string()));
        }
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = values
            .iter()
            .map(|value| format!("{}{}:{}", self.index_prefix(), field, value))
            .collect();

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let members: Vec<String> = conn.sunion(keys).await?;

        let mut ids = Vec::with_capacity(members.len());
        for member in members {
            match member.parse::<ObjectId>() {
                Ok(id) => ids.push(id),
                Err(_) => tracing::warn!(field, member = %member, "Skipping malformed index entry"),
            }
        }
        ids.sort();
        ids.truncate(limit);
        Ok(ids)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}
