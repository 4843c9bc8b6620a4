use async_trait::async_trait;
use bb8_redis::{
    bb8::{Pool, PooledConnection},
    redis::{self, aio::ConnectionLike, AsyncCommands, JsonAsyncCommands},
    RedisConnectionManager,
};
use libs::{Collection, DocumentField};
use strum_macros::Display;

use super::{field_matches, string_field, Document, DocumentStore, StoreError};

#[derive(Debug, Display)]
enum RedisJsonPath {
    #[strum(serialize = "$")]
    Root,
}

#[derive(Debug, Display)]
#[strum(serialize_all = "snake_case")]
enum OperatingRedisKey {
    CurrentId,
    OperatingInfo,
    Index,
}

const SCHEMA_VERSION: u32 = 1;

fn document_key(collection: Collection, id: &str) -> String {
    format!("{}:{}", collection, id)
}

fn counter_key(collection: Collection) -> String {
    format!("{}:{}", OperatingRedisKey::CurrentId, collection)
}

fn index_key(collection: Collection, field: DocumentField, value: &str) -> String {
    format!("{}:{}:{}:{}", OperatingRedisKey::Index, collection, field, value)
}

fn field_path(field: &str) -> String {
    format!("{}.{}", RedisJsonPath::Root, field)
}

// Ids are zero-padded so keys of one collection sort in creation order.
fn generate_id(n: i64) -> String {
    format!("{:04}", n)
}

/// Documents live at `<collection>:<id>` as RedisJSON values. Unique fields
/// are claimed through `index:<collection>:<field>:<value>` keys holding the
/// owning id, so lookups on them never scan.
#[derive(Clone)]
pub struct RedisStore {
    redis_pool: Pool<RedisConnectionManager>,
}

impl RedisStore {
    pub async fn connect(url: &str, min_idle: u32) -> Result<Self, StoreError> {
        let redis_manager = RedisConnectionManager::new(url)?;
        let redis_pool = Pool::builder()
            .min_idle(Some(min_idle))
            .build(redis_manager)
            .await?;

        let store = RedisStore { redis_pool };
        store.check_or_init_operating_record().await?;
        Ok(store)
    }

    async fn connection(
        &self,
    ) -> Result<PooledConnection<'_, RedisConnectionManager>, StoreError> {
        self.redis_pool
            .get()
            .await
            .map_err(|err| StoreError::PoolError(err.to_string()))
    }

    async fn check_or_init_operating_record(&self) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        let key = OperatingRedisKey::OperatingInfo.to_string();
        let existing: Option<String> = con
            .json_get(&key, RedisJsonPath::Root.to_string())
            .await?;

        match existing {
            Some(_) => {
                tracing::info!("Check: `{}` exists.", key);
            }
            None => {
                tracing::info!("Check: `{}` doesn't exist. Creating", key);
                let operating_info = serde_json::json!({
                    "schema_version": SCHEMA_VERSION,
                    "collections": [Collection::Todos.to_string(), Collection::Users.to_string()],
                });
                let _: () = con
                    .json_set(&key, RedisJsonPath::Root.to_string(), &operating_info)
                    .await?;
            }
        }
        Ok(())
    }

    async fn write_new<C>(
        con: &mut C,
        collection: Collection,
        doc: Document,
    ) -> Result<String, StoreError>
    where
        C: ConnectionLike + Send,
    {
        let id = next_id(con, collection).await?;
        write_document(con, collection, &id, doc).await?;
        Ok(id)
    }
}

async fn next_id<C>(con: &mut C, collection: Collection) -> Result<String, StoreError>
where
    C: ConnectionLike + Send,
{
    let n: i64 = con.incr(counter_key(collection), 1).await?;
    Ok(generate_id(n))
}

async fn write_document<C>(
    con: &mut C,
    collection: Collection,
    id: &str,
    mut doc: Document,
) -> Result<(), StoreError>
where
    C: ConnectionLike + Send,
{
    doc.insert(DocumentField::Id.to_string(), serde_json::json!(id));
    let _: () = con
        .json_set(
            document_key(collection, id),
            RedisJsonPath::Root.to_string(),
            &doc,
        )
        .await?;
    Ok(())
}

// Deletes KEYS[1] only while it still holds ARGV[1].
const RELEASE_CLAIM: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
";

/// Reserves `id` under a unique index key, then writes the document. The
/// index never holds anything but the owning id.
async fn insert_claimed<C>(
    con: &mut C,
    collection: Collection,
    field: DocumentField,
    doc: Document,
) -> Result<String, StoreError>
where
    C: ConnectionLike + Send,
{
    let value = string_field(&doc, field)?;
    let index = index_key(collection, field, &value);
    let id = next_id(con, collection).await?;

    let claimed: bool = con.set_nx(&index, &id).await?;
    if !claimed {
        return Err(StoreError::Conflict {
            collection,
            field: field.to_string(),
        });
    }

    match write_document(con, collection, &id, doc).await {
        Ok(()) => Ok(id),
        Err(err) => {
            let released: Result<i64, _> = redis::Script::new(RELEASE_CLAIM)
                .key(&index)
                .arg(&id)
                .invoke_async(con)
                .await;
            if let Err(cleanup) = released {
                tracing::error!("could not release `{}` held by {}: {:?}", index, id, cleanup);
            }
            Err(err)
        }
    }
}

async fn read_document<C>(con: &mut C, key: &str) -> Result<Option<Document>, StoreError>
where
    C: ConnectionLike + Send,
{
    let raw: Option<String> = con.json_get(key, RedisJsonPath::Root.to_string()).await?;
    parse_json_get(raw)
}

// JSON.GET with a `$` path answers with an array of matches.
fn parse_json_get(raw: Option<String>) -> Result<Option<Document>, StoreError> {
    match raw {
        Some(raw) => {
            let matches: Vec<Document> = serde_json::from_str(&raw)?;
            Ok(matches.into_iter().next())
        }
        None => Ok(None),
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn list_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let mut con = self.connection().await?;

        let keys: Vec<String> = {
            let mut iter = con
                .scan_match::<String, String>(format!("{}:*", collection))
                .await?;
            let mut keys = vec![];
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        let mut documents = Vec::with_capacity(keys.len());
        for key in keys {
            match read_document(&mut *con, &key).await? {
                Some(doc) => documents.push(doc),
                // Deleted between SCAN and JSON.GET.
                None => tracing::debug!("`{}` vanished while listing", key),
            }
        }
        Ok(documents)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let mut con = self.connection().await?;
        read_document(&mut *con, &document_key(collection, id)).await
    }

    async fn insert(&self, collection: Collection, doc: Document) -> Result<String, StoreError> {
        let mut con = self.connection().await?;
        Self::write_new(&mut *con, collection, doc).await
    }

    async fn insert_unique(
        &self,
        collection: Collection,
        field: DocumentField,
        doc: Document,
    ) -> Result<String, StoreError> {
        let mut con = self.connection().await?;
        insert_claimed(&mut *con, collection, field, doc).await
    }

    async fn update_fields(
        &self,
        collection: Collection,
        id: &str,
        fields: Document,
    ) -> Result<(), StoreError> {
        let key = document_key(collection, id);
        let mut con = self.connection().await?;

        let exists: bool = con.exists(&key).await?;
        if !exists {
            return Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            });
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (field, value) in &fields {
            pipe.cmd("JSON.SET")
                .arg(&key)
                .arg(field_path(field))
                .arg(serde_json::to_string(value)?)
                .ignore();
        }
        let _: () = pipe.query_async(&mut *con).await?;
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let mut con = self.connection().await?;
        let removed: i64 = con.del(document_key(collection, id)).await?;
        Ok(removed > 0)
    }

    async fn find_by_field(
        &self,
        collection: Collection,
        field: DocumentField,
        value: &str,
    ) -> Result<Vec<Document>, StoreError> {
        if field == DocumentField::Email {
            let mut con = self.connection().await?;
            let id: Option<String> = con.get(index_key(collection, field, value)).await?;
            let doc = match id.filter(|id| !id.is_empty()) {
                Some(id) => read_document(&mut *con, &document_key(collection, &id)).await?,
                None => None,
            };
            return Ok(doc
                .filter(|doc| field_matches(doc, field, value))
                .into_iter()
                .collect());
        }

        Ok(self
            .list_all(collection)
            .await?
            .into_iter()
            .filter(|doc| field_matches(doc, field, value))
            .collect())
    }
}
