use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::ReplaceOptions;
use mongodb::Collection;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::Error;

/// A persisted key-value store holding serialized values, one entry per key.
#[async_trait]
pub trait Database: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, Error>;

    async fn set_item(&self, key: &str, value: String) -> Result<(), Error>;

    async fn remove_item(&self, key: &str) -> Result<(), Error>;

    /// Held across a read-modify-write of an item. Plain gets and sets do not
    /// take it.
    fn write_lock(&self) -> &AsyncMutex<()>;
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StorageEntry {
    #[serde(rename = "_id")]
    pub key: String,
    pub value: String,
}

#[derive(Debug)]
pub struct MongoDatabase {
    storage: Collection<StorageEntry>,
    writes: AsyncMutex<()>,
}

impl MongoDatabase {
    pub async fn initialize(db: mongodb::Database) -> Result<MongoDatabase, Error> {
        // ping the database to ensure connection is established
        db.run_command(doc! { "ping": 1 }, None).await?;

        Ok(MongoDatabase {
            storage: db.collection("storage"),
            writes: AsyncMutex::new(()),
        })
    }
}

#[async_trait]
impl Database for MongoDatabase {
    #[tracing::instrument(skip(self))]
    async fn get_item(&self, key: &str) -> Result<Option<String>, Error> {
        let entry = self.storage.find_one(doc! { "_id": key }, None).await?;

        Ok(entry.map(|entry| entry.value))
    }

    #[tracing::instrument(skip(self, value))]
    async fn set_item(&self, key: &str, value: String) -> Result<(), Error> {
        let entry = StorageEntry {
            key: key.to_owned(),
            value,
        };
        let options = ReplaceOptions::builder().upsert(true).build();
        self.storage
            .replace_one(doc! { "_id": key }, &entry, options)
            .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn remove_item(&self, key: &str) -> Result<(), Error> {
        self.storage.delete_one(doc! { "_id": key }, None).await?;

        Ok(())
    }

    fn write_lock(&self) -> &AsyncMutex<()> {
        &self.writes
    }
}

/// Process-local store, used for tests and when no mongo instance is
/// configured. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    items: Mutex<HashMap<String, String>>,
    writes: AsyncMutex<()>,
}

impl MemoryDatabase {
    pub fn new() -> MemoryDatabase {
        MemoryDatabase::default()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn get_item(&self, key: &str) -> Result<Option<String>, Error> {
        let items = self.items.lock().unwrap();
        Ok(items.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), Error> {
        let mut items = self.items.lock().unwrap();
        items.insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), Error> {
        let mut items = self.items.lock().unwrap();
        items.remove(key);
        Ok(())
    }

    fn write_lock(&self) -> &AsyncMutex<()> {
        &self.writes
    }
}
