//! The cache-store contract shared by interchangeable backends.
//!
//! A multi-backend cache layer holds stores as `dyn CacheStore` and tells
//! them apart with [`CacheStore::store_type`].

use std::time::Duration;

use async_trait::async_trait;

use crate::Error;

/// Options for [`CacheStore::set`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Tags the key is registered under.
    pub tags: Vec<String>,
}

impl SetOptions {
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// Options for [`CacheStore::invalidate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidateOptions {
    /// Tags whose dependent keys are deleted, in order.
    pub tags: Vec<String>,
}

impl InvalidateOptions {
    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { tags: tags.into_iter().map(Into::into).collect() }
    }
}

/// Operations every cache backend provides.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Value stored under `key`; `Error::NotFound` on a miss.
    async fn get(&self, key: &str) -> Result<Vec<u8>, Error>;

    /// Value stored under `key` together with the remaining lifetime the
    /// backend reports for it.
    async fn get_with_ttl(&self, key: &str) -> Result<(Vec<u8>, Duration), Error>;

    async fn set(&self, key: &str, value: &[u8], options: SetOptions) -> Result<(), Error>;

    /// Remove `key`; removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), Error>;

    /// Delete every key listed under the given tags.
    async fn invalidate(&self, options: InvalidateOptions) -> Result<(), Error>;

    /// Remove every entry, tag records included.
    async fn clear(&self) -> Result<(), Error>;

    /// Backend-type identifier.
    fn store_type(&self) -> &'static str;

    /// Release the store's connection. The store is unusable afterwards.
    async fn close(&self) -> Result<(), Error>;
}
