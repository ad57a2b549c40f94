use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{BackendError, BackendResult};
use crate::query::Query;

/// Row-level access to the relational store.
///
/// Rows travel as JSON; [`DataApiExt`] layers typed helpers on top.
#[async_trait]
pub trait DataApi: Send + Sync {
    async fn select(&self, query: &Query) -> BackendResult<Vec<Value>>;

    /// Insert one row and return the stored representation.
    async fn insert(&self, table: &str, row: Value) -> BackendResult<Value>;

    /// Apply `changes` to every row matched by `query`, returning the updated rows.
    async fn update(&self, query: &Query, changes: Value) -> BackendResult<Vec<Value>>;

    async fn delete(&self, query: &Query) -> BackendResult<Vec<Value>>;

    /// Invoke a remote procedure with named arguments.
    async fn rpc(&self, function: &str, args: Value) -> BackendResult<Value>;
}

#[async_trait]
pub trait DataApiExt: DataApi {
    async fn select_as<T>(&self, query: &Query) -> BackendResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let rows = self.select(query).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(BackendError::from))
            .collect()
    }

    /// Exactly one row; zero rows is [`BackendError::NotFound`].
    async fn select_single<T>(&self, query: &Query) -> BackendResult<T>
    where
        T: DeserializeOwned + Send,
    {
        let query = query.clone().limit(1);
        let row = self
            .select(&query)
            .await?
            .into_iter()
            .next()
            .ok_or(BackendError::NotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    /// Zero or one row.
    async fn select_optional<T>(&self, query: &Query) -> BackendResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.select_single(query).await {
            Ok(row) => Ok(Some(row)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn insert_as<R, T>(&self, table: &str, row: &R) -> BackendResult<T>
    where
        R: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Send,
    {
        let stored = self.insert(table, serde_json::to_value(row)?).await?;
        Ok(serde_json::from_value(stored)?)
    }

    async fn update_as<T>(&self, query: &Query, changes: Value) -> BackendResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let rows = self.update(query, changes).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(BackendError::from))
            .collect()
    }

    async fn rpc_as<T>(&self, function: &str, args: Value) -> BackendResult<T>
    where
        T: DeserializeOwned + Send,
    {
        let value = self.rpc(function, args).await?;
        Ok(serde_json::from_value(value)?)
    }
}

impl<D: DataApi + ?Sized> DataApiExt for D {}
