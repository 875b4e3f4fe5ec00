//! In-memory storage used by the mock repository adapters
//!
//! Rows are kept in insertion order and soft deletion is a timestamp, so
//! the mock adapters observe the same visibility rules as PostgreSQL.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::context::Context;
use crate::ports::PortError;

#[derive(Debug, Clone)]
struct Row<V> {
    value: V,
    seq: u64,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Rows<K, V> {
    by_key: HashMap<K, Row<V>>,
    next_seq: u64,
}

/// A soft-delete aware table keyed by `K`
#[derive(Debug)]
pub struct InMemoryTable<K, V> {
    entity: &'static str,
    rows: RwLock<Rows<K, V>>,
}

impl<K, V> InMemoryTable<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Display,
    V: Clone,
{
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            rows: RwLock::new(Rows {
                by_key: HashMap::new(),
                next_seq: 0,
            }),
        }
    }

    /// Inserts a new row; `unique` rejects the insert when it matches any live row
    pub async fn insert(
        &self,
        ctx: &Context,
        key: K,
        value: V,
        unique: impl Fn(&V) -> bool,
    ) -> Result<V, PortError> {
        ctx.check()?;
        let mut rows = self.rows.write().await;
        if rows.by_key.contains_key(&key) {
            return Err(PortError::conflict(format!("{} {} already exists", self.entity, key)));
        }
        if rows.by_key.values().any(|r| r.deleted_at.is_none() && unique(&r.value)) {
            return Err(PortError::conflict(format!("{} violates a unique key", self.entity)));
        }
        let seq = rows.next_seq;
        rows.next_seq += 1;
        rows.by_key.insert(key, Row { value: value.clone(), seq, deleted_at: None });
        Ok(value)
    }

    pub async fn get(&self, ctx: &Context, key: &K) -> Result<V, PortError> {
        ctx.check()?;
        self.rows
            .read()
            .await
            .by_key
            .get(key)
            .filter(|r| r.deleted_at.is_none())
            .map(|r| r.value.clone())
            .ok_or_else(|| PortError::not_found(self.entity, key))
    }

    /// First live row matching `pred`
    pub async fn find(&self, ctx: &Context, pred: impl Fn(&V) -> bool) -> Result<Option<V>, PortError> {
        Ok(self.filter(ctx, pred).await?.into_iter().next())
    }

    /// All live rows matching `pred`, in insertion order
    pub async fn filter(&self, ctx: &Context, pred: impl Fn(&V) -> bool) -> Result<Vec<V>, PortError> {
        ctx.check()?;
        let rows = self.rows.read().await;
        let mut matched: Vec<&Row<V>> = rows
            .by_key
            .values()
            .filter(|r| r.deleted_at.is_none() && pred(&r.value))
            .collect();
        matched.sort_by_key(|r| r.seq);
        Ok(matched.into_iter().map(|r| r.value.clone()).collect())
    }

    /// Live rows matching `pred`, sliced by `limit` / `offset`
    pub async fn page(
        &self,
        ctx: &Context,
        pred: impl Fn(&V) -> bool,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<V>, PortError> {
        Ok(self
            .filter(ctx, pred)
            .await?
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    pub async fn count(&self, ctx: &Context, pred: impl Fn(&V) -> bool) -> Result<u64, PortError> {
        Ok(self.filter(ctx, pred).await?.len() as u64)
    }

    /// Replaces a live row
    pub async fn replace(&self, ctx: &Context, key: &K, value: V) -> Result<V, PortError> {
        ctx.check()?;
        let mut rows = self.rows.write().await;
        match rows.by_key.get_mut(key) {
            Some(row) if row.deleted_at.is_none() => {
                row.value = value.clone();
                Ok(value)
            }
            _ => Err(PortError::not_found(self.entity, key)),
        }
    }

    pub async fn soft_delete(&self, ctx: &Context, key: &K) -> Result<(), PortError> {
        ctx.check()?;
        let mut rows = self.rows.write().await;
        match rows.by_key.get_mut(key) {
            Some(row) if row.deleted_at.is_none() => {
                row.deleted_at = Some(Utc::now());
                Ok(())
            }
            _ => Err(PortError::not_found(self.entity, key)),
        }
    }
}
