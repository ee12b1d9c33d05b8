// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the record repository defined in the
//! domain layer, following the Repository pattern from DDD.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve workload records
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **PostgresSchainRecordRepository** - `schains` table, one row per workload
//! - **InMemorySchainRecordRepository** - Thread-safe HashMap-backed storage
//!   for tests and single-process development

pub mod postgres_schain;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::record::{RecordField, SchainRecord};
use crate::domain::repository::{RepositoryError, SchainRecordRepository};

#[derive(Clone, Default)]
pub struct InMemorySchainRecordRepository {
    records: Arc<RwLock<HashMap<String, SchainRecord>>>,
}

impl InMemorySchainRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchainRecordRepository for InMemorySchainRecordRepository {
    async fn upsert(&self, name: &str) -> Result<SchainRecord, RepositoryError> {
        let mut records = self.records.write();
        Ok(records
            .entry(name.to_string())
            .or_insert_with(|| SchainRecord::new(name))
            .clone())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<SchainRecord>, RepositoryError> {
        Ok(self.records.read().get(name).cloned())
    }

    async fn list(&self) -> Result<Vec<SchainRecord>, RepositoryError> {
        let mut records: Vec<SchainRecord> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn set(&self, name: &str, field: RecordField) -> Result<(), RepositoryError> {
        let mut records = self.records.write();
        match records.get_mut(name) {
            Some(record) => {
                record.apply(&field);
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("sChain record {}", name))),
        }
    }
}
