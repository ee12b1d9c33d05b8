// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contract for [`SchainRecord`], following the DDD Repository
//! pattern: interface defined in the domain layer, implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `SchainRecordRepository` | `SchainRecord` | `InMemorySchainRecordRepository`, `PostgresSchainRecordRepository` |
//!
//! ## Storage Backend Abstraction
//!
//! The implementation is selected at startup: PostgreSQL when
//! `spec.database.url` is configured, in-memory otherwise (tests and
//! single-process development).

use async_trait::async_trait;

use crate::domain::record::{RecordField, SchainRecord};

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
}

#[async_trait]
pub trait SchainRecordRepository: Send + Sync {
    /// Get the record for `name`, creating it with defaults if absent.
    /// Creation is guarded by the unique constraint on `name`.
    async fn upsert(&self, name: &str) -> Result<SchainRecord, RepositoryError>;

    async fn get_by_name(&self, name: &str) -> Result<Option<SchainRecord>, RepositoryError>;

    /// All records, including soft-deleted ones.
    async fn list(&self) -> Result<Vec<SchainRecord>, RepositoryError>;

    /// Update exactly one field. Fails with `NotFound` for unknown names.
    async fn set(&self, name: &str, field: RecordField) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
