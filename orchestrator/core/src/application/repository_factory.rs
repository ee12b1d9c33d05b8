// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates the concrete record repository for the configured storage backend.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Backend selection for `SchainRecordRepository`

use std::sync::Arc;

use crate::domain::repository::{RepositoryError, SchainRecordRepository, StorageBackend};
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::postgres_schain::PostgresSchainRecordRepository;
use crate::infrastructure::repositories::InMemorySchainRecordRepository;

/// Creates a SchainRecordRepository implementation based on the configured backend.
/// The Postgres variant connects and ensures its table exists.
pub async fn create_schain_record_repository(
    backend: &StorageBackend,
    max_connections: u32,
) -> Result<Arc<dyn SchainRecordRepository>, RepositoryError> {
    match backend {
        StorageBackend::InMemory => Ok(Arc::new(InMemorySchainRecordRepository::new())),
        StorageBackend::PostgreSQL(config) => {
            let db = Database::connect(&config.connection_string, max_connections).await?;
            let repo = PostgresSchainRecordRepository::new(db.get_pool().clone());
            repo.migrate().await?;
            Ok(Arc::new(repo))
        }
    }
}
