// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres sChain Records
//!
//! One row per workload in the `schains` table. Every setter is a single-column
//! `UPDATE`, so concurrent writers of different fields never overwrite each
//! other.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `SchainRecordRepository` on PostgreSQL

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::record::{DkgStatus, RecordField, SchainRecord};
use crate::domain::repository::{RepositoryError, SchainRecordRepository};

const SELECT_COLUMNS: &str = r#"
    name, added_at, dkg_status, is_deleted, first_run, new_schain,
    repair_mode, needs_reload, backup_run, monitor_pid, monitor_last_seen,
    restart_count, failed_rpc_count, config_version, snapshot_source
"#;

pub struct PostgresSchainRecordRepository {
    pool: PgPool,
}

impl PostgresSchainRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `schains` table if it does not exist yet.
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schains (
                name TEXT PRIMARY KEY,
                added_at TIMESTAMPTZ NOT NULL,
                dkg_status INTEGER NOT NULL DEFAULT 1,
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                first_run BOOLEAN NOT NULL DEFAULT TRUE,
                new_schain BOOLEAN NOT NULL DEFAULT TRUE,
                repair_mode BOOLEAN NOT NULL DEFAULT FALSE,
                needs_reload BOOLEAN NOT NULL DEFAULT FALSE,
                backup_run BOOLEAN NOT NULL DEFAULT FALSE,
                monitor_pid BIGINT NOT NULL DEFAULT 0,
                monitor_last_seen TIMESTAMPTZ NOT NULL,
                restart_count INTEGER NOT NULL DEFAULT 0,
                failed_rpc_count INTEGER NOT NULL DEFAULT 0,
                config_version TEXT NOT NULL DEFAULT '0.0.0',
                snapshot_source TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to create schains table: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl SchainRecordRepository for PostgresSchainRecordRepository {
    async fn upsert(&self, name: &str) -> Result<SchainRecord, RepositoryError> {
        let record = SchainRecord::new(name);
        sqlx::query(
            r#"
            INSERT INTO schains (
                name, added_at, dkg_status, is_deleted, first_run, new_schain,
                repair_mode, needs_reload, backup_run, monitor_pid, monitor_last_seen,
                restart_count, failed_rpc_count, config_version, snapshot_source
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(&record.name)
        .bind(record.added_at)
        .bind(record.dkg_status.code())
        .bind(record.is_deleted)
        .bind(record.first_run)
        .bind(record.new_schain)
        .bind(record.repair_mode)
        .bind(record.needs_reload)
        .bind(record.backup_run)
        .bind(record.monitor_pid as i64)
        .bind(record.monitor_last_seen)
        .bind(record.restart_count as i32)
        .bind(record.failed_rpc_count as i32)
        .bind(&record.config_version)
        .bind(&record.snapshot_source)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to upsert sChain record: {}", e)))?;

        self.get_by_name(name)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("sChain record {}", name)))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<SchainRecord>, RepositoryError> {
        let sql = format!("SELECT {} FROM schains WHERE name = $1", SELECT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        row.map(parse_record_row).transpose()
    }

    async fn list(&self) -> Result<Vec<SchainRecord>, RepositoryError> {
        let sql = format!("SELECT {} FROM schains ORDER BY name", SELECT_COLUMNS);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.into_iter().map(parse_record_row).collect()
    }

    async fn set(&self, name: &str, field: RecordField) -> Result<(), RepositoryError> {
        // Column names come from a closed enum, never from input.
        let sql = format!("UPDATE schains SET {} = $1 WHERE name = $2", field.column());
        let query = sqlx::query(&sql);
        let query = match field {
            RecordField::DkgStatus(status) => query.bind(status.code()),
            RecordField::IsDeleted(v)
            | RecordField::FirstRun(v)
            | RecordField::NewSchain(v)
            | RecordField::RepairMode(v)
            | RecordField::NeedsReload(v)
            | RecordField::BackupRun(v) => query.bind(v),
            RecordField::MonitorPid(pid) => query.bind(pid as i64),
            RecordField::MonitorLastSeen(ts) => query.bind(ts),
            RecordField::RestartCount(n) | RecordField::FailedRpcCount(n) => query.bind(n as i32),
            RecordField::ConfigVersion(version) => query.bind(version),
            RecordField::SnapshotSource(source) => query.bind(source),
        };

        let result = query
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to update sChain record: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("sChain record {}", name)));
        }
        Ok(())
    }
}

fn parse_record_row(row: PgRow) -> Result<SchainRecord, RepositoryError> {
    let dkg_code: i32 = row.try_get("dkg_status")?;
    let dkg_status = DkgStatus::from_code(dkg_code)
        .ok_or_else(|| RepositoryError::Serialization(format!("Unknown dkg_status {}", dkg_code)))?;
    let monitor_pid: i64 = row.try_get("monitor_pid")?;
    let restart_count: i32 = row.try_get("restart_count")?;
    let failed_rpc_count: i32 = row.try_get("failed_rpc_count")?;
    let added_at: DateTime<Utc> = row.try_get("added_at")?;
    let monitor_last_seen: DateTime<Utc> = row.try_get("monitor_last_seen")?;

    Ok(SchainRecord {
        name: row.try_get("name")?,
        added_at,
        dkg_status,
        is_deleted: row.try_get("is_deleted")?,
        first_run: row.try_get("first_run")?,
        new_schain: row.try_get("new_schain")?,
        repair_mode: row.try_get("repair_mode")?,
        needs_reload: row.try_get("needs_reload")?,
        backup_run: row.try_get("backup_run")?,
        monitor_pid: monitor_pid.max(0) as u32,
        monitor_last_seen,
        restart_count: restart_count.max(0) as u32,
        failed_rpc_count: failed_rpc_count.max(0) as u32,
        config_version: row.try_get("config_version")?,
        snapshot_source: row.try_get("snapshot_source")?,
    })
}
