//! # Cylinder Repository
//!
//! Filled/empty counts per (branch, cylinder type) and the append-only
//! journal of the movements applied to them.
//!
//! ## Transaction Flow
//! ```text
//! apply_transaction(branch, type, ISSUE, 2)
//!      │
//!      ├── BEGIN
//!      ├── INSERT stock row ON CONFLICT DO NOTHING   ← write lock, lazy row
//!      ├── SELECT filled, empty
//!      ├── CylinderLevels::apply                     ← rule check
//!      ├── UPDATE … WHERE filled_qty = ? AND empty_qty = ?
//!      ├── INSERT cylinder_transactions
//!      └── COMMIT
//! ```
//! A rejected movement leaves both the stock row and the journal untouched.

use chrono::Utc;
use forecourt_core::cylinder::CylinderLevels;
use forecourt_core::validation::validate_notes;
use forecourt_core::{
    Branch, CoreError, CylinderStock, CylinderTransaction, CylinderTxType, CylinderType,
};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::registry::{BRANCHES, CYLINDER_TYPES};
use super::{fetch_by_id, new_id, require_active};
use crate::error::{DbError, DbResult};

/// Stock after a movement together with its journal row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedTransaction {
    pub stock: CylinderStock,
    pub transaction: CylinderTransaction,
}

/// Repository for cylinder stock operations.
#[derive(Debug, Clone)]
pub struct CylinderRepository {
    pool: SqlitePool,
}

impl CylinderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CylinderRepository { pool }
    }

    /// Applies one stock movement.
    ///
    /// ## Movements
    /// - RECEIVE: filled += q
    /// - ISSUE: filled -= q, empty += q (needs filled ≥ q)
    /// - RETURN: empty -= q (needs empty ≥ q)
    pub async fn apply_transaction(
        &self,
        branch_id: &str,
        cylinder_type_id: &str,
        tx_type: CylinderTxType,
        quantity: i64,
        notes: Option<&str>,
    ) -> DbResult<AppliedTransaction> {
        debug!(branch_id = %branch_id, cylinder_type_id = %cylinder_type_id, ?tx_type, quantity, "Applying cylinder transaction");

        let notes = validate_notes(notes)?;

        let cylinder_type = {
            let mut conn = self.pool.acquire().await?;
            let branch = require_active(
                fetch_by_id::<Branch>(&mut *conn, BRANCHES, branch_id).await?,
                "Branch",
                branch_id,
            )?;
            let cylinder_type = require_active(
                fetch_by_id::<CylinderType>(&mut *conn, CYLINDER_TYPES, cylinder_type_id).await?,
                "CylinderType",
                cylinder_type_id,
            )?;
            if cylinder_type.business_id != branch.business_id {
                return Err(CoreError::reference(
                    "CylinderType",
                    cylinder_type_id,
                    "belongs to another business",
                )
                .into());
            }
            cylinder_type
        };

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO cylinder_stock (id, branch_id, cylinder_type_id, filled_qty, empty_qty, updated_at)
            VALUES (?1, ?2, ?3, 0, 0, ?4)
            ON CONFLICT (branch_id, cylinder_type_id) DO NOTHING
            "#,
        )
        .bind(new_id())
        .bind(branch_id)
        .bind(cylinder_type_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let current = stock_row(&mut tx, branch_id, cylinder_type_id)
            .await?
            .ok_or_else(|| DbError::Internal("cylinder stock row missing after insert".to_string()))?;
        let levels = CylinderLevels::new(current.filled_qty, current.empty_qty);

        let (after, delta) = levels.apply(&cylinder_type.code, tx_type, quantity)?;

        let result = sqlx::query(
            r#"
            UPDATE cylinder_stock SET filled_qty = ?2, empty_qty = ?3, updated_at = ?4
            WHERE id = ?1 AND filled_qty = ?5 AND empty_qty = ?6
            "#,
        )
        .bind(&current.id)
        .bind(after.filled)
        .bind(after.empty)
        .bind(now)
        .bind(levels.filled)
        .bind(levels.empty)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Busy(format!(
                "cylinder stock {} changed during transaction",
                current.id
            )));
        }

        let transaction = CylinderTransaction {
            id: new_id(),
            branch_id: branch_id.to_string(),
            cylinder_type_id: cylinder_type_id.to_string(),
            tx_type,
            quantity,
            filled_delta: delta.filled,
            empty_delta: delta.empty,
            filled_after: after.filled,
            empty_after: after.empty,
            notes,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO cylinder_transactions (
                id, branch_id, cylinder_type_id, tx_type, quantity,
                filled_delta, empty_delta, filled_after, empty_after, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&transaction.id)
        .bind(&transaction.branch_id)
        .bind(&transaction.cylinder_type_id)
        .bind(transaction.tx_type)
        .bind(transaction.quantity)
        .bind(transaction.filled_delta)
        .bind(transaction.empty_delta)
        .bind(transaction.filled_after)
        .bind(transaction.empty_after)
        .bind(&transaction.notes)
        .bind(transaction.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            branch_id = %branch_id,
            cylinder_type = %cylinder_type.code,
            ?tx_type,
            quantity,
            filled = after.filled,
            empty = after.empty,
            "Cylinder stock updated"
        );

        Ok(AppliedTransaction {
            stock: CylinderStock {
                filled_qty: after.filled,
                empty_qty: after.empty,
                updated_at: now,
                ..current
            },
            transaction,
        })
    }

    /// Stock of one cylinder type; `None` before the first movement.
    pub async fn stock(
        &self,
        branch_id: &str,
        cylinder_type_id: &str,
    ) -> DbResult<Option<CylinderStock>> {
        let mut conn = self.pool.acquire().await?;
        stock_row(&mut conn, branch_id, cylinder_type_id).await
    }

    pub async fn list_stock(&self, branch_id: &str) -> DbResult<Vec<CylinderStock>> {
        let stock = sqlx::query_as::<_, CylinderStock>(
            r#"
            SELECT s.* FROM cylinder_stock s
            JOIN cylinder_types t ON t.id = s.cylinder_type_id
            WHERE s.branch_id = ?1
            ORDER BY t.code
            "#,
        )
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(stock)
    }

    /// Journal rows, newest first.
    pub async fn history(
        &self,
        branch_id: &str,
        cylinder_type_id: &str,
        limit: u32,
    ) -> DbResult<Vec<CylinderTransaction>> {
        let rows = sqlx::query_as::<_, CylinderTransaction>(
            r#"
            SELECT * FROM cylinder_transactions
            WHERE branch_id = ?1 AND cylinder_type_id = ?2
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?3
            "#,
        )
        .bind(branch_id)
        .bind(cylinder_type_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

async fn stock_row(
    conn: &mut SqliteConnection,
    branch_id: &str,
    cylinder_type_id: &str,
) -> DbResult<Option<CylinderStock>> {
    let stock = sqlx::query_as::<_, CylinderStock>(
        "SELECT * FROM cylinder_stock WHERE branch_id = ?1 AND cylinder_type_id = ?2",
    )
    .bind(branch_id)
    .bind(cylinder_type_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(stock)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{station, station_on};
    use crate::repository::registry::TopologyEntity;
    use crate::{Database, DbConfig};
    use forecourt_core::StockBucket;
    use std::time::Duration;

    #[tokio::test]
    async fn test_issue_swaps_and_rejects_overdraw() {
        let s = station(0).await;
        let cylinders = s.db.cylinders();
        let (branch, kind) = (&s.branch.id, &s.cylinder.id);

        cylinders
            .apply_transaction(branch, kind, CylinderTxType::Receive, 85, Some("Supplier delivery"))
            .await
            .unwrap();
        sqlx::query("UPDATE cylinder_stock SET empty_qty = 15 WHERE branch_id = ?1")
            .bind(branch)
            .execute(s.db.pool())
            .await
            .unwrap();

        let applied = cylinders
            .apply_transaction(branch, kind, CylinderTxType::Issue, 10, None)
            .await
            .unwrap();
        assert_eq!((applied.stock.filled_qty, applied.stock.empty_qty), (75, 25));
        assert_eq!(applied.transaction.filled_delta, -10);
        assert_eq!(applied.transaction.empty_delta, 10);

        let err = cylinders
            .apply_transaction(branch, kind, CylinderTxType::Issue, 80, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock {
                bucket: StockBucket::Filled,
                available: 75,
                requested: 80,
                ..
            })
        ));

        let stock = cylinders.stock(branch, kind).await.unwrap().unwrap();
        assert_eq!((stock.filled_qty, stock.empty_qty), (75, 25));
        assert_eq!(cylinders.history(branch, kind, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_return_needs_empties() {
        let s = station(0).await;
        let cylinders = s.db.cylinders();
        let (branch, kind) = (&s.branch.id, &s.cylinder.id);

        assert!(cylinders.stock(branch, kind).await.unwrap().is_none());
        let err = cylinders
            .apply_transaction(branch, kind, CylinderTxType::Return, 1, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock {
                bucket: StockBucket::Empty,
                ..
            })
        ));
        assert!(cylinders.history(branch, kind, 10).await.unwrap().is_empty());

        cylinders
            .apply_transaction(branch, kind, CylinderTxType::Receive, 5, None)
            .await
            .unwrap();
        cylinders
            .apply_transaction(branch, kind, CylinderTxType::Issue, 3, None)
            .await
            .unwrap();
        let applied = cylinders
            .apply_transaction(branch, kind, CylinderTxType::Return, 3, Some("Back to depot"))
            .await
            .unwrap();
        assert_eq!((applied.stock.filled_qty, applied.stock.empty_qty), (2, 0));

        let history = cylinders.history(branch, kind, 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].tx_type, CylinderTxType::Return);
        assert_eq!(history[0].notes.as_deref(), Some("Back to depot"));
    }

    #[tokio::test]
    async fn test_rejects_bad_input_and_inactive_refs() {
        let s = station(0).await;
        let cylinders = s.db.cylinders();

        for qty in [0, -3] {
            let err = cylinders
                .apply_transaction(&s.branch.id, &s.cylinder.id, CylinderTxType::Receive, qty, None)
                .await
                .unwrap_err();
            assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
        }

        s.db.registry()
            .deactivate(TopologyEntity::CylinderType, &s.cylinder.id)
            .await
            .unwrap();
        let err = cylinders
            .apply_transaction(&s.branch.id, &s.cylinder.id, CylinderTxType::Receive, 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Reference { .. })));
    }

    #[tokio::test]
    async fn test_journal_is_append_only() {
        let s = station(0).await;
        let applied = s
            .db
            .cylinders()
            .apply_transaction(&s.branch.id, &s.cylinder.id, CylinderTxType::Receive, 4, None)
            .await
            .unwrap();

        let err: DbError = sqlx::query("DELETE FROM cylinder_transactions WHERE id = ?1")
            .bind(&applied.transaction.id)
            .execute(s.db.pool())
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, DbError::ConstraintViolation(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_issues_never_overdraw() {
        let path = std::env::temp_dir().join(format!("forecourt-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(
            DbConfig::new(&path)
                .max_connections(8)
                .busy_timeout(Duration::from_secs(30)),
        )
        .await
        .unwrap();
        let s = station_on(db, 0).await;

        s.db.cylinders()
            .apply_transaction(&s.branch.id, &s.cylinder.id, CylinderTxType::Receive, 25, None)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..40 {
            let cylinders = s.db.cylinders();
            let branch = s.branch.id.clone();
            let kind = s.cylinder.id.clone();
            handles.push(tokio::spawn(async move {
                cylinders
                    .apply_transaction(&branch, &kind, CylinderTxType::Issue, 1, None)
                    .await
            }));
        }

        let mut issued = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => issued += 1,
                Err(DbError::Core(CoreError::InsufficientStock { .. })) => {}
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
        assert_eq!(issued, 25);

        let stock = s
            .db
            .cylinders()
            .stock(&s.branch.id, &s.cylinder.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!((stock.filled_qty, stock.empty_qty), (0, 25));
        assert_eq!(
            s.db.cylinders()
                .history(&s.branch.id, &s.cylinder.id, 100)
                .await
                .unwrap()
                .len(),
            26
        );

        s.db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
