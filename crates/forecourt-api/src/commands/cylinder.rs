//! # Cylinder Commands
//!
//! LPG cylinder stock movements and stock listing for a branch.
//!
//! ```text
//! RECEIVE 10  → filled +10
//! ISSUE    3  → filled  -3, empty +3   (swap: customer hands in an empty)
//! RETURN   3  → empty   -3             (empties back to the supplier)
//! ```

use chrono::{DateTime, Utc};
use forecourt_core::{CylinderStock, CylinderTransaction, CylinderTxType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};
use ts_rs::TS;

use super::{check_id, load_branch};
use crate::error::ApiError;
use crate::state::DbState;

const DEFAULT_HISTORY_LIMIT: u32 = 50;
const MAX_HISTORY_LIMIT: u32 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostCylinderTransaction {
    pub branch_id: String,
    pub cylinder_type_id: String,
    #[serde(rename = "type")]
    pub tx_type: CylinderTxType,
    pub quantity: i64,
    pub notes: Option<String>,
}

/// Filled/empty counts of one cylinder type at a branch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CylinderStockDto {
    pub branch_id: String,
    pub cylinder_type_id: String,
    pub code: String,
    pub name: String,
    pub filled_qty: i64,
    pub empty_qty: i64,
    #[ts(as = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostCylinderTransactionResponse {
    pub stock: CylinderStock,
    pub transaction: CylinderTransaction,
}

/// Applies one stock movement and returns the updated snapshot.
///
/// ## Errors
/// - `VALIDATION_ERROR` for a non-positive quantity or a malformed id
/// - `INSUFFICIENT_STOCK` when an ISSUE or RETURN exceeds what is on hand
/// - `REFERENCE_ERROR` for an inactive branch or cylinder type
pub async fn post_cylinder_transaction(
    db: &DbState,
    request: PostCylinderTransaction,
) -> Result<PostCylinderTransactionResponse, ApiError> {
    debug!(
        branch_id = %request.branch_id,
        cylinder_type_id = %request.cylinder_type_id,
        tx_type = ?request.tx_type,
        quantity = request.quantity,
        "post_cylinder_transaction command"
    );
    check_id("branch_id", &request.branch_id)?;
    check_id("cylinder_type_id", &request.cylinder_type_id)?;

    let applied = db
        .inner()
        .cylinders()
        .apply_transaction(
            &request.branch_id,
            &request.cylinder_type_id,
            request.tx_type,
            request.quantity,
            request.notes.as_deref(),
        )
        .await?;

    info!(
        transaction_id = %applied.transaction.id,
        filled = applied.stock.filled_qty,
        empty = applied.stock.empty_qty,
        "post_cylinder_transaction complete"
    );

    Ok(PostCylinderTransactionResponse {
        stock: applied.stock,
        transaction: applied.transaction,
    })
}

/// Stock of every active cylinder type of the branch's business.
///
/// Types that never moved at the branch are listed with zero counts.
pub async fn get_cylinder_stock(
    db: &DbState,
    branch_id: String,
) -> Result<Vec<CylinderStockDto>, ApiError> {
    debug!(branch_id = %branch_id, "get_cylinder_stock command");
    let db = db.inner();

    let branch = load_branch(db, &branch_id).await?;

    let mut stock: HashMap<String, CylinderStock> = db
        .cylinders()
        .list_stock(&branch.id)
        .await?
        .into_iter()
        .map(|s| (s.cylinder_type_id.clone(), s))
        .collect();

    let types = db
        .registry()
        .list_active_cylinder_types(&branch.business_id)
        .await?;

    Ok(types
        .into_iter()
        .map(|t| {
            let row = stock.remove(&t.id);
            CylinderStockDto {
                branch_id: branch.id.clone(),
                cylinder_type_id: t.id,
                code: t.code,
                name: t.name,
                filled_qty: row.as_ref().map_or(0, |s| s.filled_qty),
                empty_qty: row.as_ref().map_or(0, |s| s.empty_qty),
                updated_at: row.map(|s| s.updated_at),
            }
        })
        .collect())
}

/// Journal of one cylinder type at a branch, newest first.
///
/// ## Arguments
/// * `limit` - Maximum rows (default: 50, max: 500)
pub async fn get_cylinder_history(
    db: &DbState,
    branch_id: String,
    cylinder_type_id: String,
    limit: Option<u32>,
) -> Result<Vec<CylinderTransaction>, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);
    debug!(branch_id = %branch_id, cylinder_type_id = %cylinder_type_id, limit, "get_cylinder_history command");
    check_id("branch_id", &branch_id)?;
    check_id("cylinder_type_id", &cylinder_type_id)?;

    Ok(db
        .inner()
        .cylinders()
        .history(&branch_id, &cylinder_type_id, limit)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::site;
    use crate::error::ErrorCode;

    fn movement(
        site: &crate::commands::fixtures::Site,
        tx_type: CylinderTxType,
        quantity: i64,
    ) -> PostCylinderTransaction {
        PostCylinderTransaction {
            branch_id: site.branch.id.clone(),
            cylinder_type_id: site.cylinder.id.clone(),
            tx_type,
            quantity,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_swap_flow_and_stock_listing() {
        let site = site().await;

        let listed = get_cylinder_stock(&site.db, site.branch.id.clone()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].filled_qty, 0);
        assert!(listed[0].updated_at.is_none());

        post_cylinder_transaction(&site.db, movement(&site, CylinderTxType::Receive, 10))
            .await
            .unwrap();
        let response =
            post_cylinder_transaction(&site.db, movement(&site, CylinderTxType::Issue, 3))
                .await
                .unwrap();
        assert_eq!(response.stock.filled_qty, 7);
        assert_eq!(response.stock.empty_qty, 3);
        assert_eq!(response.transaction.filled_after, 7);

        let listed = get_cylinder_stock(&site.db, site.branch.id.clone()).await.unwrap();
        assert_eq!(listed[0].code, "12KG");
        assert_eq!(listed[0].filled_qty, 7);
        assert_eq!(listed[0].empty_qty, 3);

        let history = get_cylinder_history(
            &site.db,
            site.branch.id.clone(),
            site.cylinder.id.clone(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].tx_type, CylinderTxType::Issue);
    }

    #[tokio::test]
    async fn test_insufficient_stock_details() {
        let site = site().await;

        let err = post_cylinder_transaction(&site.db, movement(&site, CylinderTxType::Return, 1))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        let details = err.details.unwrap();
        assert_eq!(details["bucket"], "empty");
        assert_eq!(details["available"], 0);
        assert_eq!(details["requested"], 1);

        let err = post_cylinder_transaction(&site.db, movement(&site, CylinderTxType::Receive, 0))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let mut request = movement(&site, CylinderTxType::Receive, 1);
        request.cylinder_type_id = "12KG".to_string();
        let err = post_cylinder_transaction(&site.db, request).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = get_cylinder_history(&site.db, "b1".to_string(), site.cylinder.id.clone(), None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_request_uses_type_key() {
        let request: PostCylinderTransaction = serde_json::from_value(serde_json::json!({
            "branchId": "b1",
            "cylinderTypeId": "c1",
            "type": "ISSUE",
            "quantity": 2,
            "notes": null
        }))
        .unwrap();
        assert_eq!(request.tx_type, CylinderTxType::Issue);
    }
}
