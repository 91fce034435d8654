use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEntry},
    dto::products::{InventoryAdjustRequest, ProductList},
    entity::products::{Column as ProdCol, Entity as Products},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Product,
    policy::{self, Action, Resource},
    response::{ApiResponse, Meta},
    routes::params::{LowStockQuery, Pagination},
    state::AppState,
};

/// Take `quantity` units out of stock. Returns the remaining stock.
///
/// A single conditional `UPDATE`: when two writers race for the last units the
/// loser's predicate no longer holds and it updates zero rows.
pub async fn decrement_stock<C>(conn: &C, product_id: Uuid, quantity: i32) -> AppResult<i32>
where
    C: ConnectionTrait,
{
    if quantity < 1 {
        return Err(AppError::Validation("quantity must be at least 1".into()));
    }

    let result = Products::update_many()
        .col_expr(
            ProdCol::StockQuantity,
            Expr::col(ProdCol::StockQuantity).sub(quantity),
        )
        .filter(ProdCol::Id.eq(product_id))
        .filter(ProdCol::StockQuantity.gte(quantity))
        .exec(conn)
        .await?;

    let product = Products::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Product", product_id))?;

    if result.rows_affected == 0 {
        return Err(AppError::InsufficientStock {
            product_id,
            requested: quantity,
            available: product.stock_quantity,
        });
    }

    Ok(product.stock_quantity)
}

/// Put `quantity` units back. Returns the new stock.
pub async fn restock<C>(conn: &C, product_id: Uuid, quantity: i32) -> AppResult<i32>
where
    C: ConnectionTrait,
{
    if quantity < 1 {
        return Err(AppError::Validation("quantity must be at least 1".into()));
    }

    let result = Products::update_many()
        .col_expr(
            ProdCol::StockQuantity,
            Expr::col(ProdCol::StockQuantity).add(quantity),
        )
        .filter(ProdCol::Id.eq(product_id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Product", product_id));
    }

    let product = Products::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Product", product_id))?;
    Ok(product.stock_quantity)
}

pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: InventoryAdjustRequest,
) -> AppResult<ApiResponse<Product>> {
    policy::authorize(Some(user), Action::Update, Resource::Inventory)?;
    if payload.delta == 0 {
        return Err(AppError::Validation("delta must not be 0".into()));
    }

    let txn = state.orm.begin().await?;
    let before = Products::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Product", id))?;

    let new_stock = if payload.delta > 0 {
        restock(&txn, id, payload.delta).await?
    } else {
        let quantity = payload
            .delta
            .checked_neg()
            .ok_or_else(|| AppError::Validation("delta out of range".into()))?;
        decrement_stock(&txn, id, quantity).await?
    };

    let updated = Products::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Product", id))?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "inventory_adjust", "products")
            .record(id)
            .old_values(serde_json::json!({ "stock_quantity": before.stock_quantity }))
            .new_values(serde_json::json!({
                "stock_quantity": new_stock,
                "delta": payload.delta,
                "reason": payload.reason,
            })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    tracing::info!(product_id = %id, delta = payload.delta, stock = new_stock, "inventory adjusted");
    if updated.is_low_stock() {
        tracing::warn!(product_id = %id, stock = new_stock, "product is below its minimum stock level");
    }

    Ok(ApiResponse::single("Inventory updated", Product::from(updated)))
}

/// Products whose stock fell below their own `min_stock_level`.
pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    policy::authorize(Some(user), Action::Read, Resource::Inventory)?;
    let (page, limit, offset) = Pagination::new(query.page, query.per_page).normalize();

    let finder = Products::find()
        .filter(Expr::col(ProdCol::StockQuantity).lt(Expr::col(ProdCol::MinStockLevel)))
        .order_by_asc(ProdCol::StockQuantity)
        .order_by_desc(ProdCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Low stock", ProductList { items }, Some(meta)))
}
