use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{self, AuditEntry},
    dto::cart::{AddToCartRequest, CartItemDto, CartList},
    entity::{
        Products,
        cart_items::{ActiveModel, Column as CartCol, Entity as CartItems},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, Product},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_cart(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_desc(CartCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let rows = finder
        .find_also_related(Products)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = rows
        .into_iter()
        .filter_map(|(item, product)| {
            product.map(|product| CartItemDto {
                id: item.id,
                product: Product::from(product),
                quantity: item.quantity,
            })
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("OK", CartList { items }, Some(meta)))
}

/// Put a product in the cart, replacing the quantity if it is already there.
pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    payload.validate()?;

    let txn = state.orm.begin().await?;
    Products::find_by_id(payload.product_id)
        .one(&txn)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::not_found("Product", payload.product_id))?;

    let existing = CartItems::find()
        .filter(
            Condition::all()
                .add(CartCol::UserId.eq(user.user_id))
                .add(CartCol::ProductId.eq(payload.product_id)),
        )
        .one(&txn)
        .await?;

    let cart_item = match existing {
        Some(item) => {
            let mut active: ActiveModel = item.into();
            active.quantity = Set(payload.quantity);
            active.update(&txn).await?
        }
        None => {
            ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.user_id),
                product_id: Set(payload.product_id),
                quantity: Set(payload.quantity),
                created_at: Set(Utc::now().into()),
            }
            .insert(&txn)
            .await?
        }
    };

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "cart_update", "cart_items")
            .record(cart_item.id)
            .new_values(serde_json::json!({
                "product_id": payload.product_id,
                "quantity": payload.quantity,
            })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    Ok(ApiResponse::single("OK", CartItem::from(cart_item)))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;
    let result = CartItems::delete_many()
        .filter(
            Condition::all()
                .add(CartCol::UserId.eq(user.user_id))
                .add(CartCol::ProductId.eq(product_id)),
        )
        .exec(&txn)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("Cart item for product {product_id}")));
    }

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "cart_remove", "cart_items")
            .old_values(serde_json::json!({ "product_id": product_id })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    Ok(ApiResponse::single("Removed from cart", serde_json::json!({})))
}
