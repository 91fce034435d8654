use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, Func},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{self, AuditEntry},
    dto::products::{
        CategoryList, CreateCategoryRequest, CreateProductRequest, ProductList,
        UpdateProductRequest,
    },
    entity::{
        product_categories::{
            ActiveModel as CategoryActive, Column as CategoryCol, Entity as ProductCategories,
            Model as CategoryModel,
        },
        products::{ActiveModel, Column, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Product, ProductCategory},
    policy::{self, Action, Resource},
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

const DEFAULT_MIN_STOCK_LEVEL: i32 = 10;

async fn find_category<C>(conn: &C, name: &str) -> AppResult<Option<CategoryModel>>
where
    C: ConnectionTrait,
{
    Ok(ProductCategories::find()
        .filter(Expr::expr(Func::lower(Expr::col(CategoryCol::Name))).eq(name.to_lowercase()))
        .one(conn)
        .await?)
}

async fn insert_category<C>(
    conn: &C,
    name: &str,
    description: Option<String>,
) -> AppResult<CategoryModel>
where
    C: ConnectionTrait,
{
    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(description),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await?;
    Ok(category)
}

/// Category with this name, compared case-insensitively, created if missing.
pub async fn ensure_category<C>(conn: &C, name: &str) -> AppResult<CategoryModel>
where
    C: ConnectionTrait,
{
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("category must not be empty".into()));
    }
    match find_category(conn, name).await? {
        Some(existing) => Ok(existing),
        None => insert_category(conn, name, None).await,
    }
}

pub async fn list_categories(
    state: &AppState,
    user: Option<&AuthUser>,
) -> AppResult<ApiResponse<CategoryList>> {
    policy::authorize(user, Action::Read, Resource::Product)?;
    let items = ProductCategories::find()
        .order_by_asc(CategoryCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(ProductCategory::from)
        .collect();
    Ok(ApiResponse::single("Categories", CategoryList { items }))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<ProductCategory>> {
    policy::authorize(Some(user), Action::Create, Resource::Product)?;
    payload.validate()?;
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name must not be blank".into()));
    }

    let txn = state.orm.begin().await?;
    if let Some(existing) = find_category(&txn, name).await? {
        return Err(AppError::Validation(format!(
            "category '{}' already exists",
            existing.name
        )));
    }
    let description = payload
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    let category = insert_category(&txn, name, description).await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "category_create", "product_categories")
            .record(category.id)
            .new_values(serde_json::json!({ "name": category.name })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    Ok(ApiResponse::single("Category created", ProductCategory::from(category)))
}

/// Anonymous callers and customers only see active products.
pub async fn list_products(
    state: &AppState,
    user: Option<&AuthUser>,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    policy::authorize(user, Action::Read, Resource::Product)?;
    let (page, limit, offset) = Pagination::new(query.page, query.per_page).normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        condition = condition.add(
            Condition::any()
                .add(Expr::expr(Func::lower(Expr::col(Column::Name))).like(pattern.clone()))
                .add(Expr::expr(Func::lower(Expr::col(Column::Sku))).like(pattern.clone()))
                .add(Expr::expr(Func::lower(Expr::col(Column::Description))).like(pattern)),
        );
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    if let Some(category_id) = query.category_id {
        condition = condition.add(Column::CategoryId.eq(category_id));
    }

    let back_office = user.is_some_and(policy::is_back_office);
    if !back_office {
        condition = condition.add(Column::IsActive.eq(true));
    } else if let Some(active) = query.is_active {
        condition = condition.add(Column::IsActive.eq(active));
    }

    let sort_col = match query.sort_by.unwrap_or(ProductSortBy::CreatedAt) {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
        ProductSortBy::Stock => Column::StockQuantity,
    };

    let mut finder = Products::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

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
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(
    state: &AppState,
    user: Option<&AuthUser>,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    policy::authorize(user, Action::Read, Resource::Product)?;
    let back_office = user.is_some_and(policy::is_back_office);
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .filter(|p| p.is_active || back_office)
        .ok_or_else(|| AppError::not_found("Product", id))?;
    Ok(ApiResponse::single("Product", Product::from(product)))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    policy::authorize(Some(user), Action::Create, Resource::Product)?;
    payload.validate()?;

    let txn = state.orm.begin().await?;
    let taken = Products::find()
        .filter(Column::Sku.eq(payload.sku.trim()))
        .one(&txn)
        .await?;
    if taken.is_some() {
        return Err(AppError::Validation(format!(
            "sku '{}' is already in use",
            payload.sku.trim()
        )));
    }
    let category_id = match payload.category.as_deref() {
        Some(name) => Some(ensure_category(&txn, name).await?.id),
        None => None,
    };

    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        sku: Set(payload.sku.trim().to_string()),
        name: Set(payload.name),
        description: Set(payload.description),
        category_id: Set(category_id),
        price: Set(payload.price),
        stock_quantity: Set(payload.stock_quantity),
        min_stock_level: Set(payload.min_stock_level.unwrap_or(DEFAULT_MIN_STOCK_LEVEL)),
        is_active: Set(true),
        created_at: Set(Utc::now().into()),
    }
    .insert(&txn)
    .await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "product_create", "products")
            .record(product.id)
            .new_values(serde_json::json!({
                "sku": product.sku,
                "category_id": product.category_id,
                "price": product.price,
                "stock_quantity": product.stock_quantity,
            })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    Ok(ApiResponse::single("Product created", Product::from(product)))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    policy::authorize(Some(user), Action::Update, Resource::Product)?;
    payload.validate()?;

    let txn = state.orm.begin().await?;
    let existing = Products::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Product", id))?;
    let old_values = serde_json::json!({
        "name": existing.name,
        "category_id": existing.category_id,
        "price": existing.price,
        "min_stock_level": existing.min_stock_level,
        "is_active": existing.is_active,
    });

    let category_id = match payload.category.as_deref() {
        Some(name) => Some(ensure_category(&txn, name).await?.id),
        None => None,
    };

    let mut active: ActiveModel = existing.into();
    if let Some(category_id) = category_id {
        active.category_id = Set(Some(category_id));
    }
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(min_stock_level) = payload.min_stock_level {
        active.min_stock_level = Set(min_stock_level);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    let product = active.update(&txn).await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "product_update", "products")
            .record(product.id)
            .old_values(old_values)
            .new_values(serde_json::json!({
                "name": product.name,
                "category_id": product.category_id,
                "price": product.price,
                "min_stock_level": product.min_stock_level,
                "is_active": product.is_active,
            })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    Ok(ApiResponse::single("Updated", Product::from(product)))
}

/// Products referenced by orders are never removed, only hidden.
pub async fn deactivate_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    policy::authorize(Some(user), Action::Delete, Resource::Product)?;

    let txn = state.orm.begin().await?;
    let existing = Products::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Product", id))?;

    let mut active: ActiveModel = existing.into();
    active.is_active = Set(false);
    let product = active.update(&txn).await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "product_deactivate", "products").record(product.id),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    Ok(ApiResponse::single("Deactivated", Product::from(product)))
}
