use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};

use crate::{
    dto::activity::ActivityList,
    entity::activity_logs::{Column as LogCol, Entity as ActivityLogs},
    error::AppResult,
    middleware::auth::AuthUser,
    models::ActivityLog,
    policy::{self, Action, Resource},
    response::{ApiResponse, Meta},
    routes::params::{ActivityQuery, Pagination},
    state::AppState,
};

pub async fn list_activity(
    state: &AppState,
    user: &AuthUser,
    query: ActivityQuery,
) -> AppResult<ApiResponse<ActivityList>> {
    policy::authorize(Some(user), Action::Read, Resource::ActivityLog)?;
    let (page, limit, offset) = Pagination::new(query.page, query.per_page).normalize();

    let mut condition = Condition::all();
    if let Some(table_name) = query.table_name.as_deref().filter(|s| !s.is_empty()) {
        condition = condition.add(LogCol::TableName.eq(table_name));
    }
    if let Some(record_id) = query.record_id {
        condition = condition.add(LogCol::RecordId.eq(record_id));
    }

    let finder = ActivityLogs::find()
        .filter(condition)
        .order_by_desc(LogCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(ActivityLog::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Activity", ActivityList { items }, Some(meta)))
}
