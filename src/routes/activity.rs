use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::activity::ActivityList,
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::ActivityQuery,
    services::activity_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_activity))
}

#[utoipa::path(
    get,
    path = "/api/activity",
    params(ActivityQuery),
    responses(
        (status = 200, description = "Audit trail, newest first", body = ApiResponse<ActivityList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Audit"
)]
pub async fn list_activity(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<ApiResponse<ActivityList>>> {
    let resp = activity_service::list_activity(&state, &user, query).await?;
    Ok(Json(resp))
}
