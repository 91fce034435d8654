use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::leads::{CreateLeadRequest, LeadList, UpdateLeadStatusRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Lead,
    response::ApiResponse,
    routes::params::LeadQuery,
    services::lead_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_leads).post(create_lead))
        .route("/{id}", get(get_lead))
        .route("/{id}/status", patch(update_lead_status))
}

#[utoipa::path(
    get,
    path = "/api/leads",
    params(LeadQuery),
    responses(
        (status = 200, description = "List leads", body = ApiResponse<LeadList>)
    ),
    security(("bearer_auth" = [])),
    tag = "CRM"
)]
pub async fn list_leads(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LeadQuery>,
) -> AppResult<Json<ApiResponse<LeadList>>> {
    let resp = lead_service::list_leads(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/leads",
    request_body = CreateLeadRequest,
    responses(
        (status = 201, description = "Create lead", body = ApiResponse<Lead>)
    ),
    security(("bearer_auth" = [])),
    tag = "CRM"
)]
pub async fn create_lead(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateLeadRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Lead>>)> {
    let resp = lead_service::create_lead(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/leads/{id}",
    params(
        ("id" = Uuid, Path, description = "Lead ID")
    ),
    responses(
        (status = 200, description = "Get lead", body = ApiResponse<Lead>),
        (status = 404, description = "Lead not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "CRM"
)]
pub async fn get_lead(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Lead>>> {
    let resp = lead_service::get_lead(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/leads/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Lead ID")
    ),
    request_body = UpdateLeadStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<Lead>)
    ),
    security(("bearer_auth" = [])),
    tag = "CRM"
)]
pub async fn update_lead_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLeadStatusRequest>,
) -> AppResult<Json<ApiResponse<Lead>>> {
    let resp = lead_service::update_lead_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
