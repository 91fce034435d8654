use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::enquiries::{ConvertedEnquiry, EnquiryList, SubmitEnquiryRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Enquiry,
    response::ApiResponse,
    routes::params::EnquiryQuery,
    services::enquiry_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_enquiries).post(submit_enquiry))
        .route("/{id}/convert", post(convert_enquiry))
}

#[utoipa::path(
    post,
    path = "/api/enquiries",
    request_body = SubmitEnquiryRequest,
    responses(
        (status = 201, description = "Enquiry received", body = ApiResponse<Enquiry>),
        (status = 400, description = "Invalid payload"),
    ),
    tag = "CRM"
)]
pub async fn submit_enquiry(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Json(payload): Json<SubmitEnquiryRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Enquiry>>)> {
    let resp = enquiry_service::submit_enquiry(&state, user.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/enquiries",
    params(EnquiryQuery),
    responses(
        (status = 200, description = "List enquiries", body = ApiResponse<EnquiryList>)
    ),
    security(("bearer_auth" = [])),
    tag = "CRM"
)]
pub async fn list_enquiries(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<EnquiryQuery>,
) -> AppResult<Json<ApiResponse<EnquiryList>>> {
    let resp = enquiry_service::list_enquiries(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/enquiries/{id}/convert",
    params(
        ("id" = Uuid, Path, description = "Enquiry ID")
    ),
    responses(
        (status = 200, description = "Enquiry converted to a lead", body = ApiResponse<ConvertedEnquiry>),
        (status = 400, description = "Already converted"),
    ),
    security(("bearer_auth" = [])),
    tag = "CRM"
)]
pub async fn convert_enquiry(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ConvertedEnquiry>>> {
    let resp = enquiry_service::convert_enquiry(&state, &user, id).await?;
    Ok(Json(resp))
}
