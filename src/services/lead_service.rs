use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{self, AuditEntry},
    domain::{
        crm::{LeadSource, LeadStatus},
        numbering::{self, document_number},
        parse_field,
    },
    dto::leads::{CreateLeadRequest, LeadList, UpdateLeadStatusRequest},
    entity::leads::{ActiveModel, Column as LeadCol, Entity as Leads, Model as LeadModel},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Lead, convert_all},
    policy::{self, Action, Resource},
    response::{ApiResponse, Meta},
    routes::params::{LeadQuery, Pagination},
    state::AppState,
};

/// Fields of a lead that callers provide.
#[derive(Debug, Clone)]
pub(crate) struct NewLead {
    pub company_name: String,
    pub contact_person: String,
    pub email: String,
    pub phone: String,
    pub source: LeadSource,
    pub estimated_value: Option<i64>,
    pub notes: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
}

pub(crate) async fn insert_lead<C>(conn: &C, lead: NewLead) -> AppResult<LeadModel>
where
    C: ConnectionTrait,
{
    let model = ActiveModel {
        id: Set(Uuid::new_v4()),
        lead_number: Set(document_number(numbering::LEAD)),
        company_name: Set(lead.company_name),
        contact_person: Set(lead.contact_person),
        email: Set(lead.email),
        phone: Set(lead.phone),
        source: Set(lead.source.to_string()),
        status: Set(LeadStatus::New.to_string()),
        estimated_value: Set(lead.estimated_value),
        notes: Set(lead.notes),
        assigned_to: Set(lead.assigned_to),
        created_by: Set(lead.created_by),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await?;
    Ok(model)
}

pub async fn create_lead(
    state: &AppState,
    user: &AuthUser,
    payload: CreateLeadRequest,
) -> AppResult<ApiResponse<Lead>> {
    policy::authorize(Some(user), Action::Create, Resource::Lead)?;
    payload.validate()?;
    let source = match payload.source.as_deref() {
        Some(raw) => parse_field("source", raw)?,
        None => LeadSource::Other,
    };

    let txn = state.orm.begin().await?;
    let lead = insert_lead(
        &txn,
        NewLead {
            company_name: payload.company_name,
            contact_person: payload.contact_person,
            email: payload.email,
            phone: payload.phone,
            source,
            estimated_value: payload.estimated_value,
            notes: payload.notes,
            assigned_to: payload.assigned_to,
            created_by: Some(user.user_id),
        },
    )
    .await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "lead_create", "leads")
            .record(lead.id)
            .new_values(serde_json::json!({
                "lead_number": lead.lead_number,
                "source": lead.source,
            })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    Ok(ApiResponse::single("Lead created", Lead::try_from(lead)?))
}

pub async fn get_lead(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<Lead>> {
    policy::authorize(Some(user), Action::Read, Resource::Lead)?;
    let lead = Leads::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Lead", id))?;
    Ok(ApiResponse::single("Lead", Lead::try_from(lead)?))
}

pub async fn list_leads(
    state: &AppState,
    user: &AuthUser,
    query: LeadQuery,
) -> AppResult<ApiResponse<LeadList>> {
    policy::authorize(Some(user), Action::Read, Resource::Lead)?;
    let (page, limit, offset) = Pagination::new(query.page, query.per_page).normalize();

    let mut condition = Condition::all();
    if let Some(raw) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status: LeadStatus = parse_field("status", raw)?;
        condition = condition.add(LeadCol::Status.eq(status.as_ref()));
    }

    let finder = Leads::find()
        .filter(condition)
        .order_by_desc(LeadCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Leads",
        LeadList {
            items: convert_all(rows)?,
        },
        Some(meta),
    ))
}

pub async fn update_lead_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateLeadStatusRequest,
) -> AppResult<ApiResponse<Lead>> {
    policy::authorize(Some(user), Action::Update, Resource::Lead)?;
    let next: LeadStatus = parse_field("status", &payload.status)?;

    let txn = state.orm.begin().await?;
    let existing = Leads::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Lead", id))?;
    let previous = existing.status.clone();

    let mut active: ActiveModel = existing.into();
    active.status = Set(next.to_string());
    let lead = active.update(&txn).await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "lead_status_update", "leads")
            .record(lead.id)
            .old_values(serde_json::json!({ "status": previous }))
            .new_values(serde_json::json!({ "status": next })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    Ok(ApiResponse::single("Lead updated", Lead::try_from(lead)?))
}
