use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait, sea_query::LockType,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{self, AuditEntry},
    domain::{
        crm::{EnquiryStatus, EnquiryType, LeadSource},
        numbering::{self, document_number},
        parse_field,
    },
    dto::enquiries::{ConvertedEnquiry, EnquiryList, SubmitEnquiryRequest},
    entity::{
        Products,
        website_enquiries::{ActiveModel, Column as EnquiryCol, Entity as WebsiteEnquiries},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Enquiry, Lead, convert_all},
    policy::{self, Action, Resource},
    response::{ApiResponse, Meta},
    routes::params::{EnquiryQuery, Pagination},
    services::lead_service::{NewLead, insert_lead},
    state::AppState,
};

/// Storefront contact form. Anonymous visitors may submit.
pub async fn submit_enquiry(
    state: &AppState,
    user: Option<&AuthUser>,
    payload: SubmitEnquiryRequest,
) -> AppResult<ApiResponse<Enquiry>> {
    policy::authorize(user, Action::Create, Resource::Enquiry)?;
    payload.validate()?;
    let enquiry_type = match payload.enquiry_type.as_deref() {
        Some(raw) => parse_field("enquiry_type", raw)?,
        None => EnquiryType::Other,
    };

    let txn = state.orm.begin().await?;
    if let Some(product_id) = payload.interested_product_id {
        Products::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("Product", product_id))?;
    }

    let enquiry = ActiveModel {
        id: Set(Uuid::new_v4()),
        enquiry_number: Set(document_number(numbering::ENQUIRY)),
        enquiry_type: Set(enquiry_type.to_string()),
        company_name: Set(payload.company_name),
        contact_person: Set(payload.contact_person),
        email: Set(payload.email),
        phone: Set(payload.phone),
        subject: Set(payload.subject),
        message: Set(payload.message),
        interested_product_id: Set(payload.interested_product_id),
        status: Set(EnquiryStatus::New.to_string()),
        lead_id: Set(None),
        converted_at: Set(None),
        converted_by: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(&txn)
    .await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(user.map(|u| u.user_id), "enquiry_submit", "website_enquiries")
            .record(enquiry.id)
            .new_values(serde_json::json!({
                "enquiry_number": enquiry.enquiry_number,
                "enquiry_type": enquiry.enquiry_type,
            })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    Ok(ApiResponse::single("Enquiry received", Enquiry::try_from(enquiry)?))
}

pub async fn list_enquiries(
    state: &AppState,
    user: &AuthUser,
    query: EnquiryQuery,
) -> AppResult<ApiResponse<EnquiryList>> {
    policy::authorize(Some(user), Action::Read, Resource::Enquiry)?;
    let (page, limit, offset) = Pagination::new(query.page, query.per_page).normalize();

    let mut condition = Condition::all();
    if let Some(raw) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status: EnquiryStatus = parse_field("status", raw)?;
        condition = condition.add(EnquiryCol::Status.eq(status.as_ref()));
    }

    let finder = WebsiteEnquiries::find()
        .filter(condition)
        .order_by_desc(EnquiryCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Enquiries",
        EnquiryList {
            items: convert_all(rows)?,
        },
        Some(meta),
    ))
}

/// Promote an enquiry to a lead. Happens at most once per enquiry.
pub async fn convert_enquiry(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<ConvertedEnquiry>> {
    policy::authorize(Some(user), Action::Convert, Resource::Enquiry)?;

    let txn = state.orm.begin().await?;
    let enquiry = WebsiteEnquiries::find()
        .filter(EnquiryCol::Id.eq(id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Enquiry", id))?;

    if enquiry.lead_id.is_some() || enquiry.status == EnquiryStatus::Converted.as_ref() {
        return Err(AppError::Validation(format!(
            "enquiry {} was already converted",
            enquiry.enquiry_number
        )));
    }
    if enquiry.status == EnquiryStatus::Rejected.as_ref() {
        return Err(AppError::Validation(format!(
            "enquiry {} was rejected",
            enquiry.enquiry_number
        )));
    }

    let company_name = if enquiry.company_name.trim().is_empty() {
        enquiry.contact_person.clone()
    } else {
        enquiry.company_name.clone()
    };
    let lead = insert_lead(
        &txn,
        NewLead {
            company_name,
            contact_person: enquiry.contact_person.clone(),
            email: enquiry.email.clone(),
            phone: enquiry.phone.clone(),
            source: LeadSource::Website,
            estimated_value: None,
            notes: Some(format!("{}\n\n{}", enquiry.subject, enquiry.message)),
            assigned_to: None,
            created_by: Some(user.user_id),
        },
    )
    .await?;

    let mut active: ActiveModel = enquiry.into();
    active.status = Set(EnquiryStatus::Converted.to_string());
    active.lead_id = Set(Some(lead.id));
    active.converted_at = Set(Some(Utc::now().into()));
    active.converted_by = Set(Some(user.user_id));
    let enquiry = active.update(&txn).await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "enquiry_convert", "website_enquiries")
            .record(enquiry.id)
            .new_values(serde_json::json!({
                "lead_id": lead.id,
                "lead_number": lead.lead_number,
            })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    tracing::info!(enquiry_id = %enquiry.id, lead_id = %lead.id, "enquiry converted to lead");
    Ok(ApiResponse::single(
        "Enquiry converted",
        ConvertedEnquiry {
            enquiry: Enquiry::try_from(enquiry)?,
            lead: Lead::try_from(lead)?,
        },
    ))
}
