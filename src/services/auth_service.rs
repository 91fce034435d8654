use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{self, AuditEntry},
    config::AppConfig,
    domain::crm::CustomerType,
    dto::auth::{Claims, LoginRequest, LoginResponse, RegisterRequest, Registration},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    error::{AppError, AppResult},
    models::{Customer, User},
    policy::Role,
    response::ApiResponse,
    services::customer_service::insert_customer,
    state::AppState,
};

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn issue_token(config: &AppConfig, user_id: Uuid, role: Role) -> AppResult<LoginResponse> {
    let expires_at = Utc::now()
        .checked_add_signed(Duration::hours(config.jwt_ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    Ok(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_at,
    })
}

/// Self-service signup: a customer account plus its customer record.
pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<Registration>> {
    payload.validate()?;
    let email = payload.email.trim().to_lowercase();

    let txn = state.orm.begin().await?;
    let exist = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&txn)
        .await?;
    if exist.is_some() {
        return Err(AppError::Validation("Email is already taken".to_string()));
    }

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        password_hash: Set(hash_password(&payload.password)?),
        role: Set(Role::Customer.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&txn)
    .await?;

    let customer = insert_customer(
        &txn,
        user.id,
        CustomerType::Regular,
        payload.billing_address.unwrap_or_default(),
        payload.shipping_address.unwrap_or_default(),
        0,
        String::new(),
    )
    .await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.id), "user_register", "users")
            .record(user.id)
            .new_values(serde_json::json!({ "customer_id": customer.id })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(ApiResponse::single(
        "User created",
        Registration {
            user: User::try_from(user)?,
            customer: Customer::try_from(customer)?,
        },
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    payload.validate()?;
    let email = payload.email.trim().to_lowercase();

    let user = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("Invalid email or password".into()))?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    if Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::Unauthenticated("Invalid email or password".into()));
    }

    let role = User::try_from(user.clone())?.role;
    let resp = issue_token(&state.config, user.id, role)?;

    audit::enqueue(
        &state.orm,
        AuditEntry::new(Some(user.id), "user_login", "users").record(user.id),
    )
    .await?;
    audit::deliver_best_effort(&state.orm).await;

    Ok(ApiResponse::single("Logged in", resp))
}
