use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Admin,
    Staff,
    Finance,
    Customer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    /// Enquiry → lead promotion.
    Convert,
    /// Settling an order's payment status by hand.
    Settle,
    /// Starting or confirming a card payment.
    Pay,
}

/// What is being acted on. `owner` is the user id that owns the record, when
/// one exists; customers may only touch records they own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Product,
    Inventory,
    Order { owner: Option<Uuid> },
    Customer { owner: Option<Uuid> },
    Invoice,
    Payment,
    Lead,
    Enquiry,
    ActivityLog,
}

impl Resource {
    fn name(&self) -> &'static str {
        match self {
            Resource::Product => "products",
            Resource::Inventory => "inventory",
            Resource::Order { .. } => "orders",
            Resource::Customer { .. } => "customers",
            Resource::Invoice => "invoices",
            Resource::Payment => "payments",
            Resource::Lead => "leads",
            Resource::Enquiry => "enquiries",
            Resource::ActivityLog => "activity log",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

pub fn evaluate(actor: Option<&AuthUser>, action: Action, resource: Resource) -> Decision {
    use Action::*;
    use Resource::*;

    let allowed = match actor {
        None => matches!((action, resource), (Read, Product) | (Create, Enquiry)),
        Some(user) => match user.role {
            Role::Admin => true,
            Role::Staff => match resource {
                Product | Inventory | Order { .. } | Customer { .. } | Lead | Enquiry => true,
                Invoice | Payment => action == Read,
                ActivityLog => false,
            },
            Role::Finance => match resource {
                Invoice | Payment => true,
                Order { .. } => matches!(action, Read | Settle | Pay),
                Customer { .. } | Product => action == Read,
                Inventory | Lead | Enquiry | ActivityLog => false,
            },
            Role::Customer => match (action, resource) {
                (Read, Product) | (Create, Enquiry) => true,
                (Read | Create | Pay, Order { owner }) => owner == Some(user.user_id),
                (Read | Update, Customer { owner }) => owner == Some(user.user_id),
                _ => false,
            },
        },
    };

    if allowed { Decision::Allow } else { Decision::Deny }
}

pub fn authorize(actor: Option<&AuthUser>, action: Action, resource: Resource) -> AppResult<()> {
    match evaluate(actor, action, resource) {
        Decision::Allow => Ok(()),
        Decision::Deny => {
            let who = actor.map_or("anonymous".to_string(), |u| u.role.to_string());
            Err(AppError::Unauthorized(format!(
                "{who} may not {action} {}",
                resource.name()
            )))
        }
    }
}

/// True for roles that see every order rather than only their own.
pub fn is_back_office(user: &AuthUser) -> bool {
    matches!(user.role, Role::Admin | Role::Staff | Role::Finance)
}
