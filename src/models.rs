use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    domain::{
        crm::{
            CustomerType, EnquiryStatus, EnquiryType, InvoiceStatus, LeadSource, LeadStatus,
            LedgerPaymentMethod,
        },
        order::{OrderChannel, OrderStatus, PaymentMethod, PaymentStatus},
    },
    entity::{
        activity_logs, cart_items, customers, invoices, leads, order_items, orders, payments,
        product_categories, products, users, website_enquiries,
    },
    error::{AppError, AppResult},
    policy::Role,
};

fn stored<T: FromStr>(column: &str, raw: &str) -> AppResult<T> {
    raw.parse::<T>().map_err(|_| {
        AppError::Internal(anyhow::anyhow!("unexpected value '{raw}' in column {column}"))
    })
}

fn utc(ts: sea_orm::prelude::DateTimeWithTimeZone) -> DateTime<Utc> {
    ts.with_timezone(&Utc)
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<users::Model> for User {
    type Error = AppError;

    fn try_from(model: users::Model) -> AppResult<Self> {
        Ok(Self {
            id: model.id,
            email: model.email,
            role: stored("users.role", &model.role)?,
            created_at: utc(model.created_at),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Customer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer_code: String,
    pub customer_type: CustomerType,
    pub billing_address: String,
    pub shipping_address: String,
    pub credit_limit: i64,
    pub balance: i64,
    pub tax_number: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<customers::Model> for Customer {
    type Error = AppError;

    fn try_from(model: customers::Model) -> AppResult<Self> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            customer_code: model.customer_code,
            customer_type: stored("customers.customer_type", &model.customer_type)?,
            billing_address: model.billing_address,
            shipping_address: model.shipping_address,
            credit_limit: model.credit_limit,
            balance: model.balance,
            tax_number: model.tax_number,
            created_at: utc(model.created_at),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub price: i64,
    pub stock_quantity: i32,
    pub min_stock_level: i32,
    pub is_active: bool,
    pub low_stock: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductCategory {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<product_categories::Model> for ProductCategory {
    fn from(model: product_categories::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            created_at: utc(model.created_at),
        }
    }
}

impl From<products::Model> for Product {
    fn from(model: products::Model) -> Self {
        let low_stock = model.is_low_stock();
        Self {
            id: model.id,
            sku: model.sku,
            name: model.name,
            description: model.description,
            category_id: model.category_id,
            price: model.price,
            stock_quantity: model.stock_quantity,
            min_stock_level: model.min_stock_level,
            is_active: model.is_active,
            low_stock,
            created_at: utc(model.created_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub channel: OrderChannel,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub total_amount: i64,
    pub tax_amount: i64,
    pub discount_amount: i64,
    pub grand_total: i64,
    pub shipping_address: String,
    pub billing_address: String,
    pub notes: Option<String>,
    pub payment_intent_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<orders::Model> for Order {
    type Error = AppError;

    fn try_from(model: orders::Model) -> AppResult<Self> {
        Ok(Self {
            id: model.id,
            order_number: model.order_number,
            customer_id: model.customer_id,
            channel: stored("orders.channel", &model.channel)?,
            status: stored("orders.status", &model.status)?,
            payment_status: stored("orders.payment_status", &model.payment_status)?,
            payment_method: stored("orders.payment_method", &model.payment_method)?,
            total_amount: model.total_amount,
            tax_amount: model.tax_amount,
            discount_amount: model.discount_amount,
            grand_total: model.grand_total,
            shipping_address: model.shipping_address,
            billing_address: model.billing_address,
            notes: model.notes,
            payment_intent_id: model.payment_intent_id,
            paid_at: model.paid_at.map(utc),
            created_by: model.created_by,
            created_at: utc(model.created_at),
            updated_at: utc(model.updated_at),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
    pub total_price: i64,
}

impl From<order_items::Model> for OrderItem {
    fn from(model: order_items::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            quantity: model.quantity,
            unit_price: model.unit_price,
            total_price: model.total_price,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl From<cart_items::Model> for CartItem {
    fn from(model: cart_items::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            user_id: model.user_id,
            quantity: model.quantity,
            created_at: utc(model.created_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub order_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total_amount: i64,
    pub paid_amount: i64,
    pub balance_amount: i64,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<invoices::Model> for Invoice {
    type Error = AppError;

    fn try_from(model: invoices::Model) -> AppResult<Self> {
        let balance_amount = model.balance_amount();
        Ok(Self {
            id: model.id,
            invoice_number: model.invoice_number,
            order_id: model.order_id,
            customer_id: model.customer_id,
            invoice_date: model.invoice_date,
            due_date: model.due_date,
            total_amount: model.total_amount,
            paid_amount: model.paid_amount,
            balance_amount,
            status: stored("invoices.status", &model.status)?,
            notes: model.notes,
            created_by: model.created_by,
            created_at: utc(model.created_at),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub payment_number: String,
    pub invoice_id: Uuid,
    pub customer_id: Uuid,
    pub amount: i64,
    pub payment_method: LedgerPaymentMethod,
    pub payment_date: NaiveDate,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<payments::Model> for Payment {
    type Error = AppError;

    fn try_from(model: payments::Model) -> AppResult<Self> {
        Ok(Self {
            id: model.id,
            payment_number: model.payment_number,
            invoice_id: model.invoice_id,
            customer_id: model.customer_id,
            amount: model.amount,
            payment_method: stored("payments.payment_method", &model.payment_method)?,
            payment_date: model.payment_date,
            reference_number: model.reference_number,
            notes: model.notes,
            created_by: model.created_by,
            created_at: utc(model.created_at),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Lead {
    pub id: Uuid,
    pub lead_number: String,
    pub company_name: String,
    pub contact_person: String,
    pub email: String,
    pub phone: String,
    pub source: LeadSource,
    pub status: LeadStatus,
    pub estimated_value: Option<i64>,
    pub notes: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<leads::Model> for Lead {
    type Error = AppError;

    fn try_from(model: leads::Model) -> AppResult<Self> {
        Ok(Self {
            id: model.id,
            lead_number: model.lead_number,
            company_name: model.company_name,
            contact_person: model.contact_person,
            email: model.email,
            phone: model.phone,
            source: stored("leads.source", &model.source)?,
            status: stored("leads.status", &model.status)?,
            estimated_value: model.estimated_value,
            notes: model.notes,
            assigned_to: model.assigned_to,
            created_by: model.created_by,
            created_at: utc(model.created_at),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Enquiry {
    pub id: Uuid,
    pub enquiry_number: String,
    pub enquiry_type: EnquiryType,
    pub company_name: String,
    pub contact_person: String,
    pub email: String,
    pub phone: String,
    pub subject: String,
    pub message: String,
    pub interested_product_id: Option<Uuid>,
    pub status: EnquiryStatus,
    pub lead_id: Option<Uuid>,
    pub converted_at: Option<DateTime<Utc>>,
    pub converted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<website_enquiries::Model> for Enquiry {
    type Error = AppError;

    fn try_from(model: website_enquiries::Model) -> AppResult<Self> {
        Ok(Self {
            id: model.id,
            enquiry_number: model.enquiry_number,
            enquiry_type: stored("website_enquiries.enquiry_type", &model.enquiry_type)?,
            company_name: model.company_name,
            contact_person: model.contact_person,
            email: model.email,
            phone: model.phone,
            subject: model.subject,
            message: model.message,
            interested_product_id: model.interested_product_id,
            status: stored("website_enquiries.status", &model.status)?,
            lead_id: model.lead_id,
            converted_at: model.converted_at.map(utc),
            converted_by: model.converted_by,
            created_at: utc(model.created_at),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActivityLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub table_name: Option<String>,
    pub record_id: Option<Uuid>,
    #[schema(value_type = Option<Object>)]
    pub old_values: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub new_values: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl From<activity_logs::Model> for ActivityLog {
    fn from(model: activity_logs::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            action: model.action,
            table_name: model.table_name,
            record_id: model.record_id,
            old_values: model.old_values,
            new_values: model.new_values,
            created_at: utc(model.created_at),
        }
    }
}

/// Convert a batch of rows, failing on the first corrupt one.
pub fn convert_all<M, T>(rows: Vec<M>) -> AppResult<Vec<T>>
where
    T: TryFrom<M, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}
