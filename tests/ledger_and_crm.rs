mod common;

use common::{
    activity_for, create_customer, create_product, create_user, order_request, setup_state,
    stock_of,
};
use erp_crm_api::{
    domain::{
        crm::{EnquiryStatus, InvoiceStatus, LeadSource, LeadStatus},
        order::PaymentStatus,
    },
    dto::{
        auth::{LoginRequest, RegisterRequest},
        enquiries::SubmitEnquiryRequest,
        invoices::{CreateInvoiceRequest, UpdateInvoiceStatusRequest},
        leads::{CreateLeadRequest, UpdateLeadStatusRequest},
        orders::{ConfirmPaymentRequest, UpdateOrderStatusRequest},
        payments::RecordPaymentRequest,
        products::{
            CreateCategoryRequest, CreateProductRequest, InventoryAdjustRequest,
            UpdateProductRequest,
        },
    },
    entity::{Customers, Orders, invoices},
    error::AppError,
    gateway::StubGateway,
    middleware::auth::AuthUser,
    policy::Role,
    routes::params::{ActivityQuery, LowStockQuery, ProductQuery},
    services::{
        activity_service, auth_service, checkout_service, enquiry_service, invoice_service, lead_service,
        order_service, payment_service, product_service, stock_ledger,
    },
    state::AppState,
};
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;

fn payment(invoice_id: Uuid, amount: i64) -> RecordPaymentRequest {
    RecordPaymentRequest {
        invoice_id,
        amount,
        payment_method: "bank_transfer".into(),
        payment_date: None,
        reference_number: Some("REF-1".into()),
        notes: None,
    }
}

async fn balance_of(state: &AppState, customer_id: Uuid) -> anyhow::Result<i64> {
    let customer = Customers::find_by_id(customer_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("customer vanished"))?;
    Ok(customer.balance)
}

async fn invoiced_order(
    state: &AppState,
    finance: &AuthUser,
) -> anyhow::Result<(Uuid, Uuid, Uuid)> {
    let (customer, customer_id) = create_customer(state).await?;
    let product = create_product(state, 250, 10).await?;
    let order = order_service::place_order(state, &customer, order_request(customer_id, &[(product, 4)]))
        .await?
        .data
        .expect("order data")
        .order;

    let invoice = invoice_service::create_invoice(
        state,
        finance,
        CreateInvoiceRequest {
            order_id: Some(order.id),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("invoice data");
    Ok((order.id, invoice.id, customer_id))
}

#[tokio::test]
async fn payments_drive_invoice_order_and_customer_balance() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let finance = create_user(&state, Role::Finance).await?;
    let (order_id, invoice_id, customer_id) = invoiced_order(&state, &finance).await?;
    assert_eq!(balance_of(&state, customer_id).await?, 1_000);

    payment_service::record_payment(&state, &finance, payment(invoice_id, 400)).await?;
    let partial = invoice_service::get_invoice(&state, &finance, invoice_id)
        .await?
        .data
        .expect("invoice data");
    assert_eq!(partial.invoice.paid_amount, 400);
    assert_eq!(partial.invoice.balance_amount, 600);
    assert_eq!(partial.payments.len(), 1);
    assert_eq!(balance_of(&state, customer_id).await?, 600);

    let order = order_service::get_order(&state, &finance, order_id)
        .await?
        .data
        .expect("order data")
        .order;
    assert_eq!(order.payment_status, PaymentStatus::Partial);

    let err = payment_service::record_payment(&state, &finance, payment(invoice_id, 601))
        .await
        .expect_err("overpayment");
    assert!(matches!(err, AppError::Validation(_)));

    let last = payment_service::record_payment(&state, &finance, payment(invoice_id, 600))
        .await?
        .data
        .expect("payment data");
    assert!(last.payment_number.starts_with("PAY-"));

    let settled = invoice_service::get_invoice(&state, &finance, invoice_id)
        .await?
        .data
        .expect("invoice data")
        .invoice;
    assert_eq!(settled.status, InvoiceStatus::Paid);
    assert_eq!(balance_of(&state, customer_id).await?, 0);
    let order = order_service::get_order(&state, &finance, order_id)
        .await?
        .data
        .expect("order data")
        .order;
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert!(order.paid_at.is_some());

    // Removing a payment reopens the invoice.
    payment_service::delete_payment(&state, &finance, last.id).await?;
    let reopened = invoice_service::get_invoice(&state, &finance, invoice_id)
        .await?
        .data
        .expect("invoice data")
        .invoice;
    assert_eq!(reopened.paid_amount, 400);
    assert_eq!(reopened.status, InvoiceStatus::Sent);
    assert_eq!(balance_of(&state, customer_id).await?, 600);
    Ok(())
}

#[tokio::test]
async fn invoices_refuse_cancelled_or_already_invoiced_orders() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let finance = create_user(&state, Role::Finance).await?;
    let staff = create_user(&state, Role::Staff).await?;
    let (order_id, invoice_id, _) = invoiced_order(&state, &finance).await?;

    let err = invoice_service::create_invoice(
        &state,
        &finance,
        CreateInvoiceRequest {
            order_id: Some(order_id),
            ..Default::default()
        },
    )
    .await
    .expect_err("second invoice for the same order");
    assert!(matches!(err, AppError::Validation(_)));

    let err = invoice_service::update_invoice_status(
        &state,
        &finance,
        invoice_id,
        UpdateInvoiceStatusRequest {
            status: "paid".into(),
        },
    )
    .await
    .expect_err("paid is derived");
    assert!(matches!(err, AppError::Validation(_)));

    let err = invoice_service::create_invoice(&state, &staff, CreateInvoiceRequest::default())
        .await
        .expect_err("staff only read invoices");
    assert!(matches!(err, AppError::Unauthorized(_)));

    let (customer, customer_id) = create_customer(&state).await?;
    let product = create_product(&state, 100, 5).await?;
    let order = order_service::place_order(&state, &customer, order_request(customer_id, &[(product, 1)]))
        .await?
        .data
        .expect("order data")
        .order;
    order_service::update_order_status(
        &state,
        &staff,
        order.id,
        UpdateOrderStatusRequest {
            status: "cancelled".into(),
        },
    )
    .await?;
    let err = invoice_service::create_invoice(
        &state,
        &finance,
        CreateInvoiceRequest {
            order_id: Some(order.id),
            ..Default::default()
        },
    )
    .await
    .expect_err("cancelled order");
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn cancelled_invoices_leave_the_customer_balance() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let finance = create_user(&state, Role::Finance).await?;
    let (_, customer_id) = create_customer(&state).await?;

    let invoice = invoice_service::create_invoice(
        &state,
        &finance,
        CreateInvoiceRequest {
            customer_id: Some(customer_id),
            total_amount: Some(7_500),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("invoice data");
    assert_eq!(invoice.status, InvoiceStatus::Draft);
    assert_eq!(invoice.due_date, invoice.invoice_date + chrono::Days::new(30));
    assert_eq!(balance_of(&state, customer_id).await?, 7_500);

    invoice_service::update_invoice_status(
        &state,
        &finance,
        invoice.id,
        UpdateInvoiceStatusRequest {
            status: "cancelled".into(),
        },
    )
    .await?;
    assert_eq!(balance_of(&state, customer_id).await?, 0);

    let err = payment_service::record_payment(&state, &finance, payment(invoice.id, 100))
        .await
        .expect_err("cancelled invoice");
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn enquiry_converts_to_a_lead_exactly_once() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let staff = create_user(&state, Role::Staff).await?;
    let product = create_product(&state, 100, 5).await?;

    let enquiry = enquiry_service::submit_enquiry(
        &state,
        None,
        SubmitEnquiryRequest {
            enquiry_type: Some("product".into()),
            company_name: "Acme Ltd".into(),
            contact_person: "Sam Doe".into(),
            email: "sam@acme.test".into(),
            phone: "555-0100".into(),
            subject: "Bulk pricing".into(),
            message: "Need 200 chairs".into(),
            interested_product_id: Some(product),
        },
    )
    .await?
    .data
    .expect("enquiry data");
    assert_eq!(enquiry.status, EnquiryStatus::New);
    assert!(enquiry.enquiry_number.starts_with("ENQ-"));
    let submitted = activity_for(&state, "enquiry_submit", enquiry.id).await?;
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].user_id, None);

    let converted = enquiry_service::convert_enquiry(&state, &staff, enquiry.id)
        .await?
        .data
        .expect("conversion data");
    assert_eq!(converted.enquiry.status, EnquiryStatus::Converted);
    assert_eq!(converted.enquiry.lead_id, Some(converted.lead.id));
    assert_eq!(converted.lead.source, LeadSource::Website);
    assert_eq!(converted.lead.status, LeadStatus::New);
    assert_eq!(converted.lead.company_name, "Acme Ltd");

    let err = enquiry_service::convert_enquiry(&state, &staff, enquiry.id)
        .await
        .expect_err("already converted");
    assert!(matches!(err, AppError::Validation(_)));

    let leads = lead_service::list_leads(&state, &staff, Default::default())
        .await?
        .data
        .expect("lead list");
    assert_eq!(leads.items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn leads_move_through_their_pipeline() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let staff = create_user(&state, Role::Staff).await?;
    let (customer, _) = create_customer(&state).await?;

    let request = || CreateLeadRequest {
        company_name: "Globex".into(),
        contact_person: "Hank".into(),
        email: "hank@globex.test".into(),
        phone: String::new(),
        source: Some("referral".into()),
        estimated_value: Some(120_000),
        notes: None,
        assigned_to: Some(staff.user_id),
    };

    let err = lead_service::create_lead(&state, &customer, request())
        .await
        .expect_err("customers have no CRM access");
    assert!(matches!(err, AppError::Unauthorized(_)));

    let lead = lead_service::create_lead(&state, &staff, request())
        .await?
        .data
        .expect("lead data");
    assert_eq!(lead.source, LeadSource::Referral);

    let updated = lead_service::update_lead_status(
        &state,
        &staff,
        lead.id,
        UpdateLeadStatusRequest {
            status: "proposal_sent".into(),
        },
    )
    .await?
    .data
    .expect("lead data");
    assert_eq!(updated.status, LeadStatus::ProposalSent);

    let err = lead_service::update_lead_status(
        &state,
        &staff,
        lead.id,
        UpdateLeadStatusRequest {
            status: "abandoned".into(),
        },
    )
    .await
    .expect_err("unknown status");
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn inventory_adjustments_feed_the_low_stock_report() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let staff = create_user(&state, Role::Staff).await?;
    let (customer, _) = create_customer(&state).await?;

    let product = product_service::create_product(
        &state,
        &staff,
        CreateProductRequest {
            sku: "SKU-LAMP".into(),
            name: "Desk Lamp".into(),
            description: None,
            category: None,
            price: 2_500,
            stock_quantity: 12,
            min_stock_level: Some(10),
        },
    )
    .await?
    .data
    .expect("product data");

    let low = stock_ledger::list_low_stock(&state, &staff, LowStockQuery::default())
        .await?
        .data
        .expect("low stock");
    assert!(low.items.is_empty());

    let err = stock_ledger::adjust_inventory(
        &state,
        &staff,
        product.id,
        InventoryAdjustRequest {
            delta: -13,
            reason: Some("stock take".into()),
        },
    )
    .await
    .expect_err("cannot go negative");
    assert!(matches!(err, AppError::InsufficientStock { available: 12, .. }));

    stock_ledger::adjust_inventory(
        &state,
        &staff,
        product.id,
        InventoryAdjustRequest {
            delta: -5,
            reason: Some("damaged".into()),
        },
    )
    .await?;
    assert_eq!(stock_of(&state, product.id).await?, 7);
    assert_eq!(activity_for(&state, "inventory_adjust", product.id).await?.len(), 1);

    let low = stock_ledger::list_low_stock(&state, &staff, LowStockQuery::default())
        .await?
        .data
        .expect("low stock");
    assert_eq!(low.items.len(), 1);

    let err = stock_ledger::list_low_stock(&state, &customer, LowStockQuery::default())
        .await
        .expect_err("customers cannot see inventory");
    assert!(matches!(err, AppError::Unauthorized(_)));

    // Deactivated products disappear from the storefront.
    product_service::deactivate_product(&state, &staff, product.id).await?;
    let visible = product_service::list_products(&state, None, ProductQuery::default())
        .await?
        .data
        .expect("products");
    assert!(visible.items.is_empty());
    let all = product_service::list_products(&state, Some(&staff), ProductQuery::default())
        .await?
        .data
        .expect("products");
    assert_eq!(all.items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn registration_login_and_activity_trail() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let admin = create_user(&state, Role::Admin).await?;

    let registered = auth_service::register_user(
        &state,
        RegisterRequest {
            email: "New.Customer@Example.com".into(),
            password: "correct horse".into(),
            billing_address: Some("9 Bill St".into()),
            shipping_address: None,
        },
    )
    .await?
    .data
    .expect("registration");
    assert_eq!(registered.user.email, "new.customer@example.com");
    assert_eq!(registered.user.role, Role::Customer);
    assert_eq!(registered.customer.user_id, registered.user.id);

    let err = auth_service::login_user(
        &state,
        LoginRequest {
            email: "new.customer@example.com".into(),
            password: "wrong password".into(),
        },
    )
    .await
    .expect_err("bad password");
    assert!(matches!(err, AppError::Unauthenticated(_)));

    let login = auth_service::login_user(
        &state,
        LoginRequest {
            email: "new.customer@example.com".into(),
            password: "correct horse".into(),
        },
    )
    .await?
    .data
    .expect("login");
    assert_eq!(login.token_type, "Bearer");

    let trail = activity_service::list_activity(
        &state,
        &admin,
        ActivityQuery {
            table_name: Some("users".into()),
            record_id: Some(registered.user.id),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("activity");
    let actions: Vec<&str> = trail.items.iter().map(|a| a.action.as_str()).collect();
    assert_eq!(actions.len(), 2);
    assert!(actions.contains(&"user_register"));
    assert!(actions.contains(&"user_login"));

    let customer = AuthUser {
        user_id: registered.user.id,
        role: Role::Customer,
    };
    let err = activity_service::list_activity(&state, &customer, ActivityQuery::default())
        .await
        .expect_err("customers cannot read the audit trail");
    assert!(matches!(err, AppError::Unauthorized(_)));
    Ok(())
}

fn product_request(sku: &str, category: Option<&str>) -> CreateProductRequest {
    CreateProductRequest {
        sku: sku.into(),
        name: format!("Product {sku}"),
        description: None,
        category: category.map(Into::into),
        price: 1_000,
        stock_quantity: 5,
        min_stock_level: None,
    }
}

#[tokio::test]
async fn categories_are_unique_by_name_and_filter_the_catalog() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let staff = create_user(&state, Role::Staff).await?;
    let (customer, _) = create_customer(&state).await?;

    let lighting = product_service::create_category(
        &state,
        &staff,
        CreateCategoryRequest {
            name: " Lighting ".into(),
            description: Some("Lamps and bulbs".into()),
        },
    )
    .await?
    .data
    .expect("category data");
    assert_eq!(lighting.name, "Lighting");

    let err = product_service::create_category(
        &state,
        &staff,
        CreateCategoryRequest {
            name: "LIGHTING".into(),
            description: None,
        },
    )
    .await
    .expect_err("names compare case-insensitively");
    assert!(matches!(err, AppError::Validation(_)));

    let err = product_service::create_category(
        &state,
        &customer,
        CreateCategoryRequest {
            name: "Garden".into(),
            description: None,
        },
    )
    .await
    .expect_err("customers cannot edit the catalog");
    assert!(matches!(err, AppError::Unauthorized(_)));

    let lamp = product_service::create_product(&state, &staff, product_request("SKU-LAMP", Some("lighting")))
        .await?
        .data
        .expect("product data");
    assert_eq!(lamp.category_id, Some(lighting.id));

    let bench = product_service::create_product(&state, &staff, product_request("SKU-BENCH", Some("Outdoor")))
        .await?
        .data
        .expect("product data");
    product_service::create_product(&state, &staff, product_request("SKU-PLAIN", None)).await?;

    let categories = product_service::list_categories(&state, None)
        .await?
        .data
        .expect("categories");
    let names: Vec<&str> = categories.items.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Lighting", "Outdoor"]);

    let in_lighting = product_service::list_products(
        &state,
        None,
        ProductQuery {
            category_id: Some(lighting.id),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("products");
    assert_eq!(in_lighting.items.len(), 1);
    assert_eq!(in_lighting.items[0].id, lamp.id);

    let moved = product_service::update_product(
        &state,
        &staff,
        bench.id,
        UpdateProductRequest {
            name: None,
            description: None,
            category: Some("LIGHTING".into()),
            price: None,
            min_stock_level: None,
            is_active: None,
        },
    )
    .await?
    .data
    .expect("product data");
    assert_eq!(moved.category_id, Some(lighting.id));
    Ok(())
}

#[tokio::test]
async fn one_live_invoice_per_order_is_enforced_by_the_schema() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let finance = create_user(&state, Role::Finance).await?;
    let (order_id, invoice_id, customer_id) = invoiced_order(&state, &finance).await?;

    let duplicate = invoices::ActiveModel {
        id: Set(Uuid::new_v4()),
        invoice_number: Set("INV-DUPLICATE".into()),
        order_id: Set(Some(order_id)),
        customer_id: Set(customer_id),
        invoice_date: Set(Utc::now().date_naive()),
        due_date: Set(Utc::now().date_naive()),
        total_amount: Set(1_000),
        paid_amount: Set(0),
        status: Set("draft".into()),
        notes: Set(None),
        created_by: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await;
    assert!(duplicate.is_err());

    invoice_service::update_invoice_status(
        &state,
        &finance,
        invoice_id,
        UpdateInvoiceStatusRequest {
            status: "cancelled".into(),
        },
    )
    .await?;
    let replacement = invoice_service::create_invoice(
        &state,
        &finance,
        CreateInvoiceRequest {
            order_id: Some(order_id),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("invoice data");
    assert_ne!(replacement.id, invoice_id);
    assert_eq!(balance_of(&state, customer_id).await?, 1_000);
    Ok(())
}

#[tokio::test]
async fn invoice_payments_do_not_override_card_settlement() -> anyhow::Result<()> {
    let state = setup_state()
        .await?
        .with_gateway(Arc::new(StubGateway::default()));
    let finance = create_user(&state, Role::Finance).await?;
    let (customer, customer_id) = create_customer(&state).await?;
    let product = create_product(&state, 600, 10).await?;

    let card_order = |quantity| {
        let mut request = order_request(customer_id, &[(product, quantity)]);
        request.payment_method = "card".into();
        request
    };
    let invoice_for = |order_id| CreateInvoiceRequest {
        order_id: Some(order_id),
        ..Default::default()
    };

    // Paid through the gateway, then invoiced for the books.
    let paid = order_service::place_order(&state, &customer, card_order(1))
        .await?
        .data
        .expect("order data")
        .order;
    let intent = checkout_service::create_payment_intent(&state, &customer, paid.id)
        .await?
        .data
        .expect("intent");
    checkout_service::confirm_payment(
        &state,
        &customer,
        paid.id,
        ConfirmPaymentRequest {
            intent_id: intent.intent_id,
        },
    )
    .await?;
    let invoice = invoice_service::create_invoice(&state, &finance, invoice_for(paid.id))
        .await?
        .data
        .expect("invoice data");

    let err = payment_service::record_payment(&state, &finance, payment(invoice.id, 100))
        .await
        .expect_err("already paid by card");
    assert!(matches!(err, AppError::Validation(_)));
    let stored = Orders::find_by_id(paid.id)
        .one(&state.orm)
        .await?
        .expect("order");
    assert_eq!(stored.payment_status, "paid");
    assert!(stored.paid_at.is_some());

    // An unpaid card order keeps its gateway-owned status while the invoice fills.
    let open = order_service::place_order(&state, &customer, card_order(2))
        .await?
        .data
        .expect("order data")
        .order;
    let invoice = invoice_service::create_invoice(&state, &finance, invoice_for(open.id))
        .await?
        .data
        .expect("invoice data");
    payment_service::record_payment(&state, &finance, payment(invoice.id, 1_200)).await?;
    let stored = Orders::find_by_id(open.id)
        .one(&state.orm)
        .await?
        .expect("order");
    assert_eq!(stored.payment_status, "pending");
    assert!(stored.paid_at.is_none());
    Ok(())
}
