use utoipa::{
    Modify, OpenApi,
    openapi::{
        self, OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    domain::{
        crm::{
            CustomerType, EnquiryStatus, EnquiryType, InvoiceStatus, LeadSource, LeadStatus,
            LedgerPaymentMethod,
        },
        order::{OrderChannel, OrderStatus, PaymentMethod, PaymentStatus},
    },
    dto::{
        activity::ActivityList,
        auth::{LoginRequest, LoginResponse, RegisterRequest, Registration},
        cart::{AddToCartRequest, CartItemDto, CartList},
        customers::{CreateCustomerRequest, CustomerList, UpdateCustomerRequest},
        enquiries::{ConvertedEnquiry, EnquiryList, SubmitEnquiryRequest},
        invoices::{
            CreateInvoiceRequest, InvoiceList, InvoiceWithPayments, UpdateInvoiceStatusRequest,
        },
        leads::{CreateLeadRequest, LeadList, UpdateLeadStatusRequest},
        orders::{
            CheckoutRequest, ConfirmPaymentRequest, LineItemRequest, OrderList, OrderWithItems,
            PlaceOrderRequest, UpdateOrderStatusRequest, UpdateOrderTotalsRequest,
            UpdatePaymentStatusRequest,
        },
        payments::{PaymentList, RecordPaymentRequest},
        products::{
            CategoryList, CreateCategoryRequest, CreateProductRequest, InventoryAdjustRequest,
            ProductList, UpdateProductRequest,
        },
    },
    gateway::PaymentIntent,
    models::{
        ActivityLog, CartItem, Customer, Enquiry, Invoice, Lead, Order, OrderItem, Payment,
        Product, ProductCategory, User,
    },
    response::{ApiResponse, Meta},
    routes::{
        activity, auth, cart, customers, enquiries, health, invoices, leads, orders, params,
        payments, products,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::deactivate_product,
        products::list_categories,
        products::create_category,
        products::list_low_stock,
        products::adjust_inventory,
        customers::list_customers,
        customers::create_customer,
        customers::get_customer,
        customers::update_customer,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        orders::list_orders,
        orders::place_order,
        orders::checkout,
        orders::get_order,
        orders::update_order_status,
        orders::update_order_totals,
        orders::update_payment_status,
        orders::create_payment_intent,
        orders::confirm_payment,
        invoices::list_invoices,
        invoices::create_invoice,
        invoices::get_invoice,
        invoices::update_invoice_status,
        payments::list_payments,
        payments::record_payment,
        payments::get_payment,
        payments::delete_payment,
        leads::list_leads,
        leads::create_lead,
        leads::get_lead,
        leads::update_lead_status,
        enquiries::submit_enquiry,
        enquiries::list_enquiries,
        enquiries::convert_enquiry,
        activity::list_activity
    ),
    components(
        schemas(
            User,
            Customer,
            Product,
            ProductCategory,
            CartItem,
            Order,
            OrderItem,
            Invoice,
            Payment,
            Lead,
            Enquiry,
            ActivityLog,
            PaymentIntent,
            OrderStatus,
            PaymentStatus,
            PaymentMethod,
            OrderChannel,
            CustomerType,
            InvoiceStatus,
            LedgerPaymentMethod,
            LeadSource,
            LeadStatus,
            EnquiryType,
            EnquiryStatus,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            Registration,
            CreateProductRequest,
            UpdateProductRequest,
            InventoryAdjustRequest,
            ProductList,
            CreateCategoryRequest,
            CategoryList,
            CreateCustomerRequest,
            UpdateCustomerRequest,
            CustomerList,
            AddToCartRequest,
            CartItemDto,
            CartList,
            LineItemRequest,
            PlaceOrderRequest,
            CheckoutRequest,
            UpdateOrderStatusRequest,
            UpdateOrderTotalsRequest,
            UpdatePaymentStatusRequest,
            ConfirmPaymentRequest,
            OrderWithItems,
            OrderList,
            CreateInvoiceRequest,
            UpdateInvoiceStatusRequest,
            InvoiceWithPayments,
            InvoiceList,
            RecordPaymentRequest,
            PaymentList,
            CreateLeadRequest,
            UpdateLeadStatusRequest,
            LeadList,
            SubmitEnquiryRequest,
            ConvertedEnquiry,
            EnquiryList,
            ActivityList,
            params::Pagination,
            Meta,
            ApiResponse<Product>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<Invoice>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration and login"),
        (name = "Products", description = "Catalogue"),
        (name = "Inventory", description = "Stock levels and adjustments"),
        (name = "Customers", description = "Customer records"),
        (name = "Cart", description = "Storefront cart"),
        (name = "Orders", description = "Order lifecycle"),
        (name = "Invoices", description = "Invoicing"),
        (name = "Payments", description = "Invoice payments and card settlement"),
        (name = "CRM", description = "Leads and website enquiries"),
        (name = "Audit", description = "Activity log"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
