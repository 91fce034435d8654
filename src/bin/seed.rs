use chrono::Utc;
use erp_crm_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    domain::{
        crm::CustomerType,
        numbering::{self, document_number},
    },
    entity::{
        Customers, Products, Users, customers,
        products::{self, Column as ProductCol},
        users::{self, Column as UserCol},
    },
    policy::Role,
    services::{auth_service::hash_password, product_service::ensure_category},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "admin@example.com", "admin12345", Role::Admin).await?;
    ensure_user(&orm, "staff@example.com", "staff12345", Role::Staff).await?;
    ensure_user(&orm, "finance@example.com", "finance12345", Role::Finance).await?;
    let customer_user = ensure_user(&orm, "customer@example.com", "customer12345", Role::Customer).await?;
    ensure_customer(&orm, customer_user).await?;
    seed_products(&orm).await?;

    println!("Seed completed. Admin ID: {admin_id}, Customer user ID: {customer_user}");
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    email: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?
    {
        println!("User {email} already present");
        return Ok(existing.id);
    }

    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set(hash_password(password)?),
        role: Set(role.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(orm)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user.id)
}

async fn ensure_customer(orm: &DatabaseConnection, user_id: Uuid) -> anyhow::Result<()> {
    let existing = Customers::find()
        .filter(customers::Column::UserId.eq(user_id))
        .one(orm)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    customers::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        customer_code: Set(document_number(numbering::CUSTOMER)),
        customer_type: Set(CustomerType::Regular.to_string()),
        billing_address: Set("1 Billing Road".to_string()),
        shipping_address: Set("1 Shipping Lane".to_string()),
        credit_limit: Set(500_000),
        balance: Set(0),
        tax_number: Set(String::new()),
        created_at: Set(Utc::now().into()),
    }
    .insert(orm)
    .await?;

    println!("Seeded customer record");
    Ok(())
}

async fn seed_products(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let category_id = Some(ensure_category(orm, "Office Furniture").await?.id);
    let products = vec![
        ("SKU-CHAIR-01", "Office Chair", "Ergonomic mesh chair", 15_000, 40, 10),
        ("SKU-DESK-01", "Standing Desk", "Electric height adjustable", 45_000, 12, 5),
        ("SKU-LAMP-01", "Desk Lamp", "LED, dimmable", 2_500, 150, 20),
        ("SKU-MAT-01", "Anti-fatigue Mat", "For standing desks", 4_000, 8, 10),
    ];

    for (sku, name, desc, price, stock, min_stock) in products {
        let exists = Products::find()
            .filter(ProductCol::Sku.eq(sku))
            .one(orm)
            .await?;
        if exists.is_some() {
            continue;
        }
        products::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(sku.to_string()),
            name: Set(name.to_string()),
            description: Set(Some(desc.to_string())),
            category_id: Set(category_id),
            price: Set(price),
            stock_quantity: Set(stock),
            min_stock_level: Set(min_stock),
            is_active: Set(true),
            created_at: Set(Utc::now().into()),
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
