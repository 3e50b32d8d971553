use crate::config::AppConfig;
use crate::entities;
use sea_orm::{
    sea_query::Index, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema,
};
use std::time::Duration;
use tracing::{debug, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for the database connection pool
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

/// Establishes a connection pool to the database.
pub async fn establish_connection(database_url: &str) -> Result<DbPool, DbErr> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };
    establish_connection_with_config(&config).await
}

/// Establishes a connection pool using pool sizing from the app config.
pub async fn establish_connection_from_app_config(config: &AppConfig) -> Result<DbPool, DbErr> {
    let db_config = DbConfig {
        url: config.database_url.clone(),
        max_connections: config.db_max_connections,
        min_connections: config.db_min_connections,
        ..Default::default()
    };
    let pool = establish_connection_with_config(&db_config).await?;
    if config.auto_migrate {
        create_schema(&pool).await?;
    }
    Ok(pool)
}

async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, DbErr> {
    debug!("Configuring database connection: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .acquire_timeout(config.acquire_timeout)
        .sqlx_logging(false);

    let pool = Database::connect(opt).await?;
    info!("Database connection established");
    Ok(pool)
}

/// Creates all tables and unique indexes from the entity definitions.
/// Idempotent; used on startup (auto_migrate) and by the test harness.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut tables = vec![
        schema.create_table_from_entity(entities::Customer),
        schema.create_table_from_entity(entities::Product),
        schema.create_table_from_entity(entities::ProductVariant),
        schema.create_table_from_entity(entities::CartItem),
        schema.create_table_from_entity(entities::PromoCode),
        schema.create_table_from_entity(entities::Order),
        schema.create_table_from_entity(entities::OrderItem),
        schema.create_table_from_entity(entities::BonusTransaction),
        schema.create_table_from_entity(entities::StoreSettings),
    ];
    for stmt in &mut tables {
        db.execute(backend.build(stmt.if_not_exists())).await?;
    }

    let cart_unique = Index::create()
        .name("uq_cart_customer_product_variant")
        .table(entities::CartItem)
        .col(entities::cart_item::Column::CustomerId)
        .col(entities::cart_item::Column::ProductId)
        .col(entities::cart_item::Column::VariantKey)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&cart_unique)).await?;

    let variant_unique = Index::create()
        .name("uq_variant_product_option")
        .table(entities::ProductVariant)
        .col(entities::product_variant::Column::ProductId)
        .col(entities::product_variant::Column::OptionName)
        .col(entities::product_variant::Column::OptionValue)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&variant_unique)).await?;

    info!("Database schema ready");
    Ok(())
}
