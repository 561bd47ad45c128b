//! Service wiring: store selection and the orchestrators handlers call.

use std::sync::Arc;

use storefront_core::{Clock, SystemClock};
use storefront_infra::{
    AuthService, CartService, CheckoutService, InMemoryStore, OrderService, PostgresStore,
    ServiceResult, Store, StorefrontConfig,
};

#[derive(Clone)]
pub struct AppServices {
    pub auth: AuthService,
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
}

impl AppServices {
    /// Wire every service over one store and clock.
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        config: &StorefrontConfig,
    ) -> ServiceResult<Self> {
        Ok(Self {
            auth: AuthService::new(store.clone(), clock.clone(), &config.auth)?,
            carts: CartService::new(store.clone(), clock.clone(), config.pricing),
            checkout: CheckoutService::new(store.clone(), clock.clone(), config.pricing),
            orders: OrderService::new(store, clock),
        })
    }
}

/// Postgres when `DATABASE_URL` is set (migrations applied on start),
/// otherwise an empty in-memory store.
pub async fn build_services(config: &StorefrontConfig) -> ServiceResult<AppServices> {
    let store: Arc<dyn Store> = match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresStore::connect(url, config.database_max_connections).await?;
            store.migrate().await?;
            tracing::info!("using postgres store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    AppServices::new(store, Arc::new(SystemClock), config)
}
