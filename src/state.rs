// src/state.rs

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::gateway::Gateway;
use crate::storefront::Storefront;

const MAX_CLIENTS: u64 = 10_000;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
    /// One storefront per browser, keyed by the `client_id` cookie. The mutex
    /// makes a client's events run one at a time.
    pub clients: Cache<Uuid, Arc<Mutex<Storefront>>>,
}

impl AppState {
    pub fn new(gateway: Gateway, client_idle: Duration) -> Self {
        let clients = Cache::builder()
            .max_capacity(MAX_CLIENTS)
            .time_to_idle(client_idle)
            .build();
        Self { gateway, clients }
    }
}
