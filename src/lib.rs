pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use crate::infra::db::Db;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub posts_per_page: u32,
    pub paseto_access_key: [u8; 32],
    pub access_ttl_minutes: u64,
}
