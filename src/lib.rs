//src/lib.rs

// Store de domínio do ERP/CRM: coleções em memória, motor de preços,
// faturação automática, sincronização otimista e persistência de sessão.

pub mod common;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod remote;
pub mod services;
pub mod store;
pub mod telemetry;

pub use common::error::AppError;
pub use common::money::Money;
pub use config::StoreConfig;
pub use store::{DomainStore, StoreBuilder};
