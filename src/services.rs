// src/services.rs

pub mod auth;
pub mod catalog_service;
pub mod client_service;
pub mod company_service;
pub mod document_service;
pub mod engagement_service;
pub mod invoicing;
pub mod lead_service;
pub mod loader;
pub mod performance;
pub mod pricing;
pub mod purchase_service;
pub mod session_service;
pub mod settings_service;
pub mod signature_service;
pub mod subscription_service;
pub mod sync;
