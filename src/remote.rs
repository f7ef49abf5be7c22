// src/remote.rs

// Contrato com o backend REST (caixa-preta) e uma implementação em memória.
pub mod api;
pub mod dto;
pub mod memory;

pub use api::{ApiResult, Backend, RemoteApi, RemoteRecord};
pub use memory::InMemoryBackend;
