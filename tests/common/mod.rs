// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use erp_domain_store::{
    DomainStore, StoreConfig,
    common::{clock::FixedClock, ids::SequentialIds},
    db::MemoryStorage,
    models::{
        company::Company,
        settings::{BackendUserSnapshot, SessionPayload},
    },
    remote::InMemoryBackend,
};

pub struct Harness {
    pub store: DomainStore,
    pub backend: Arc<InMemoryBackend>,
    pub storage: Arc<MemoryStorage>,
    pub clock: Arc<FixedClock>,
}

pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 12, 12, 0, 0).unwrap()
}

pub async fn harness() -> Harness {
    harness_with(MemoryStorage::new(), SequentialIds::new()).await
}

pub async fn harness_with(storage: MemoryStorage, ids: SequentialIds) -> Harness {
    let backend = Arc::new(InMemoryBackend::new());
    let storage = Arc::new(storage);
    let clock = Arc::new(FixedClock::new(noon()));
    let store = DomainStore::builder()
        .backend(backend.clone())
        .storage(storage.clone())
        .clock(clock.clone())
        .ids(Arc::new(ids))
        .config(StoreConfig::for_tests())
        .build()
        .await
        .expect("store de teste");
    Harness { store, backend, storage, clock }
}

pub fn company(id: &str, vat_enabled: bool) -> Company {
    let mut company = Company::named(id, format!("Empresa {}", id));
    company.vat_enabled = vat_enabled;
    company
}

/// Sessão de um agente com acesso total às duas empresas.
pub fn session(primary: Company, others: Vec<Company>) -> SessionPayload {
    SessionPayload {
        user: BackendUserSnapshot {
            id: "u-1".into(),
            username: "agent".into(),
            pages: vec!["*".into()],
            permissions: vec!["*".into()],
            ..BackendUserSnapshot::default()
        },
        company: Some(primary),
        companies: Some(others),
        ..SessionPayload::default()
    }
}
