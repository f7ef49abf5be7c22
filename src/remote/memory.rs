// src/remote/memory.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::models::settings::Backpack;
use crate::remote::api::{ApiResult, Backend, RemoteApi, RemoteRecord};
use crate::remote::dto::{
    AppointmentDto, CategoryDto, ClientDto, CompanyDto, LeadDto, PricingGridDto, ServiceDto,
    SubscriptionDto, UserDto,
};

// Estado compartilhado por todas as tabelas do backend em memória
#[derive(Debug, Default)]
struct Shared {
    next_id: AtomicU64,
    offline: AtomicBool,
    fail_next: AtomicU32,
    latency_ms: AtomicU64,
    scope: Mutex<Option<String>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl Shared {
    fn record_call(&self, key: String) {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        *calls.entry(key).or_insert(0) += 1;
    }

    /// Latência simulada e falhas injetadas, na ordem em que a rede as produziria.
    async fn transport(&self, key: String) -> Result<(), String> {
        self.record_call(key);
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err("Network unreachable".to_string());
        }
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err("HTTP 500: injected failure".to_string());
        }
        Ok(())
    }

    fn server_id(&self) -> String {
        format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Uma tabela do servidor simulado (um recurso REST).
pub struct MemoryTable<D> {
    family: &'static str,
    rows: Mutex<Vec<D>>,
    shared: Arc<Shared>,
}

impl<D: RemoteRecord> MemoryTable<D> {
    fn new(family: &'static str, shared: Arc<Shared>) -> Self {
        Self { family, rows: Mutex::new(Vec::new()), shared }
    }

    /// Registros já "no servidor", com os ids fornecidos.
    pub fn seed(&self, rows: Vec<D>) {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).extend(rows);
    }

    pub fn rows(&self) -> Vec<D> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn find(&self, id: &str) -> Option<D> {
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|row| row.remote_id() == id)
            .cloned()
    }

    fn key(&self, method: &str) -> String {
        format!("{}.{}", self.family, method)
    }
}

#[async_trait]
impl<D: RemoteRecord> RemoteApi<D> for MemoryTable<D> {
    async fn create(&self, dto: &D) -> ApiResult<D> {
        if let Err(e) = self.shared.transport(self.key("create")).await {
            return ApiResult::err(e);
        }
        let mut stored = dto.clone();
        stored.set_remote_id(self.shared.server_id());
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).push(stored.clone());
        ApiResult::ok(stored)
    }

    async fn update(&self, id: &str, dto: &D) -> ApiResult<D> {
        if let Err(e) = self.shared.transport(self.key("update")).await {
            return ApiResult::err(e);
        }
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        match rows.iter_mut().find(|row| row.remote_id() == id) {
            Some(row) => {
                let mut stored = dto.clone();
                stored.set_remote_id(id.to_string());
                *row = stored.clone();
                ApiResult::ok(stored)
            }
            None => ApiResult::err(format!("404: {} {} not found", self.family, id)),
        }
    }

    async fn delete(&self, id: &str) -> ApiResult<()> {
        if let Err(e) = self.shared.transport(self.key("delete")).await {
            return ApiResult::err(e);
        }
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let before = rows.len();
        rows.retain(|row| row.remote_id() != id);
        if rows.len() == before {
            return ApiResult::err(format!("404: {} {} not found", self.family, id));
        }
        ApiResult::ok_empty()
    }

    async fn get_all(&self) -> ApiResult<Vec<D>> {
        if let Err(e) = self.shared.transport(self.key("get_all")).await {
            return ApiResult::err(e);
        }
        let scope = self.shared.scope.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let visible = rows
            .iter()
            .filter(|row| match (scope.as_deref(), row.owner_company()) {
                (Some(active), Some(owner)) => active == owner,
                _ => true,
            })
            .cloned()
            .collect();
        ApiResult::ok(visible)
    }
}

/// Backend completo em memória: ids do servidor `srv-N`, falhas injetáveis e
/// contadores de chamadas (`"clients.create"`, `"backpack"`, ...).
pub struct InMemoryBackend {
    shared: Arc<Shared>,
    pub client_table: MemoryTable<ClientDto>,
    pub lead_table: MemoryTable<LeadDto>,
    pub service_table: MemoryTable<ServiceDto>,
    pub appointment_table: MemoryTable<AppointmentDto>,
    pub company_table: MemoryTable<CompanyDto>,
    pub user_table: MemoryTable<UserDto>,
    pub subscription_table: MemoryTable<SubscriptionDto>,
    pub category_table: MemoryTable<CategoryDto>,
    backpacks: Mutex<HashMap<String, Backpack>>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        let shared = Arc::new(Shared::default());
        Self {
            client_table: MemoryTable::new("clients", shared.clone()),
            lead_table: MemoryTable::new("leads", shared.clone()),
            service_table: MemoryTable::new("services", shared.clone()),
            appointment_table: MemoryTable::new("appointments", shared.clone()),
            company_table: MemoryTable::new("companies", shared.clone()),
            user_table: MemoryTable::new("users", shared.clone()),
            subscription_table: MemoryTable::new("subscriptions", shared.clone()),
            category_table: MemoryTable::new("categories", shared.clone()),
            backpacks: Mutex::new(HashMap::new()),
            shared,
        }
    }

    /// As próximas `count` chamadas falham com um erro HTTP 500.
    pub fn fail_next(&self, count: u32) {
        self.shared.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn set_offline(&self, offline: bool) {
        self.shared.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.shared.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_backpack(&self, company_id: &str, backpack: Backpack) {
        self.backpacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(company_id.to_string(), backpack);
    }

    pub fn calls(&self, key: &str) -> usize {
        self.shared
            .calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub fn company_scope(&self) -> Option<String> {
        self.shared.scope.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    fn clients(&self) -> &dyn RemoteApi<ClientDto> {
        &self.client_table
    }

    fn leads(&self) -> &dyn RemoteApi<LeadDto> {
        &self.lead_table
    }

    fn services(&self) -> &dyn RemoteApi<ServiceDto> {
        &self.service_table
    }

    fn appointments(&self) -> &dyn RemoteApi<AppointmentDto> {
        &self.appointment_table
    }

    fn companies(&self) -> &dyn RemoteApi<CompanyDto> {
        &self.company_table
    }

    fn users(&self) -> &dyn RemoteApi<UserDto> {
        &self.user_table
    }

    fn subscriptions(&self) -> &dyn RemoteApi<SubscriptionDto> {
        &self.subscription_table
    }

    fn categories(&self) -> &dyn RemoteApi<CategoryDto> {
        &self.category_table
    }

    fn set_company_scope(&self, company_id: Option<&str>) {
        *self.shared.scope.lock().unwrap_or_else(|e| e.into_inner()) = company_id.map(str::to_string);
    }

    async fn backpack(&self, company_id: &str) -> ApiResult<Backpack> {
        if let Err(e) = self.shared.transport("backpack".to_string()).await {
            return ApiResult::err(e);
        }
        let backpack = self
            .backpacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(company_id)
            .cloned()
            .unwrap_or_default();
        ApiResult::ok(backpack)
    }

    async fn update_pricing_grid(&self, client_id: &str, grid: &PricingGridDto) -> ApiResult<PricingGridDto> {
        if let Err(e) = self.shared.transport("clients.pricing_grid".to_string()).await {
            return ApiResult::err(e);
        }
        let mut rows = self.client_table.rows.lock().unwrap_or_else(|e| e.into_inner());
        match rows.iter_mut().find(|row| row.id == client_id) {
            Some(row) => {
                row.pricing_grid = Some(grid.clone());
                ApiResult::ok(grid.clone())
            }
            None => ApiResult::err(format!("404: client {} not found", client_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(name: &str) -> CompanyDto {
        CompanyDto { name: name.into(), ..CompanyDto::default() }
    }

    #[tokio::test]
    async fn create_assigns_server_ids_and_counts_calls() {
        let backend = InMemoryBackend::new();
        let created = backend.companies().create(&company("A")).await;
        assert!(created.success);
        assert_eq!(created.data.unwrap().id, "srv-1");
        assert_eq!(backend.calls("companies.create"), 1);
        assert_eq!(backend.company_table.rows().len(), 1);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_one_by_one() {
        let backend = InMemoryBackend::new();
        backend.fail_next(1);
        assert!(!backend.companies().create(&company("A")).await.success);
        assert!(backend.companies().create(&company("A")).await.success);

        backend.set_offline(true);
        let listed = backend.companies().get_all().await;
        assert_eq!(listed.error.as_deref(), Some("Network unreachable"));
    }

    #[tokio::test]
    async fn unknown_ids_report_not_found() {
        let backend = InMemoryBackend::new();
        let deleted = backend.companies().delete("ghost").await;
        assert!(crate::common::error::is_not_found_message(&deleted.error.unwrap()));
        let updated = backend.companies().update("ghost", &company("B")).await;
        assert!(!updated.success);
    }
}
