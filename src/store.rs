// src/store.rs

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::{
    common::{
        clock::{Clock, SystemClock},
        error::AppError,
        ids::{IdGenerator, RandomIds},
    },
    config::StoreConfig,
    db::{FileStorage, KeyValueStorage, SettingsRepository, StoreState},
    middleware::AccessGate,
    models::{
        auth::AuthSession,
        settings::{LEGACY_VAT_COMPANY_KEY, VatSettings},
    },
    remote::{Backend, InMemoryBackend},
    services::{
        auth::{self, AuthService},
        catalog_service::CatalogService,
        client_service::ClientService,
        company_service::CompanyService,
        document_service::DocumentService,
        engagement_service::EngagementService,
        lead_service::LeadService,
        loader::LoadGuard,
        purchase_service::PurchaseService,
        session_service::SessionService,
        settings_service::SettingsService,
        signature_service::SignatureService,
        subscription_service::SubscriptionService,
        sync::{self, PendingOp, PendingOps, SyncTicket},
    },
};

/// Contexto compartilhado por todos os serviços do store.
///
/// O estado fica atrás de um único `Mutex`; os acessos passam por `read` e
/// `write`, que nunca atravessam um `.await`.
pub struct StoreContext {
    state: Mutex<StoreState>,
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdGenerator>,
    pub(crate) settings: SettingsRepository,
    pub(crate) pending: PendingOps,
    pub(crate) loads: LoadGuard,
    pub(crate) config: StoreConfig,
}

impl StoreContext {
    pub(crate) fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        let guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn new_id(&self, prefix: &str) -> String {
        self.ids.temp_id(prefix, self.now())
    }

    pub(crate) fn persist_auth(&self) {
        let session = self.read(|s| AuthSession {
            auth_users: s.users.to_vec(),
            current_user_id: s.current_user_id.clone(),
        });
        self.settings.save_auth_state(&session);
    }

    pub(crate) fn persist_vat(&self) {
        let settings = self.read(|s| {
            let mut per_company = s.vat_per_company();
            // Sem empresas, o flag global é guardado na chave legada
            if per_company.is_empty() {
                per_company.insert(LEGACY_VAT_COMPANY_KEY.to_string(), s.vat_enabled);
            }
            VatSettings { per_company, rate: s.vat_rate }
        });
        self.settings.save_vat_settings(&settings);
    }

    pub(crate) fn persist_active_company(&self) {
        let active = self.read(|s| s.active_company_id.clone());
        self.settings.save_active_company_id(active.as_deref());
    }
}

/// Monta um `DomainStore` com colaboradores injetáveis.
#[derive(Default)]
pub struct StoreBuilder {
    backend: Option<Arc<dyn Backend>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    storage: Option<Arc<dyn KeyValueStorage>>,
    config: Option<StoreConfig>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Carrega a sessão persistida e cria o administrador padrão quando não
    /// há nenhum usuário salvo.
    pub async fn build(self) -> anyhow::Result<DomainStore> {
        let config = self.config.unwrap_or_default();
        let storage: Arc<dyn KeyValueStorage> = match self.storage {
            Some(storage) => storage,
            None => Arc::new(FileStorage::new(config.storage_path.clone())),
        };
        let settings = SettingsRepository::new(storage);

        // --- Estado persistido ---
        let mut state = StoreState::default();
        if let Some(session) = settings.load_auth_state() {
            state.users.replace_all(session.auth_users.into_iter().map(auth::sanitize_auth_user).collect());
            state.current_user_id = session
                .current_user_id
                .filter(|id| state.users.get(id).is_some_and(|u| u.active));
        }
        if let Some(vat) = settings.load_vat_settings() {
            state.vat_rate = vat.rate.max(rust_decimal::Decimal::ZERO);
            if let Some(enabled) = vat.per_company.get(LEGACY_VAT_COMPANY_KEY) {
                state.vat_enabled = *enabled;
            }
        }
        state.theme = settings.load_theme();
        state.sidebar_title = settings.load_sidebar_title();
        state.active_company_id = settings.load_active_company_id();

        let seed_admin = state.users.is_empty();
        if seed_admin {
            let admin = auth::default_admin(&config).await?;
            state.users.push(admin);
            tracing::info!("✅ Administrador padrão criado (usuário 'admin')");
        }

        let ctx = Arc::new(StoreContext {
            state: Mutex::new(state),
            backend: self.backend.unwrap_or_else(|| Arc::new(InMemoryBackend::new())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            ids: self.ids.unwrap_or_else(|| Arc::new(RandomIds)),
            settings,
            pending: PendingOps::new(),
            loads: LoadGuard::new(),
            config,
        });
        if seed_admin {
            ctx.persist_auth();
        }

        tracing::info!("✅ Store de domínio inicializado");
        Ok(DomainStore { ctx })
    }
}

/// Handle do store. Clonar é barato: todos os clones veem o mesmo estado.
#[derive(Clone)]
pub struct DomainStore {
    ctx: Arc<StoreContext>,
}

impl DomainStore {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// Cópia do estado inteiro (para a UI e para asserções de teste).
    pub fn snapshot(&self) -> StoreState {
        self.ctx.read(|s| s.clone())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.ctx.config
    }

    // --- Serviços por família ---

    pub fn clients(&self) -> ClientService {
        ClientService::new(self.ctx.clone())
    }

    pub fn leads(&self) -> LeadService {
        LeadService::new(self.ctx.clone())
    }

    pub fn catalog(&self) -> CatalogService {
        CatalogService::new(self.ctx.clone())
    }

    pub fn engagements(&self) -> EngagementService {
        EngagementService::new(self.ctx.clone())
    }

    pub fn companies(&self) -> CompanyService {
        CompanyService::new(self.ctx.clone())
    }

    pub fn subscriptions(&self) -> SubscriptionService {
        SubscriptionService::new(self.ctx.clone())
    }

    pub fn purchases(&self) -> PurchaseService {
        PurchaseService::new(self.ctx.clone())
    }

    pub fn documents(&self) -> DocumentService {
        DocumentService::new(self.ctx.clone())
    }

    pub fn signatures(&self) -> SignatureService {
        SignatureService::new(self.ctx.clone())
    }

    pub fn settings(&self) -> SettingsService {
        SettingsService::new(self.ctx.clone())
    }

    pub fn session(&self) -> SessionService {
        SessionService::new(self.ctx.clone())
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.ctx.clone())
    }

    pub fn access(&self) -> AccessGate {
        AccessGate::new(self.ctx.clone())
    }

    // --- Ledger de sincronização ---

    pub fn failed_operations(&self) -> Vec<PendingOp> {
        self.ctx.pending.failed()
    }

    pub fn pending_operation(&self, op_id: u64) -> Option<PendingOp> {
        self.ctx.pending.get(op_id)
    }

    pub fn last_sync_error(&self) -> Option<String> {
        self.ctx.read(|s| s.last_sync_error.clone())
    }

    /// Reenvia uma operação em falha com o estado local atual da entidade.
    pub fn retry(&self, op_id: u64) -> Result<SyncTicket, AppError> {
        let op = self.ctx.pending.reopen(op_id)?;
        tracing::info!("🔁 Reenviando {} {:?} {}", op.family.label(), op.action, op.entity_id);
        Ok(sync::resume(&self.ctx, &op))
    }

    /// Reenvia todas as operações em falha.
    pub fn retry_all(&self) -> Vec<SyncTicket> {
        self.failed_operations()
            .into_iter()
            .filter_map(|op| self.retry(op.id).ok())
            .collect()
    }
}
