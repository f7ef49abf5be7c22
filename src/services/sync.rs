// src/services/sync.rs

// Protocolo otimista: a mutação local já aconteceu, aqui só se empurra o
// registro para o backend e se reconcilia a resposta. Falhas nunca desfazem o
// estado local: a operação fica `Failed` no ledger até um `retry`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::common::error::{AppError, is_not_found_message};
use crate::db::{Collection, Identified, StoreState};
use crate::models::{
    auth::AuthUser,
    catalog::{Category, Service},
    client::Client,
    company::Company,
    engagement::Engagement,
    lead::Lead,
    subscription::Subscription,
};
use crate::remote::api::{Backend, RemoteApi, RemoteRecord};
use crate::remote::dto::{
    AppointmentDto, CategoryDto, ClientDto, CompanyDto, EntityMapper, LeadDto, ServiceDto,
    SubscriptionDto, UserDto,
};
use crate::store::StoreContext;

// Operações confirmadas mantidas para consulta antes da poda
const CONFIRMED_KEPT: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Family {
    Clients,
    Leads,
    Services,
    Engagements,
    Companies,
    Users,
    Subscriptions,
    Categories,
}

impl Family {
    pub fn label(self) -> &'static str {
        match self {
            Family::Clients => "clients",
            Family::Leads => "leads",
            Family::Services => "services",
            Family::Engagements => "appointments",
            Family::Companies => "companies",
            Family::Users => "users",
            Family::Subscriptions => "subscriptions",
            Family::Categories => "categories",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OpState {
    AppliedLocally,
    Confirmed,
    Failed(String),
}

impl OpState {
    pub fn is_failed(&self) -> bool {
        matches!(self, OpState::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOp {
    pub id: u64,
    pub family: Family,
    pub action: SyncAction,
    pub entity_id: String,
    pub state: OpState,
    pub attempts: u32,
}

/// Ledger das operações remotas disparadas pelas mutações.
#[derive(Debug, Default)]
pub struct PendingOps {
    next_id: AtomicU64,
    ops: Mutex<Vec<PendingOp>>,
}

impl PendingOps {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PendingOp>> {
        self.ops.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(&self, family: Family, action: SyncAction, entity_id: &str) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut ops = self.lock();
        prune_confirmed(&mut ops);
        ops.push(PendingOp {
            id,
            family,
            action,
            entity_id: entity_id.to_string(),
            state: OpState::AppliedLocally,
            attempts: 1,
        });
        id
    }

    pub fn settle(&self, id: u64, state: OpState) {
        if let Some(op) = self.lock().iter_mut().find(|op| op.id == id) {
            op.state = state;
        }
    }

    /// Reabre uma operação em falha para nova tentativa.
    pub fn reopen(&self, id: u64) -> Result<PendingOp, AppError> {
        let mut ops = self.lock();
        let op = ops
            .iter_mut()
            .find(|op| op.id == id)
            .ok_or_else(|| AppError::not_found("Operação pendente", id.to_string()))?;
        if !op.state.is_failed() {
            return Err(AppError::OperationNotFailed(id));
        }
        op.state = OpState::AppliedLocally;
        op.attempts += 1;
        Ok(op.clone())
    }

    /// Id local trocado pelo id do servidor: as operações seguintes usam o novo.
    pub fn rename_entity(&self, family: Family, old_id: &str, new_id: &str) {
        for op in self.lock().iter_mut() {
            if op.family == family && op.entity_id == old_id {
                op.entity_id = new_id.to_string();
            }
        }
    }

    pub fn get(&self, id: u64) -> Option<PendingOp> {
        self.lock().iter().find(|op| op.id == id).cloned()
    }

    pub fn failed(&self) -> Vec<PendingOp> {
        self.lock().iter().filter(|op| op.state.is_failed()).cloned().collect()
    }

    /// Registros criados localmente que o servidor ainda não confirmou.
    pub fn unsettled_creates(&self, family: Family) -> HashSet<String> {
        self.lock()
            .iter()
            .filter(|op| op.family == family && op.action == SyncAction::Create)
            .filter(|op| op.state != OpState::Confirmed)
            .map(|op| op.entity_id.clone())
            .collect()
    }
}

fn prune_confirmed(ops: &mut Vec<PendingOp>) {
    let confirmed = ops.iter().filter(|op| op.state == OpState::Confirmed).count();
    if confirmed <= CONFIRMED_KEPT {
        return;
    }
    let mut excess = confirmed - CONFIRMED_KEPT;
    ops.retain(|op| {
        if excess > 0 && op.state == OpState::Confirmed {
            excess -= 1;
            return false;
        }
        true
    });
}

#[derive(Debug)]
enum TicketInner {
    Spawned(JoinHandle<OpState>),
    Ready(OpState),
}

/// Devolvido por toda mutação sincronizada; pode ser aguardado ou ignorado.
#[derive(Debug)]
pub struct SyncTicket {
    op_id: Option<u64>,
    inner: TicketInner,
}

impl SyncTicket {
    /// Mutação puramente local, nada a sincronizar.
    pub fn local() -> Self {
        Self { op_id: None, inner: TicketInner::Ready(OpState::Confirmed) }
    }

    fn spawned(op_id: u64, handle: JoinHandle<OpState>) -> Self {
        Self { op_id: Some(op_id), inner: TicketInner::Spawned(handle) }
    }

    fn ready(op_id: u64, state: OpState) -> Self {
        Self { op_id: Some(op_id), inner: TicketInner::Ready(state) }
    }

    pub fn op_id(&self) -> Option<u64> {
        self.op_id
    }

    pub async fn settled(self) -> OpState {
        match self.inner {
            TicketInner::Ready(state) => state,
            TicketInner::Spawned(handle) => handle
                .await
                .unwrap_or_else(|e| OpState::Failed(format!("Tarefa de sincronização interrompida: {}", e))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reconcile {
    // Troca o registro na mesma posição pela resposta do servidor
    Patch,
    // Recarrega a coleção inteira
    Refetch,
}

/// Uma entidade sincronizada com uma família do backend.
pub(crate) trait SyncEntity: Identified + Clone + Send + Sync + 'static {
    type Remote: EntityMapper<Entity = Self>;

    const FAMILY: Family;
    const ON_CREATE: Reconcile;
    const ON_UPDATE: Reconcile;
    const REFETCH_AFTER_DELETE: bool = false;
    // Famílias escopadas descartam respostas de outra empresa
    const COMPANY_SCOPED: bool = true;

    fn set_id(&mut self, id: String);
    fn api(backend: &dyn Backend) -> &dyn RemoteApi<Self::Remote>;
    fn collection(state: &StoreState) -> &Collection<Self>;
    fn collection_mut(state: &mut StoreState) -> &mut Collection<Self>;

    /// Atualiza as referências cruzadas quando o id local vira id do servidor.
    fn on_id_reconciled(_state: &mut StoreState, _old_id: &str, _new_id: &str) {}

    /// Persistência após qualquer reconciliação aplicada.
    fn after_reconcile(_ctx: &StoreContext) {}
}

fn rename_ref(slot: &mut String, old_id: &str, new_id: &str) {
    if slot == old_id {
        *slot = new_id.to_string();
    }
}

fn rename_opt(slot: &mut Option<String>, old_id: &str, new_id: &str) {
    if slot.as_deref() == Some(old_id) {
        *slot = Some(new_id.to_string());
    }
}

// ==========================================
// FAMÍLIAS
// ==========================================

impl SyncEntity for Client {
    type Remote = ClientDto;
    const FAMILY: Family = Family::Clients;
    const ON_CREATE: Reconcile = Reconcile::Refetch;
    const ON_UPDATE: Reconcile = Reconcile::Refetch;
    const REFETCH_AFTER_DELETE: bool = true;

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn api(backend: &dyn Backend) -> &dyn RemoteApi<ClientDto> {
        backend.clients()
    }
    fn collection(state: &StoreState) -> &Collection<Self> {
        &state.clients
    }
    fn collection_mut(state: &mut StoreState) -> &mut Collection<Self> {
        &mut state.clients
    }

    fn on_id_reconciled(state: &mut StoreState, old_id: &str, new_id: &str) {
        for engagement in state.engagements.iter_mut() {
            rename_ref(&mut engagement.client_id, old_id, new_id);
        }
        for note in state.notes.iter_mut() {
            rename_ref(&mut note.client_id, old_id, new_id);
        }
        for subscription in state.subscriptions.iter_mut() {
            rename_ref(&mut subscription.client_id, old_id, new_id);
        }
        for project in state.projects.iter_mut() {
            rename_ref(&mut project.client_id, old_id, new_id);
        }
    }
}

impl SyncEntity for Lead {
    type Remote = LeadDto;
    const FAMILY: Family = Family::Leads;
    const ON_CREATE: Reconcile = Reconcile::Patch;
    const ON_UPDATE: Reconcile = Reconcile::Patch;

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn api(backend: &dyn Backend) -> &dyn RemoteApi<LeadDto> {
        backend.leads()
    }
    fn collection(state: &StoreState) -> &Collection<Self> {
        &state.leads
    }
    fn collection_mut(state: &mut StoreState) -> &mut Collection<Self> {
        &mut state.leads
    }
}

impl SyncEntity for Service {
    type Remote = ServiceDto;
    const FAMILY: Family = Family::Services;
    const ON_CREATE: Reconcile = Reconcile::Refetch;
    const ON_UPDATE: Reconcile = Reconcile::Refetch;

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn api(backend: &dyn Backend) -> &dyn RemoteApi<ServiceDto> {
        backend.services()
    }
    fn collection(state: &StoreState) -> &Collection<Self> {
        &state.services
    }
    fn collection_mut(state: &mut StoreState) -> &mut Collection<Self> {
        &mut state.services
    }

    fn on_id_reconciled(state: &mut StoreState, old_id: &str, new_id: &str) {
        for engagement in state.engagements.iter_mut() {
            rename_ref(&mut engagement.service_id, old_id, new_id);
            for line in engagement.services.iter_mut() {
                rename_ref(&mut line.service_id, old_id, new_id);
            }
        }
    }
}

impl SyncEntity for Engagement {
    type Remote = AppointmentDto;
    const FAMILY: Family = Family::Engagements;
    const ON_CREATE: Reconcile = Reconcile::Patch;
    const ON_UPDATE: Reconcile = Reconcile::Patch;

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn api(backend: &dyn Backend) -> &dyn RemoteApi<AppointmentDto> {
        backend.appointments()
    }
    fn collection(state: &StoreState) -> &Collection<Self> {
        &state.engagements
    }
    fn collection_mut(state: &mut StoreState) -> &mut Collection<Self> {
        &mut state.engagements
    }

    fn on_id_reconciled(state: &mut StoreState, old_id: &str, new_id: &str) {
        for document in state.documents.iter_mut() {
            rename_opt(&mut document.engagement_id, old_id, new_id);
        }
    }
}

impl SyncEntity for Company {
    type Remote = CompanyDto;
    const FAMILY: Family = Family::Companies;
    const ON_CREATE: Reconcile = Reconcile::Refetch;
    const ON_UPDATE: Reconcile = Reconcile::Refetch;
    const REFETCH_AFTER_DELETE: bool = true;
    const COMPANY_SCOPED: bool = false;

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn api(backend: &dyn Backend) -> &dyn RemoteApi<CompanyDto> {
        backend.companies()
    }
    fn collection(state: &StoreState) -> &Collection<Self> {
        &state.companies
    }
    fn collection_mut(state: &mut StoreState) -> &mut Collection<Self> {
        &mut state.companies
    }

    fn on_id_reconciled(state: &mut StoreState, old_id: &str, new_id: &str) {
        rename_opt(&mut state.active_company_id, old_id, new_id);
        for user in state.users.iter_mut() {
            rename_opt(&mut user.company_id, old_id, new_id);
        }
        for signature in state.email_signatures.iter_mut() {
            rename_opt(&mut signature.company_id, old_id, new_id);
        }
        for client in state.clients.iter_mut() {
            rename_opt(&mut client.company_id, old_id, new_id);
        }
        for lead in state.leads.iter_mut() {
            rename_opt(&mut lead.company_id, old_id, new_id);
        }
        for engagement in state.engagements.iter_mut() {
            rename_opt(&mut engagement.company_id, old_id, new_id);
        }
    }

    fn after_reconcile(ctx: &StoreContext) {
        ctx.persist_vat();
        ctx.persist_active_company();
    }
}

impl SyncEntity for AuthUser {
    type Remote = UserDto;
    const FAMILY: Family = Family::Users;
    const ON_CREATE: Reconcile = Reconcile::Patch;
    const ON_UPDATE: Reconcile = Reconcile::Patch;
    const COMPANY_SCOPED: bool = false;

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn api(backend: &dyn Backend) -> &dyn RemoteApi<UserDto> {
        backend.users()
    }
    fn collection(state: &StoreState) -> &Collection<Self> {
        &state.users
    }
    fn collection_mut(state: &mut StoreState) -> &mut Collection<Self> {
        &mut state.users
    }

    fn on_id_reconciled(state: &mut StoreState, old_id: &str, new_id: &str) {
        rename_opt(&mut state.current_user_id, old_id, new_id);
        for signature in state.email_signatures.iter_mut() {
            rename_opt(&mut signature.user_id, old_id, new_id);
        }
    }

    fn after_reconcile(ctx: &StoreContext) {
        ctx.persist_auth();
    }
}

impl SyncEntity for Subscription {
    type Remote = SubscriptionDto;
    const FAMILY: Family = Family::Subscriptions;
    const ON_CREATE: Reconcile = Reconcile::Refetch;
    const ON_UPDATE: Reconcile = Reconcile::Patch;

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn api(backend: &dyn Backend) -> &dyn RemoteApi<SubscriptionDto> {
        backend.subscriptions()
    }
    fn collection(state: &StoreState) -> &Collection<Self> {
        &state.subscriptions
    }
    fn collection_mut(state: &mut StoreState) -> &mut Collection<Self> {
        &mut state.subscriptions
    }
}

impl SyncEntity for Category {
    type Remote = CategoryDto;
    const FAMILY: Family = Family::Categories;
    const ON_CREATE: Reconcile = Reconcile::Patch;
    const ON_UPDATE: Reconcile = Reconcile::Patch;

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn api(backend: &dyn Backend) -> &dyn RemoteApi<CategoryDto> {
        backend.categories()
    }
    fn collection(state: &StoreState) -> &Collection<Self> {
        &state.categories
    }
    fn collection_mut(state: &mut StoreState) -> &mut Collection<Self> {
        &mut state.categories
    }

    fn on_id_reconciled(state: &mut StoreState, old_id: &str, new_id: &str) {
        for category in state.categories.iter_mut() {
            rename_opt(&mut category.parent_id, old_id, new_id);
        }
        for engagement in state.engagements.iter_mut() {
            rename_opt(&mut engagement.main_category_id, old_id, new_id);
            rename_opt(&mut engagement.sub_category_id, old_id, new_id);
            for line in engagement.services.iter_mut() {
                rename_opt(&mut line.main_category_id, old_id, new_id);
                rename_opt(&mut line.sub_category_id, old_id, new_id);
            }
        }
    }
}

// ==========================================
// DISPARO E EXECUÇÃO
// ==========================================

/// Registra a operação no ledger e dispara a tarefa de sincronização.
pub(crate) fn push<E: SyncEntity>(ctx: &Arc<StoreContext>, action: SyncAction, entity_id: &str) -> SyncTicket {
    let op_id = ctx.pending.register(E::FAMILY, action, entity_id);
    spawn_op::<E>(ctx, op_id)
}

/// Reexecuta uma operação reaberta pelo `retry`.
pub(crate) fn resume(ctx: &Arc<StoreContext>, op: &PendingOp) -> SyncTicket {
    match op.family {
        Family::Clients => spawn_op::<Client>(ctx, op.id),
        Family::Leads => spawn_op::<Lead>(ctx, op.id),
        Family::Services => spawn_op::<Service>(ctx, op.id),
        Family::Engagements => spawn_op::<Engagement>(ctx, op.id),
        Family::Companies => spawn_op::<Company>(ctx, op.id),
        Family::Users => spawn_op::<AuthUser>(ctx, op.id),
        Family::Subscriptions => spawn_op::<Subscription>(ctx, op.id),
        Family::Categories => spawn_op::<Category>(ctx, op.id),
    }
}

fn spawn_op<E: SyncEntity>(ctx: &Arc<StoreContext>, op_id: u64) -> SyncTicket {
    // Época capturada no momento da mutação, não da execução
    let epoch = ctx.read(|s| s.company_epoch);
    match Handle::try_current() {
        Ok(handle) => {
            let task_ctx = Arc::clone(ctx);
            let task = handle.spawn(async move { run_op::<E>(task_ctx, op_id, epoch).await });
            SyncTicket::spawned(op_id, task)
        }
        Err(_) => {
            let reason = "Nenhum runtime assíncrono disponível para sincronizar".to_string();
            tracing::warn!("⚠️ {} ({} #{})", reason, E::FAMILY.label(), op_id);
            record_failure(ctx, op_id, &reason);
            SyncTicket::ready(op_id, OpState::Failed(reason))
        }
    }
}

fn record_failure(ctx: &StoreContext, op_id: u64, reason: &str) {
    ctx.write(|s| s.last_sync_error = Some(reason.to_string()));
    ctx.pending.settle(op_id, OpState::Failed(reason.to_string()));
}

async fn run_op<E: SyncEntity>(ctx: Arc<StoreContext>, op_id: u64, epoch: u64) -> OpState {
    let Some(op) = ctx.pending.get(op_id) else {
        return OpState::Failed(format!("Operação pendente {} desconhecida", op_id));
    };

    let outcome = match op.action {
        SyncAction::Create => create_remote::<E>(&ctx, &op.entity_id, epoch).await,
        SyncAction::Update => update_remote::<E>(&ctx, &op.entity_id, epoch).await,
        SyncAction::Delete => delete_remote::<E>(&ctx, &op.entity_id, epoch).await,
    };

    match outcome {
        Ok(()) => {
            ctx.pending.settle(op_id, OpState::Confirmed);
            OpState::Confirmed
        }
        Err(e) => {
            tracing::error!(
                "❌ Falha ao sincronizar {} {:?} {}: {}",
                E::FAMILY.label(),
                op.action,
                op.entity_id,
                e
            );
            let reason = e.to_string();
            record_failure(&ctx, op_id, &reason);
            OpState::Failed(reason)
        }
    }
}

fn is_stale<E: SyncEntity>(ctx: &StoreContext, epoch: u64) -> bool {
    E::COMPANY_SCOPED && ctx.read(|s| s.company_epoch) != epoch
}

async fn create_remote<E: SyncEntity>(ctx: &StoreContext, entity_id: &str, epoch: u64) -> Result<(), AppError> {
    let Some(local) = ctx.read(|s| E::collection(s).get(entity_id).cloned()) else {
        tracing::debug!("{} {} removido antes da criação remota", E::FAMILY.label(), entity_id);
        return Ok(());
    };
    let dto = E::Remote::from_entity(&local);
    let created = E::api(ctx.backend.as_ref()).create(&dto).await.into_result()?;

    if is_stale::<E>(ctx, epoch) {
        tracing::debug!("Resposta de {} descartada: empresa ativa mudou", E::FAMILY.label());
        return Ok(());
    }
    if let Some(remote) = created {
        apply_remote::<E>(ctx, entity_id, remote);
    }
    if E::ON_CREATE == Reconcile::Refetch {
        refetch_after::<E>(ctx, epoch).await;
    }
    Ok(())
}

async fn update_remote<E: SyncEntity>(ctx: &StoreContext, entity_id: &str, epoch: u64) -> Result<(), AppError> {
    let Some(local) = ctx.read(|s| E::collection(s).get(entity_id).cloned()) else {
        tracing::debug!("{} {} removido antes da atualização remota", E::FAMILY.label(), entity_id);
        return Ok(());
    };
    let dto = E::Remote::from_entity(&local);
    let updated = E::api(ctx.backend.as_ref()).update(entity_id, &dto).await.into_result()?;

    if is_stale::<E>(ctx, epoch) {
        return Ok(());
    }
    match E::ON_UPDATE {
        Reconcile::Patch => {
            if let Some(remote) = updated {
                apply_remote::<E>(ctx, entity_id, remote);
            }
        }
        Reconcile::Refetch => refetch_after::<E>(ctx, epoch).await,
    }
    Ok(())
}

async fn delete_remote<E: SyncEntity>(ctx: &StoreContext, entity_id: &str, epoch: u64) -> Result<(), AppError> {
    match E::api(ctx.backend.as_ref()).delete(entity_id).await.into_result() {
        Ok(_) => {}
        // Já não existe no servidor: é o resultado desejado
        Err(AppError::Remote(message)) if is_not_found_message(&message) => {
            tracing::debug!("{} {} já ausente no servidor", E::FAMILY.label(), entity_id);
        }
        Err(e) => return Err(e),
    }
    if E::REFETCH_AFTER_DELETE && !is_stale::<E>(ctx, epoch) {
        refetch_after::<E>(ctx, epoch).await;
    }
    Ok(())
}

// O registro já foi aceito; uma falha no recarregamento só é registrada
async fn refetch_after<E: SyncEntity>(ctx: &StoreContext, epoch: u64) {
    if let Err(e) = refetch::<E>(ctx, epoch).await {
        tracing::warn!("⚠️ Falha ao recarregar {}: {}", E::FAMILY.label(), e);
    }
}

/// Troca o registro local pela resposta do servidor, na mesma posição.
fn apply_remote<E: SyncEntity>(ctx: &StoreContext, local_id: &str, remote: E::Remote) {
    let renamed = ctx.write(|state| {
        let current = E::collection(state).get(local_id).cloned()?;
        let mut merged = remote.into_entity(Some(&current));
        if merged.id().is_empty() {
            merged.set_id(local_id.to_string());
        }
        let server_id = merged.id().to_string();

        let items = E::collection_mut(state);
        if server_id != local_id && items.contains(&server_id) {
            items.remove(local_id);
            items.replace(&server_id, merged);
        } else {
            items.replace(local_id, merged);
        }
        if server_id != local_id {
            E::on_id_reconciled(state, local_id, &server_id);
        }
        Some(server_id)
    });

    let Some(server_id) = renamed else {
        tracing::debug!("{} {} não existe mais, resposta ignorada", E::FAMILY.label(), local_id);
        return;
    };
    if server_id != local_id {
        ctx.pending.rename_entity(E::FAMILY, local_id, &server_id);
        tracing::info!("🔁 {} {} reconciliado como {}", E::FAMILY.label(), local_id, server_id);
    }
    E::after_reconcile(ctx);
}

/// Substitui a coleção pela lista do servidor, preservando as criações
/// locais ainda não confirmadas.
pub(crate) async fn refetch<E: SyncEntity>(ctx: &StoreContext, epoch: u64) -> Result<(), AppError> {
    let rows = E::api(ctx.backend.as_ref()).get_all().await.into_result()?.unwrap_or_default();
    if is_stale::<E>(ctx, epoch) {
        return Ok(());
    }
    let unsynced = ctx.pending.unsettled_creates(E::FAMILY);

    ctx.write(|state| {
        let current = E::collection(state);
        let fetched: Vec<E> = rows
            .into_iter()
            .map(|dto| {
                let local = current.get(dto.remote_id()).cloned();
                dto.into_entity(local.as_ref())
            })
            .collect();
        let mut merged: Vec<E> = current
            .iter()
            .filter(|e| unsynced.contains(e.id()) && !fetched.iter().any(|f| f.id() == e.id()))
            .cloned()
            .collect();
        merged.extend(fetched);
        E::collection_mut(state).replace_all(merged);
    });
    E::after_reconcile(ctx);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reopen_only_accepts_failed_operations() {
        let ops = PendingOps::new();
        let id = ops.register(Family::Leads, SyncAction::Create, "l-1");
        assert!(matches!(ops.reopen(id), Err(AppError::OperationNotFailed(_))));

        ops.settle(id, OpState::Failed("HTTP 500".into()));
        assert_eq!(ops.failed().len(), 1);
        let reopened = ops.reopen(id).unwrap();
        assert_eq!(reopened.attempts, 2);
        assert!(ops.failed().is_empty());

        assert!(matches!(ops.reopen(999), Err(AppError::NotFound { .. })));
    }

    #[test]
    fn renaming_follows_the_family() {
        let ops = PendingOps::new();
        let create = ops.register(Family::Clients, SyncAction::Create, "c-1");
        let update = ops.register(Family::Clients, SyncAction::Update, "c-1");
        let other = ops.register(Family::Leads, SyncAction::Update, "c-1");

        ops.rename_entity(Family::Clients, "c-1", "srv-4");
        assert_eq!(ops.get(create).unwrap().entity_id, "srv-4");
        assert_eq!(ops.get(update).unwrap().entity_id, "srv-4");
        assert_eq!(ops.get(other).unwrap().entity_id, "c-1");
    }

    #[test]
    fn confirmed_creates_are_not_unsettled() {
        let ops = PendingOps::new();
        let a = ops.register(Family::Clients, SyncAction::Create, "c-1");
        ops.register(Family::Clients, SyncAction::Create, "c-2");
        ops.settle(a, OpState::Confirmed);
        let unsettled = ops.unsettled_creates(Family::Clients);
        assert!(unsettled.contains("c-2"));
        assert!(!unsettled.contains("c-1"));
    }

    #[test]
    fn old_confirmations_are_pruned() {
        let ops = PendingOps::new();
        for n in 0..(CONFIRMED_KEPT + 10) {
            let id = ops.register(Family::Users, SyncAction::Update, &format!("u-{}", n));
            ops.settle(id, OpState::Confirmed);
        }
        ops.register(Family::Users, SyncAction::Update, "last");
        assert!(ops.lock().len() <= CONFIRMED_KEPT + 1);
    }

    #[tokio::test]
    async fn local_tickets_settle_immediately() {
        let ticket = SyncTicket::local();
        assert_eq!(ticket.op_id(), None);
        assert_eq!(ticket.settled().await, OpState::Confirmed);
    }
}
