// src/middleware/rbac.rs

use std::sync::Arc;

use crate::{
    common::error::AppError,
    models::auth::{AuthUser, WILDCARD},
    store::StoreContext,
};

/// Páginas da aplicação, na ordem do menu.
pub const PAGE_KEYS: &[&str] = &[
    "dashboard",
    "clients",
    "leads",
    "devis",
    "service",
    "abonnement",
    "achats",
    "documents",
    "planning",
    "stats",
    "administratif",
    "administratif.overview",
    "administratif.fournisseurs",
    "administratif.team",
    "comptabilite",
    "comptabilite.achats",
    "comptabilite.facturesClients",
    "comptabilite.tva",
    "comptabilite.export",
    "comptabilite.documents",
    "parametres",
    "parametres.utilisateurs",
];

pub const PERMISSION_KEYS: &[&str] = &[
    // Services
    "service.create",
    "service.edit",
    "service.duplicate",
    "service.invoice",
    "service.print",
    "service.email",
    "service.archive",
    "service.export",
    // Abonnements
    "abonnement.create",
    "abonnement.edit",
    "abonnement.delete",
    "abonnement.export",
    // Leads
    "lead.edit",
    "lead.contact",
    "lead.convert",
    "lead.delete",
    "lead.export",
    // Clients
    "client.edit",
    "client.contact.add",
    "client.invoice",
    "client.quote",
    "client.email",
    "client.archive",
    "client.export",
    // Achats
    "purchase.create",
    "purchase.edit",
    "purchase.delete",
    "purchase.export",
    // Documents
    "documents.view",
    "documents.create",
    "documents.edit",
    "documents.delete",
    "documents.send",
    // Planning
    "planning.view",
    "planning.create",
    "planning.edit",
    "planning.delete",
    // Comptabilité
    "accounting.view",
    "accounting.export",
    "accounting.invoice.create",
    "accounting.invoice.edit",
    "accounting.invoice.delete",
    "accounting.vat.view",
    "stats.view",
    // Paramètres
    "settings.view",
    "settings.profile",
    "settings.companies",
    "settings.catalog",
    "settings.users",
];

/// 1. O Trait que define o que é uma Permissão
pub trait PermissionDef: Send + Sync + 'static {
    fn slug() -> &'static str;
}

/// Lista de acesso normalizada: o wildcard absorve tudo, chaves desconhecidas
/// e repetidas são descartadas.
pub fn normalize_access(values: &[String], catalog: &[&str]) -> Vec<String> {
    if values.iter().any(|v| v.trim() == WILDCARD) {
        return vec![WILDCARD.to_string()];
    }
    let mut normalized: Vec<String> = Vec::new();
    for value in values {
        let key = value.trim();
        if catalog.contains(&key) && !normalized.iter().any(|k| k == key) {
            normalized.push(key.to_string());
        }
    }
    normalized
}

fn grants(values: &[String], key: &str) -> bool {
    values.iter().any(|v| v == WILDCARD || v == key)
}

pub fn user_has_page_access(user: &AuthUser, page: &str) -> bool {
    user.active && grants(&user.pages, page)
}

pub fn user_has_permission(user: &AuthUser, permission: &str) -> bool {
    user.active && grants(&user.permissions, permission)
}

/// 2. O Guardião: consulta o usuário corrente da sessão
#[derive(Clone)]
pub struct AccessGate {
    ctx: Arc<StoreContext>,
}

impl AccessGate {
    pub(crate) fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    pub fn has_page_access(&self, page: &str) -> bool {
        self.ctx
            .read(|s| s.current_user().map(|u| user_has_page_access(u, page)))
            .unwrap_or(false)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.ctx
            .read(|s| s.current_user().map(|u| user_has_permission(u, permission)))
            .unwrap_or(false)
    }

    // 3. Versão tipada, para mutações que preferem falhar
    pub fn require_permission<P: PermissionDef>(&self) -> Result<(), AppError> {
        let required = P::slug();
        let allowed = self
            .ctx
            .read(|s| s.current_user().map(|u| user_has_permission(u, required)));
        match allowed {
            None => Err(AppError::NotAuthenticated),
            Some(false) => Err(AppError::Forbidden(required.to_string())),
            Some(true) => Ok(()),
        }
    }
}

// ---
// DEFINIÇÃO DAS PERMISSÕES (TIPOS)
// ---

macro_rules! permission {
    ($($name:ident => $slug:literal),* $(,)?) => {
        $(
            pub struct $name;
            impl PermissionDef for $name {
                fn slug() -> &'static str { $slug }
            }
        )*
    };
}

permission! {
    PermLeadEdit => "lead.edit",
    PermClientEdit => "client.edit",
    PermClientArchive => "client.archive",
}
