// src/db/state.rs

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde_json::Value;

use crate::db::collection::Collection;
use crate::models::{
    auth::AuthUser,
    catalog::{Category, Service},
    client::{Client, Note},
    company::{Company, EmailSignature},
    document::{Document, Project},
    engagement::Engagement,
    lead::Lead,
    purchase::{Purchase, Vehicle},
    settings::{SidebarTitlePreference, ThemeMode, default_vat_rate},
    subscription::Subscription,
};

/// O contêiner único de estado do store.
///
/// Só é acessado através do `Mutex` do contexto; nenhuma referência sobrevive
/// a um `.await`.
#[derive(Debug, Clone)]
pub struct StoreState {
    pub clients: Collection<Client>,
    pub leads: Collection<Lead>,
    pub services: Collection<Service>,
    pub engagements: Collection<Engagement>,
    pub companies: Collection<Company>,
    pub users: Collection<AuthUser>,
    pub purchases: Collection<Purchase>,
    pub vehicles: Collection<Vehicle>,
    pub categories: Collection<Category>,
    pub subscriptions: Collection<Subscription>,
    pub documents: Collection<Document>,
    pub projects: Collection<Project>,
    pub notes: Collection<Note>,
    pub email_signatures: Collection<EmailSignature>,

    pub current_user_id: Option<String>,
    pub active_company_id: Option<String>,
    // Incrementado a cada troca de empresa; respostas antigas são descartadas
    pub company_epoch: u64,

    pub vat_enabled: bool,
    pub vat_rate: Decimal,
    pub theme: ThemeMode,
    pub sidebar_title: SidebarTitlePreference,
    pub stats: BTreeMap<String, Value>,
    pub last_sync_error: Option<String>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            clients: Collection::default(),
            leads: Collection::default(),
            services: Collection::default(),
            engagements: Collection::default(),
            companies: Collection::default(),
            users: Collection::default(),
            purchases: Collection::default(),
            vehicles: Collection::default(),
            categories: Collection::default(),
            subscriptions: Collection::default(),
            documents: Collection::default(),
            projects: Collection::default(),
            notes: Collection::default(),
            email_signatures: Collection::default(),
            current_user_id: None,
            active_company_id: None,
            company_epoch: 0,
            vat_enabled: true,
            vat_rate: default_vat_rate(),
            theme: ThemeMode::default(),
            sidebar_title: SidebarTitlePreference::default(),
            stats: BTreeMap::new(),
            last_sync_error: None,
        }
    }
}

impl StoreState {
    /// Usuário autenticado, apenas se ainda estiver ativo.
    pub fn current_user(&self) -> Option<&AuthUser> {
        let id = self.current_user_id.as_deref()?;
        self.users.get(id).filter(|user| user.active)
    }

    /// Esvazia todas as coleções ligadas à empresa ativa.
    pub fn clear_company_data(&mut self) {
        self.clients.clear();
        self.leads.clear();
        self.services.clear();
        self.categories.clear();
        self.engagements.clear();
        self.purchases.clear();
        self.subscriptions.clear();
        self.documents.clear();
        self.projects.clear();
        self.notes.clear();
        self.email_signatures.clear();
        self.stats.clear();
    }

    pub fn vat_per_company(&self) -> HashMap<String, bool> {
        self.companies.iter().map(|c| (c.id.clone(), c.vat_enabled)).collect()
    }

    pub fn default_company_id(&self) -> Option<String> {
        self.companies.iter().find(|c| c.is_default).map(|c| c.id.clone())
    }
}
