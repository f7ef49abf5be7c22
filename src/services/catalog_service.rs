// src/services/catalog_service.rs

use std::sync::Arc;

use rust_decimal::Decimal;
use validator::Validate;

use crate::{
    common::{error::AppError, money::Money},
    models::catalog::{
        Category, CategoryDraft, CategoryPatch, OptionDraft, OptionPatch, Service, ServiceDraft, ServiceOption,
        ServicePatch,
    },
    services::{
        pricing::{self, CategorySummary, ServiceOverview},
        sync::{self, SyncAction, SyncTicket},
    },
    store::StoreContext,
};

/// Categoria atribuída aos serviços órfãos quando nenhuma outra está ativa.
pub const FALLBACK_CATEGORY: &str = "Autre";

fn trimmed_opt(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// Taxas negativas não fazem sentido; `None` herda a taxa global
fn clean_tva(value: Option<Decimal>) -> Option<Decimal> {
    value.map(|v| v.max(Decimal::ZERO))
}

#[derive(Clone)]
pub struct CatalogService {
    ctx: Arc<StoreContext>,
}

impl CatalogService {
    pub(crate) fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    // ==========================================
    // SERVIÇOS
    // ==========================================

    pub fn services(&self) -> Vec<Service> {
        self.ctx.read(|s| s.services.to_vec())
    }

    pub fn get(&self, service_id: &str) -> Option<Service> {
        self.ctx.read(|s| s.services.get(service_id).cloned())
    }

    fn build_option(&self, draft: OptionDraft) -> ServiceOption {
        ServiceOption {
            id: self.ctx.new_id("opt"),
            label: draft.label.trim().to_string(),
            description: trimmed_opt(draft.description),
            default_duration_min: draft.default_duration_min,
            unit_price_ht: draft.unit_price_ht.clamp_non_negative(),
            tva_pct: clean_tva(draft.tva_pct),
            active: draft.active,
        }
    }

    pub fn add(&self, draft: ServiceDraft) -> Result<(Service, SyncTicket), AppError> {
        draft.validate()?;
        for option in &draft.options {
            option.validate()?;
        }

        let options = draft.options.into_iter().map(|o| self.build_option(o)).collect();
        let service = Service {
            id: self.ctx.new_id("s"),
            category: draft.category.trim().to_string(),
            name: draft.name.trim().to_string(),
            description: trimmed_opt(draft.description),
            options,
            active: draft.active,
            base_price: draft.base_price.map(Money::clamp_non_negative),
            base_duration: draft.base_duration,
        };

        self.ctx.write(|s| s.services.push(service.clone()));
        tracing::info!("✅ Serviço {} criado localmente ({})", service.name, service.id);
        let ticket = sync::push::<Service>(&self.ctx, SyncAction::Create, &service.id);
        Ok((service, ticket))
    }

    pub fn update(&self, service_id: &str, patch: ServicePatch) -> Option<(Service, SyncTicket)> {
        let updated = self.ctx.write(|s| {
            let service = s.services.get_mut(service_id)?;
            if let Some(v) = patch.category {
                service.category = v.trim().to_string();
            }
            if let Some(v) = patch.name {
                service.name = v.trim().to_string();
            }
            if let Some(v) = patch.description {
                service.description = trimmed_opt(v);
            }
            if let Some(v) = patch.active {
                service.active = v;
            }
            if let Some(v) = patch.base_price {
                service.base_price = v.map(Money::clamp_non_negative);
            }
            if let Some(v) = patch.base_duration {
                service.base_duration = v;
            }
            Some(service.clone())
        })?;
        let ticket = sync::push::<Service>(&self.ctx, SyncAction::Update, service_id);
        Some((updated, ticket))
    }

    /// Remove o serviço e os engagements (modo legado) que o usam.
    pub fn remove(&self, service_id: &str) -> Option<SyncTicket> {
        let cascaded = self.ctx.write(|s| {
            s.services.remove(service_id)?;
            Some(s.engagements.drain_where(|e| e.service_id == service_id).len())
        })?;
        if cascaded > 0 {
            tracing::info!("🗑️ Serviço {} removido com {} engagements", service_id, cascaded);
        }
        Some(sync::push::<Service>(&self.ctx, SyncAction::Delete, service_id))
    }

    // --- Opções (sincronizadas como atualização do serviço) ---

    pub fn add_option(&self, service_id: &str, draft: OptionDraft) -> Result<Option<ServiceOption>, AppError> {
        draft.validate()?;
        let option = self.build_option(draft);
        let added = self.ctx.write(|s| {
            let service = s.services.get_mut(service_id)?;
            service.options.push(option.clone());
            Some(())
        });
        Ok(added.map(|_| {
            sync::push::<Service>(&self.ctx, SyncAction::Update, service_id);
            option
        }))
    }

    pub fn update_option(&self, service_id: &str, option_id: &str, patch: OptionPatch) -> Option<ServiceOption> {
        let updated = self.ctx.write(|s| {
            let option = s.services.get_mut(service_id)?.options.iter_mut().find(|o| o.id == option_id)?;
            if let Some(v) = patch.label {
                option.label = v.trim().to_string();
            }
            if let Some(v) = patch.description {
                option.description = trimmed_opt(v);
            }
            if let Some(v) = patch.default_duration_min {
                option.default_duration_min = v;
            }
            if let Some(v) = patch.unit_price_ht {
                option.unit_price_ht = v.clamp_non_negative();
            }
            if let Some(v) = patch.tva_pct {
                option.tva_pct = clean_tva(v);
            }
            if let Some(v) = patch.active {
                option.active = v;
            }
            Some(option.clone())
        })?;
        sync::push::<Service>(&self.ctx, SyncAction::Update, service_id);
        Some(updated)
    }

    pub fn remove_option(&self, service_id: &str, option_id: &str) -> bool {
        let removed = self.ctx.write(|s| {
            let Some(service) = s.services.get_mut(service_id) else {
                return false;
            };
            let before = service.options.len();
            service.options.retain(|o| o.id != option_id);
            service.options.len() < before
        });
        if removed {
            sync::push::<Service>(&self.ctx, SyncAction::Update, service_id);
        }
        removed
    }

    // ==========================================
    // CATEGORIAS
    // ==========================================

    pub fn categories(&self) -> Vec<Category> {
        self.ctx.read(|s| s.categories.to_vec())
    }

    pub fn add_category(&self, draft: CategoryDraft) -> Result<(Category, SyncTicket), AppError> {
        draft.validate()?;
        let now = self.ctx.now();
        let category = Category {
            id: self.ctx.new_id("cat-"),
            name: draft.name.trim().to_string(),
            description: trimmed_opt(draft.description),
            active: draft.active,
            parent_id: draft.parent_id,
            created_at: now,
            updated_at: now,
            price_ht: draft.price_ht.map(Money::clamp_non_negative),
            default_duration_min: draft.default_duration_min,
        };
        self.ctx.write(|s| s.categories.push(category.clone()));
        let ticket = sync::push::<Category>(&self.ctx, SyncAction::Create, &category.id);
        Ok((category, ticket))
    }

    pub fn update_category(&self, category_id: &str, patch: CategoryPatch) -> Option<(Category, SyncTicket)> {
        let now = self.ctx.now();
        let updated = self.ctx.write(|s| {
            let category = s.categories.get_mut(category_id)?;
            if let Some(v) = patch.name {
                category.name = v.trim().to_string();
            }
            if let Some(v) = patch.description {
                category.description = trimmed_opt(v);
            }
            if let Some(v) = patch.active {
                category.active = v;
            }
            if let Some(v) = patch.parent_id {
                category.parent_id = v;
            }
            if let Some(v) = patch.price_ht {
                category.price_ht = v.map(Money::clamp_non_negative);
            }
            if let Some(v) = patch.default_duration_min {
                category.default_duration_min = v;
            }
            category.updated_at = now;
            Some(category.clone())
        })?;
        let ticket = sync::push::<Category>(&self.ctx, SyncAction::Update, category_id);
        Some((updated, ticket))
    }

    /// Os serviços da categoria removida passam para a primeira outra categoria
    /// ativa (ou `Autre`).
    pub fn remove_category(&self, category_id: &str) -> Option<SyncTicket> {
        self.ctx.write(|s| {
            let removed = s.categories.remove(category_id)?;
            let fallback = s
                .categories
                .iter()
                .find(|c| c.active)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| FALLBACK_CATEGORY.to_string());
            for service in s.services.iter_mut().filter(|svc| svc.category == removed.name) {
                service.category = fallback.clone();
            }
            Some(())
        })?;
        Some(sync::push::<Category>(&self.ctx, SyncAction::Delete, category_id))
    }

    // --- Agregados ---

    pub fn category_summary(&self) -> Vec<CategorySummary> {
        self.ctx.read(|s| {
            pricing::service_category_summary(s.services.as_slice(), s.engagements.as_slice(), s.categories.as_slice())
        })
    }

    pub fn overview(&self) -> ServiceOverview {
        self.ctx
            .read(|s| pricing::service_overview(s.services.as_slice(), s.engagements.as_slice(), s.categories.as_slice()))
    }
}
