// src/services/settings_service.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value;

use crate::{
    models::settings::{SidebarTitlePatch, SidebarTitlePreference, ThemeMode},
    store::StoreContext,
};

/// Preferências locais: IVA, tema e título da barra lateral.
///
/// Cada mudança é gravada na hora no armazenamento durável.
#[derive(Clone)]
pub struct SettingsService {
    ctx: Arc<StoreContext>,
}

impl SettingsService {
    pub(crate) fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    // --- IVA ---

    pub fn vat_enabled(&self) -> bool {
        self.ctx.read(|s| s.vat_enabled)
    }

    pub fn vat_rate(&self) -> Decimal {
        self.ctx.read(|s| s.vat_rate)
    }

    /// Aplica o flag à empresa ativa (ou à primeira, se nenhuma estiver ativa).
    pub fn set_vat_enabled(&self, enabled: bool) {
        self.ctx.write(|s| {
            let target = s
                .active_company_id
                .clone()
                .or_else(|| s.companies.first().map(|c| c.id.clone()));
            if let Some(company) = target.as_deref().and_then(|id| s.companies.get_mut(id)) {
                company.vat_enabled = enabled;
            }
            s.vat_enabled = enabled;
        });
        self.ctx.persist_vat();
        tracing::info!("🧾 IVA {}", if enabled { "ativado" } else { "desativado" });
    }

    /// Taxas negativas viram zero.
    pub fn set_vat_rate(&self, rate: Decimal) {
        let safe = rate.max(Decimal::ZERO);
        self.ctx.write(|s| s.vat_rate = safe);
        self.ctx.persist_vat();
    }

    // --- Tema ---

    pub fn theme(&self) -> ThemeMode {
        self.ctx.read(|s| s.theme)
    }

    pub fn set_theme(&self, mode: ThemeMode) {
        self.ctx.write(|s| s.theme = mode);
        self.ctx.settings.save_theme(mode);
    }

    pub fn toggle_theme(&self) -> ThemeMode {
        let next = self.ctx.write(|s| {
            s.theme = s.theme.toggled();
            s.theme
        });
        self.ctx.settings.save_theme(next);
        next
    }

    // --- Barra lateral ---

    pub fn sidebar_title(&self) -> SidebarTitlePreference {
        self.ctx.read(|s| s.sidebar_title.clone())
    }

    pub fn set_sidebar_title(&self, patch: SidebarTitlePatch) -> SidebarTitlePreference {
        let next = self.ctx.write(|s| {
            if let Some(text) = patch.text {
                s.sidebar_title.text = text;
            }
            if let Some(hidden) = patch.hidden {
                s.sidebar_title.hidden = hidden;
            }
            s.sidebar_title.clone()
        });
        self.ctx.settings.save_sidebar_title(&next);
        next
    }

    pub fn reset_sidebar_title(&self) -> SidebarTitlePreference {
        let next = SidebarTitlePreference::default();
        self.ctx.write(|s| s.sidebar_title = next.clone());
        self.ctx.settings.save_sidebar_title(&next);
        next
    }

    // --- Estatísticas do backpack ---

    pub fn stats(&self) -> BTreeMap<String, Value> {
        self.ctx.read(|s| s.stats.clone())
    }
}
