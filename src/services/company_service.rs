// src/services/company_service.rs

use std::sync::Arc;

use validator::Validate;

use crate::{
    common::error::AppError,
    db::StoreState,
    models::company::{Company, CompanyDraft, CompanyPatch},
    services::{
        session_service::SessionService,
        sync::{self, SyncAction, SyncTicket},
    },
    store::StoreContext,
};

// Exatamente uma empresa padrão: sem nenhuma, a primeira assume
fn ensure_default(state: &mut StoreState) {
    if !state.companies.is_empty() && !state.companies.iter().any(|c| c.is_default) {
        for (index, company) in state.companies.iter_mut().enumerate() {
            company.is_default = index == 0;
        }
    }
}

fn promote(state: &mut StoreState, company_id: &str) {
    for company in state.companies.iter_mut() {
        company.is_default = company.id == company_id;
    }
}

/// Empresa que deve ficar ativa: a preferida, a atual se ainda existir, a
/// padrão ou a primeira.
fn resolve_active(state: &StoreState, preferred: Option<&str>) -> Option<String> {
    let keep_current = state
        .active_company_id
        .as_deref()
        .filter(|id| state.companies.contains(id))
        .map(str::to_string);
    preferred
        .map(str::to_string)
        .or(keep_current)
        .or_else(|| state.default_company_id())
        .or_else(|| state.companies.first().map(|c| c.id.clone()))
}

// Ativa inalterada: só o flag de IVA acompanha a empresa
fn align_vat(state: &mut StoreState) {
    if let Some(enabled) = state
        .active_company_id
        .as_deref()
        .and_then(|id| state.companies.get(id))
        .map(|c| c.vat_enabled)
    {
        state.vat_enabled = enabled;
    }
}

/// Próxima empresa ativa quando ela muda; `None` quando a atual continua.
fn settle_active(state: &mut StoreState, preferred: Option<&str>) -> Option<Option<String>> {
    let next = resolve_active(state, preferred);
    if next == state.active_company_id {
        align_vat(state);
        return None;
    }
    Some(next)
}

#[derive(Clone)]
pub struct CompanyService {
    ctx: Arc<StoreContext>,
}

impl CompanyService {
    pub(crate) fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    pub fn list(&self) -> Vec<Company> {
        self.ctx.read(|s| s.companies.to_vec())
    }

    pub fn get(&self, company_id: &str) -> Option<Company> {
        self.ctx.read(|s| s.companies.get(company_id).cloned())
    }

    pub fn active(&self) -> Option<Company> {
        self.ctx
            .read(|s| s.active_company_id.as_deref().and_then(|id| s.companies.get(id)).cloned())
    }

    // Troca de empresa ativa passa pela sequência completa da sessão
    // (limpeza, época, persistência e recarga); sem troca, só o scope e as
    // chaves persistidas acompanham.
    fn after_change(&self, switch_to: Option<Option<String>>) {
        match switch_to {
            Some(next) => SessionService::new(self.ctx.clone()).set_active_company(next),
            None => {
                let active = self.ctx.read(|s| s.active_company_id.clone());
                self.ctx.backend.set_company_scope(active.as_deref());
                self.ctx.persist_active_company();
            }
        }
        self.ctx.persist_vat();
    }

    /// A primeira empresa, ou uma marcada como padrão, vira padrão e ativa.
    pub fn add(&self, draft: CompanyDraft) -> Result<(Company, SyncTicket), AppError> {
        draft.validate()?;
        let mut company = Company::named(self.ctx.new_id("co"), draft.name.trim());
        company.logo_url = draft.logo_url.unwrap_or_default();
        company.invoice_logo_url = draft.invoice_logo_url.unwrap_or_default();
        company.address = draft.address.unwrap_or_default();
        company.postal_code = draft.postal_code.unwrap_or_default();
        company.city = draft.city.unwrap_or_default();
        company.country = draft.country.unwrap_or_default();
        company.phone = draft.phone.unwrap_or_default();
        company.email = draft.email.unwrap_or_default();
        company.website = draft.website.unwrap_or_default();
        company.siret = draft.siret;
        company.vat_number = draft.vat_number.unwrap_or_default();
        company.legal_notes = draft.legal_notes.unwrap_or_default();
        company.document_header_title = draft.document_header_title;
        company.document_header_subtitle = draft.document_header_subtitle;
        company.document_header_note = draft.document_header_note;
        company.vat_enabled = draft.vat_enabled.unwrap_or(true);
        company.default_signature_id = draft.default_signature_id;
        company.bank_name = draft.bank_name.unwrap_or_default();
        company.bank_address = draft.bank_address.unwrap_or_default();
        company.iban = draft.iban.unwrap_or_default();
        company.bic = draft.bic.unwrap_or_default();
        company.planning_user = draft.planning_user;

        let (inserted, switch_to) = self.ctx.write(|s| {
            company.is_default = draft.is_default.unwrap_or(false) || s.companies.is_empty();
            if company.is_default {
                for other in s.companies.iter_mut() {
                    other.is_default = false;
                }
            }
            s.companies.push(company.clone());
            let preferred = company.is_default.then_some(company.id.as_str());
            let switch_to = settle_active(s, preferred);
            (company, switch_to)
        });
        self.after_change(switch_to);

        tracing::info!("✅ Empresa {} criada localmente ({})", inserted.name, inserted.id);
        let ticket = sync::push::<Company>(&self.ctx, SyncAction::Create, &inserted.id);
        Ok((inserted, ticket))
    }

    pub fn update(&self, company_id: &str, patch: CompanyPatch) -> Option<(Company, SyncTicket)> {
        let (updated, switch_to) = self.ctx.write(|s| {
            let promote_default = patch.is_default == Some(true);
            let company = s.companies.get_mut(company_id)?;
            if let Some(v) = patch.name {
                company.name = v;
            }
            if let Some(v) = patch.logo_url {
                company.logo_url = v;
            }
            if let Some(v) = patch.invoice_logo_url {
                company.invoice_logo_url = v;
            }
            if let Some(v) = patch.address {
                company.address = v;
            }
            if let Some(v) = patch.postal_code {
                company.postal_code = v;
            }
            if let Some(v) = patch.city {
                company.city = v;
            }
            if let Some(v) = patch.country {
                company.country = v;
            }
            if let Some(v) = patch.phone {
                company.phone = v;
            }
            if let Some(v) = patch.email {
                company.email = v;
            }
            if let Some(v) = patch.website {
                company.website = v;
            }
            if let Some(v) = patch.siret {
                company.siret = v;
            }
            if let Some(v) = patch.vat_number {
                company.vat_number = v;
            }
            if let Some(v) = patch.legal_notes {
                company.legal_notes = v;
            }
            if let Some(v) = patch.document_header_title {
                company.document_header_title = v;
            }
            if let Some(v) = patch.document_header_subtitle {
                company.document_header_subtitle = v;
            }
            if let Some(v) = patch.document_header_note {
                company.document_header_note = v;
            }
            if let Some(v) = patch.vat_enabled {
                company.vat_enabled = v;
            }
            if let Some(v) = patch.is_default {
                company.is_default = v;
            }
            if let Some(v) = patch.default_signature_id {
                company.default_signature_id = v;
            }
            if let Some(v) = patch.bank_name {
                company.bank_name = v;
            }
            if let Some(v) = patch.bank_address {
                company.bank_address = v;
            }
            if let Some(v) = patch.iban {
                company.iban = v;
            }
            if let Some(v) = patch.bic {
                company.bic = v;
            }
            if let Some(v) = patch.planning_user {
                company.planning_user = v;
            }

            if promote_default {
                promote(s, company_id);
            }
            ensure_default(s);
            let switch_to = settle_active(s, promote_default.then_some(company_id));
            Some((s.companies.get(company_id).cloned()?, switch_to))
        })?;
        self.after_change(switch_to);

        let ticket = sync::push::<Company>(&self.ctx, SyncAction::Update, company_id);
        Some((updated, ticket))
    }

    /// Remove a empresa e reelege a padrão e a ativa entre as restantes.
    pub fn remove(&self, company_id: &str) -> Option<SyncTicket> {
        let switch_to = self.ctx.write(|s| {
            s.companies.remove(company_id)?;
            ensure_default(s);
            Some(settle_active(s, None))
        })?;
        self.after_change(switch_to);
        Some(sync::push::<Company>(&self.ctx, SyncAction::Delete, company_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(ids: &[(&str, bool)]) -> StoreState {
        let mut state = StoreState::default();
        for (id, is_default) in ids {
            let mut company = Company::named(*id, *id);
            company.is_default = *is_default;
            state.companies.push(company);
        }
        state
    }

    fn defaults(state: &StoreState) -> Vec<String> {
        state.companies.iter().filter(|c| c.is_default).map(|c| c.id.clone()).collect()
    }

    #[test]
    fn promotion_demotes_the_others() {
        let mut state = state_with(&[("a", true), ("b", false)]);
        promote(&mut state, "b");
        assert_eq!(defaults(&state), vec!["b"]);
    }

    #[test]
    fn missing_default_falls_back_to_first() {
        let mut state = state_with(&[("a", false), ("b", false)]);
        ensure_default(&mut state);
        assert_eq!(defaults(&state), vec!["a"]);
    }

    #[test]
    fn active_company_prefers_current_then_default() {
        let mut state = state_with(&[("a", false), ("b", true)]);
        state.companies.get_mut("b").unwrap().vat_enabled = false;
        assert_eq!(settle_active(&mut state, None), Some(Some("b".into())));

        state.active_company_id = Some("a".into());
        state.vat_enabled = false;
        assert_eq!(settle_active(&mut state, None), None);
        assert!(state.vat_enabled);

        assert_eq!(settle_active(&mut state, Some("b")), Some(Some("b".into())));
        assert_eq!(state.active_company_id.as_deref(), Some("a"));

        let mut empty = StoreState::default();
        empty.active_company_id = Some("gone".into());
        assert_eq!(settle_active(&mut empty, None), Some(None));
    }
}
