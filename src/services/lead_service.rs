// src/services/lead_service.rs

use std::sync::Arc;

use validator::Validate;

use crate::{
    common::error::AppError,
    db::Collection,
    models::lead::{Lead, LeadActivity, LeadActivityKind, LeadDraft, LeadPatch},
    services::sync::{self, SyncAction, SyncTicket},
    store::StoreContext,
};

fn email_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

// Só os dígitos contam: "06 12-34" e "061234" são o mesmo telefone
fn phone_key(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Recusa e-mail ou telefone já usados por outro lead.
fn ensure_unique(leads: &Collection<Lead>, email: &str, phone: &str, except_id: Option<&str>) -> Result<(), AppError> {
    let email = email_key(email);
    let phone = phone_key(phone);
    let others: Vec<&Lead> = leads.iter().filter(|lead| Some(lead.id.as_str()) != except_id).collect();

    if !email.is_empty() && others.iter().any(|lead| email_key(&lead.email) == email) {
        return Err(AppError::DuplicateLeadEmail);
    }
    if !phone.is_empty() && others.iter().any(|lead| phone_key(&lead.phone) == phone) {
        return Err(AppError::DuplicateLeadPhone);
    }
    Ok(())
}

fn apply_patch(lead: &mut Lead, patch: LeadPatch) {
    if let Some(v) = patch.company {
        lead.company = v;
    }
    if let Some(v) = patch.contact {
        lead.contact = v;
    }
    if let Some(v) = patch.phone {
        lead.phone = v;
    }
    if let Some(v) = patch.email {
        lead.email = v;
    }
    if let Some(v) = patch.source {
        lead.source = v;
    }
    if let Some(v) = patch.segment {
        lead.segment = v;
    }
    if let Some(v) = patch.status {
        lead.status = v;
    }
    if let Some(v) = patch.next_step_date {
        lead.next_step_date = v;
    }
    if let Some(v) = patch.next_step_note {
        lead.next_step_note = v;
    }
    if let Some(v) = patch.last_contact {
        lead.last_contact = v;
    }
    if let Some(v) = patch.estimated_value {
        lead.estimated_value = v;
    }
    if let Some(v) = patch.owner {
        lead.owner = v;
    }
    if let Some(v) = patch.tags {
        lead.tags = v;
    }
    if let Some(v) = patch.address {
        lead.address = v;
    }
}

#[derive(Clone)]
pub struct LeadService {
    ctx: Arc<StoreContext>,
}

impl LeadService {
    pub(crate) fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    pub fn list(&self) -> Vec<Lead> {
        self.ctx.read(|s| s.leads.to_vec())
    }

    pub fn get(&self, lead_id: &str) -> Option<Lead> {
        self.ctx.read(|s| s.leads.get(lead_id).cloned())
    }

    pub fn add(&self, draft: LeadDraft) -> Result<(Lead, SyncTicket), AppError> {
        draft.validate()?;
        let email = draft.email.unwrap_or_default().trim().to_string();
        let phone = draft.phone.trim().to_string();

        let lead = Lead {
            id: self.ctx.new_id("l"),
            company: draft.company,
            contact: draft.contact,
            phone,
            email,
            source: draft.source,
            segment: draft.segment,
            status: draft.status,
            next_step_date: draft.next_step_date,
            next_step_note: draft.next_step_note,
            last_contact: draft.last_contact,
            estimated_value: draft.estimated_value,
            owner: draft.owner,
            tags: draft.tags,
            address: draft.address,
            company_id: draft.company_id.or_else(|| self.ctx.read(|s| s.active_company_id.clone())),
            support_type: draft.support_type,
            support_detail: draft.support_detail,
            siret: draft.siret,
            client_type: draft.client_type,
            created_at: self.ctx.now(),
            activities: Vec::new(),
        };

        // Verificação e inserção sob o mesmo lock
        self.ctx.write(|s| {
            ensure_unique(&s.leads, &lead.email, &lead.phone, None)?;
            s.leads.insert_front(lead.clone());
            Ok::<_, AppError>(())
        })?;

        tracing::info!("✅ Lead {} criado localmente ({})", lead.company, lead.id);
        let ticket = sync::push::<Lead>(&self.ctx, SyncAction::Create, &lead.id);
        Ok((lead, ticket))
    }

    pub fn update(&self, lead_id: &str, patch: LeadPatch) -> Result<Option<(Lead, SyncTicket)>, AppError> {
        let updated = self.ctx.write(|s| {
            let Some(current) = s.leads.get(lead_id) else {
                return Ok(None);
            };
            let email = patch.email.as_deref().unwrap_or(&current.email).to_string();
            let phone = patch.phone.as_deref().unwrap_or(&current.phone).to_string();
            ensure_unique(&s.leads, &email, &phone, Some(lead_id))?;

            let Some(lead) = s.leads.get_mut(lead_id) else {
                return Ok(None);
            };
            apply_patch(lead, patch);
            Ok::<_, AppError>(Some(lead.clone()))
        })?;

        Ok(updated.map(|lead| {
            let ticket = sync::push::<Lead>(&self.ctx, SyncAction::Update, &lead.id);
            (lead, ticket)
        }))
    }

    pub fn remove(&self, lead_id: &str) -> Option<SyncTicket> {
        self.ctx.write(|s| s.leads.remove(lead_id))?;
        Some(sync::push::<Lead>(&self.ctx, SyncAction::Delete, lead_id))
    }

    /// Nova atividade no topo; uma chamada também atualiza `last_contact`.
    pub fn record_activity(&self, lead_id: &str, kind: LeadActivityKind, content: &str) -> Option<(LeadActivity, SyncTicket)> {
        let activity = LeadActivity {
            id: self.ctx.new_id("la"),
            kind,
            content: content.to_string(),
            created_at: self.ctx.now(),
        };
        self.ctx.write(|s| {
            let lead = s.leads.get_mut(lead_id)?;
            lead.activities.insert(0, activity.clone());
            if kind == LeadActivityKind::Call {
                lead.last_contact = Some(activity.created_at);
            }
            Some(())
        })?;
        let ticket = sync::push::<Lead>(&self.ctx, SyncAction::Update, lead_id);
        Some((activity, ticket))
    }

    pub fn remove_activity(&self, lead_id: &str, activity_id: &str) -> bool {
        self.ctx.write(|s| {
            let Some(lead) = s.leads.get_mut(lead_id) else {
                return false;
            };
            let before = lead.activities.len();
            lead.activities.retain(|a| a.id != activity_id);
            lead.activities.len() < before
        })
    }

    /// Mesmo patch aplicado a vários leads (mudança de status, responsável...).
    pub fn bulk_update(&self, lead_ids: &[String], patch: LeadPatch) -> Vec<SyncTicket> {
        let touched: Vec<String> = self.ctx.write(|s| {
            s.leads
                .iter_mut()
                .filter(|lead| lead_ids.contains(&lead.id))
                .map(|lead| {
                    apply_patch(lead, patch.clone());
                    lead.id.clone()
                })
                .collect()
        });
        touched
            .iter()
            .map(|id| sync::push::<Lead>(&self.ctx, SyncAction::Update, id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn lead(id: &str, email: &str, phone: &str) -> Lead {
        Lead {
            id: id.into(),
            company: "ACME".into(),
            contact: "Jean".into(),
            phone: phone.into(),
            email: email.into(),
            source: String::new(),
            segment: String::new(),
            status: Default::default(),
            next_step_date: None,
            next_step_note: String::new(),
            last_contact: None,
            estimated_value: None,
            owner: String::new(),
            tags: vec![],
            address: None,
            company_id: None,
            support_type: None,
            support_detail: None,
            siret: None,
            client_type: None,
            created_at: Utc::now(),
            activities: vec![],
        }
    }

    #[test]
    fn duplicate_email_ignores_case_and_spaces() {
        let leads = Collection::from_vec(vec![lead("l1", "Contact@Acme.fr", "")]);
        assert!(matches!(
            ensure_unique(&leads, "  contact@acme.FR ", "", None),
            Err(AppError::DuplicateLeadEmail)
        ));
        // O próprio lead não conta como duplicado
        assert!(ensure_unique(&leads, "contact@acme.fr", "", Some("l1")).is_ok());
    }

    #[test]
    fn duplicate_phone_compares_digits_only() {
        let leads = Collection::from_vec(vec![lead("l1", "", "06 12 34 56 78")]);
        assert!(matches!(ensure_unique(&leads, "", "06.12.34.56.78", None), Err(AppError::DuplicateLeadPhone)));
        assert!(ensure_unique(&leads, "", "07 00 00 00 00", None).is_ok());
        // Campos vazios nunca colidem
        assert!(ensure_unique(&Collection::from_vec(vec![lead("l2", "", "")]), "", "", None).is_ok());
    }
}
