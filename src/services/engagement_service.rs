// src/services/engagement_service.rs

use std::sync::Arc;

use crate::{
    common::{error::AppError, money::Money},
    db::StoreState,
    models::engagement::{
        Engagement, EngagementDraft, EngagementKind, EngagementPatch, EngagementStatus, EngagementTotals,
        QuoteStatus, SendPayload, SendRecord, Slot,
    },
    services::{
        invoicing,
        performance::{self, DurationPerformance},
        pricing,
        sync::{self, SyncAction, SyncTicket},
    },
    store::StoreContext,
};

/// Resultado de um salvamento: o engagement e, quando a regra disparou, a
/// fatura gerada com o seu próprio ticket.
#[derive(Debug)]
pub struct EngagementSaved {
    pub engagement: Engagement,
    pub ticket: SyncTicket,
    pub invoice: Option<(Engagement, SyncTicket)>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn apply_patch(engagement: &mut Engagement, patch: EngagementPatch) {
    if let Some(v) = patch.client_id {
        engagement.client_id = v;
    }
    if let Some(v) = patch.company_id {
        engagement.company_id = non_empty(v);
    }
    if let Some(v) = patch.service_id {
        engagement.service_id = v;
    }
    if let Some(v) = patch.option_ids {
        engagement.option_ids = v;
    }
    // Sobreposições sempre revalidadas contra as opções resultantes
    let overrides = patch.option_overrides.unwrap_or_else(|| engagement.option_overrides.clone());
    engagement.option_overrides = pricing::sanitize_option_overrides(&engagement.option_ids, &overrides);

    if let Some(v) = patch.scheduled_at {
        engagement.scheduled_at = v;
    }
    if let Some(v) = patch.status {
        engagement.status = v;
    }
    if let Some(v) = patch.kind {
        engagement.kind = v;
    }
    if let Some(v) = patch.support_type {
        engagement.support_type = v;
    }
    if let Some(v) = patch.support_detail {
        engagement.support_detail = v;
    }
    if let Some(v) = patch.additional_charge {
        engagement.additional_charge = v;
    }
    if let Some(v) = patch.contact_ids {
        engagement.contact_ids = v;
    }
    if let Some(v) = patch.assigned_user_ids {
        engagement.assigned_user_ids = v;
    }
    if let Some(v) = patch.invoice_number {
        engagement.invoice_number = v;
    }
    if let Some(v) = patch.invoice_vat_enabled {
        engagement.invoice_vat_enabled = v;
    }
    if let Some(v) = patch.quote_number {
        engagement.quote_number = v;
    }
    if let Some(v) = patch.quote_status {
        engagement.quote_status = v;
    }
    if let Some(v) = patch.quote_name {
        engagement.quote_name = non_empty(v);
    }
    if let Some(v) = patch.mobile_duration_minutes {
        engagement.mobile_duration_minutes = v;
    }
    if let Some(v) = patch.mobile_completion_comment {
        engagement.mobile_completion_comment = v;
    }
    if let Some(v) = patch.planning_user {
        engagement.planning_user = non_empty(v);
    }
    if let Some(v) = patch.start_time {
        engagement.start_time = non_empty(v);
    }
    if let Some(v) = patch.main_category_id {
        engagement.main_category_id = v;
    }
    if let Some(v) = patch.sub_category_id {
        engagement.sub_category_id = v;
    }
    if let Some(v) = patch.services {
        engagement.services = pricing::sanitize_lines(v);
    }
}

#[derive(Clone)]
pub struct EngagementService {
    ctx: Arc<StoreContext>,
}

impl EngagementService {
    pub(crate) fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    pub fn list(&self) -> Vec<Engagement> {
        self.ctx.read(|s| s.engagements.to_vec())
    }

    pub fn get(&self, engagement_id: &str) -> Option<Engagement> {
        self.ctx.read(|s| s.engagements.get(engagement_id).cloned())
    }

    // Fatura preparada sob o mesmo lock da mutação que a disparou
    fn prepare_invoice(
        &self,
        state: &StoreState,
        previous: Option<EngagementStatus>,
        source: &Engagement,
    ) -> Result<Option<Engagement>, AppError> {
        if !invoicing::should_auto_invoice(previous, source) {
            return Ok(None);
        }
        if invoicing::has_matching_invoice(state.engagements.iter(), source) {
            tracing::info!("🧾 Fatura já existente para {} em {}", source.client_id, source.scheduled_date());
            return Ok(None);
        }
        let number = invoicing::unique_invoice_number(
            self.ctx.now().date_naive(),
            self.ctx.ids.as_ref(),
            state.engagements.iter(),
            self.ctx.config.invoice_number_attempts,
        )?;
        Ok(Some(invoicing::build_invoice(source, self.ctx.new_id("e"), number)))
    }

    fn push_invoice(&self, invoice: Option<Engagement>) -> Option<(Engagement, SyncTicket)> {
        invoice.map(|invoice| {
            tracing::info!(
                "🧾 Fatura {} gerada automaticamente ({})",
                invoice.invoice_number.as_deref().unwrap_or_default(),
                invoice.id
            );
            let ticket = sync::push::<Engagement>(&self.ctx, SyncAction::Create, &invoice.id);
            (invoice, ticket)
        })
    }

    /// Cria o engagement; um serviço já `réalisé` gera a sua fatura.
    ///
    /// O esgotamento dos números de fatura aborta a operação inteira, antes
    /// de qualquer mutação.
    pub fn add(&self, draft: EngagementDraft) -> Result<EngagementSaved, AppError> {
        let kind = draft.kind.unwrap_or_default();
        let overrides = pricing::sanitize_option_overrides(&draft.option_ids, &draft.option_overrides);
        let engagement = Engagement {
            id: self.ctx.new_id("e"),
            client_id: draft.client_id,
            company_id: non_empty(draft.company_id),
            service_id: draft.service_id,
            option_ids: draft.option_ids,
            option_overrides: overrides,
            scheduled_at: draft.scheduled_at.unwrap_or_else(|| self.ctx.now()),
            status: draft.status.unwrap_or_default(),
            kind,
            support_type: draft.support_type.unwrap_or_default(),
            support_detail: draft.support_detail.unwrap_or_default(),
            additional_charge: Some(draft.additional_charge.unwrap_or(Money::ZERO)),
            contact_ids: draft.contact_ids,
            assigned_user_ids: draft.assigned_user_ids,
            send_history: Vec::new(),
            invoice_number: draft.invoice_number,
            invoice_vat_enabled: draft.invoice_vat_enabled,
            quote_number: draft.quote_number,
            quote_status: draft
                .quote_status
                .or_else(|| (kind == EngagementKind::Quote).then_some(QuoteStatus::Draft)),
            quote_name: non_empty(draft.quote_name),
            mobile_duration_minutes: draft.mobile_duration_minutes,
            mobile_completion_comment: draft.mobile_completion_comment,
            planning_user: non_empty(draft.planning_user),
            start_time: non_empty(draft.start_time),
            main_category_id: non_empty(draft.main_category_id),
            sub_category_id: non_empty(draft.sub_category_id),
            services: pricing::sanitize_lines(draft.services),
        };

        let invoice = self.ctx.write(|s| {
            let invoice = self.prepare_invoice(s, None, &engagement)?;
            s.engagements.insert_front(engagement.clone());
            if let Some(invoice) = &invoice {
                s.engagements.insert_front(invoice.clone());
            }
            Ok::<_, AppError>(invoice)
        })?;

        tracing::info!("✅ Engagement {} criado localmente ({:?})", engagement.id, engagement.kind);
        let ticket = sync::push::<Engagement>(&self.ctx, SyncAction::Create, &engagement.id);
        let invoice = self.push_invoice(invoice);
        Ok(EngagementSaved { engagement, ticket, invoice })
    }

    /// `Ok(None)` para um id desconhecido.
    pub fn update(&self, engagement_id: &str, patch: EngagementPatch) -> Result<Option<EngagementSaved>, AppError> {
        let saved = self.ctx.write(|s| {
            let Some(current) = s.engagements.get(engagement_id) else {
                return Ok(None);
            };
            let previous = current.status;
            let mut next = current.clone();
            apply_patch(&mut next, patch);

            let invoice = self.prepare_invoice(s, Some(previous), &next)?;
            s.engagements.replace(engagement_id, next.clone());
            if let Some(invoice) = &invoice {
                s.engagements.insert_front(invoice.clone());
            }
            Ok::<_, AppError>(Some((next, invoice)))
        })?;

        Ok(saved.map(|(engagement, invoice)| {
            let ticket = sync::push::<Engagement>(&self.ctx, SyncAction::Update, &engagement.id);
            let invoice = self.push_invoice(invoice);
            EngagementSaved { engagement, ticket, invoice }
        }))
    }

    /// Registra um envio (contatos sem repetição) no topo do histórico.
    ///
    /// Um devis enviado passa a `envoyé`, salvo se já aceito ou recusado.
    pub fn record_send(&self, engagement_id: &str, payload: SendPayload) -> Option<(SendRecord, SyncTicket)> {
        let mut contact_ids: Vec<String> = Vec::new();
        for id in payload.contact_ids.into_iter().filter(|id| !id.is_empty()) {
            if !contact_ids.contains(&id) {
                contact_ids.push(id);
            }
        }
        if contact_ids.is_empty() {
            return None;
        }

        let record = SendRecord {
            id: self.ctx.new_id("es"),
            sent_at: self.ctx.now(),
            contact_ids,
            subject: payload.subject,
        };
        self.ctx.write(|s| {
            let engagement = s.engagements.get_mut(engagement_id)?;
            for id in &record.contact_ids {
                if !engagement.contact_ids.contains(id) {
                    engagement.contact_ids.push(id.clone());
                }
            }
            engagement.send_history.insert(0, record.clone());
            let settled = matches!(engagement.quote_status, Some(QuoteStatus::Accepted | QuoteStatus::Refused));
            if engagement.kind == EngagementKind::Quote && !settled {
                engagement.quote_status = Some(QuoteStatus::Sent);
            }
            Some(())
        })?;

        let ticket = sync::push::<Engagement>(&self.ctx, SyncAction::Update, engagement_id);
        Some((record, ticket))
    }

    pub fn remove(&self, engagement_id: &str) -> Option<SyncTicket> {
        self.ctx.write(|s| s.engagements.remove(engagement_id))?;
        Some(sync::push::<Engagement>(&self.ctx, SyncAction::Delete, engagement_id))
    }

    // --- Derivados ---

    pub fn totals(&self, engagement: &Engagement) -> EngagementTotals {
        self.ctx
            .read(|s| pricing::compute_totals(engagement, s.services.as_slice(), s.categories.as_slice()))
    }

    pub fn totals_of(&self, engagement_id: &str) -> Option<EngagementTotals> {
        self.ctx.read(|s| {
            let engagement = s.engagements.get(engagement_id)?;
            Some(pricing::compute_totals(engagement, s.services.as_slice(), s.categories.as_slice()))
        })
    }

    pub fn slots(&self) -> Vec<Slot> {
        self.ctx.read(|s| {
            pricing::build_slots(s.engagements.as_slice(), s.services.as_slice(), s.categories.as_slice())
        })
    }

    pub fn duration_performance(&self) -> DurationPerformance {
        self.ctx
            .read(|s| performance::compute_duration_performance(s.engagements.as_slice(), s.services.as_slice()))
    }
}
