// src/services/subscription_service.rs

use std::sync::Arc;

use crate::{
    models::subscription::{Subscription, SubscriptionDraft, SubscriptionPatch},
    services::sync::{self, SyncAction, SyncTicket},
    store::StoreContext,
};

#[derive(Clone)]
pub struct SubscriptionService {
    ctx: Arc<StoreContext>,
}

impl SubscriptionService {
    pub(crate) fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    pub fn list(&self) -> Vec<Subscription> {
        self.ctx.read(|s| s.subscriptions.to_vec())
    }

    pub fn get(&self, subscription_id: &str) -> Option<Subscription> {
        self.ctx.read(|s| s.subscriptions.get(subscription_id).cloned())
    }

    pub fn add(&self, draft: SubscriptionDraft) -> (Subscription, SyncTicket) {
        let now = self.ctx.now();
        let subscription = Subscription {
            id: self.ctx.new_id("sub-"),
            client_id: draft.client_id,
            vehicle_info: draft.vehicle_info,
            start_date: draft.start_date,
            end_date: draft.end_date,
            status: draft.status,
            frequency: draft.frequency,
            price_ht: draft.price_ht.clamp_non_negative(),
            vat_enabled: draft.vat_enabled,
            document_id: draft.document_id,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        };
        self.ctx.write(|s| s.subscriptions.push(subscription.clone()));
        tracing::info!("✅ Abonnement {} criado localmente", subscription.id);
        let ticket = sync::push::<Subscription>(&self.ctx, SyncAction::Create, &subscription.id);
        (subscription, ticket)
    }

    /// Toda atualização renova `updated_at`.
    pub fn update(&self, subscription_id: &str, patch: SubscriptionPatch) -> Option<(Subscription, SyncTicket)> {
        let now = self.ctx.now();
        let updated = self.ctx.write(|s| {
            let sub = s.subscriptions.get_mut(subscription_id)?;
            if let Some(v) = patch.vehicle_info {
                sub.vehicle_info = v;
            }
            if let Some(v) = patch.start_date {
                sub.start_date = v;
            }
            if let Some(v) = patch.end_date {
                sub.end_date = v;
            }
            if let Some(v) = patch.status {
                sub.status = v;
            }
            if let Some(v) = patch.frequency {
                sub.frequency = v;
            }
            if let Some(v) = patch.price_ht {
                sub.price_ht = v.clamp_non_negative();
            }
            if let Some(v) = patch.vat_enabled {
                sub.vat_enabled = v;
            }
            if let Some(v) = patch.document_id {
                sub.document_id = v;
            }
            if let Some(v) = patch.notes {
                sub.notes = v;
            }
            sub.updated_at = now;
            Some(sub.clone())
        })?;
        let ticket = sync::push::<Subscription>(&self.ctx, SyncAction::Update, subscription_id);
        Some((updated, ticket))
    }

    pub fn remove(&self, subscription_id: &str) -> Option<SyncTicket> {
        self.ctx.write(|s| s.subscriptions.remove(subscription_id))?;
        Some(sync::push::<Subscription>(&self.ctx, SyncAction::Delete, subscription_id))
    }
}
