// src/services/purchase_service.rs

use std::sync::Arc;

use crate::{
    models::purchase::{Purchase, PurchaseDraft, PurchasePatch, Vehicle, VehicleDraft, VehiclePatch},
    store::StoreContext,
};

// Compras e veículos são só locais: o backend não expõe estas famílias.
#[derive(Clone)]
pub struct PurchaseService {
    ctx: Arc<StoreContext>,
}

impl PurchaseService {
    pub(crate) fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    pub fn list(&self) -> Vec<Purchase> {
        self.ctx.read(|s| s.purchases.to_vec())
    }

    pub fn add(&self, draft: PurchaseDraft) -> Purchase {
        let purchase = Purchase {
            id: self.ctx.new_id("pur"),
            company_id: draft.company_id,
            vendor: draft.vendor,
            reference: draft.reference,
            description: draft.description,
            date: draft.date,
            amount_ht: draft.amount_ht,
            vat_rate: draft.vat_rate,
            amount_ttc: draft.amount_ht.with_vat_percent(draft.vat_rate),
            category: draft.category,
            status: draft.status,
            recurring: draft.recurring,
            notes: draft.notes,
            vehicle_id: draft.vehicle_id,
            kilometers: draft.kilometers,
        };
        self.ctx.write(|s| s.purchases.insert_front(purchase.clone()));
        purchase
    }

    /// O TTC é sempre recalculado a partir do HT e da taxa resultantes.
    pub fn update(&self, purchase_id: &str, patch: PurchasePatch) -> Option<Purchase> {
        self.ctx.write(|s| {
            let purchase = s.purchases.get_mut(purchase_id)?;
            if let Some(v) = patch.company_id {
                purchase.company_id = v;
            }
            if let Some(v) = patch.vendor {
                purchase.vendor = v;
            }
            if let Some(v) = patch.reference {
                purchase.reference = v;
            }
            if let Some(v) = patch.description {
                purchase.description = v;
            }
            if let Some(v) = patch.date {
                purchase.date = v;
            }
            if let Some(v) = patch.amount_ht {
                purchase.amount_ht = v;
            }
            if let Some(v) = patch.vat_rate {
                purchase.vat_rate = v;
            }
            if let Some(v) = patch.category {
                purchase.category = v;
            }
            if let Some(v) = patch.status {
                purchase.status = v;
            }
            if let Some(v) = patch.recurring {
                purchase.recurring = v;
            }
            if let Some(v) = patch.notes {
                purchase.notes = v;
            }
            if let Some(v) = patch.vehicle_id {
                purchase.vehicle_id = v;
            }
            if let Some(v) = patch.kilometers {
                purchase.kilometers = v;
            }
            purchase.amount_ttc = purchase.amount_ht.with_vat_percent(purchase.vat_rate);
            Some(purchase.clone())
        })
    }

    pub fn remove(&self, purchase_id: &str) -> bool {
        self.ctx.write(|s| s.purchases.remove(purchase_id).is_some())
    }

    /// Devolve quantas compras foram removidas.
    pub fn bulk_remove(&self, purchase_ids: &[String]) -> usize {
        if purchase_ids.is_empty() {
            return 0;
        }
        self.ctx
            .write(|s| s.purchases.drain_where(|p| purchase_ids.contains(&p.id)).len())
    }

    // --- Veículos ---

    pub fn vehicles(&self) -> Vec<Vehicle> {
        self.ctx.read(|s| s.vehicles.to_vec())
    }

    pub fn add_vehicle(&self, draft: VehicleDraft) -> Vehicle {
        let vehicle = Vehicle {
            id: self.ctx.new_id("veh"),
            name: draft.name,
            mileage: draft.mileage,
            usage_rate: draft.usage_rate,
            cost_per_km: draft.cost_per_km,
            active: draft.active,
        };
        self.ctx.write(|s| s.vehicles.push(vehicle.clone()));
        vehicle
    }

    pub fn update_vehicle(&self, vehicle_id: &str, patch: VehiclePatch) -> Option<Vehicle> {
        self.ctx.write(|s| {
            let vehicle = s.vehicles.get_mut(vehicle_id)?;
            if let Some(v) = patch.name {
                vehicle.name = v;
            }
            if let Some(v) = patch.mileage {
                vehicle.mileage = v;
            }
            if let Some(v) = patch.usage_rate {
                vehicle.usage_rate = v;
            }
            if let Some(v) = patch.cost_per_km {
                vehicle.cost_per_km = v;
            }
            if let Some(v) = patch.active {
                vehicle.active = v;
            }
            Some(vehicle.clone())
        })
    }

    pub fn remove_vehicle(&self, vehicle_id: &str) -> bool {
        self.ctx.write(|s| s.vehicles.remove(vehicle_id).is_some())
    }
}
