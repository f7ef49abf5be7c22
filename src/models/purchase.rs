// src/models/purchase.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PurchaseStatus {
    #[default]
    #[serde(rename = "Brouillon")]
    Draft,
    #[serde(rename = "Validé")]
    Validated,
    #[serde(rename = "Payé")]
    Paid,
    #[serde(rename = "Annulé")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PurchaseCategory {
    #[serde(rename = "Produits")]
    Products,
    #[serde(rename = "Services")]
    Services,
    #[serde(rename = "Carburant")]
    Fuel,
    #[serde(rename = "Entretien")]
    Maintenance,
    #[serde(rename = "Sous-traitance")]
    Subcontracting,
    #[default]
    #[serde(rename = "Autre")]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: String,
    pub company_id: Option<String>,
    pub vendor: String,
    pub reference: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub amount_ht: Money,
    // Percentual (20 = 20%)
    pub vat_rate: Decimal,
    // Derivado de amount_ht e vat_rate
    pub amount_ttc: Money,
    pub category: PurchaseCategory,
    pub status: PurchaseStatus,
    pub recurring: bool,
    pub notes: Option<String>,
    pub vehicle_id: Option<String>,
    pub kilometers: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseDraft {
    pub company_id: Option<String>,
    pub vendor: String,
    pub reference: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub amount_ht: Money,
    pub vat_rate: Decimal,
    pub category: PurchaseCategory,
    pub status: PurchaseStatus,
    pub recurring: bool,
    pub notes: Option<String>,
    pub vehicle_id: Option<String>,
    pub kilometers: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasePatch {
    pub company_id: Option<Option<String>>,
    pub vendor: Option<String>,
    pub reference: Option<String>,
    pub description: Option<Option<String>>,
    pub date: Option<NaiveDate>,
    pub amount_ht: Option<Money>,
    pub vat_rate: Option<Decimal>,
    pub category: Option<PurchaseCategory>,
    pub status: Option<PurchaseStatus>,
    pub recurring: Option<bool>,
    pub notes: Option<Option<String>>,
    pub vehicle_id: Option<Option<String>>,
    pub kilometers: Option<Option<u32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: String,
    pub name: String,
    pub mileage: u32,
    pub usage_rate: Decimal,
    pub cost_per_km: Money,
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDraft {
    pub name: String,
    pub mileage: u32,
    pub usage_rate: Decimal,
    pub cost_per_km: Money,
    pub active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePatch {
    pub name: Option<String>,
    pub mileage: Option<u32>,
    pub usage_rate: Option<Decimal>,
    pub cost_per_km: Option<Money>,
    pub active: Option<bool>,
}
