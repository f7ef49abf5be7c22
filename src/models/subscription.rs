// src/models/subscription.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::common::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    #[default]
    #[serde(rename = "actif")]
    Active,
    #[serde(rename = "suspendu")]
    Suspended,
    #[serde(rename = "terminé")]
    Ended,
    #[serde(rename = "annulé")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SubscriptionFrequency {
    #[default]
    #[serde(rename = "mensuel")]
    Monthly,
    #[serde(rename = "trimestriel")]
    Quarterly,
    #[serde(rename = "semestriel")]
    HalfYearly,
    #[serde(rename = "annuel")]
    Yearly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub client_id: String,
    // Marca, modelo, matrícula
    pub vehicle_info: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: SubscriptionStatus,
    pub frequency: SubscriptionFrequency,
    pub price_ht: Money,
    pub vat_enabled: bool,
    pub document_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDraft {
    pub client_id: String,
    pub vehicle_info: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: SubscriptionStatus,
    pub frequency: SubscriptionFrequency,
    pub price_ht: Money,
    pub vat_enabled: bool,
    pub document_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPatch {
    pub vehicle_info: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<Option<NaiveDate>>,
    pub status: Option<SubscriptionStatus>,
    pub frequency: Option<SubscriptionFrequency>,
    pub price_ht: Option<Money>,
    pub vat_enabled: Option<bool>,
    pub document_id: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}
