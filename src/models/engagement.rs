// src/models/engagement.rs

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::common::money::Money;

// Máquina de estados: brouillon -> envoyé -> planifié -> réalisé, annulé a partir
// de qualquer estado não terminal. O store aceita qualquer atribuição.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EngagementStatus {
    #[default]
    #[serde(rename = "brouillon")]
    Draft,
    #[serde(rename = "envoyé")]
    Sent,
    #[serde(rename = "planifié")]
    Scheduled,
    #[serde(rename = "réalisé")]
    Completed,
    #[serde(rename = "annulé")]
    Cancelled,
}

impl EngagementStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, EngagementStatus::Completed | EngagementStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EngagementKind {
    #[default]
    #[serde(rename = "service")]
    Service,
    #[serde(rename = "devis")]
    Quote,
    #[serde(rename = "facture")]
    Invoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SupportType {
    #[default]
    #[serde(rename = "Voiture")]
    Car,
    #[serde(rename = "Canapé")]
    Sofa,
    #[serde(rename = "Textile")]
    Textile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteStatus {
    #[serde(rename = "brouillon")]
    Draft,
    #[serde(rename = "envoyé")]
    Sent,
    #[serde(rename = "accepté")]
    Accepted,
    #[serde(rename = "refusé")]
    Refused,
}

/// Sobreposições por opção. Só existem para ids presentes em `option_ids`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionOverride {
    pub quantity: Option<u32>,
    pub unit_price_ht: Option<Money>,
    pub duration_min: Option<u32>,
}

pub type OptionOverrides = BTreeMap<String, OptionOverride>;

// Uma linha do modo multi-serviço
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementLine {
    pub service_id: String,
    pub option_ids: Vec<String>,
    pub option_overrides: OptionOverrides,
    pub support_type: Option<SupportType>,
    pub support_detail: Option<String>,
    pub main_category_id: Option<String>,
    pub sub_category_id: Option<String>,
    pub additional_charge: Option<Money>,
    pub quantity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRecord {
    pub id: String,
    pub sent_at: DateTime<Utc>,
    pub contact_ids: Vec<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    pub id: String,
    pub client_id: String,
    pub company_id: Option<String>,
    // Modo legado (um serviço); vazio no modo multi-linha
    pub service_id: String,
    pub option_ids: Vec<String>,
    pub option_overrides: OptionOverrides,
    pub scheduled_at: DateTime<Utc>,
    pub status: EngagementStatus,
    pub kind: EngagementKind,
    pub support_type: SupportType,
    pub support_detail: String,
    pub additional_charge: Option<Money>,
    pub contact_ids: Vec<String>,
    pub assigned_user_ids: Vec<String>,
    pub send_history: Vec<SendRecord>,
    pub invoice_number: Option<String>,
    pub invoice_vat_enabled: Option<bool>,
    pub quote_number: Option<String>,
    pub quote_status: Option<QuoteStatus>,
    pub quote_name: Option<String>,
    // Duração real capturada em campo; autoritativa quando réalisé
    pub mobile_duration_minutes: Option<u32>,
    pub mobile_completion_comment: Option<String>,
    pub planning_user: Option<String>,
    pub start_time: Option<String>,
    pub main_category_id: Option<String>,
    pub sub_category_id: Option<String>,
    pub services: Vec<EngagementLine>,
}

impl Engagement {
    pub fn is_multi_line(&self) -> bool {
        !self.services.is_empty()
    }

    pub fn scheduled_date(&self) -> NaiveDate {
        self.scheduled_at.date_naive()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementDraft {
    pub client_id: String,
    pub company_id: Option<String>,
    pub service_id: String,
    pub option_ids: Vec<String>,
    pub option_overrides: OptionOverrides,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: Option<EngagementStatus>,
    pub kind: Option<EngagementKind>,
    pub support_type: Option<SupportType>,
    pub support_detail: Option<String>,
    pub additional_charge: Option<Money>,
    pub contact_ids: Vec<String>,
    pub assigned_user_ids: Vec<String>,
    pub invoice_number: Option<String>,
    pub invoice_vat_enabled: Option<bool>,
    pub quote_number: Option<String>,
    pub quote_status: Option<QuoteStatus>,
    pub quote_name: Option<String>,
    pub mobile_duration_minutes: Option<u32>,
    pub mobile_completion_comment: Option<String>,
    pub planning_user: Option<String>,
    pub start_time: Option<String>,
    pub main_category_id: Option<String>,
    pub sub_category_id: Option<String>,
    pub services: Vec<EngagementLine>,
}

// `Some(None)` limpa um campo opcional, `None` mantém
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementPatch {
    pub client_id: Option<String>,
    pub company_id: Option<Option<String>>,
    pub service_id: Option<String>,
    pub option_ids: Option<Vec<String>>,
    pub option_overrides: Option<OptionOverrides>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: Option<EngagementStatus>,
    pub kind: Option<EngagementKind>,
    pub support_type: Option<SupportType>,
    pub support_detail: Option<String>,
    pub additional_charge: Option<Option<Money>>,
    pub contact_ids: Option<Vec<String>>,
    pub assigned_user_ids: Option<Vec<String>>,
    pub invoice_number: Option<Option<String>>,
    pub invoice_vat_enabled: Option<Option<bool>>,
    pub quote_number: Option<Option<String>>,
    pub quote_status: Option<Option<QuoteStatus>>,
    pub quote_name: Option<Option<String>>,
    pub mobile_duration_minutes: Option<Option<u32>>,
    pub mobile_completion_comment: Option<Option<String>>,
    pub planning_user: Option<Option<String>>,
    pub start_time: Option<Option<String>>,
    pub main_category_id: Option<Option<String>>,
    pub sub_category_id: Option<Option<String>>,
    pub services: Option<Vec<EngagementLine>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendPayload {
    pub contact_ids: Vec<String>,
    pub subject: Option<String>,
}

/// Resultado derivado, nunca armazenado.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementTotals {
    pub price: Money,
    pub duration: u32,
    pub surcharge: Money,
}

impl EngagementTotals {
    /// Preço + acréscimo, como somado pelos agregados de receita.
    pub fn billed(&self) -> Money {
        self.price + self.surcharge
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: String,
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub engagement_id: String,
}
