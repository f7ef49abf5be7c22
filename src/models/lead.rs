// src/models/lead.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::common::money::Money;
use crate::models::client::ClientType;
use crate::models::engagement::SupportType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LeadStatus {
    #[default]
    #[serde(rename = "Nouveau")]
    New,
    #[serde(rename = "À contacter")]
    ToContact,
    #[serde(rename = "En cours")]
    InProgress,
    #[serde(rename = "Devis envoyé")]
    QuoteSent,
    #[serde(rename = "Gagné")]
    Won,
    #[serde(rename = "Perdu")]
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadActivityKind {
    Note,
    Call,
}

// Nunca editada: só adicionada ou removida por id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadActivity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LeadActivityKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub company: String,
    pub contact: String,
    pub phone: String,
    pub email: String,
    pub source: String,
    pub segment: String,
    pub status: LeadStatus,
    pub next_step_date: Option<NaiveDate>,
    pub next_step_note: String,
    pub last_contact: Option<DateTime<Utc>>,
    pub estimated_value: Option<Money>,
    pub owner: String,
    pub tags: Vec<String>,
    pub address: Option<String>,
    pub company_id: Option<String>,
    pub support_type: Option<SupportType>,
    pub support_detail: Option<String>,
    pub siret: Option<String>,
    pub client_type: Option<ClientType>,
    pub created_at: DateTime<Utc>,
    pub activities: Vec<LeadActivity>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LeadDraft {
    pub company: String,
    pub contact: String,
    pub phone: String,
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: Option<String>,
    pub source: String,
    pub segment: String,
    pub status: LeadStatus,
    pub next_step_date: Option<NaiveDate>,
    pub next_step_note: String,
    pub last_contact: Option<DateTime<Utc>>,
    pub estimated_value: Option<Money>,
    pub owner: String,
    pub tags: Vec<String>,
    pub address: Option<String>,
    pub company_id: Option<String>,
    pub support_type: Option<SupportType>,
    pub support_detail: Option<String>,
    pub siret: Option<String>,
    pub client_type: Option<ClientType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPatch {
    pub company: Option<String>,
    pub contact: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub source: Option<String>,
    pub segment: Option<String>,
    pub status: Option<LeadStatus>,
    pub next_step_date: Option<Option<NaiveDate>>,
    pub next_step_note: Option<String>,
    pub last_contact: Option<Option<DateTime<Utc>>>,
    pub estimated_value: Option<Option<Money>>,
    pub owner: Option<String>,
    pub tags: Option<Vec<String>>,
    pub address: Option<Option<String>>,
}
