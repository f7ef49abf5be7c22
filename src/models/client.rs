// src/models/client.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::common::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    #[default]
    Company,
    Individual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClientStatus {
    #[default]
    #[serde(rename = "Actif")]
    Active,
    #[serde(rename = "Non actif")]
    Inactive,
    #[serde(rename = "À appeler")]
    ToCall,
    #[serde(rename = "À contacter")]
    ToContact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactRole {
    #[serde(rename = "achat")]
    Purchasing,
    #[serde(rename = "facturation")]
    Billing,
    #[serde(rename = "technique")]
    Technical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContact {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile: String,
    pub roles: Vec<ContactRole>,
    pub is_billing_default: bool,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingGridItem {
    pub service_id: String,
    pub service_option_id: String,
    pub default_price_ht: Money,
    pub custom_price_ht: Option<Money>,
}

// Tarifs négociés d'un client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPricingGrid {
    pub pricing_items: Vec<PricingGridItem>,
}

impl ClientPricingGrid {
    pub fn custom_price(&self, service_id: &str, option_id: &str) -> Option<Money> {
        self.pricing_items
            .iter()
            .find(|item| item.service_id == service_id && item.service_option_id == option_id)
            .and_then(|item| item.custom_price_ht)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    #[serde(rename = "type")]
    pub client_type: ClientType,
    pub name: String,
    pub company_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub siret: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub status: ClientStatus,
    pub tags: Vec<String>,
    pub last_service: Option<DateTime<Utc>>,
    pub contacts: Vec<ClientContact>,
    pub pricing_grid: Option<ClientPricingGrid>,
    pub next_action_date: Option<NaiveDate>,
    pub next_action_note: Option<String>,
    pub company_id: Option<String>,
}

impl Client {
    /// Tags comparados como conjunto (ordem e caixa ignoradas).
    pub fn has_tag(&self, tag: &str) -> bool {
        let wanted = tag.trim().to_lowercase();
        self.tags.iter().any(|t| t.trim().to_lowercase() == wanted)
    }

    pub fn billing_contact(&self) -> Option<&ClientContact> {
        self.contacts.iter().find(|c| c.active && c.is_billing_default)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub client_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// Dados para criação de um novo cliente
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClientDraft {
    #[serde(rename = "type")]
    pub client_type: ClientType,
    pub name: String,
    pub company_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub siret: Option<String>,
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub status: ClientStatus,
    pub tags: Vec<String>,
    pub contacts: Vec<ClientContact>,
    pub next_action_date: Option<NaiveDate>,
    pub next_action_note: Option<String>,
}

// Atualização parcial: `None` mantém o valor atual
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPatch {
    #[serde(rename = "type")]
    pub client_type: Option<ClientType>,
    pub name: Option<String>,
    pub company_name: Option<Option<String>>,
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
    pub siret: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub status: Option<ClientStatus>,
    pub tags: Option<Vec<String>>,
    pub last_service: Option<Option<DateTime<Utc>>>,
    pub next_action_date: Option<Option<NaiveDate>>,
    pub next_action_note: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ContactDraft {
    pub first_name: String,
    pub last_name: String,
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: String,
    pub mobile: String,
    pub roles: Vec<ContactRole>,
    pub is_billing_default: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub roles: Option<Vec<ContactRole>>,
    pub is_billing_default: Option<bool>,
    pub active: Option<bool>,
}

/// Remoção de cliente, guardada para desfazer (`restore_client`).
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedClient {
    pub client: Client,
    pub engagements: Vec<crate::models::engagement::Engagement>,
    pub notes: Vec<Note>,
}
