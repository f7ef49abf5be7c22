// src/models/catalog.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::common::money::Money;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOption {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub default_duration_min: u32,
    pub unit_price_ht: Money,
    pub tva_pct: Option<Decimal>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    // Categoria livre (nome de uma `Category`)
    pub category: String,
    pub name: String,
    pub description: Option<String>,
    pub options: Vec<ServiceOption>,
    pub active: bool,
    // Fallback quando nenhuma opção está selecionada
    pub base_price: Option<Money>,
    pub base_duration: Option<u32>,
}

impl Service {
    pub fn option(&self, option_id: &str) -> Option<&ServiceOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // Sobreposição plana usada por sub-categoria numa linha de engagement
    pub price_ht: Option<Money>,
    pub default_duration_min: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDraft {
    pub category: String,
    #[validate(length(min = 1, message = "O nome do serviço é obrigatório."))]
    pub name: String,
    pub description: Option<String>,
    pub options: Vec<OptionDraft>,
    pub active: bool,
    pub base_price: Option<Money>,
    pub base_duration: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePatch {
    pub category: Option<String>,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub active: Option<bool>,
    pub base_price: Option<Option<Money>>,
    pub base_duration: Option<Option<u32>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OptionDraft {
    #[validate(length(min = 1, message = "O rótulo da opção é obrigatório."))]
    pub label: String,
    pub description: Option<String>,
    pub default_duration_min: u32,
    pub unit_price_ht: Money,
    pub tva_pct: Option<Decimal>,
    pub active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionPatch {
    pub label: Option<String>,
    pub description: Option<Option<String>>,
    pub default_duration_min: Option<u32>,
    pub unit_price_ht: Option<Money>,
    pub tva_pct: Option<Option<Decimal>>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDraft {
    #[validate(length(min = 1, message = "O nome da categoria é obrigatório."))]
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub parent_id: Option<String>,
    pub price_ht: Option<Money>,
    pub default_duration_min: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub active: Option<bool>,
    pub parent_id: Option<Option<String>>,
    pub price_ht: Option<Option<Money>>,
    pub default_duration_min: Option<Option<u32>>,
}
