// src/models/company.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub logo_url: String,
    #[serde(default)]
    pub invoice_logo_url: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub siret: String,
    #[serde(default)]
    pub vat_number: String,
    #[serde(default)]
    pub legal_notes: String,
    pub document_header_title: Option<String>,
    pub document_header_subtitle: Option<String>,
    pub document_header_note: Option<String>,
    #[serde(default = "default_true")]
    pub vat_enabled: bool,
    #[serde(default)]
    pub is_default: bool,
    pub default_signature_id: Option<String>,
    // Informações bancárias
    #[serde(default)]
    pub bank_name: String,
    #[serde(default)]
    pub bank_address: String,
    #[serde(default)]
    pub iban: String,
    #[serde(default)]
    pub bic: String,
    pub planning_user: Option<String>,
}

impl Company {
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            logo_url: String::new(),
            invoice_logo_url: String::new(),
            address: String::new(),
            postal_code: String::new(),
            city: String::new(),
            country: String::new(),
            phone: String::new(),
            email: String::new(),
            website: String::new(),
            siret: String::new(),
            vat_number: String::new(),
            legal_notes: String::new(),
            document_header_title: None,
            document_header_subtitle: None,
            document_header_note: None,
            vat_enabled: true,
            is_default: false,
            default_signature_id: None,
            bank_name: String::new(),
            bank_address: String::new(),
            iban: String::new(),
            bic: String::new(),
            planning_user: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDraft {
    #[validate(length(min = 1, message = "O nome da empresa é obrigatório."))]
    pub name: String,
    pub logo_url: Option<String>,
    pub invoice_logo_url: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: Option<String>,
    pub website: Option<String>,
    pub siret: String,
    pub vat_number: Option<String>,
    pub legal_notes: Option<String>,
    pub document_header_title: Option<String>,
    pub document_header_subtitle: Option<String>,
    pub document_header_note: Option<String>,
    pub vat_enabled: Option<bool>,
    pub is_default: Option<bool>,
    pub default_signature_id: Option<String>,
    pub bank_name: Option<String>,
    pub bank_address: Option<String>,
    pub iban: Option<String>,
    pub bic: Option<String>,
    pub planning_user: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyPatch {
    pub name: Option<String>,
    pub logo_url: Option<String>,
    pub invoice_logo_url: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub siret: Option<String>,
    pub vat_number: Option<String>,
    pub legal_notes: Option<String>,
    pub document_header_title: Option<Option<String>>,
    pub document_header_subtitle: Option<Option<String>>,
    pub document_header_note: Option<Option<String>>,
    pub vat_enabled: Option<bool>,
    pub is_default: Option<bool>,
    pub default_signature_id: Option<Option<String>>,
    pub bank_name: Option<String>,
    pub bank_address: Option<String>,
    pub iban: Option<String>,
    pub bic: Option<String>,
    pub planning_user: Option<Option<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureScope {
    Company,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSignature {
    pub id: String,
    pub scope: SignatureScope,
    pub company_id: Option<String>,
    pub user_id: Option<String>,
    pub label: String,
    pub html: String,
    pub is_default: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureDraft {
    pub scope: SignatureScope,
    pub company_id: Option<String>,
    pub user_id: Option<String>,
    pub label: String,
    pub html: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePatch {
    pub label: Option<String>,
    pub html: Option<String>,
    pub is_default: Option<bool>,
}
