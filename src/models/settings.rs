// src/models/settings.rs

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::auth::{NotificationPreferences, UserProfile, UserRole};
use crate::models::company::Company;

/// Título da barra lateral quando o usuário não escolheu outro.
pub const DEFAULT_SIDEBAR_TITLE: &str = "Wash&Go";

/// Chave usada pelo formato legado `{enabled, rate}`.
pub const LEGACY_VAT_COMPANY_KEY: &str = "__legacy__";

pub fn default_vat_rate() -> Decimal {
    Decimal::new(20, 2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().trim_matches('"') {
            "light" => Some(ThemeMode::Light),
            "dark" => Some(ThemeMode::Dark),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidebarTitlePreference {
    pub text: String,
    pub hidden: bool,
}

impl Default for SidebarTitlePreference {
    fn default() -> Self {
        Self { text: DEFAULT_SIDEBAR_TITLE.to_string(), hidden: false }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidebarTitlePatch {
    pub text: Option<String>,
    pub hidden: Option<bool>,
}

// IVA: ligado/desligado por empresa, taxa global (0.2 = 20%)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VatSettings {
    pub per_company: HashMap<String, bool>,
    pub rate: Decimal,
}

impl Default for VatSettings {
    fn default() -> Self {
        Self { per_company: HashMap::new(), rate: default_vat_rate() }
    }
}

// --- Payloads de sessão vindos do servidor ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendUserSnapshot {
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub role: Option<UserRole>,
    pub company_id: Option<String>,
    #[serde(default)]
    pub pages: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub active: Option<bool>,
    pub profile: Option<UserProfile>,
    pub notification_preferences: Option<NotificationPreferences>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    pub vat_enabled: Option<bool>,
    pub vat_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub user: BackendUserSnapshot,
    pub company: Option<Company>,
    pub companies: Option<Vec<Company>>,
    #[serde(default)]
    pub settings: SessionSettings,
}

/// Agregado (configurações + estatísticas) carregado uma vez por empresa.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backpack {
    pub settings: Option<BackpackSettings>,
    #[serde(default)]
    pub stats: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackpackSettings {
    pub vat_enabled: Option<bool>,
    pub vat_rate: Option<Decimal>,
}
