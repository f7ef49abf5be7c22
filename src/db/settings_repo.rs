// src/db/settings_repo.rs

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Serialize;
use serde_json::Value;

use crate::db::storage::KeyValueStorage;
use crate::models::auth::AuthSession;
use crate::models::settings::{
    LEGACY_VAT_COMPANY_KEY, SidebarTitlePreference, ThemeMode, VatSettings,
};

pub const AUTH_STORAGE_KEY: &str = "washandgo-auth-state";
pub const VAT_STORAGE_KEY: &str = "washandgo-vat-settings";
pub const THEME_STORAGE_KEY: &str = "washandgo-theme";
pub const SIDEBAR_TITLE_STORAGE_KEY: &str = "washandgo:sidebar-title";
pub const ACTIVE_COMPANY_STORAGE_KEY: &str = "erp_active_company_id";

const LEGACY_AUTH_KEYS: [&str; 2] = ["washingo-auth-state", "washango-auth-state"];
const LEGACY_VAT_KEYS: [&str; 2] = ["washingo-vat-settings", "washango-vat-settings"];
const LEGACY_THEME_KEYS: [&str; 2] = ["washingo-theme", "washango-theme"];
const LEGACY_SIDEBAR_KEYS: [&str; 2] = ["washingo:sidebar-title", "washango:sidebar-title"];

/// Fatia persistida do store (sessão, IVA, tema, barra lateral, empresa ativa).
///
/// Toda escrita é "best effort": falhas viram `warn!` e nunca sobem.
#[derive(Clone)]
pub struct SettingsRepository {
    storage: Arc<dyn KeyValueStorage>,
}

impl SettingsRepository {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    // --- Sessão de autenticação ---

    pub fn load_auth_state(&self) -> Option<AuthSession> {
        let raw = self.read_migrating(AUTH_STORAGE_KEY, &LEGACY_AUTH_KEYS)?;
        match serde_json::from_str::<AuthSession>(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!("Não foi possível carregar a sessão persistida: {}", e);
                None
            }
        }
    }

    pub fn save_auth_state(&self, session: &AuthSession) {
        self.write_json(AUTH_STORAGE_KEY, session, &LEGACY_AUTH_KEYS);
    }

    // --- IVA ---

    pub fn load_vat_settings(&self) -> Option<VatSettings> {
        let raw = self.read_migrating(VAT_STORAGE_KEY, &LEGACY_VAT_KEYS)?;
        let parsed = match serde_json::from_str::<Value>(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Não foi possível carregar as configurações de IVA: {}", e);
                return None;
            }
        };
        parse_vat_settings(&parsed)
    }

    pub fn save_vat_settings(&self, settings: &VatSettings) {
        self.write_json(VAT_STORAGE_KEY, settings, &LEGACY_VAT_KEYS);
    }

    // --- Tema ---

    pub fn load_theme(&self) -> ThemeMode {
        self.read_migrating(THEME_STORAGE_KEY, &LEGACY_THEME_KEYS)
            .and_then(|raw| ThemeMode::parse(&raw))
            .unwrap_or_default()
    }

    pub fn save_theme(&self, mode: ThemeMode) {
        self.write_raw(THEME_STORAGE_KEY, mode.as_str(), &LEGACY_THEME_KEYS);
    }

    // --- Título da barra lateral ---

    pub fn load_sidebar_title(&self) -> SidebarTitlePreference {
        self.read_migrating(SIDEBAR_TITLE_STORAGE_KEY, &LEGACY_SIDEBAR_KEYS)
            .and_then(|raw| parse_sidebar_title(&raw))
            .unwrap_or_default()
    }

    pub fn save_sidebar_title(&self, preference: &SidebarTitlePreference) {
        self.write_json(SIDEBAR_TITLE_STORAGE_KEY, preference, &LEGACY_SIDEBAR_KEYS);
    }

    // --- Empresa ativa ---

    pub fn load_active_company_id(&self) -> Option<String> {
        self.read_migrating(ACTIVE_COMPANY_STORAGE_KEY, &[])
            .map(|raw| raw.trim().to_string())
            .filter(|id| !id.is_empty())
    }

    pub fn save_active_company_id(&self, company_id: Option<&str>) {
        let result = match company_id {
            Some(id) => self.storage.set(ACTIVE_COMPANY_STORAGE_KEY, id),
            None => self.storage.remove(ACTIVE_COMPANY_STORAGE_KEY),
        };
        if let Err(e) = result {
            tracing::warn!("Não foi possível salvar a empresa ativa: {}", e);
        }
    }

    // --- Auxiliares ---

    /// Lê a chave atual; na ausência, a primeira chave legada encontrada é
    /// regravada sob a chave atual e todas as legadas são apagadas.
    fn read_migrating(&self, key: &str, legacy_keys: &[&str]) -> Option<String> {
        match self.storage.get(key) {
            Ok(Some(raw)) if !raw.is_empty() => return Some(raw),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Falha ao ler '{}': {}", key, e);
                return None;
            }
        }

        let (legacy_key, raw) = legacy_keys.iter().find_map(|legacy| match self.storage.get(legacy) {
            Ok(Some(raw)) if !raw.is_empty() => Some((*legacy, raw)),
            _ => None,
        })?;

        tracing::info!("🔁 Migrando chave legada '{}' para '{}'", legacy_key, key);
        self.write_raw(key, &raw, legacy_keys);
        Some(raw)
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T, legacy_keys: &[&str]) {
        match serde_json::to_string(value) {
            Ok(raw) => self.write_raw(key, &raw, legacy_keys),
            Err(e) => tracing::warn!("Falha ao serializar '{}': {}", key, e),
        }
    }

    fn write_raw(&self, key: &str, raw: &str, legacy_keys: &[&str]) {
        if let Err(e) = self.storage.set(key, raw) {
            tracing::warn!("Não foi possível salvar '{}': {}", key, e);
            return;
        }
        for legacy in legacy_keys {
            if let Err(e) = self.storage.remove(legacy) {
                tracing::warn!("Não foi possível remover a chave legada '{}': {}", legacy, e);
            }
        }
    }
}

// Aceita o formato atual `{perCompany, rate}` e o legado `{enabled, rate}`
fn parse_vat_settings(value: &Value) -> Option<VatSettings> {
    let object = value.as_object()?;
    let rate = object.get("rate")?.as_f64().and_then(Decimal::from_f64)?;

    if let Some(per_company) = object.get("perCompany") {
        let per_company: HashMap<String, bool> = per_company
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(id, flag)| flag.as_bool().map(|flag| (id.clone(), flag)))
                    .collect()
            })
            .unwrap_or_default();
        return Some(VatSettings { per_company, rate });
    }

    let enabled = object.get("enabled")?.as_bool()?;
    let mut per_company = HashMap::new();
    per_company.insert(LEGACY_VAT_COMPANY_KEY.to_string(), enabled);
    Some(VatSettings { per_company, rate })
}

// Objeto JSON, string JSON ou texto cru
fn parse_sidebar_title(raw: &str) -> Option<SidebarTitlePreference> {
    let parsed = match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(_) => return Some(SidebarTitlePreference { text: raw.to_string(), hidden: false }),
    };

    match parsed {
        Value::String(text) => Some(SidebarTitlePreference { text, hidden: false }),
        Value::Object(map) => {
            let text = map
                .get("text")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| SidebarTitlePreference::default().text);
            let hidden = map.get("hidden").is_some_and(is_truthy);
            Some(SidebarTitlePreference { text, hidden })
        }
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::storage::MemoryStorage;
    use crate::models::settings::DEFAULT_SIDEBAR_TITLE;

    fn repo_with(entries: Vec<(&str, &str)>) -> (Arc<MemoryStorage>, SettingsRepository) {
        let storage = Arc::new(MemoryStorage::with_entries(entries));
        let repo = SettingsRepository::new(storage.clone());
        (storage, repo)
    }

    #[test]
    fn legacy_vat_format_is_migrated_and_removed() {
        let (storage, repo) = repo_with(vec![("washingo-vat-settings", r#"{"enabled":false,"rate":0.1}"#)]);

        let settings = repo.load_vat_settings().unwrap();
        assert_eq!(settings.per_company.get(LEGACY_VAT_COMPANY_KEY), Some(&false));
        assert_eq!(settings.rate, Decimal::new(1, 1));

        assert!(storage.get("washingo-vat-settings").unwrap().is_none());
        assert!(storage.get(VAT_STORAGE_KEY).unwrap().is_some());
    }

    #[test]
    fn current_key_wins_over_legacy_keys() {
        let (storage, repo) = repo_with(vec![(THEME_STORAGE_KEY, "dark"), ("washango-theme", "light")]);
        assert_eq!(repo.load_theme(), ThemeMode::Dark);
        // Sem migração: a legada só some na próxima escrita
        assert!(storage.get("washango-theme").unwrap().is_some());
        repo.save_theme(ThemeMode::Light);
        assert!(storage.get("washango-theme").unwrap().is_none());
    }

    #[test]
    fn sidebar_title_accepts_object_string_and_raw_text() {
        assert_eq!(
            parse_sidebar_title(r#"{"text":"Atelier","hidden":1}"#),
            Some(SidebarTitlePreference { text: "Atelier".into(), hidden: true })
        );
        assert_eq!(parse_sidebar_title(r#""Atelier""#).unwrap().text, "Atelier");
        assert_eq!(parse_sidebar_title("Atelier brut").unwrap().text, "Atelier brut");
        assert_eq!(parse_sidebar_title(r#"{"hidden":false}"#).unwrap().text, DEFAULT_SIDEBAR_TITLE);
        assert_eq!(parse_sidebar_title("42"), None);
    }

    #[test]
    fn sidebar_legacy_key_uses_colon_separator() {
        let (storage, repo) = repo_with(vec![("washango:sidebar-title", r#""Wash Pro""#)]);
        assert_eq!(repo.load_sidebar_title().text, "Wash Pro");
        assert!(storage.get("washango:sidebar-title").unwrap().is_none());
    }

    #[test]
    fn active_company_is_removed_when_cleared() {
        let (storage, repo) = repo_with(vec![]);
        repo.save_active_company_id(Some("co-1"));
        assert_eq!(repo.load_active_company_id().as_deref(), Some("co-1"));
        repo.save_active_company_id(None);
        assert!(storage.get(ACTIVE_COMPANY_STORAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn write_failures_are_swallowed() {
        let (storage, repo) = repo_with(vec![]);
        storage.set_fail_writes(true);
        repo.save_theme(ThemeMode::Dark);
        assert_eq!(repo.load_theme(), ThemeMode::Light);
    }

    #[test]
    fn broken_auth_state_is_ignored() {
        let (_, repo) = repo_with(vec![(AUTH_STORAGE_KEY, "{not json")]);
        assert!(repo.load_auth_state().is_none());
    }
}
