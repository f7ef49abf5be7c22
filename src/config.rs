// src/config.rs

use std::{env, path::PathBuf, time::Duration};

use anyhow::{Context, bail};

/// Configuração do store, lida do ambiente (`.env` incluído).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub storage_path: PathBuf,
    // Espera por um carregamento do backpack já em andamento
    pub backpack_poll_attempts: u32,
    pub backpack_poll_interval: Duration,
    pub invoice_number_attempts: u32,
    pub bcrypt_cost: u32,
    pub default_admin_password: String,
    pub log_filter: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("data/erp-store.json"),
            backpack_poll_attempts: 50,
            backpack_poll_interval: Duration::from_millis(100),
            invoice_number_attempts: 20,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            default_admin_password: "admin".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl StoreConfig {
    // A assinatura retorna um Result: variável malformada é erro de arranque
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Mesmo parsing de `from_env`, com uma fonte de variáveis arbitrária.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let number = |key: &str, fallback: u64| -> anyhow::Result<u64> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("{} deve ser um inteiro positivo", key)),
                None => Ok(fallback),
            }
        };

        let backpack_poll_attempts =
            number("ERP_BACKPACK_POLL_ATTEMPTS", u64::from(defaults.backpack_poll_attempts))? as u32;
        let poll_ms = number(
            "ERP_BACKPACK_POLL_INTERVAL_MS",
            defaults.backpack_poll_interval.as_millis() as u64,
        )?;
        let invoice_number_attempts =
            number("ERP_INVOICE_NUMBER_ATTEMPTS", u64::from(defaults.invoice_number_attempts))? as u32;
        let bcrypt_cost = number("ERP_BCRYPT_COST", u64::from(defaults.bcrypt_cost))? as u32;

        if !(4..=31).contains(&bcrypt_cost) {
            bail!("ERP_BCRYPT_COST deve estar entre 4 e 31 (recebido {})", bcrypt_cost);
        }
        if invoice_number_attempts == 0 {
            bail!("ERP_INVOICE_NUMBER_ATTEMPTS deve ser maior que zero");
        }

        Ok(Self {
            storage_path: lookup("ERP_STORAGE_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_path),
            backpack_poll_attempts,
            backpack_poll_interval: Duration::from_millis(poll_ms),
            invoice_number_attempts,
            bcrypt_cost,
            default_admin_password: lookup("ERP_DEFAULT_ADMIN_PASSWORD")
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.default_admin_password),
            log_filter: lookup("RUST_LOG").unwrap_or(defaults.log_filter),
        })
    }

    /// Configuração rápida para testes (bcrypt no custo mínimo, polling curto).
    pub fn for_tests() -> Self {
        Self {
            backpack_poll_interval: Duration::from_millis(5),
            bcrypt_cost: 4,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_variables_fall_back_to_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.backpack_poll_attempts, 50);
        assert_eq!(config.backpack_poll_interval, Duration::from_millis(100));
        assert_eq!(config.default_admin_password, "admin");
    }

    #[test]
    fn values_are_parsed_and_validated() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("ERP_STORAGE_PATH", "/tmp/store.json"),
            ("ERP_BCRYPT_COST", "6"),
            ("ERP_INVOICE_NUMBER_ATTEMPTS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.storage_path, PathBuf::from("/tmp/store.json"));
        assert_eq!(config.bcrypt_cost, 6);
        assert_eq!(config.invoice_number_attempts, 3);

        assert!(StoreConfig::from_lookup(lookup(&[("ERP_BCRYPT_COST", "2")])).is_err());
        assert!(StoreConfig::from_lookup(lookup(&[("ERP_BACKPACK_POLL_ATTEMPTS", "muitos")])).is_err());
    }
}
