// src/services/loader.rs

use std::collections::HashMap;
use std::sync::Mutex;

pub const BACKPACK: &str = "backpack";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    InFlight,
    Loaded,
}

/// Resultado de `LoadGuard::begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTicket {
    /// Quem chamou deve fazer o carregamento e depois chamar `finish`.
    Acquired,
    InFlight,
    Loaded,
}

/// Marcadores de carregamento por `(recurso, empresa)`.
#[derive(Debug, Default)]
pub struct LoadGuard {
    entries: Mutex<HashMap<(String, String), LoadState>>,
}

impl LoadGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, resource: &str, company_id: &str) -> LoadTicket {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let key = (resource.to_string(), company_id.to_string());
        match entries.get(&key) {
            Some(LoadState::Loaded) => LoadTicket::Loaded,
            Some(LoadState::InFlight) => LoadTicket::InFlight,
            None => {
                entries.insert(key, LoadState::InFlight);
                LoadTicket::Acquired
            }
        }
    }

    /// Falha libera o marcador para que uma chamada posterior tente de novo.
    pub fn finish(&self, resource: &str, company_id: &str, success: bool) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let key = (resource.to_string(), company_id.to_string());
        if success {
            entries.insert(key, LoadState::Loaded);
        } else {
            entries.remove(&key);
        }
    }

    pub fn is_in_flight(&self, resource: &str, company_id: &str) -> bool {
        self.state(resource, company_id) == Some(LoadState::InFlight)
    }

    pub fn is_loaded(&self, resource: &str, company_id: &str) -> bool {
        self.state(resource, company_id) == Some(LoadState::Loaded)
    }

    fn state(&self, resource: &str, company_id: &str) -> Option<LoadState> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(resource.to_string(), company_id.to_string()))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_caller_sees_the_load_in_flight() {
        let guard = LoadGuard::new();
        assert_eq!(guard.begin(BACKPACK, "co1"), LoadTicket::Acquired);
        assert_eq!(guard.begin(BACKPACK, "co1"), LoadTicket::InFlight);
        // Outra empresa, outro marcador
        assert_eq!(guard.begin(BACKPACK, "co2"), LoadTicket::Acquired);

        guard.finish(BACKPACK, "co1", true);
        assert_eq!(guard.begin(BACKPACK, "co1"), LoadTicket::Loaded);
    }

    #[test]
    fn failure_releases_the_marker() {
        let guard = LoadGuard::new();
        guard.begin(BACKPACK, "co1");
        guard.finish(BACKPACK, "co1", false);
        assert!(!guard.is_in_flight(BACKPACK, "co1"));
        assert_eq!(guard.begin(BACKPACK, "co1"), LoadTicket::Acquired);
    }
}
