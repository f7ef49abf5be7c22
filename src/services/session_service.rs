// src/services/session_service.rs

use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    db::StoreState,
    models::{
        auth::{AuthUser, UserRole},
        catalog::{Category, Service},
        client::Client,
        company::Company,
        engagement::Engagement,
        lead::Lead,
        settings::{BackendUserSnapshot, SessionPayload},
        subscription::Subscription,
    },
    services::{
        auth::sanitize_auth_user,
        loader::{BACKPACK, LoadTicket},
        sync,
    },
    store::StoreContext,
};

// Listas de acesso do servidor só substituem as locais quando não vazias
fn merge_access(server: Vec<String>, cached: Option<&Vec<String>>) -> Vec<String> {
    if server.iter().any(|entry| entry == "*") {
        return vec!["*".to_string()];
    }
    if server.is_empty() {
        return cached.cloned().unwrap_or_default();
    }
    server
}

fn merge_user(snapshot: BackendUserSnapshot, existing: Option<&AuthUser>, payload_company: Option<&str>) -> AuthUser {
    let username = if snapshot.username.is_empty() {
        existing.map(|u| u.username.clone()).unwrap_or_default()
    } else {
        snapshot.username.clone()
    };
    let full_name = snapshot
        .full_name
        .or_else(|| existing.map(|u| u.full_name.clone()))
        .unwrap_or_else(|| username.clone());

    sanitize_auth_user(AuthUser {
        id: snapshot.id,
        username,
        full_name,
        password_hash: existing.map(|u| u.password_hash.clone()).unwrap_or_default(),
        role: snapshot.role.or(existing.map(|u| u.role)).unwrap_or(UserRole::Agent),
        pages: merge_access(snapshot.pages, existing.map(|u| &u.pages)),
        permissions: merge_access(snapshot.permissions, existing.map(|u| &u.permissions)),
        active: snapshot.active.or(existing.map(|u| u.active)).unwrap_or(true),
        profile: snapshot
            .profile
            .or_else(|| existing.map(|u| u.profile.clone()))
            .unwrap_or_default(),
        notification_preferences: snapshot
            .notification_preferences
            .or_else(|| existing.map(|u| u.notification_preferences.clone()))
            .unwrap_or_default(),
        company_id: snapshot
            .company_id
            .or_else(|| existing.and_then(|u| u.company_id.clone()))
            .or_else(|| payload_company.map(str::to_string)),
    })
}

/// Primeira ocorrência de cada id vence.
fn dedupe_companies(companies: Vec<Company>) -> Vec<Company> {
    let mut seen = HashSet::new();
    companies.into_iter().filter(|c| seen.insert(c.id.clone())).collect()
}

/// Ordem de preferência para a empresa ativa após a hidratação.
fn resolve_active_company(
    state: &StoreState,
    persisted: Option<String>,
    user_company: Option<&str>,
    payload_company: Option<&str>,
) -> Option<String> {
    let exists = |id: &str| state.companies.contains(id);
    persisted
        .filter(|id| exists(id.as_str()))
        .or_else(|| user_company.filter(|id| exists(*id)).map(str::to_string))
        .or_else(|| payload_company.filter(|id| exists(*id)).map(str::to_string))
        .or_else(|| state.default_company_id())
        .or_else(|| state.companies.first().map(|c| c.id.clone()))
        .or_else(|| state.active_company_id.clone())
}

/// Sessão: hidratação a partir do servidor, troca de empresa e carregamento
/// do backpack.
#[derive(Clone)]
pub struct SessionService {
    ctx: Arc<StoreContext>,
}

impl SessionService {
    pub(crate) fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    pub fn active_company_id(&self) -> Option<String> {
        self.ctx.read(|s| s.active_company_id.clone())
    }

    /// Aplica o payload de sessão do servidor e carrega o backpack da empresa
    /// ativa resultante. Devolve o usuário corrente já mesclado.
    pub async fn hydrate(&self, payload: SessionPayload) -> AuthUser {
        let persisted_company = self.ctx.settings.load_active_company_id();
        let payload_company_id = payload.company.as_ref().map(|c| c.id.clone());

        // 1. Usuário, empresas, empresa ativa e IVA numa única escrita
        let (user, active) = self.ctx.write(|s| {
            let existing = s.users.get(&payload.user.id).cloned();
            let user = merge_user(payload.user, existing.as_ref(), payload_company_id.as_deref());
            if existing.is_some() {
                s.users.replace(&user.id, user.clone());
            } else {
                s.users.push(user.clone());
            }
            s.current_user_id = Some(user.id.clone());

            let mut companies = payload.companies.unwrap_or_else(|| s.companies.to_vec());
            if let Some(primary) = payload.company.clone() {
                companies.insert(0, primary);
            }
            s.companies.replace_all(dedupe_companies(companies));

            let active = resolve_active_company(
                s,
                persisted_company,
                user.company_id.as_deref(),
                payload_company_id.as_deref(),
            );
            s.active_company_id = active.clone();

            s.vat_enabled = payload
                .settings
                .vat_enabled
                .or(payload.company.as_ref().map(|c| c.vat_enabled))
                .unwrap_or(s.vat_enabled);
            if let Some(rate) = payload.settings.vat_rate {
                s.vat_rate = rate.max(rust_decimal::Decimal::ZERO);
            }
            (user, active)
        });

        // 2. Persistência e escopo das próximas chamadas
        self.ctx.persist_auth();
        self.ctx.persist_vat();
        self.ctx.persist_active_company();
        self.ctx.backend.set_company_scope(active.as_deref());
        tracing::info!(
            "✅ Sessão hidratada para '{}' (empresa ativa: {})",
            user.username,
            active.as_deref().unwrap_or("nenhuma")
        );

        // 3. Backpack da empresa ativa
        if let Some(company_id) = active {
            self.load_company_backpack(&company_id).await;
        }
        user
    }

    /// Troca a empresa ativa. A limpeza e a persistência são síncronas; o
    /// backpack e as coleções da nova empresa chegam por tarefas em segundo plano.
    pub fn set_active_company(&self, company_id: Option<String>) {
        // 1. Limpa os dados da empresa anterior e troca o id
        let epoch = self.ctx.write(|s| {
            s.clear_company_data();
            if let Some(enabled) = company_id.as_deref().and_then(|id| s.companies.get(id)).map(|c| c.vat_enabled) {
                s.vat_enabled = enabled;
            }
            s.active_company_id = company_id.clone();
            s.company_epoch += 1;
            s.company_epoch
        });
        self.ctx.backend.set_company_scope(company_id.as_deref());

        // 2. Persistência imediata (remove a chave quando `None`)
        self.ctx.persist_active_company();
        tracing::info!("🔁 Empresa ativa: {}", company_id.as_deref().unwrap_or("nenhuma"));

        let Some(company_id) = company_id else {
            return;
        };

        // 3. Recarregamento assíncrono
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("⚠️ Sem runtime assíncrono: dados da empresa {} não recarregados", company_id);
            return;
        };
        let ctx = self.ctx.clone();
        handle.spawn(async move {
            SessionService::new(ctx.clone()).load_company_backpack(&company_id).await;
            let results = [
                ("clientes", sync::refetch::<Client>(&ctx, epoch).await),
                ("leads", sync::refetch::<Lead>(&ctx, epoch).await),
                ("serviços", sync::refetch::<Service>(&ctx, epoch).await),
                ("engagements", sync::refetch::<Engagement>(&ctx, epoch).await),
                ("assinaturas", sync::refetch::<Subscription>(&ctx, epoch).await),
                ("categorias", sync::refetch::<Category>(&ctx, epoch).await),
            ];
            for (family, result) in results {
                if let Err(e) = result {
                    tracing::warn!("⚠️ Falha ao recarregar {} da empresa {}: {}", family, company_id, e);
                }
            }
        });
    }

    /// Carrega o backpack da empresa no máximo uma vez.
    ///
    /// Com outro carregamento em andamento, espera por ele (tentativas
    /// limitadas) e retorna. Uma falha libera o marcador.
    pub async fn load_company_backpack(&self, company_id: &str) {
        match self.ctx.loads.begin(BACKPACK, company_id) {
            LoadTicket::Loaded => return,
            LoadTicket::InFlight => {
                for _ in 0..self.ctx.config.backpack_poll_attempts {
                    if !self.ctx.loads.is_in_flight(BACKPACK, company_id) {
                        break;
                    }
                    tokio::time::sleep(self.ctx.config.backpack_poll_interval).await;
                }
                return;
            }
            LoadTicket::Acquired => {}
        }

        let result = self.ctx.backend.backpack(company_id).await.into_result();
        let backpack = match result {
            Ok(backpack) => backpack.unwrap_or_default(),
            Err(e) => {
                tracing::error!("❌ Falha ao carregar o backpack da empresa {}: {}", company_id, e);
                self.ctx.loads.finish(BACKPACK, company_id, false);
                return;
            }
        };

        let applied = self.ctx.write(|s| {
            // Resposta de uma empresa que já não está ativa
            if s.active_company_id.as_deref().is_some_and(|active| active != company_id) {
                return false;
            }
            if s.active_company_id.is_none() {
                s.active_company_id = Some(company_id.to_string());
            }
            let settings = backpack.settings.unwrap_or_default();
            let company_vat = s.companies.get(company_id).map(|c| c.vat_enabled);
            s.vat_enabled = settings.vat_enabled.or(company_vat).unwrap_or(s.vat_enabled);
            if let Some(rate) = settings.vat_rate {
                s.vat_rate = rate.max(rust_decimal::Decimal::ZERO);
            }
            s.stats.extend(backpack.stats);
            true
        });
        self.ctx.loads.finish(BACKPACK, company_id, true);

        if applied {
            tracing::info!("✅ Backpack da empresa {} carregado", company_id);
        } else {
            tracing::debug!("Backpack da empresa {} ignorado: empresa ativa mudou", company_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pages: &[&str]) -> BackendUserSnapshot {
        BackendUserSnapshot {
            id: "u-1".into(),
            username: "ana".into(),
            pages: pages.iter().map(|p| p.to_string()).collect(),
            ..BackendUserSnapshot::default()
        }
    }

    #[test]
    fn empty_server_pages_keep_the_cached_ones() {
        let cached = merge_user(snapshot(&["clients", "leads"]), None, None);
        let merged = merge_user(snapshot(&[]), Some(&cached), None);
        assert_eq!(merged.pages, vec!["clients", "leads"]);

        let replaced = merge_user(snapshot(&["planning"]), Some(&cached), None);
        assert_eq!(replaced.pages, vec!["planning"]);
    }

    #[test]
    fn user_company_falls_back_to_payload_company() {
        let merged = merge_user(snapshot(&[]), None, Some("co-9"));
        assert_eq!(merged.company_id.as_deref(), Some("co-9"));
        assert_eq!(merged.full_name, "ana");
        assert_eq!(merged.role, UserRole::Agent);
    }

    #[test]
    fn duplicated_companies_keep_the_first() {
        let mut first = Company::named("co-1", "Primeira");
        first.city = "Lyon".into();
        let companies = dedupe_companies(vec![first, Company::named("co-2", "B"), Company::named("co-1", "Outra")]);
        assert_eq!(companies.len(), 2);
        assert_eq!(companies[0].city, "Lyon");
    }

    #[test]
    fn active_company_skips_unknown_candidates() {
        let mut state = StoreState::default();
        let mut default = Company::named("co-2", "B");
        default.is_default = true;
        state.companies.push(Company::named("co-1", "A"));
        state.companies.push(default);

        let active = resolve_active_company(&state, Some("gone".into()), Some("co-1"), None);
        assert_eq!(active.as_deref(), Some("co-1"));

        let active = resolve_active_company(&state, None, Some("gone"), Some("also-gone"));
        assert_eq!(active.as_deref(), Some("co-2"));

        let mut empty = StoreState::default();
        empty.active_company_id = Some("legacy".into());
        assert_eq!(resolve_active_company(&empty, None, None, None).as_deref(), Some("legacy"));
    }
}
