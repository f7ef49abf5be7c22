// src/services/auth.rs

use std::sync::Arc;

use bcrypt::{hash, verify};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::StoreConfig,
    middleware::rbac::{PAGE_KEYS, PERMISSION_KEYS, normalize_access},
    models::auth::{
        AuthUser, DEFAULT_ADMIN_ID, DEFAULT_ADMIN_USERNAME, NewUserPayload, NotificationPreferences,
        NotificationPreferencesPatch, ProfilePatch, UserAccountPatch, UserProfile, UserRole, WILDCARD,
    },
    remote::dto::{EntityMapper, UserDto},
    services::sync::{self, SyncAction, SyncTicket},
    store::StoreContext,
};

const FALLBACK_USERNAME: &str = "Utilisateur";

// ==========================================
// HASH DE SENHAS
// ==========================================

pub async fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    let password_clone = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || hash(&password_clone, cost))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
    Ok(hashed)
}

/// Hash ilegível ou de formato desconhecido nunca confere.
pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    if password_hash.starts_with(legacy::PREFIX) {
        return Ok(legacy::verify(password, password_hash));
    }
    let password_clone = password.to_owned();
    let hash_clone = password_hash.to_owned();
    let outcome = tokio::task::spawn_blocking(move || verify(&password_clone, &hash_clone))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))?;
    match outcome {
        Ok(valid) => Ok(valid),
        Err(e) => {
            tracing::warn!("⚠️ Hash de senha inválido armazenado: {}", e);
            Ok(false)
        }
    }
}

/// Hash FNV-1a salgado das versões offline antigas.
pub mod legacy {
    pub const PREFIX: &str = "fnv1a:";

    #[cfg(feature = "offline-demo")]
    const SALT: &str = "washandgo::auth::v1";

    #[cfg(feature = "offline-demo")]
    pub fn hash(password: &str) -> String {
        use unicode_normalization::UnicodeNormalization;

        let normalized: String = password.nfkc().collect();
        let input = format!("{}:{}", SALT, normalized);
        // Unidades UTF-16, como os hashes já gravados foram calculados
        let mut value: u32 = 0x811c_9dc5;
        for unit in input.encode_utf16() {
            value ^= u32::from(unit);
            value = value.wrapping_mul(0x0100_0193);
        }
        format!("{}{:08x}", PREFIX, value)
    }

    #[cfg(feature = "offline-demo")]
    pub fn verify(password: &str, stored: &str) -> bool {
        hash(password) == stored
    }

    #[cfg(not(feature = "offline-demo"))]
    pub fn verify(_password: &str, _stored: &str) -> bool {
        tracing::warn!("⚠️ Hash legado recusado: compile com a feature `offline-demo`");
        false
    }
}

// ==========================================
// NORMALIZAÇÃO
// ==========================================

/// Conta normalizada: identificador aparado, nome completo preenchido,
/// páginas/permissões filtradas e `superAdmin` sem listas recebendo `*`.
pub fn sanitize_auth_user(mut user: AuthUser) -> AuthUser {
    let username = user.username.trim();
    user.username = if username.is_empty() { FALLBACK_USERNAME.to_string() } else { username.to_string() };
    let full_name = user.full_name.trim();
    user.full_name = if full_name.is_empty() { user.username.clone() } else { full_name.to_string() };

    user.pages = normalize_access(&user.pages, PAGE_KEYS);
    user.permissions = normalize_access(&user.permissions, PERMISSION_KEYS);
    if user.role == UserRole::SuperAdmin {
        if user.pages.is_empty() {
            user.pages = vec![WILDCARD.to_string()];
        }
        if user.permissions.is_empty() {
            user.permissions = vec![WILDCARD.to_string()];
        }
    }
    user
}

pub(crate) async fn default_admin(config: &StoreConfig) -> anyhow::Result<AuthUser> {
    let password_hash = hash_password(&config.default_admin_password, config.bcrypt_cost)
        .await
        .map_err(|e| anyhow::anyhow!("Falha ao gerar o hash do administrador padrão: {}", e))?;
    Ok(AuthUser {
        id: DEFAULT_ADMIN_ID.to_string(),
        username: DEFAULT_ADMIN_USERNAME.to_string(),
        full_name: "Administrateur".to_string(),
        password_hash,
        role: UserRole::SuperAdmin,
        pages: vec![WILDCARD.to_string()],
        permissions: vec![WILDCARD.to_string()],
        active: true,
        profile: UserProfile {
            id: "user-admin".to_string(),
            role: UserRole::SuperAdmin.label().to_string(),
            email_signature_use_default: true,
            ..UserProfile::default()
        },
        notification_preferences: NotificationPreferences::default(),
        company_id: None,
    })
}

fn is_conflict(message: &str) -> bool {
    message.contains("409") || message.contains("Conflict") || message.contains("déjà utilisé")
}

// ==========================================
// SERVIÇO
// ==========================================

#[derive(Clone)]
pub struct AuthService {
    ctx: Arc<StoreContext>,
}

impl AuthService {
    pub(crate) fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.ctx.read(|s| s.current_user().cloned())
    }

    pub fn users(&self) -> Vec<AuthUser> {
        self.ctx.read(|s| s.users.to_vec())
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthUser, AppError> {
        let candidate = self
            .ctx
            .read(|s| s.users.iter().find(|u| u.username_matches(username)).cloned())
            .ok_or(AppError::InvalidCredentials)?;

        if !candidate.active {
            return Err(AppError::UserInactive);
        }

        // Executa a verificação em um thread separado
        if !verify_password(password.trim(), &candidate.password_hash).await? {
            return Err(AppError::InvalidCredentials);
        }

        self.ctx.write(|s| s.current_user_id = Some(candidate.id.clone()));
        self.ctx.persist_auth();
        tracing::info!("✅ Sessão iniciada para {}", candidate.username);
        Ok(candidate)
    }

    pub fn logout(&self) {
        self.ctx.write(|s| s.current_user_id = None);
        self.ctx.persist_auth();
    }

    fn require_super_admin(&self) -> Result<AuthUser, AppError> {
        let actor = self.current_user().ok_or(AppError::NotAuthenticated)?;
        if !actor.is_super_admin() {
            return Err(AppError::Forbidden("superAdmin".to_string()));
        }
        Ok(actor)
    }

    fn username_taken(&self, username: &str, except_id: Option<&str>) -> bool {
        self.ctx.read(|s| {
            s.users
                .iter()
                .any(|u| Some(u.id.as_str()) != except_id && u.username_matches(username))
        })
    }

    /// Cria a conta no backend e só então a adiciona localmente.
    pub async fn create_user(&self, payload: NewUserPayload) -> Result<AuthUser, AppError> {
        self.require_super_admin()?;

        let payload = NewUserPayload {
            username: payload.username.trim().to_string(),
            password: payload.password.trim().to_string(),
            ..payload
        };
        if payload.username.is_empty() || payload.password.is_empty() {
            return Err(AppError::MissingCredentials);
        }
        payload.validate()?;
        if self.username_taken(&payload.username, None) {
            return Err(AppError::UsernameAlreadyExists(payload.username));
        }

        let password_hash = hash_password(&payload.password, self.ctx.config.bcrypt_cost).await?;
        let now = self.ctx.now();
        let local = sanitize_auth_user(AuthUser {
            id: format!("auth-{}", now.timestamp_millis()),
            username: payload.username.clone(),
            full_name: payload.full_name.clone().unwrap_or_else(|| payload.username.clone()),
            password_hash,
            role: payload.role,
            pages: payload.pages.clone(),
            permissions: payload.permissions.clone(),
            active: true,
            profile: UserProfile {
                id: format!("user-{}", now.timestamp_millis()),
                first_name: payload.username.clone(),
                role: payload.role.label().to_string(),
                email_signature_use_default: true,
                ..UserProfile::default()
            },
            notification_preferences: NotificationPreferences::default(),
            company_id: payload.company_id.clone(),
        });

        let created = self
            .ctx
            .backend
            .users()
            .create(&UserDto::from_entity(&local))
            .await
            .into_result()
            .map_err(|e| match e {
                AppError::Remote(message) if is_conflict(&message) => {
                    AppError::UsernameAlreadyExists(payload.username.clone())
                }
                other => other,
            })?;

        let mut user = match created {
            Some(remote) => sanitize_auth_user(remote.into_entity(Some(&local))),
            None => local.clone(),
        };
        if user.id.is_empty() {
            user.id = local.id.clone();
        }
        // Um usuário novo nunca herda a foto de outro
        user.profile.avatar_url = None;

        self.ctx.write(|s| s.users.push(user.clone()));
        self.ctx.persist_auth();
        tracing::info!("✅ Usuário {} criado", user.username);
        Ok(user)
    }

    pub fn update_user_account(
        &self,
        user_id: &str,
        patch: UserAccountPatch,
    ) -> Result<(AuthUser, SyncTicket), AppError> {
        self.require_super_admin()?;
        if let Some(username) = patch.username.as_deref() {
            if username.trim().is_empty() {
                return Err(AppError::MissingCredentials);
            }
            if self.username_taken(username, Some(user_id)) {
                return Err(AppError::UsernameAlreadyExists(username.trim().to_string()));
            }
        }

        let updated = self.ctx.write(|s| {
            let user = s.users.get_mut(user_id)?;
            let mut next = user.clone();
            if let Some(username) = patch.username {
                next.username = username;
            }
            if let Some(full_name) = patch.full_name {
                next.full_name = full_name;
            }
            if let Some(role) = patch.role {
                next.role = role;
                next.profile.role = role.label().to_string();
            }
            if let Some(pages) = patch.pages {
                next.pages = pages;
            }
            if let Some(permissions) = patch.permissions {
                next.permissions = permissions;
            }
            if let Some(company_id) = patch.company_id {
                next.company_id = company_id;
            }
            *user = sanitize_auth_user(next);
            Some(user.clone())
        });
        let user = updated.ok_or_else(|| AppError::not_found("Usuário", user_id))?;
        self.ctx.persist_auth();
        let ticket = sync::push::<AuthUser>(&self.ctx, SyncAction::Update, &user.id);
        Ok((user, ticket))
    }

    /// Desativar a própria conta encerra a sessão.
    pub fn set_user_active_state(&self, user_id: &str, active: bool) -> Result<(AuthUser, SyncTicket), AppError> {
        self.require_super_admin()?;
        let updated = self.ctx.write(|s| {
            let user = s.users.get_mut(user_id)?;
            user.active = active;
            let user = user.clone();
            if !active && s.current_user_id.as_deref() == Some(user_id) {
                s.current_user_id = None;
            }
            Some(user)
        });
        let user = updated.ok_or_else(|| AppError::not_found("Usuário", user_id))?;
        self.ctx.persist_auth();
        let ticket = sync::push::<AuthUser>(&self.ctx, SyncAction::Update, &user.id);
        Ok((user, ticket))
    }

    pub async fn reset_user_password(&self, user_id: &str, password: &str) -> Result<SyncTicket, AppError> {
        self.require_super_admin()?;
        let password = password.trim();
        if password.is_empty() {
            return Err(AppError::MissingCredentials);
        }
        if !self.ctx.read(|s| s.users.contains(user_id)) {
            return Err(AppError::not_found("Usuário", user_id));
        }

        let password_hash = hash_password(password, self.ctx.config.bcrypt_cost).await?;
        let found = self.ctx.write(|s| match s.users.get_mut(user_id) {
            Some(user) => {
                user.password_hash = password_hash;
                true
            }
            None => false,
        });
        if !found {
            return Err(AppError::not_found("Usuário", user_id));
        }
        self.ctx.persist_auth();
        Ok(sync::push::<AuthUser>(&self.ctx, SyncAction::Update, user_id))
    }

    pub fn delete_user(&self, user_id: &str) -> Result<SyncTicket, AppError> {
        let actor = self.require_super_admin()?;
        if actor.id == user_id {
            return Err(AppError::CannotDeleteSelf);
        }
        let removed = self.ctx.write(|s| {
            let target = s.users.get(user_id)?;
            if target.id == DEFAULT_ADMIN_ID && target.username.eq_ignore_ascii_case(DEFAULT_ADMIN_USERNAME) {
                return Some(Err(AppError::CannotDeleteDefaultAdmin));
            }
            s.users.remove(user_id);
            if s.current_user_id.as_deref() == Some(user_id) {
                s.current_user_id = None;
            }
            Some(Ok(()))
        });
        match removed {
            None => return Err(AppError::not_found("Usuário", user_id)),
            Some(Err(e)) => return Err(e),
            Some(Ok(())) => {}
        }
        self.ctx.persist_auth();
        Ok(sync::push::<AuthUser>(&self.ctx, SyncAction::Delete, user_id))
    }

    /// Perfil do usuário corrente (apenas local).
    pub fn update_profile(&self, patch: ProfilePatch) -> Result<AuthUser, AppError> {
        let updated = self.ctx.write(|s| {
            let id = s.current_user_id.clone()?;
            let user = s.users.get_mut(&id)?;
            let profile = &mut user.profile;
            if let Some(v) = patch.first_name {
                profile.first_name = v;
            }
            if let Some(v) = patch.last_name {
                profile.last_name = v;
            }
            if let Some(v) = patch.email {
                profile.email = v;
            }
            if let Some(v) = patch.phone {
                profile.phone = v;
            }
            if let Some(v) = patch.avatar_url {
                profile.avatar_url = v;
            }
            if let Some(v) = patch.email_signature_html {
                profile.email_signature_html = v;
            }
            if let Some(v) = patch.email_signature_use_default {
                profile.email_signature_use_default = v;
            }
            let display = format!("{} {}", profile.first_name, profile.last_name).trim().to_string();
            if !display.is_empty() {
                user.full_name = display;
            }
            if let Some(company_id) = patch.company_id {
                user.company_id = company_id;
            }
            *user = sanitize_auth_user(user.clone());
            Some(user.clone())
        });
        let user = updated.ok_or(AppError::NotAuthenticated)?;
        self.ctx.persist_auth();
        Ok(user)
    }

    pub fn update_notification_preferences(
        &self,
        patch: NotificationPreferencesPatch,
    ) -> Result<NotificationPreferences, AppError> {
        let updated = self.ctx.write(|s| {
            let id = s.current_user_id.clone()?;
            let prefs = &mut s.users.get_mut(&id)?.notification_preferences;
            if let Some(v) = patch.email_alerts {
                prefs.email_alerts = v;
            }
            if let Some(v) = patch.internal_alerts {
                prefs.internal_alerts = v;
            }
            if let Some(v) = patch.sms_alerts {
                prefs.sms_alerts = v;
            }
            Some(prefs.clone())
        });
        let prefs = updated.ok_or(AppError::NotAuthenticated)?;
        self.ctx.persist_auth();
        Ok(prefs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(role: UserRole, pages: &[&str]) -> AuthUser {
        AuthUser {
            id: "u1".into(),
            username: "  Marie ".into(),
            full_name: " ".into(),
            password_hash: String::new(),
            role,
            pages: pages.iter().map(|p| p.to_string()).collect(),
            permissions: Vec::new(),
            active: true,
            profile: UserProfile::default(),
            notification_preferences: NotificationPreferences::default(),
            company_id: None,
        }
    }

    #[test]
    fn super_admin_without_lists_gets_the_wildcard() {
        let user = sanitize_auth_user(account(UserRole::SuperAdmin, &[]));
        assert_eq!(user.pages, vec!["*".to_string()]);
        assert_eq!(user.permissions, vec!["*".to_string()]);
        assert_eq!(user.username, "Marie");
        assert_eq!(user.full_name, "Marie");
    }

    #[test]
    fn agents_keep_empty_lists() {
        let user = sanitize_auth_user(account(UserRole::Agent, &["clients", "clients", "bogus"]));
        assert_eq!(user.pages, vec!["clients".to_string()]);
        assert!(user.permissions.is_empty());
    }

    #[tokio::test]
    async fn bcrypt_round_trip_and_garbage_hashes() {
        let hashed = hash_password("s3cret", 4).await.unwrap();
        assert!(verify_password("s3cret", &hashed).await.unwrap());
        assert!(!verify_password("other", &hashed).await.unwrap());
        assert!(!verify_password("s3cret", "not-a-hash").await.unwrap());
    }

    #[cfg(feature = "offline-demo")]
    #[test]
    fn legacy_hash_matches_stored_values() {
        assert_eq!(legacy::hash("admin"), "fnv1a:7330bf8b");
        // NFKC: a ligadura "ﬁ" vira "fi"
        assert_eq!(legacy::hash("\u{FB01}"), legacy::hash("fi"));
    }

    #[cfg(not(feature = "offline-demo"))]
    #[tokio::test]
    async fn legacy_hashes_never_verify_without_the_feature() {
        assert!(!verify_password("admin", "fnv1a:7330bf8b").await.unwrap());
    }
}
