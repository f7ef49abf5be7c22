// src/models/auth.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Wildcard que libera todas as páginas/permissões.
pub const WILDCARD: &str = "*";

/// Id reservado do administrador criado no primeiro arranque.
pub const DEFAULT_ADMIN_ID: &str = "auth-admin";
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UserRole {
    #[serde(rename = "superAdmin")]
    SuperAdmin,
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "manager")]
    Manager,
    #[default]
    #[serde(rename = "agent")]
    Agent,
    #[serde(rename = "lecture")]
    ReadOnly,
}

impl UserRole {
    pub fn label(self) -> &'static str {
        match self {
            UserRole::SuperAdmin => "Super administrateur",
            UserRole::Admin => "Administrateur",
            UserRole::Manager => "Manager",
            UserRole::Agent => "Agent",
            UserRole::ReadOnly => "Lecture seule",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub role: String,
    pub avatar_url: Option<String>,
    pub email_signature_html: String,
    pub email_signature_use_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationPreferences {
    pub email_alerts: bool,
    pub internal_alerts: bool,
    pub sms_alerts: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self { email_alerts: true, internal_alerts: true, sms_alerts: false }
    }
}

// Representa um usuário local. Só guarda o hash, nunca a senha.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: UserRole,
    pub pages: Vec<String>,
    pub permissions: Vec<String>,
    pub active: bool,
    #[serde(default)]
    pub profile: UserProfile,
    #[serde(default)]
    pub notification_preferences: NotificationPreferences,
    pub company_id: Option<String>,
}

impl AuthUser {
    pub fn is_super_admin(&self) -> bool {
        self.role == UserRole::SuperAdmin
    }

    pub fn username_matches(&self, username: &str) -> bool {
        self.username.to_lowercase() == username.trim().to_lowercase()
    }
}

// Dados para criação de conta (senha em claro só até o hash)
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewUserPayload {
    #[validate(length(min = 1, message = "O identificador é obrigatório."))]
    pub username: String,
    #[validate(length(min = 1, message = "A senha é obrigatória."))]
    pub password: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub pages: Vec<String>,
    pub permissions: Vec<String>,
    pub company_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccountPatch {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<UserRole>,
    pub pages: Option<Vec<String>>,
    pub permissions: Option<Vec<String>>,
    pub company_id: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<Option<String>>,
    pub email_signature_html: Option<String>,
    pub email_signature_use_default: Option<bool>,
    pub company_id: Option<Option<String>>,
}

/// Sessão persistida: usuários (apenas hashes) e o usuário corrente.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub auth_users: Vec<AuthUser>,
    pub current_user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferencesPatch {
    pub email_alerts: Option<bool>,
    pub internal_alerts: Option<bool>,
    pub sms_alerts: Option<bool>,
}
