use std::collections::HashMap;

use thiserror::Error;

// Nosso tipo de erro único, com `thiserror` para a ergonomia do `?`.
// Validações síncronas devolvem estas variantes antes de qualquer mutação;
// falhas remotas só aparecem dentro das tarefas de sincronização.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // Mapa campo -> código, como no motor de validação do CRM
    #[error("Campos inválidos: {0:?}")]
    InvalidFields(HashMap<String, String>),

    #[error("Já existe um lead com este e-mail")]
    DuplicateLeadEmail,

    #[error("Já existe um lead com este telefone")]
    DuplicateLeadPhone,

    #[error("Identificador já existe: {0}")]
    UsernameAlreadyExists(String),

    #[error("Identificador e senha são obrigatórios")]
    MissingCredentials,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Usuário inativo")]
    UserInactive,

    #[error("Nenhum usuário autenticado")]
    NotAuthenticated,

    #[error("Permissão necessária: {0}")]
    Forbidden(String),

    #[error("Você não pode excluir a sua própria conta")]
    CannotDeleteSelf,

    #[error("O administrador padrão não pode ser excluído")]
    CannotDeleteDefaultAdmin,

    #[error("{entity} não encontrado: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Não foi possível gerar um número de fatura único após {0} tentativas")]
    InvoiceNumberExhausted(u32),

    #[error("Operação pendente {0} não está em falha")]
    OperationNotFailed(u64),

    // Resposta `{success: false, error}` do backend remoto
    #[error("Erro do backend: {0}")]
    Remote(String),

    #[error("Erro de armazenamento: {0}")]
    StorageError(#[from] std::io::Error),

    #[error("Erro de serialização: {0}")]
    SerializationError(#[from] serde_json::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound { entity, id: id.into() }
    }

    /// Código estável para a UI renderizar mensagens inline.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) | AppError::InvalidFields(_) => "validation",
            AppError::DuplicateLeadEmail => "duplicate_email",
            AppError::DuplicateLeadPhone => "duplicate_phone",
            AppError::UsernameAlreadyExists(_) => "username_taken",
            AppError::MissingCredentials => "missing_credentials",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::UserInactive => "user_inactive",
            AppError::NotAuthenticated => "not_authenticated",
            AppError::Forbidden(_) => "forbidden",
            AppError::CannotDeleteSelf => "cannot_delete_self",
            AppError::CannotDeleteDefaultAdmin => "cannot_delete_default_admin",
            AppError::NotFound { .. } => "not_found",
            AppError::InvoiceNumberExhausted(_) => "invoice_number_exhausted",
            AppError::OperationNotFailed(_) => "operation_not_failed",
            AppError::Remote(_) => "remote",
            ref e => {
                tracing::error!("Erro interno do store: {}", e);
                "internal"
            }
        }
    }

    /// Detalhes por campo, no mesmo formato que os erros do `validator`.
    pub fn field_details(&self) -> HashMap<String, Vec<String>> {
        let mut details = HashMap::new();
        match self {
            AppError::ValidationError(errors) => {
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
            }
            AppError::InvalidFields(fields) => {
                for (field, code) in fields {
                    details.insert(field.clone(), vec![code.clone()]);
                }
            }
            _ => {}
        }
        details
    }
}

/// Respostas do backend contam "não encontrado" como sucesso na exclusão.
pub fn is_not_found_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("404") || lowered.contains("not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Payload {
        #[validate(length(min = 1, message = "obrigatório"))]
        name: String,
    }

    #[test]
    fn validation_details_keep_messages_per_field() {
        let err: AppError = Payload { name: String::new() }.validate().unwrap_err().into();
        assert_eq!(err.code(), "validation");
        assert_eq!(err.field_details()["name"], vec!["obrigatório".to_string()]);
    }

    #[test]
    fn not_found_detection_is_case_insensitive() {
        assert!(is_not_found_message("HTTP 404"));
        assert!(is_not_found_message("Appointment Not Found"));
        assert!(!is_not_found_message("500 internal"));
    }
}
