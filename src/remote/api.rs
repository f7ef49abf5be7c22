// src/remote/api.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::error::AppError;
use crate::models::settings::Backpack;
use crate::remote::dto::{
    AppointmentDto, CategoryDto, ClientDto, CompanyDto, LeadDto, PricingGridDto, ServiceDto,
    SubscriptionDto, UserDto,
};

/// Envelope de toda resposta do backend: `{success, data?, error?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResult<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn ok_empty() -> Self {
        Self { success: true, data: None, error: None }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(message.into()) }
    }

    /// `success = false` vira `AppError::Remote` com a mensagem do servidor.
    pub fn into_result(self) -> Result<Option<T>, AppError> {
        if self.success {
            Ok(self.data)
        } else {
            Err(AppError::Remote(
                self.error.unwrap_or_else(|| "Resposta sem sucesso do backend".to_string()),
            ))
        }
    }
}

/// DTOs que o backend guarda e identifica.
pub trait RemoteRecord: Clone + Send + Sync + 'static {
    fn remote_id(&self) -> &str;
    fn set_remote_id(&mut self, id: String);

    /// Empresa dona do registro, quando a família é escopada por empresa.
    fn owner_company(&self) -> Option<&str> {
        None
    }
}

/// Um recurso REST: `POST /`, `PUT /{id}`, `DELETE /{id}`, `GET /`.
#[async_trait]
pub trait RemoteApi<D: RemoteRecord>: Send + Sync {
    async fn create(&self, dto: &D) -> ApiResult<D>;
    async fn update(&self, id: &str, dto: &D) -> ApiResult<D>;
    async fn delete(&self, id: &str) -> ApiResult<()>;
    async fn get_all(&self) -> ApiResult<Vec<D>>;
}

/// O backend completo, uma API por família.
#[async_trait]
pub trait Backend: Send + Sync {
    fn clients(&self) -> &dyn RemoteApi<ClientDto>;
    fn leads(&self) -> &dyn RemoteApi<LeadDto>;
    fn services(&self) -> &dyn RemoteApi<ServiceDto>;
    fn appointments(&self) -> &dyn RemoteApi<AppointmentDto>;
    fn companies(&self) -> &dyn RemoteApi<CompanyDto>;
    fn users(&self) -> &dyn RemoteApi<UserDto>;
    fn subscriptions(&self) -> &dyn RemoteApi<SubscriptionDto>;
    fn categories(&self) -> &dyn RemoteApi<CategoryDto>;

    /// Empresa enviada nas próximas chamadas (o cabeçalho de empresa do cliente HTTP).
    fn set_company_scope(&self, company_id: Option<&str>);

    async fn backpack(&self, company_id: &str) -> ApiResult<Backpack>;

    async fn update_pricing_grid(
        &self,
        client_id: &str,
        grid: &PricingGridDto,
    ) -> ApiResult<PricingGridDto>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_envelope_becomes_remote_error() {
        let failed: ApiResult<u32> = ApiResult::err("HTTP 500");
        match failed.into_result() {
            Err(AppError::Remote(message)) => assert_eq!(message, "HTTP 500"),
            other => panic!("esperado erro remoto, obtido {:?}", other),
        }

        let bare: ApiResult<u32> = ApiResult { success: false, data: None, error: None };
        assert!(bare.into_result().is_err());
        assert_eq!(ApiResult::ok(3).into_result().unwrap(), Some(3));
    }

    #[test]
    fn envelope_parses_backend_json() {
        let raw = r#"{"success":true,"data":[1,2],"error":null}"#;
        let parsed: ApiResult<Vec<u32>> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data, Some(vec![1, 2]));
    }
}
