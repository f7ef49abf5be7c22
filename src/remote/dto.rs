// src/remote/dto.rs

// DTOs do backend (snake_case, dinheiro em float de unidade maior) e o mapper
// explícito de cada entidade. Nada de spread implícito: todo campo é listado.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::money::Money;
use crate::models::{
    auth::{AuthUser, NotificationPreferences, UserProfile, UserRole},
    catalog::{Category, Service, ServiceOption},
    client::{
        Client, ClientContact, ClientPricingGrid, ClientStatus, ClientType, ContactRole,
        PricingGridItem,
    },
    company::Company,
    engagement::{
        Engagement, EngagementKind, EngagementLine, EngagementStatus, OptionOverride,
        OptionOverrides, QuoteStatus, SendRecord, SupportType,
    },
    lead::{Lead, LeadActivity, LeadActivityKind, LeadStatus},
    subscription::{Subscription, SubscriptionFrequency, SubscriptionStatus},
};
use crate::remote::api::RemoteRecord;

/// Mapper bidirecional entidade local <-> DTO remoto.
pub trait EntityMapper: RemoteRecord {
    type Entity;

    fn from_entity(entity: &Self::Entity) -> Self;

    /// `local` fornece o que o servidor não devolve (atividades, hash, ...).
    fn into_entity(self, local: Option<&Self::Entity>) -> Self::Entity;
}

fn money_to_remote(value: Money) -> f64 {
    value.to_major()
}

fn money_from_remote(value: f64) -> Money {
    Money::from_major(value)
}

macro_rules! remote_record {
    ($ty:ty) => {
        impl RemoteRecord for $ty {
            fn remote_id(&self) -> &str {
                &self.id
            }
            fn set_remote_id(&mut self, id: String) {
                self.id = id;
            }
        }
    };
    ($ty:ty, scoped) => {
        impl RemoteRecord for $ty {
            fn remote_id(&self) -> &str {
                &self.id
            }
            fn set_remote_id(&mut self, id: String) {
                self.id = id;
            }
            fn owner_company(&self) -> Option<&str> {
                self.company_id.as_deref()
            }
        }
    };
}

// ==========================================
// CLIENTES
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactDto {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub mobile: String,
    #[serde(default)]
    pub roles: Vec<ContactRole>,
    #[serde(default)]
    pub is_billing_default: bool,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingItemDto {
    pub service_id: String,
    pub service_option_id: String,
    pub default_price_ht: f64,
    pub custom_price_ht: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingGridDto {
    #[serde(default)]
    pub pricing_items: Vec<PricingItemDto>,
}

impl PricingGridDto {
    pub fn from_grid(grid: &ClientPricingGrid) -> Self {
        Self {
            pricing_items: grid
                .pricing_items
                .iter()
                .map(|item| PricingItemDto {
                    service_id: item.service_id.clone(),
                    service_option_id: item.service_option_id.clone(),
                    default_price_ht: money_to_remote(item.default_price_ht),
                    custom_price_ht: item.custom_price_ht.map(money_to_remote),
                })
                .collect(),
        }
    }

    pub fn into_grid(self) -> ClientPricingGrid {
        ClientPricingGrid {
            pricing_items: self
                .pricing_items
                .into_iter()
                .map(|item| PricingGridItem {
                    service_id: item.service_id,
                    service_option_id: item.service_option_id,
                    default_price_ht: money_from_remote(item.default_price_ht),
                    custom_price_ht: item.custom_price_ht.map(money_from_remote),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDto {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub client_type: ClientType,
    pub name: String,
    pub company_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub siret: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub status: ClientStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    pub last_service: Option<DateTime<Utc>>,
    #[serde(default)]
    pub contacts: Vec<ContactDto>,
    pub pricing_grid: Option<PricingGridDto>,
    pub next_action_date: Option<NaiveDate>,
    pub next_action_note: Option<String>,
    pub company_id: Option<String>,
}

remote_record!(ClientDto, scoped);

impl EntityMapper for ClientDto {
    type Entity = Client;

    fn from_entity(client: &Client) -> Self {
        Self {
            id: client.id.clone(),
            client_type: client.client_type,
            name: client.name.clone(),
            company_name: client.company_name.clone(),
            first_name: client.first_name.clone(),
            last_name: client.last_name.clone(),
            siret: client.siret.clone(),
            email: client.email.clone(),
            phone: client.phone.clone(),
            address: client.address.clone(),
            city: client.city.clone(),
            status: client.status,
            tags: client.tags.clone(),
            last_service: client.last_service,
            contacts: client
                .contacts
                .iter()
                .map(|c| ContactDto {
                    id: c.id.clone(),
                    first_name: c.first_name.clone(),
                    last_name: c.last_name.clone(),
                    email: c.email.clone(),
                    mobile: c.mobile.clone(),
                    roles: c.roles.clone(),
                    is_billing_default: c.is_billing_default,
                    active: c.active,
                })
                .collect(),
            pricing_grid: client.pricing_grid.as_ref().map(PricingGridDto::from_grid),
            next_action_date: client.next_action_date,
            next_action_note: client.next_action_note.clone(),
            company_id: client.company_id.clone(),
        }
    }

    fn into_entity(self, local: Option<&Client>) -> Client {
        Client {
            id: self.id,
            client_type: self.client_type,
            name: self.name,
            company_name: self.company_name,
            first_name: self.first_name,
            last_name: self.last_name,
            siret: self.siret,
            email: self.email,
            phone: self.phone,
            address: self.address,
            city: self.city,
            status: self.status,
            tags: self.tags,
            last_service: self.last_service,
            contacts: self
                .contacts
                .into_iter()
                .map(|c| ClientContact {
                    id: c.id,
                    first_name: c.first_name,
                    last_name: c.last_name,
                    email: c.email,
                    mobile: c.mobile,
                    roles: c.roles,
                    is_billing_default: c.is_billing_default,
                    active: c.active,
                })
                .collect(),
            pricing_grid: self
                .pricing_grid
                .map(PricingGridDto::into_grid)
                .or_else(|| local.and_then(|l| l.pricing_grid.clone())),
            next_action_date: self.next_action_date,
            next_action_note: self.next_action_note,
            company_id: self.company_id,
        }
    }
}

// ==========================================
// LEADS
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadActivityDto {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LeadActivityKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadDto {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub segment: String,
    #[serde(default)]
    pub status: LeadStatus,
    pub next_step_date: Option<NaiveDate>,
    #[serde(default)]
    pub next_step_note: String,
    pub last_contact: Option<DateTime<Utc>>,
    pub estimated_value: Option<f64>,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub address: Option<String>,
    pub company_id: Option<String>,
    pub support_type: Option<SupportType>,
    pub support_detail: Option<String>,
    pub siret: Option<String>,
    pub client_type: Option<ClientType>,
    pub created_at: Option<DateTime<Utc>>,
    // Ausente quando o servidor não guarda atividades
    pub activities: Option<Vec<LeadActivityDto>>,
}

remote_record!(LeadDto, scoped);

impl EntityMapper for LeadDto {
    type Entity = Lead;

    fn from_entity(lead: &Lead) -> Self {
        Self {
            id: lead.id.clone(),
            company: lead.company.clone(),
            contact: lead.contact.clone(),
            phone: lead.phone.clone(),
            email: lead.email.clone(),
            source: lead.source.clone(),
            segment: lead.segment.clone(),
            status: lead.status,
            next_step_date: lead.next_step_date,
            next_step_note: lead.next_step_note.clone(),
            last_contact: lead.last_contact,
            estimated_value: lead.estimated_value.map(money_to_remote),
            owner: lead.owner.clone(),
            tags: lead.tags.clone(),
            address: lead.address.clone(),
            company_id: lead.company_id.clone(),
            support_type: lead.support_type,
            support_detail: lead.support_detail.clone(),
            siret: lead.siret.clone(),
            client_type: lead.client_type,
            created_at: Some(lead.created_at),
            activities: Some(
                lead.activities
                    .iter()
                    .map(|a| LeadActivityDto {
                        id: a.id.clone(),
                        kind: a.kind,
                        content: a.content.clone(),
                        created_at: a.created_at,
                    })
                    .collect(),
            ),
        }
    }

    fn into_entity(self, local: Option<&Lead>) -> Lead {
        let activities = match self.activities {
            Some(activities) => activities
                .into_iter()
                .map(|a| LeadActivity { id: a.id, kind: a.kind, content: a.content, created_at: a.created_at })
                .collect(),
            None => local.map(|l| l.activities.clone()).unwrap_or_default(),
        };
        Lead {
            id: self.id,
            company: self.company,
            contact: self.contact,
            phone: self.phone,
            email: self.email,
            source: self.source,
            segment: self.segment,
            status: self.status,
            next_step_date: self.next_step_date,
            next_step_note: self.next_step_note,
            last_contact: self.last_contact,
            estimated_value: self.estimated_value.map(money_from_remote),
            owner: self.owner,
            tags: self.tags,
            address: self.address,
            company_id: self.company_id,
            support_type: self.support_type,
            support_detail: self.support_detail,
            siret: self.siret,
            client_type: self.client_type,
            created_at: self
                .created_at
                .or_else(|| local.map(|l| l.created_at))
                .unwrap_or_default(),
            activities,
        }
    }
}

// ==========================================
// CATÁLOGO
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOptionDto {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    #[serde(default)]
    pub default_duration_min: u32,
    #[serde(default)]
    pub unit_price_ht: f64,
    pub tva_pct: Option<Decimal>,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDto {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub category: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub options: Vec<ServiceOptionDto>,
    #[serde(default)]
    pub active: bool,
    pub base_price: Option<f64>,
    pub base_duration: Option<u32>,
}

remote_record!(ServiceDto);

impl EntityMapper for ServiceDto {
    type Entity = Service;

    fn from_entity(service: &Service) -> Self {
        Self {
            id: service.id.clone(),
            category: service.category.clone(),
            name: service.name.clone(),
            description: service.description.clone(),
            options: service
                .options
                .iter()
                .map(|o| ServiceOptionDto {
                    id: o.id.clone(),
                    label: o.label.clone(),
                    description: o.description.clone(),
                    default_duration_min: o.default_duration_min,
                    unit_price_ht: money_to_remote(o.unit_price_ht),
                    tva_pct: o.tva_pct,
                    active: o.active,
                })
                .collect(),
            active: service.active,
            base_price: service.base_price.map(money_to_remote),
            base_duration: service.base_duration,
        }
    }

    fn into_entity(self, _local: Option<&Service>) -> Service {
        Service {
            id: self.id,
            category: self.category,
            name: self.name,
            description: self.description,
            options: self
                .options
                .into_iter()
                .map(|o| ServiceOption {
                    id: o.id,
                    label: o.label,
                    description: o.description,
                    default_duration_min: o.default_duration_min,
                    unit_price_ht: money_from_remote(o.unit_price_ht),
                    tva_pct: o.tva_pct,
                    active: o.active,
                })
                .collect(),
            active: self.active,
            base_price: self.base_price.map(money_from_remote),
            base_duration: self.base_duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDto {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub active: bool,
    pub parent_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub price_ht: Option<f64>,
    pub default_duration_min: Option<u32>,
}

remote_record!(CategoryDto);

impl EntityMapper for CategoryDto {
    type Entity = Category;

    fn from_entity(category: &Category) -> Self {
        Self {
            id: category.id.clone(),
            name: category.name.clone(),
            description: category.description.clone(),
            active: category.active,
            parent_id: category.parent_id.clone(),
            created_at: Some(category.created_at),
            updated_at: Some(category.updated_at),
            price_ht: category.price_ht.map(money_to_remote),
            default_duration_min: category.default_duration_min,
        }
    }

    fn into_entity(self, local: Option<&Category>) -> Category {
        Category {
            id: self.id,
            name: self.name,
            description: self.description,
            active: self.active,
            parent_id: self.parent_id,
            created_at: self.created_at.or_else(|| local.map(|l| l.created_at)).unwrap_or_default(),
            updated_at: self.updated_at.or_else(|| local.map(|l| l.updated_at)).unwrap_or_default(),
            price_ht: self.price_ht.map(money_from_remote),
            default_duration_min: self.default_duration_min,
        }
    }
}

// ==========================================
// AGENDAMENTOS (ENGAGEMENTS)
// ==========================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideDto {
    pub quantity: Option<u32>,
    pub unit_price_ht: Option<f64>,
    pub duration_min: Option<u32>,
}

fn overrides_to_remote(overrides: &OptionOverrides) -> BTreeMap<String, OverrideDto> {
    overrides
        .iter()
        .map(|(id, o)| {
            let dto = OverrideDto {
                quantity: o.quantity,
                unit_price_ht: o.unit_price_ht.map(money_to_remote),
                duration_min: o.duration_min,
            };
            (id.clone(), dto)
        })
        .collect()
}

fn overrides_from_remote(overrides: BTreeMap<String, OverrideDto>) -> OptionOverrides {
    overrides
        .into_iter()
        .map(|(id, o)| {
            let value = OptionOverride {
                quantity: o.quantity,
                unit_price_ht: o.unit_price_ht.map(money_from_remote),
                duration_min: o.duration_min,
            };
            (id, value)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentLineDto {
    pub service_id: String,
    #[serde(default)]
    pub option_ids: Vec<String>,
    #[serde(default)]
    pub option_overrides: BTreeMap<String, OverrideDto>,
    pub support_type: Option<SupportType>,
    pub support_detail: Option<String>,
    pub main_category_id: Option<String>,
    pub sub_category_id: Option<String>,
    pub additional_charge: Option<f64>,
    pub quantity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendRecordDto {
    pub id: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub contact_ids: Vec<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentDto {
    #[serde(default)]
    pub id: String,
    pub client_id: String,
    pub company_id: Option<String>,
    #[serde(default)]
    pub service_id: String,
    // `scheduledAt` local
    pub date: DateTime<Utc>,
    pub start_time: Option<String>,
    #[serde(default)]
    pub status: EngagementStatus,
    #[serde(default)]
    pub kind: EngagementKind,
    #[serde(default)]
    pub option_ids: Vec<String>,
    #[serde(default)]
    pub option_overrides: BTreeMap<String, OverrideDto>,
    pub support_type: Option<SupportType>,
    pub support_detail: Option<String>,
    pub additional_charge: Option<f64>,
    #[serde(default)]
    pub contact_ids: Vec<String>,
    #[serde(default)]
    pub assigned_user_ids: Vec<String>,
    pub send_history: Option<Vec<SendRecordDto>>,
    pub invoice_number: Option<String>,
    pub invoice_vat_enabled: Option<bool>,
    pub quote_number: Option<String>,
    pub quote_status: Option<QuoteStatus>,
    pub quote_name: Option<String>,
    pub mobile_duration_minutes: Option<u32>,
    pub mobile_completion_comment: Option<String>,
    pub planning_user: Option<String>,
    pub main_category_id: Option<String>,
    pub sub_category_id: Option<String>,
    pub services: Option<Vec<AppointmentLineDto>>,
}

remote_record!(AppointmentDto, scoped);

impl EntityMapper for AppointmentDto {
    type Entity = Engagement;

    fn from_entity(e: &Engagement) -> Self {
        Self {
            id: e.id.clone(),
            client_id: e.client_id.clone(),
            company_id: e.company_id.clone(),
            service_id: e.service_id.clone(),
            date: e.scheduled_at,
            start_time: e.start_time.clone(),
            status: e.status,
            kind: e.kind,
            option_ids: e.option_ids.clone(),
            option_overrides: overrides_to_remote(&e.option_overrides),
            support_type: Some(e.support_type),
            support_detail: Some(e.support_detail.clone()),
            additional_charge: e.additional_charge.map(money_to_remote),
            contact_ids: e.contact_ids.clone(),
            assigned_user_ids: e.assigned_user_ids.clone(),
            send_history: Some(
                e.send_history
                    .iter()
                    .map(|s| SendRecordDto {
                        id: s.id.clone(),
                        sent_at: s.sent_at,
                        contact_ids: s.contact_ids.clone(),
                        subject: s.subject.clone(),
                    })
                    .collect(),
            ),
            invoice_number: e.invoice_number.clone(),
            invoice_vat_enabled: e.invoice_vat_enabled,
            quote_number: e.quote_number.clone(),
            quote_status: e.quote_status,
            quote_name: e.quote_name.clone(),
            mobile_duration_minutes: e.mobile_duration_minutes,
            mobile_completion_comment: e.mobile_completion_comment.clone(),
            planning_user: e.planning_user.clone(),
            main_category_id: e.main_category_id.clone(),
            sub_category_id: e.sub_category_id.clone(),
            services: if e.services.is_empty() {
                None
            } else {
                Some(
                    e.services
                        .iter()
                        .map(|line| AppointmentLineDto {
                            service_id: line.service_id.clone(),
                            option_ids: line.option_ids.clone(),
                            option_overrides: overrides_to_remote(&line.option_overrides),
                            support_type: line.support_type,
                            support_detail: line.support_detail.clone(),
                            main_category_id: line.main_category_id.clone(),
                            sub_category_id: line.sub_category_id.clone(),
                            additional_charge: line.additional_charge.map(money_to_remote),
                            quantity: line.quantity,
                        })
                        .collect(),
                )
            },
        }
    }

    fn into_entity(self, local: Option<&Engagement>) -> Engagement {
        let send_history = match self.send_history {
            Some(history) => history
                .into_iter()
                .map(|s| SendRecord { id: s.id, sent_at: s.sent_at, contact_ids: s.contact_ids, subject: s.subject })
                .collect(),
            None => local.map(|l| l.send_history.clone()).unwrap_or_default(),
        };
        let services = match self.services {
            Some(lines) => lines
                .into_iter()
                .map(|line| EngagementLine {
                    service_id: line.service_id,
                    option_ids: line.option_ids,
                    option_overrides: overrides_from_remote(line.option_overrides),
                    support_type: line.support_type,
                    support_detail: line.support_detail,
                    main_category_id: line.main_category_id,
                    sub_category_id: line.sub_category_id,
                    additional_charge: line.additional_charge.map(money_from_remote),
                    quantity: line.quantity,
                })
                .collect(),
            None => local.map(|l| l.services.clone()).unwrap_or_default(),
        };

        Engagement {
            id: self.id,
            client_id: self.client_id,
            company_id: self.company_id,
            service_id: self.service_id,
            option_ids: self.option_ids,
            option_overrides: overrides_from_remote(self.option_overrides),
            scheduled_at: self.date,
            status: self.status,
            kind: self.kind,
            support_type: self.support_type.or_else(|| local.map(|l| l.support_type)).unwrap_or_default(),
            support_detail: self
                .support_detail
                .or_else(|| local.map(|l| l.support_detail.clone()))
                .unwrap_or_default(),
            additional_charge: self.additional_charge.map(money_from_remote),
            contact_ids: self.contact_ids,
            assigned_user_ids: self.assigned_user_ids,
            send_history,
            invoice_number: self.invoice_number,
            invoice_vat_enabled: self.invoice_vat_enabled,
            quote_number: self.quote_number,
            quote_status: self.quote_status,
            quote_name: self.quote_name,
            mobile_duration_minutes: self.mobile_duration_minutes,
            mobile_completion_comment: self.mobile_completion_comment,
            planning_user: self.planning_user,
            start_time: self.start_time,
            main_category_id: self.main_category_id,
            sub_category_id: self.sub_category_id,
            services,
        }
    }
}

// ==========================================
// EMPRESAS
// ==========================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyDto {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
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

remote_record!(CompanyDto);

const DEFAULT_COUNTRY: &str = "France";

impl EntityMapper for CompanyDto {
    type Entity = Company;

    fn from_entity(c: &Company) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.clone(),
            logo_url: Some(c.logo_url.clone()),
            invoice_logo_url: Some(c.invoice_logo_url.clone()),
            address: Some(c.address.clone()),
            postal_code: Some(c.postal_code.clone()),
            city: Some(c.city.clone()),
            country: Some(c.country.clone()),
            phone: Some(c.phone.clone()),
            email: Some(c.email.clone()),
            website: Some(c.website.clone()),
            siret: Some(c.siret.clone()),
            vat_number: Some(c.vat_number.clone()),
            legal_notes: Some(c.legal_notes.clone()),
            document_header_title: c.document_header_title.clone(),
            document_header_subtitle: c.document_header_subtitle.clone(),
            document_header_note: c.document_header_note.clone(),
            vat_enabled: Some(c.vat_enabled),
            is_default: Some(c.is_default),
            default_signature_id: c.default_signature_id.clone(),
            bank_name: Some(c.bank_name.clone()),
            bank_address: Some(c.bank_address.clone()),
            iban: Some(c.iban.clone()),
            bic: Some(c.bic.clone()),
            planning_user: c.planning_user.clone(),
        }
    }

    fn into_entity(self, _local: Option<&Company>) -> Company {
        Company {
            id: self.id,
            name: self.name,
            logo_url: self.logo_url.unwrap_or_default(),
            invoice_logo_url: self.invoice_logo_url.unwrap_or_default(),
            address: self.address.unwrap_or_default(),
            postal_code: self.postal_code.unwrap_or_default(),
            city: self.city.unwrap_or_default(),
            country: self.country.unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
            phone: self.phone.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            website: self.website.unwrap_or_default(),
            siret: self.siret.unwrap_or_default(),
            vat_number: self.vat_number.unwrap_or_default(),
            legal_notes: self.legal_notes.unwrap_or_default(),
            document_header_title: self.document_header_title,
            document_header_subtitle: self.document_header_subtitle,
            document_header_note: self.document_header_note,
            vat_enabled: self.vat_enabled.unwrap_or(true),
            is_default: self.is_default.unwrap_or(false),
            default_signature_id: self.default_signature_id,
            bank_name: self.bank_name.unwrap_or_default(),
            bank_address: self.bank_address.unwrap_or_default(),
            iban: self.iban.unwrap_or_default(),
            bic: self.bic.unwrap_or_default(),
            planning_user: self.planning_user,
        }
    }
}

// ==========================================
// USUÁRIOS
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDto {
    #[serde(default)]
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub password_hash: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub pages: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub active: bool,
    pub company_id: Option<String>,
    pub profile: Option<UserProfile>,
    pub notification_preferences: Option<NotificationPreferences>,
}

remote_record!(UserDto);

impl EntityMapper for UserDto {
    type Entity = AuthUser;

    fn from_entity(user: &AuthUser) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            full_name: Some(user.full_name.clone()),
            password_hash: Some(user.password_hash.clone()),
            role: user.role,
            pages: user.pages.clone(),
            permissions: user.permissions.clone(),
            active: user.active,
            company_id: user.company_id.clone(),
            profile: Some(user.profile.clone()),
            notification_preferences: Some(user.notification_preferences.clone()),
        }
    }

    fn into_entity(self, local: Option<&AuthUser>) -> AuthUser {
        let full_name = self
            .full_name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| local.map(|l| l.full_name.clone()))
            .unwrap_or_else(|| self.username.clone());
        AuthUser {
            id: self.id,
            full_name,
            username: self.username,
            password_hash: self
                .password_hash
                .filter(|hash| !hash.is_empty())
                .or_else(|| local.map(|l| l.password_hash.clone()))
                .unwrap_or_default(),
            role: self.role,
            pages: self.pages,
            permissions: self.permissions,
            active: self.active,
            profile: self.profile.or_else(|| local.map(|l| l.profile.clone())).unwrap_or_default(),
            notification_preferences: self
                .notification_preferences
                .or_else(|| local.map(|l| l.notification_preferences.clone()))
                .unwrap_or_default(),
            company_id: self.company_id,
        }
    }
}

// ==========================================
// ASSINATURAS (CONTRATOS)
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionDto {
    #[serde(default)]
    pub id: String,
    pub client_id: String,
    #[serde(default)]
    pub vehicle_info: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub frequency: SubscriptionFrequency,
    #[serde(default)]
    pub price_ht: f64,
    #[serde(default)]
    pub vat_enabled: bool,
    pub document_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

remote_record!(SubscriptionDto);

impl EntityMapper for SubscriptionDto {
    type Entity = Subscription;

    fn from_entity(s: &Subscription) -> Self {
        Self {
            id: s.id.clone(),
            client_id: s.client_id.clone(),
            vehicle_info: s.vehicle_info.clone(),
            start_date: s.start_date,
            end_date: s.end_date,
            status: s.status,
            frequency: s.frequency,
            price_ht: money_to_remote(s.price_ht),
            vat_enabled: s.vat_enabled,
            document_id: s.document_id.clone(),
            notes: s.notes.clone(),
            created_at: Some(s.created_at),
            updated_at: Some(s.updated_at),
        }
    }

    fn into_entity(self, local: Option<&Subscription>) -> Subscription {
        Subscription {
            id: self.id,
            client_id: self.client_id,
            vehicle_info: self.vehicle_info,
            start_date: self.start_date,
            end_date: self.end_date,
            status: self.status,
            frequency: self.frequency,
            price_ht: money_from_remote(self.price_ht),
            vat_enabled: self.vat_enabled,
            document_id: self.document_id,
            notes: self.notes,
            created_at: self.created_at.or_else(|| local.map(|l| l.created_at)).unwrap_or_default(),
            updated_at: self.updated_at.or_else(|| local.map(|l| l.updated_at)).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap()
    }

    fn sample_engagement() -> Engagement {
        let mut overrides = OptionOverrides::new();
        overrides.insert(
            "opt-1".into(),
            OptionOverride { quantity: Some(2), unit_price_ht: Some(Money::from_cents(1250)), duration_min: None },
        );
        Engagement {
            id: "e-1".into(),
            client_id: "c-1".into(),
            company_id: Some("co-1".into()),
            service_id: String::new(),
            option_ids: vec![],
            option_overrides: OptionOverrides::new(),
            scheduled_at: at(3),
            status: EngagementStatus::Scheduled,
            kind: EngagementKind::Service,
            support_type: SupportType::Sofa,
            support_detail: "3 places".into(),
            additional_charge: Some(Money::from_cents(999)),
            contact_ids: vec!["ct-1".into()],
            assigned_user_ids: vec![],
            send_history: vec![SendRecord { id: "es-1".into(), sent_at: at(2), contact_ids: vec!["ct-1".into()], subject: None }],
            invoice_number: None,
            invoice_vat_enabled: Some(true),
            quote_number: None,
            quote_status: None,
            quote_name: None,
            mobile_duration_minutes: None,
            mobile_completion_comment: None,
            planning_user: Some("clement".into()),
            start_time: Some("09:00".into()),
            main_category_id: None,
            sub_category_id: None,
            services: vec![EngagementLine {
                service_id: "s-1".into(),
                option_ids: vec!["opt-1".into()],
                option_overrides: overrides,
                sub_category_id: Some("cat-2".into()),
                quantity: Some(3),
                ..EngagementLine::default()
            }],
        }
    }

    #[test]
    fn engagement_survives_the_wire_with_lines_and_money() {
        let engagement = sample_engagement();
        let dto = AppointmentDto::from_entity(&engagement);
        let json = serde_json::to_value(&dto).unwrap();

        // Nomes do servidor
        assert_eq!(json["date"], serde_json::json!("2024-05-03T09:00:00Z"));
        assert_eq!(json["additional_charge"], serde_json::json!(9.99));
        assert_eq!(json["services"][0]["option_overrides"]["opt-1"]["unit_price_ht"], serde_json::json!(12.5));
        assert_eq!(json["services"][0]["sub_category_id"], serde_json::json!("cat-2"));

        let back: AppointmentDto = serde_json::from_value(json).unwrap();
        assert_eq!(back.into_entity(None), engagement);
    }

    #[test]
    fn lead_keeps_local_activities_when_server_omits_them() {
        let local = Lead {
            id: "l-1".into(),
            company: "Garage Martin".into(),
            contact: "Paul".into(),
            phone: "0600000000".into(),
            email: "paul@garage.fr".into(),
            source: "Salon".into(),
            segment: "Auto".into(),
            status: LeadStatus::InProgress,
            next_step_date: None,
            next_step_note: String::new(),
            last_contact: None,
            estimated_value: Some(Money::from_units(1200)),
            owner: "adrien".into(),
            tags: vec![],
            address: None,
            company_id: Some("co-1".into()),
            support_type: None,
            support_detail: None,
            siret: None,
            client_type: None,
            created_at: at(1),
            activities: vec![LeadActivity { id: "la-1".into(), kind: LeadActivityKind::Call, content: "Rappel".into(), created_at: at(2) }],
        };

        let mut dto = LeadDto::from_entity(&local);
        dto.id = "srv-7".into();
        dto.activities = None;
        dto.created_at = None;

        let merged = dto.into_entity(Some(&local));
        assert_eq!(merged.id, "srv-7");
        assert_eq!(merged.activities, local.activities);
        assert_eq!(merged.created_at, local.created_at);
        assert_eq!(merged.estimated_value, Some(Money::from_units(1200)));
    }

    #[test]
    fn company_defaults_follow_the_backend_contract() {
        let dto: CompanyDto = serde_json::from_str(r#"{"id":"co-9","name":"Wash Nord"}"#).unwrap();
        let company = dto.into_entity(None);
        assert_eq!(company.country, "France");
        assert!(company.vat_enabled);
        assert!(!company.is_default);

        let round = CompanyDto::from_entity(&company).into_entity(None);
        assert_eq!(round, company);
    }

    #[test]
    fn user_without_hash_keeps_the_local_one() {
        let dto: UserDto = serde_json::from_str(
            r#"{"id":"u-1","username":"Marie","role":"manager","pages":["clients"],"permissions":[],"active":true}"#,
        )
        .unwrap();
        let local = dto.clone().into_entity(None);
        assert_eq!(local.full_name, "Marie");

        let mut local = local;
        local.password_hash = "$2b$04$hash".into();
        let merged = dto.into_entity(Some(&local));
        assert_eq!(merged.password_hash, "$2b$04$hash");
        assert_eq!(merged.role, UserRole::Manager);
    }

    #[test]
    fn client_and_subscription_round_trip() {
        let client = Client {
            id: "c-1".into(),
            client_type: ClientType::Company,
            name: "Hôtel Lumière".into(),
            company_name: Some("Hôtel Lumière".into()),
            first_name: None,
            last_name: None,
            siret: "12345678900011".into(),
            email: "contact@lumiere.fr".into(),
            phone: "0102030405".into(),
            address: "1 rue du Port".into(),
            city: "Nantes".into(),
            status: ClientStatus::ToCall,
            tags: vec!["VIP".into()],
            last_service: Some(at(4)),
            contacts: vec![ClientContact {
                id: "ct-1".into(),
                first_name: "Léa".into(),
                last_name: "Roux".into(),
                email: "lea@lumiere.fr".into(),
                mobile: String::new(),
                roles: vec![ContactRole::Billing],
                is_billing_default: true,
                active: true,
            }],
            pricing_grid: Some(ClientPricingGrid {
                pricing_items: vec![PricingGridItem {
                    service_id: "s-1".into(),
                    service_option_id: "opt-1".into(),
                    default_price_ht: Money::from_units(50),
                    custom_price_ht: Some(Money::from_cents(4550)),
                }],
            }),
            next_action_date: None,
            next_action_note: None,
            company_id: Some("co-1".into()),
        };
        assert_eq!(ClientDto::from_entity(&client).into_entity(None), client);

        let subscription = Subscription {
            id: "sub-1".into(),
            client_id: "c-1".into(),
            vehicle_info: "Clio AB-123-CD".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
            status: SubscriptionStatus::Suspended,
            frequency: SubscriptionFrequency::Quarterly,
            price_ht: Money::from_cents(8990),
            vat_enabled: true,
            document_id: None,
            notes: Some("Lavage intérieur".into()),
            created_at: at(1),
            updated_at: at(5),
        };
        assert_eq!(SubscriptionDto::from_entity(&subscription).into_entity(None), subscription);
    }
}
