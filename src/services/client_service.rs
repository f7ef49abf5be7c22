// src/services/client_service.rs

use std::collections::HashMap;
use std::sync::Arc;

use validator::Validate;

use crate::{
    common::{error::AppError, money::Money},
    models::{
        client::{
            Client, ClientContact, ClientDraft, ClientPatch, ClientPricingGrid, ClientType, ContactDraft,
            ContactPatch, ContactRole, Note, RemovedClient,
        },
        engagement::Engagement,
        subscription::Subscription,
    },
    remote::dto::PricingGridDto,
    services::{
        pricing,
        sync::{self, SyncAction, SyncTicket},
    },
    store::StoreContext,
};

// ==========================================
// CONTATOS
// ==========================================

/// Papéis sem repetição; lista vazia vira `facturation`.
pub fn normalize_contact_roles(roles: &[ContactRole]) -> Vec<ContactRole> {
    let mut unique: Vec<ContactRole> = Vec::with_capacity(roles.len());
    for role in roles {
        if !unique.contains(role) {
            unique.push(*role);
        }
    }
    if unique.is_empty() {
        unique.push(ContactRole::Billing);
    }
    unique
}

/// Garante no máximo um contato de faturação padrão, sempre ativo.
///
/// Alvo: o preferido (se existir e estiver ativo), senão o padrão ativo
/// atual, senão o primeiro ativo.
pub fn ensure_billing_default(contacts: &mut [ClientContact], preferred_id: Option<&str>) {
    let target = preferred_id
        .filter(|id| contacts.iter().any(|c| c.id == *id && c.active))
        .map(str::to_string)
        .or_else(|| contacts.iter().find(|c| c.active && c.is_billing_default).map(|c| c.id.clone()))
        .or_else(|| contacts.iter().find(|c| c.active).map(|c| c.id.clone()));

    for contact in contacts.iter_mut() {
        contact.is_billing_default = contact.active && Some(&contact.id) == target.as_ref();
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Nome de exibição conforme o tipo: razão social para empresas,
/// "prénom nom" para particulares, com o nome fornecido como fallback.
fn display_name(client_type: ClientType, provided: &str, company_name: &str, first: &str, last: &str) -> String {
    let derived = match client_type {
        ClientType::Company => company_name.to_string(),
        ClientType::Individual => [first, last]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" "),
    };
    if derived.is_empty() { provided.to_string() } else { derived }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

#[derive(Clone)]
pub struct ClientService {
    ctx: Arc<StoreContext>,
}

impl ClientService {
    pub(crate) fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    pub fn list(&self) -> Vec<Client> {
        self.ctx.read(|s| s.clients.to_vec())
    }

    pub fn get(&self, client_id: &str) -> Option<Client> {
        self.ctx.read(|s| s.clients.get(client_id).cloned())
    }

    pub fn engagements_of(&self, client_id: &str) -> Vec<Engagement> {
        self.ctx.read(|s| s.engagements.iter().filter(|e| e.client_id == client_id).cloned().collect())
    }

    pub fn subscriptions_of(&self, client_id: &str) -> Vec<Subscription> {
        self.ctx.read(|s| s.subscriptions.iter().filter(|sub| sub.client_id == client_id).cloned().collect())
    }

    pub fn notes_of(&self, client_id: &str) -> Vec<Note> {
        self.ctx.read(|s| s.notes.iter().filter(|n| n.client_id == client_id).cloned().collect())
    }

    /// Soma preço + acréscimo dos engagements não cancelados do cliente.
    pub fn revenue(&self, client_id: &str) -> Money {
        self.ctx.read(|s| {
            pricing::client_revenue(client_id, s.engagements.as_slice(), s.services.as_slice(), s.categories.as_slice())
        })
    }

    pub fn pricing_grid(&self, client_id: &str) -> Option<ClientPricingGrid> {
        self.ctx.read(|s| s.clients.get(client_id).and_then(|c| c.pricing_grid.clone()))
    }

    pub fn applicable_price(&self, client_id: &str, service_id: &str, option_id: &str, default_price: Money) -> Money {
        self.ctx.read(|s| match s.clients.get(client_id) {
            Some(client) => pricing::applicable_price(client, service_id, option_id, default_price),
            None => default_price,
        })
    }

    pub fn add(&self, draft: ClientDraft) -> Result<(Client, SyncTicket), AppError> {
        draft.validate()?;

        let client_type = draft.client_type;
        let provided = draft.name.trim().to_string();
        let company_name = match client_type {
            ClientType::Company => {
                let raw = trimmed(draft.company_name);
                if raw.is_empty() { provided.clone() } else { raw }
            }
            ClientType::Individual => String::new(),
        };
        let (first_name, last_name) = match client_type {
            ClientType::Individual => (trimmed(draft.first_name), trimmed(draft.last_name)),
            ClientType::Company => (String::new(), String::new()),
        };
        let name = display_name(client_type, &provided, &company_name, &first_name, &last_name);
        if name.is_empty() {
            return Err(AppError::InvalidFields(HashMap::from([("name".to_string(), "required".to_string())])));
        }

        let mut contacts = draft.contacts;
        for contact in contacts.iter_mut() {
            contact.roles = normalize_contact_roles(&contact.roles);
        }
        ensure_billing_default(&mut contacts, None);

        let now = self.ctx.now();
        let client = Client {
            id: self.ctx.new_id("c"),
            client_type,
            company_name: match client_type {
                ClientType::Company => Some(if company_name.is_empty() { name.clone() } else { company_name }),
                ClientType::Individual => None,
            },
            first_name: non_empty(first_name),
            last_name: non_empty(last_name),
            name,
            // SIRET só faz sentido para empresas
            siret: match client_type {
                ClientType::Company => trimmed(draft.siret),
                ClientType::Individual => String::new(),
            },
            email: trimmed(draft.email),
            phone: trimmed(draft.phone),
            address: trimmed(draft.address),
            city: trimmed(draft.city),
            status: draft.status,
            tags: clean_tags(draft.tags),
            last_service: Some(now),
            contacts,
            pricing_grid: None,
            next_action_date: draft.next_action_date,
            next_action_note: draft.next_action_note,
            company_id: self.ctx.read(|s| s.active_company_id.clone()),
        };

        self.ctx.write(|s| s.clients.insert_front(client.clone()));
        tracing::info!("✅ Cliente {} criado localmente ({})", client.name, client.id);
        let ticket = sync::push::<Client>(&self.ctx, SyncAction::Create, &client.id);
        Ok((client, ticket))
    }

    pub fn update(&self, client_id: &str, patch: ClientPatch) -> Option<(Client, SyncTicket)> {
        let updated = self.ctx.write(|s| {
            let client = s.clients.get_mut(client_id)?;
            let client_type = patch.client_type.unwrap_or(client.client_type);
            let provided = patch.name.as_deref().map(str::trim).unwrap_or(&client.name).to_string();

            let company_name = match client_type {
                ClientType::Company => patch
                    .company_name
                    .clone()
                    .unwrap_or_else(|| client.company_name.clone())
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                ClientType::Individual => String::new(),
            };
            let (first_name, last_name) = match client_type {
                ClientType::Individual => (
                    patch.first_name.clone().unwrap_or_else(|| client.first_name.clone()).unwrap_or_default().trim().to_string(),
                    patch.last_name.clone().unwrap_or_else(|| client.last_name.clone()).unwrap_or_default().trim().to_string(),
                ),
                ClientType::Company => (String::new(), String::new()),
            };
            let name = display_name(client_type, &provided, &company_name, &first_name, &last_name);

            client.siret = match client_type {
                ClientType::Company => patch.siret.map(|v| v.trim().to_string()).unwrap_or_else(|| client.siret.clone()),
                ClientType::Individual => String::new(),
            };
            client.company_name = match client_type {
                ClientType::Company => Some(if company_name.is_empty() { name.clone() } else { company_name }),
                ClientType::Individual => None,
            };
            client.first_name = non_empty(first_name);
            client.last_name = non_empty(last_name);
            client.client_type = client_type;
            client.name = name;

            if let Some(v) = patch.email {
                client.email = v.trim().to_string();
            }
            if let Some(v) = patch.phone {
                client.phone = v.trim().to_string();
            }
            if let Some(v) = patch.address {
                client.address = v.trim().to_string();
            }
            if let Some(v) = patch.city {
                client.city = v.trim().to_string();
            }
            if let Some(v) = patch.status {
                client.status = v;
            }
            if let Some(tags) = patch.tags {
                client.tags = clean_tags(tags);
            }
            if let Some(v) = patch.last_service {
                client.last_service = v;
            }
            if let Some(v) = patch.next_action_date {
                client.next_action_date = v;
            }
            if let Some(v) = patch.next_action_note {
                client.next_action_note = v;
            }
            ensure_billing_default(&mut client.contacts, None);
            Some(client.clone())
        })?;

        let ticket = sync::push::<Client>(&self.ctx, SyncAction::Update, &updated.id);
        Some((updated, ticket))
    }

    /// Remove o cliente com os seus engagements e notas; o retorno permite
    /// desfazer com `restore`.
    pub fn remove(&self, client_id: &str) -> Option<(RemovedClient, SyncTicket)> {
        let removed = self.ctx.write(|s| {
            let client = s.clients.remove(client_id)?;
            let engagements = s.engagements.drain_where(|e| e.client_id == client_id);
            let notes = s.notes.drain_where(|n| n.client_id == client_id);
            Some(RemovedClient { client, engagements, notes })
        })?;
        tracing::info!(
            "🗑️ Cliente {} removido ({} engagements, {} notas)",
            client_id,
            removed.engagements.len(),
            removed.notes.len()
        );
        let ticket = sync::push::<Client>(&self.ctx, SyncAction::Delete, client_id);
        Some((removed, ticket))
    }

    /// Recoloca o cliente (e seus registros) no topo e recria-o no servidor.
    pub fn restore(&self, removed: RemovedClient) -> SyncTicket {
        let RemovedClient { mut client, engagements, notes } = removed;
        ensure_billing_default(&mut client.contacts, None);
        let client_id = client.id.clone();

        self.ctx.write(|s| {
            s.clients.remove(&client_id);
            s.clients.insert_front(client);
            for engagement in engagements.into_iter().rev() {
                s.engagements.remove(&engagement.id);
                s.engagements.insert_front(engagement);
            }
            for note in notes.into_iter().rev() {
                s.notes.remove(&note.id);
                s.notes.insert_front(note);
            }
        });
        sync::push::<Client>(&self.ctx, SyncAction::Create, &client_id)
    }

    // Aplica `f` aos contatos do cliente e reenvia o cliente
    fn with_contacts<R>(
        &self,
        client_id: &str,
        f: impl FnOnce(&mut Vec<ClientContact>, &mut crate::db::StoreState) -> Option<R>,
    ) -> Option<R> {
        let result = self.ctx.write(|s| {
            let mut contacts = std::mem::take(&mut s.clients.get_mut(client_id)?.contacts);
            let result = f(&mut contacts, s);
            if let Some(client) = s.clients.get_mut(client_id) {
                client.contacts = contacts;
            }
            result
        })?;
        sync::push::<Client>(&self.ctx, SyncAction::Update, client_id);
        Some(result)
    }

    /// Um e-mail já cadastrado (sem diferenciar maiúsculas) atualiza e
    /// reativa o contato existente.
    pub fn add_contact(&self, client_id: &str, draft: ContactDraft) -> Result<Option<ClientContact>, AppError> {
        draft.validate()?;
        let email = draft.email.trim().to_string();
        let roles = normalize_contact_roles(&draft.roles);
        let new_id = self.ctx.new_id("ct");

        Ok(self.with_contacts(client_id, |contacts, _| {
            let existing = contacts.iter().position(|c| c.email.to_lowercase() == email.to_lowercase());
            let contact = match existing {
                Some(index) => {
                    let current = &mut contacts[index];
                    current.first_name = draft.first_name.trim().to_string();
                    current.last_name = draft.last_name.trim().to_string();
                    current.email = email.clone();
                    current.mobile = draft.mobile.trim().to_string();
                    current.roles = roles;
                    current.is_billing_default = draft.is_billing_default.unwrap_or(current.is_billing_default);
                    current.active = true;
                    current.clone()
                }
                None => {
                    let contact = ClientContact {
                        id: new_id,
                        first_name: draft.first_name.trim().to_string(),
                        last_name: draft.last_name.trim().to_string(),
                        email: email.clone(),
                        mobile: draft.mobile.trim().to_string(),
                        roles,
                        is_billing_default: draft.is_billing_default.unwrap_or(false),
                        active: true,
                    };
                    contacts.insert(0, contact.clone());
                    contact
                }
            };
            let preferred = contact.is_billing_default.then_some(contact.id.as_str());
            ensure_billing_default(contacts, preferred);
            contacts.iter().find(|c| c.id == contact.id).cloned()
        }))
    }

    pub fn update_contact(&self, client_id: &str, contact_id: &str, patch: ContactPatch) -> Option<ClientContact> {
        self.with_contacts(client_id, |contacts, _| {
            let contact = contacts.iter_mut().find(|c| c.id == contact_id)?;
            if let Some(v) = patch.first_name {
                contact.first_name = v.trim().to_string();
            }
            if let Some(v) = patch.last_name {
                contact.last_name = v.trim().to_string();
            }
            if let Some(v) = patch.email {
                contact.email = v.trim().to_string();
            }
            if let Some(v) = patch.mobile {
                contact.mobile = v.trim().to_string();
            }
            if let Some(roles) = patch.roles {
                contact.roles = normalize_contact_roles(&roles);
            }
            if let Some(v) = patch.active {
                contact.active = v;
            }
            if let Some(v) = patch.is_billing_default {
                contact.is_billing_default = v;
            }
            let preferred = (patch.is_billing_default == Some(true)).then_some(contact_id);
            ensure_billing_default(contacts, preferred);
            contacts.iter().find(|c| c.id == contact_id).cloned()
        })
    }

    /// Arquiva o contato e o retira dos destinatários de todos os engagements.
    pub fn archive_contact(&self, client_id: &str, contact_id: &str) -> bool {
        self.with_contacts(client_id, |contacts, state| {
            let contact = contacts.iter_mut().find(|c| c.id == contact_id)?;
            contact.active = false;
            ensure_billing_default(contacts, None);
            for engagement in state.engagements.iter_mut() {
                engagement.contact_ids.retain(|id| id != contact_id);
            }
            Some(())
        })
        .is_some()
    }

    pub fn restore_contact(&self, client_id: &str, contact_id: &str) -> bool {
        self.with_contacts(client_id, |contacts, _| {
            contacts.iter_mut().find(|c| c.id == contact_id)?.active = true;
            ensure_billing_default(contacts, Some(contact_id));
            Some(())
        })
        .is_some()
    }

    pub fn set_billing_contact(&self, client_id: &str, contact_id: &str) -> bool {
        self.with_contacts(client_id, |contacts, _| {
            ensure_billing_default(contacts, Some(contact_id));
            Some(())
        })
        .is_some()
    }

    /// Grava a grade no servidor; o estado local só muda após o sucesso.
    pub async fn update_pricing_grid(&self, client_id: &str, grid: ClientPricingGrid) -> Result<Client, AppError> {
        if self.get(client_id).is_none() {
            return Err(AppError::not_found("Cliente", client_id));
        }
        let saved = self
            .ctx
            .backend
            .update_pricing_grid(client_id, &PricingGridDto::from_grid(&grid))
            .await
            .into_result()?;
        let grid = saved.map(PricingGridDto::into_grid).unwrap_or(grid);

        self.ctx
            .write(|s| {
                let client = s.clients.get_mut(client_id)?;
                client.pricing_grid = Some(grid);
                Some(client.clone())
            })
            .ok_or_else(|| AppError::not_found("Cliente", client_id))
    }

    pub fn add_note(&self, client_id: &str, content: &str) -> Result<Note, AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::InvalidFields(HashMap::from([("content".to_string(), "required".to_string())])));
        }
        if self.get(client_id).is_none() {
            return Err(AppError::not_found("Cliente", client_id));
        }
        let note = Note {
            id: self.ctx.new_id("n"),
            client_id: client_id.to_string(),
            content: content.to_string(),
            created_at: self.ctx.now(),
        };
        self.ctx.write(|s| s.notes.insert_front(note.clone()));
        Ok(note)
    }

    pub fn remove_note(&self, note_id: &str) -> bool {
        self.ctx.write(|s| s.notes.remove(note_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: &str, active: bool, default: bool) -> ClientContact {
        ClientContact {
            id: id.into(),
            first_name: "A".into(),
            last_name: "B".into(),
            email: format!("{}@example.com", id),
            mobile: String::new(),
            roles: vec![ContactRole::Billing],
            is_billing_default: default,
            active,
        }
    }

    fn defaults(contacts: &[ClientContact]) -> Vec<&str> {
        contacts.iter().filter(|c| c.is_billing_default).map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn preferred_contact_wins_when_active() {
        let mut contacts = vec![contact("a", true, true), contact("b", true, false)];
        ensure_billing_default(&mut contacts, Some("b"));
        assert_eq!(defaults(&contacts), vec!["b"]);
    }

    #[test]
    fn inactive_preferred_falls_back_to_existing_default() {
        let mut contacts = vec![contact("a", true, false), contact("b", false, false), contact("c", true, true)];
        ensure_billing_default(&mut contacts, Some("b"));
        assert_eq!(defaults(&contacts), vec!["c"]);
    }

    #[test]
    fn archived_default_is_re_elected() {
        let mut contacts = vec![contact("a", false, true), contact("b", true, false)];
        ensure_billing_default(&mut contacts, None);
        assert_eq!(defaults(&contacts), vec!["b"]);

        let mut none_active = vec![contact("a", false, true)];
        ensure_billing_default(&mut none_active, None);
        assert!(defaults(&none_active).is_empty());
    }

    #[test]
    fn roles_are_deduplicated_with_billing_fallback() {
        assert_eq!(normalize_contact_roles(&[]), vec![ContactRole::Billing]);
        assert_eq!(
            normalize_contact_roles(&[ContactRole::Technical, ContactRole::Technical, ContactRole::Purchasing]),
            vec![ContactRole::Technical, ContactRole::Purchasing]
        );
    }

    #[test]
    fn display_name_depends_on_type() {
        assert_eq!(display_name(ClientType::Company, "x", "ACME", "", ""), "ACME");
        assert_eq!(display_name(ClientType::Individual, "x", "", "Marie", "Curie"), "Marie Curie");
        assert_eq!(display_name(ClientType::Individual, "Fallback", "", "", ""), "Fallback");
    }
}
