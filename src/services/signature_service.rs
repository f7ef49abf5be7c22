// src/services/signature_service.rs

use std::sync::Arc;

use crate::{
    db::StoreState,
    models::company::{EmailSignature, SignatureDraft, SignatureScope, SignaturePatch},
    store::StoreContext,
};

// Mesmo dono: a empresa para o escopo `company`, o usuário para `user`
fn same_owner(a: &EmailSignature, b: &EmailSignature) -> bool {
    a.scope == b.scope
        && match a.scope {
            SignatureScope::Company => a.company_id == b.company_id,
            SignatureScope::User => a.user_id == b.user_id,
        }
}

/// Torna `target` a única padrão do seu dono; no escopo empresa, a empresa
/// também aponta para ela.
fn make_default(state: &mut StoreState, target: &EmailSignature) {
    for signature in state.email_signatures.iter_mut() {
        if signature.id == target.id {
            signature.is_default = true;
        } else if same_owner(signature, target) {
            signature.is_default = false;
        }
    }
    if target.scope == SignatureScope::Company {
        if let Some(company) = target.company_id.as_deref().and_then(|id| state.companies.get_mut(id)) {
            company.default_signature_id = Some(target.id.clone());
        }
    }
}

// Assinaturas de e-mail são só locais.
#[derive(Clone)]
pub struct SignatureService {
    ctx: Arc<StoreContext>,
}

impl SignatureService {
    pub(crate) fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    pub fn list(&self) -> Vec<EmailSignature> {
        self.ctx.read(|s| s.email_signatures.to_vec())
    }

    pub fn create(&self, draft: SignatureDraft) -> EmailSignature {
        let signature = EmailSignature {
            id: self.ctx.new_id("sig-"),
            scope: draft.scope,
            company_id: draft.company_id,
            user_id: draft.user_id,
            label: draft.label,
            html: draft.html,
            is_default: draft.is_default,
            updated_at: self.ctx.now(),
        };
        self.ctx.write(|s| {
            s.email_signatures.push(signature.clone());
            if signature.is_default {
                make_default(s, &signature);
            }
        });
        signature
    }

    pub fn update(&self, signature_id: &str, patch: SignaturePatch) -> Option<EmailSignature> {
        let now = self.ctx.now();
        self.ctx.write(|s| {
            let signature = s.email_signatures.get_mut(signature_id)?;
            if let Some(v) = patch.label {
                signature.label = v;
            }
            if let Some(v) = patch.html {
                signature.html = v;
            }
            if let Some(v) = patch.is_default {
                signature.is_default = v;
            }
            signature.updated_at = now;
            let updated = signature.clone();
            if updated.is_default {
                make_default(s, &updated);
            }
            Some(updated)
        })
    }

    /// Se era a padrão da empresa, outra assinatura da mesma empresa assume.
    pub fn remove(&self, signature_id: &str) -> bool {
        self.ctx.write(|s| {
            let Some(removed) = s.email_signatures.remove(signature_id) else {
                return false;
            };
            let Some(company_id) = removed.company_id.as_deref().filter(|_| removed.scope == SignatureScope::Company)
            else {
                return true;
            };
            let was_company_default = s
                .companies
                .get(company_id)
                .is_some_and(|c| c.default_signature_id.as_deref() == Some(signature_id));
            if !was_company_default {
                return true;
            }

            let replacement = s
                .email_signatures
                .iter()
                .find(|sig| sig.scope == SignatureScope::Company && sig.company_id.as_deref() == Some(company_id))
                .cloned();
            match replacement {
                Some(replacement) => make_default(s, &replacement),
                None => {
                    if let Some(company) = s.companies.get_mut(company_id) {
                        company.default_signature_id = None;
                    }
                }
            }
            true
        })
    }

    pub fn set_default(&self, signature_id: &str) -> bool {
        self.ctx.write(|s| {
            let Some(target) = s.email_signatures.get(signature_id).cloned() else {
                return false;
            };
            make_default(s, &target);
            true
        })
    }

    pub fn default_for_company(&self, company_id: &str) -> Option<EmailSignature> {
        self.ctx.read(|s| {
            s.email_signatures
                .iter()
                .find(|sig| {
                    sig.scope == SignatureScope::Company
                        && sig.company_id.as_deref() == Some(company_id)
                        && sig.is_default
                })
                .cloned()
        })
    }

    /// Assinatura padrão do usuário; uma assinatura presa a outra empresa é ignorada.
    pub fn default_for_user(&self, user_id: &str, company_id: Option<&str>) -> Option<EmailSignature> {
        self.ctx.read(|s| {
            s.email_signatures
                .iter()
                .find(|sig| {
                    let other_company = matches!(
                        (company_id, sig.company_id.as_deref()),
                        (Some(wanted), Some(own)) if wanted != own
                    );
                    sig.scope == SignatureScope::User
                        && sig.user_id.as_deref() == Some(user_id)
                        && !other_company
                        && sig.is_default
                })
                .cloned()
        })
    }

    /// HTML a anexar: a padrão da empresa tem prioridade sobre a do usuário.
    pub fn resolve_html(&self, company_id: Option<&str>, user_id: Option<&str>) -> Option<String> {
        self.ctx.read(|s| {
            let company = company_id.and_then(|id| {
                s.email_signatures.iter().find(|sig| {
                    sig.scope == SignatureScope::Company && sig.company_id.as_deref() == Some(id) && sig.is_default
                })
            });
            let user = || {
                user_id.and_then(|id| {
                    s.email_signatures.iter().find(|sig| {
                        sig.scope == SignatureScope::User && sig.user_id.as_deref() == Some(id) && sig.is_default
                    })
                })
            };
            company.or_else(user).map(|sig| sig.html.clone())
        })
    }
}
