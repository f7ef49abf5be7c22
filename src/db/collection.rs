// src/db/collection.rs

use crate::models::{
    auth::AuthUser,
    catalog::{Category, Service},
    client::{Client, Note},
    company::{Company, EmailSignature},
    document::{Document, Project},
    engagement::Engagement,
    lead::Lead,
    purchase::{Purchase, Vehicle},
    subscription::Subscription,
};

/// Registros endereçáveis por id dentro de uma `Collection`.
pub trait Identified {
    fn id(&self) -> &str;
}

macro_rules! identified {
    ($($ty:ty),* $(,)?) => {
        $(impl Identified for $ty {
            fn id(&self) -> &str {
                &self.id
            }
        })*
    };
}

identified!(
    AuthUser, Category, Service, Client, Note, Company, EmailSignature, Document, Project,
    Engagement, Lead, Purchase, Vehicle, Subscription,
);

/// Repositório em memória: mapa id -> registro exposto como lista ordenada.
///
/// As coleções são pequenas (uma empresa por vez), a busca linear preserva a
/// ordem de exibição sem índice paralelo.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    items: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Identified + Clone> Collection<T> {
    pub fn from_vec(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.clone()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    /// Novos registros entram no topo da lista.
    pub fn insert_front(&mut self, item: T) {
        self.items.insert(0, item);
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Troca o registro na mesma posição (id local -> id do servidor).
    pub fn replace(&mut self, id: &str, item: T) -> bool {
        match self.position(id) {
            Some(index) => {
                self.items[index] = item;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        self.position(id).map(|index| self.items.remove(index))
    }

    /// Remove e devolve os registros que satisfazem `predicate`.
    pub fn drain_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Vec<T> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            if predicate(&item) {
                removed.push(item);
            } else {
                kept.push(item);
            }
        }
        self.items = kept;
        removed
    }

    pub fn retain(&mut self, predicate: impl FnMut(&T) -> bool) {
        self.items.retain(predicate);
    }

    pub fn replace_all(&mut self, items: Vec<T>) {
        self.items = items;
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<'a, T> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn note(id: &str) -> Note {
        Note { id: id.into(), client_id: "c1".into(), content: String::new(), created_at: Utc::now() }
    }

    #[test]
    fn replace_keeps_position() {
        let mut notes = Collection::from_vec(vec![note("a"), note("tmp"), note("c")]);
        assert!(notes.replace("tmp", note("srv-9")));
        let ids: Vec<&str> = notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "srv-9", "c"]);
        assert!(!notes.replace("missing", note("x")));
    }

    #[test]
    fn drain_where_splits_the_collection() {
        let mut notes = Collection::from_vec(vec![note("a"), note("b"), note("c")]);
        let removed = notes.drain_where(|n| n.id != "b");
        assert_eq!(removed.len(), 2);
        assert_eq!(notes.len(), 1);
        assert!(notes.contains("b"));
    }
}
