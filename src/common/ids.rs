use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Gera os identificadores locais temporários e os sufixos aleatórios.
pub trait IdGenerator: Send + Sync {
    /// `<prefixo><millis>-<aleatório>`, trocado pelo id do servidor na reconciliação.
    fn temp_id(&self, prefix: &str, now: DateTime<Utc>) -> String;

    /// Sufixo de 4 dígitos (0..=9999) dos números de fatura.
    fn invoice_suffix(&self) -> u16;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn temp_id(&self, prefix: &str, now: DateTime<Utc>) -> String {
        let random = Uuid::new_v4().simple().to_string();
        format!("{}{}-{}", prefix, now.timestamp_millis(), &random[..8])
    }

    fn invoice_suffix(&self) -> u16 {
        (Uuid::new_v4().as_u128() % 10_000) as u16
    }
}

/// Ids determinísticos para testes: `<prefixo>-1`, `<prefixo>-2`, ...
///
/// Os sufixos de fatura seguem a lista fornecida e depois repetem o último.
#[derive(Debug, Default)]
pub struct SequentialIds {
    counter: AtomicU64,
    suffixes: Vec<u16>,
    suffix_cursor: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_invoice_suffixes(suffixes: Vec<u16>) -> Self {
        Self { suffixes, ..Self::default() }
    }
}

impl IdGenerator for SequentialIds {
    fn temp_id(&self, prefix: &str, _now: DateTime<Utc>) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}", prefix, n)
    }

    fn invoice_suffix(&self) -> u16 {
        if self.suffixes.is_empty() {
            return (self.suffix_cursor.fetch_add(1, Ordering::SeqCst) % 10_000) as u16;
        }
        let index = self.suffix_cursor.fetch_add(1, Ordering::SeqCst) as usize;
        self.suffixes[index.min(self.suffixes.len() - 1)]
    }
}
