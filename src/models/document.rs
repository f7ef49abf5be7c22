// src/models/document.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::common::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DocumentSource {
    #[serde(rename = "Google Drive")]
    GoogleDrive,
    #[serde(rename = "Lien externe")]
    ExternalLink,
    #[default]
    #[serde(rename = "Archive interne")]
    InternalArchive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommercialKind {
    #[serde(rename = "devis")]
    Quote,
    #[serde(rename = "facture")]
    Invoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommercialStatus {
    #[serde(rename = "brouillon")]
    Draft,
    #[serde(rename = "envoyé")]
    Sent,
    #[serde(rename = "accepté")]
    Accepted,
    #[serde(rename = "refusé")]
    Refused,
    #[serde(rename = "payé")]
    Paid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub category: String,
    pub description: String,
    pub updated_at: DateTime<Utc>,
    pub owner: String,
    pub company_id: Option<String>,
    pub tags: Vec<String>,
    pub source: DocumentSource,
    pub url: Option<String>,
    pub kind: Option<CommercialKind>,
    pub engagement_id: Option<String>,
    pub number: Option<String>,
    pub status: Option<CommercialStatus>,
    pub total_ht: Option<Money>,
    pub total_ttc: Option<Money>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDraft {
    pub title: String,
    pub category: String,
    pub description: String,
    pub owner: String,
    pub company_id: Option<String>,
    pub tags: Vec<String>,
    pub source: DocumentSource,
    pub url: Option<String>,
    pub kind: Option<CommercialKind>,
    pub engagement_id: Option<String>,
    pub number: Option<String>,
    pub status: Option<CommercialStatus>,
    pub total_ht: Option<Money>,
    pub total_ttc: Option<Money>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub tags: Option<Vec<String>>,
    pub url: Option<Option<String>>,
    pub status: Option<Option<CommercialStatus>>,
    pub total_ht: Option<Option<Money>>,
    pub total_ttc: Option<Option<Money>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub recipients: Option<Vec<String>>,
}

// --- Projetos ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProjectStatus {
    #[default]
    #[serde(rename = "Planifié")]
    Planned,
    #[serde(rename = "En cours")]
    InProgress,
    #[serde(rename = "Clôturé")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "À faire")]
    Todo,
    #[serde(rename = "En cours")]
    InProgress,
    #[serde(rename = "Terminé")]
    Done,
    #[serde(rename = "Bloqué")]
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskPriority {
    #[serde(rename = "Faible")]
    Low,
    #[default]
    #[serde(rename = "Normale")]
    Normal,
    #[serde(rename = "Haute")]
    High,
    #[serde(rename = "Critique")]
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTask {
    pub id: String,
    pub name: String,
    pub assignee_id: Option<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    // 0..=100
    pub progress: u8,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub estimated_hours: u32,
    pub description: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub client_id: String,
    pub manager: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub status: ProjectStatus,
    pub member_ids: Vec<String>,
    pub tasks: Vec<ProjectTask>,
}

impl Project {
    /// Progresso médio das tarefas (0 sem tarefas).
    pub fn velocity(&self) -> f64 {
        if self.tasks.is_empty() {
            return 0.0;
        }
        let total: u32 = self.tasks.iter().map(|t| u32::from(t.progress)).sum();
        f64::from(total) / self.tasks.len() as f64
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDraft {
    pub name: String,
    pub client_id: String,
    pub manager: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub status: ProjectStatus,
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub manager: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub status: Option<ProjectStatus>,
    pub member_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub name: String,
    pub assignee_id: Option<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub priority: TaskPriority,
    pub estimated_hours: u32,
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub name: Option<String>,
    pub assignee_id: Option<Option<String>>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub progress: Option<u8>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub estimated_hours: Option<u32>,
    pub description: Option<String>,
}
