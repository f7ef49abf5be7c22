// src/services/document_service.rs

use std::sync::Arc;

use serde_json::{Value, json};

use crate::{
    db::StoreState,
    models::document::{
        Document, DocumentDraft, DocumentPatch, Project, ProjectDraft, ProjectPatch, ProjectTask, TaskDraft,
        TaskPatch,
    },
    store::StoreContext,
};

/// Categoria usada quando o documento chega sem uma.
pub const UNCLASSIFIED_CATEGORY: &str = "Non classé";

pub const VELOCITY_STAT: &str = "projectVelocity";

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn trimmed_opt(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// Progresso médio por projeto, republicado a cada mudança de projeto ou tarefa
fn refresh_velocity(state: &mut StoreState) {
    let velocity: Vec<Value> = state
        .projects
        .iter()
        .map(|p| json!({ "projectId": p.id, "projectName": p.name, "progress": p.velocity() }))
        .collect();
    state.stats.insert(VELOCITY_STAT.to_string(), Value::Array(velocity));
}

// Um fim anterior ao início é alinhado pelo lado que não foi editado
fn reconcile_task_dates(task: &mut ProjectTask, start_changed: bool, end_changed: bool) {
    if task.end < task.start {
        if start_changed && !end_changed {
            task.end = task.start;
        } else {
            task.start = task.end;
        }
    }
}

// Documentos e projetos são só locais.
#[derive(Clone)]
pub struct DocumentService {
    ctx: Arc<StoreContext>,
}

impl DocumentService {
    pub(crate) fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    // ==========================================
    // DOCUMENTOS
    // ==========================================

    pub fn list(&self) -> Vec<Document> {
        self.ctx.read(|s| s.documents.to_vec())
    }

    /// Documentos comerciais ligados a um engagement (devis, faturas).
    pub fn for_engagement(&self, engagement_id: &str) -> Vec<Document> {
        self.ctx.read(|s| {
            s.documents
                .iter()
                .filter(|d| d.engagement_id.as_deref() == Some(engagement_id))
                .cloned()
                .collect()
        })
    }

    pub fn add(&self, draft: DocumentDraft) -> Document {
        let category = draft.category.trim().to_string();
        let document = Document {
            id: self.ctx.new_id("doc-"),
            title: draft.title.trim().to_string(),
            category: if category.is_empty() { UNCLASSIFIED_CATEGORY.to_string() } else { category },
            description: draft.description.trim().to_string(),
            updated_at: self.ctx.now(),
            owner: draft.owner.trim().to_string(),
            company_id: trimmed_opt(draft.company_id),
            tags: clean_tags(draft.tags),
            source: draft.source,
            url: trimmed_opt(draft.url),
            kind: draft.kind,
            engagement_id: draft.engagement_id,
            number: draft.number,
            status: draft.status,
            total_ht: draft.total_ht,
            total_ttc: draft.total_ttc,
            issue_date: draft.issue_date,
            due_date: draft.due_date,
            recipients: draft.recipients,
        };
        self.ctx.write(|s| s.documents.insert_front(document.clone()));
        document
    }

    pub fn update(&self, document_id: &str, patch: DocumentPatch) -> Option<Document> {
        let now = self.ctx.now();
        self.ctx.write(|s| {
            let document = s.documents.get_mut(document_id)?;
            if let Some(v) = patch.title {
                document.title = v.trim().to_string();
            }
            if let Some(v) = patch.category {
                let v = v.trim();
                document.category = if v.is_empty() { UNCLASSIFIED_CATEGORY.to_string() } else { v.to_string() };
            }
            if let Some(v) = patch.description {
                document.description = v.trim().to_string();
            }
            if let Some(v) = patch.owner {
                document.owner = v.trim().to_string();
            }
            if let Some(v) = patch.tags {
                document.tags = clean_tags(v);
            }
            if let Some(v) = patch.url {
                document.url = trimmed_opt(v);
            }
            if let Some(v) = patch.status {
                document.status = v;
            }
            if let Some(v) = patch.total_ht {
                document.total_ht = v;
            }
            if let Some(v) = patch.total_ttc {
                document.total_ttc = v;
            }
            if let Some(v) = patch.due_date {
                document.due_date = v;
            }
            if let Some(v) = patch.recipients {
                document.recipients = v;
            }
            document.updated_at = now;
            Some(document.clone())
        })
    }

    pub fn remove(&self, document_id: &str) -> bool {
        self.ctx.write(|s| s.documents.remove(document_id).is_some())
    }

    // ==========================================
    // PROJETOS
    // ==========================================

    pub fn projects(&self) -> Vec<Project> {
        self.ctx.read(|s| s.projects.to_vec())
    }

    pub fn add_project(&self, draft: ProjectDraft) -> Project {
        let project = Project {
            id: self.ctx.new_id("p"),
            name: draft.name,
            client_id: draft.client_id,
            manager: draft.manager,
            start: draft.start,
            end: draft.end,
            status: draft.status,
            member_ids: draft.member_ids,
            tasks: Vec::new(),
        };
        self.ctx.write(|s| {
            s.projects.push(project.clone());
            refresh_velocity(s);
        });
        project
    }

    pub fn update_project(&self, project_id: &str, patch: ProjectPatch) -> Option<Project> {
        self.ctx.write(|s| {
            let project = s.projects.get_mut(project_id)?;
            if let Some(v) = patch.name {
                project.name = v;
            }
            if let Some(v) = patch.manager {
                project.manager = v;
            }
            if let Some(v) = patch.start {
                project.start = v;
            }
            if let Some(v) = patch.end {
                project.end = v;
            }
            if let Some(v) = patch.status {
                project.status = v;
            }
            if let Some(v) = patch.member_ids {
                project.member_ids = v;
            }
            let updated = project.clone();
            refresh_velocity(s);
            Some(updated)
        })
    }

    pub fn remove_project(&self, project_id: &str) -> bool {
        self.ctx.write(|s| {
            let removed = s.projects.remove(project_id).is_some();
            refresh_velocity(s);
            removed
        })
    }

    /// O responsável da tarefa entra na equipe do projeto.
    pub fn add_task(&self, project_id: &str, draft: TaskDraft) -> Option<ProjectTask> {
        let mut task = ProjectTask {
            id: self.ctx.new_id("pt"),
            name: draft.name,
            assignee_id: draft.assignee_id,
            start: draft.start,
            end: draft.end,
            progress: 0,
            status: Default::default(),
            priority: draft.priority,
            estimated_hours: draft.estimated_hours,
            description: draft.description,
            last_updated: self.ctx.now(),
        };
        reconcile_task_dates(&mut task, false, true);

        self.ctx.write(|s| {
            let project = s.projects.get_mut(project_id)?;
            if let Some(assignee) = &task.assignee_id {
                if !project.member_ids.contains(assignee) {
                    project.member_ids.push(assignee.clone());
                }
            }
            project.tasks.push(task.clone());
            refresh_velocity(s);
            Some(task)
        })
    }

    pub fn update_task(&self, project_id: &str, task_id: &str, patch: TaskPatch) -> Option<ProjectTask> {
        let now = self.ctx.now();
        self.ctx.write(|s| {
            let project = s.projects.get_mut(project_id)?;
            let task = project.tasks.iter_mut().find(|t| t.id == task_id)?;
            let start_changed = patch.start.is_some();
            let end_changed = patch.end.is_some();
            if let Some(v) = patch.name {
                task.name = v;
            }
            if let Some(v) = patch.assignee_id {
                task.assignee_id = v;
            }
            if let Some(v) = patch.start {
                task.start = v;
            }
            if let Some(v) = patch.end {
                task.end = v;
            }
            if let Some(v) = patch.progress {
                task.progress = v.min(100);
            }
            if let Some(v) = patch.status {
                task.status = v;
            }
            if let Some(v) = patch.priority {
                task.priority = v;
            }
            if let Some(v) = patch.estimated_hours {
                task.estimated_hours = v;
            }
            if let Some(v) = patch.description {
                task.description = v;
            }
            if start_changed || end_changed {
                reconcile_task_dates(task, start_changed, end_changed);
            }
            task.last_updated = now;
            let updated = task.clone();

            for assignee in project.tasks.iter().filter_map(|t| t.assignee_id.clone()) {
                if !project.member_ids.contains(&assignee) {
                    project.member_ids.push(assignee);
                }
            }
            refresh_velocity(s);
            Some(updated)
        })
    }

    pub fn remove_task(&self, project_id: &str, task_id: &str) -> bool {
        self.ctx.write(|s| {
            let Some(project) = s.projects.get_mut(project_id) else {
                return false;
            };
            let before = project.tasks.len();
            project.tasks.retain(|t| t.id != task_id);
            let removed = project.tasks.len() < before;
            refresh_velocity(s);
            removed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn task(start: (i32, u32, u32), end: (i32, u32, u32)) -> ProjectTask {
        ProjectTask {
            id: "pt-1".into(),
            name: "Nettoyage".into(),
            assignee_id: None,
            start: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            end: NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
            progress: 0,
            status: Default::default(),
            priority: Default::default(),
            estimated_hours: 4,
            description: String::new(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn inverted_dates_follow_the_edited_side() {
        let mut moved_start = task((2024, 6, 20), (2024, 6, 10));
        reconcile_task_dates(&mut moved_start, true, false);
        assert_eq!(moved_start.end, moved_start.start);

        let mut moved_end = task((2024, 6, 20), (2024, 6, 10));
        reconcile_task_dates(&mut moved_end, false, true);
        assert_eq!(moved_end.start, NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
    }

    #[test]
    fn velocity_stat_lists_every_project() {
        let mut state = StoreState::default();
        let mut project = Project {
            id: "p-1".into(),
            name: "Flotte".into(),
            client_id: "c-1".into(),
            manager: "Ana".into(),
            start: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            status: Default::default(),
            member_ids: vec![],
            tasks: vec![task((2024, 6, 1), (2024, 6, 2)), task((2024, 6, 3), (2024, 6, 4))],
        };
        project.tasks[0].progress = 50;
        project.tasks[1].progress = 100;
        state.projects.push(project);

        refresh_velocity(&mut state);
        let velocity = &state.stats[VELOCITY_STAT];
        assert_eq!(velocity[0]["projectId"], "p-1");
        assert_eq!(velocity[0]["progress"], 75.0);
    }
}
