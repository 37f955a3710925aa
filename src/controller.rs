use anyhow::Result;
use tracing::{info, warn};

use crate::heatmap;
use crate::models::{AppView, HeatmapData, Job, JobStatus};
use crate::store::RecordStore;

/// Single owner of the job list, the active view and the selection. Every
/// list mutation re-saves the whole list and recomputes the heatmap.
pub struct Controller {
    store: RecordStore,
    jobs: Vec<Job>,
    view: AppView,
    selected: Option<String>,
    heatmap: Vec<HeatmapData>,
}

impl Controller {
    /// Loads the persisted list. A missing or unreadable blob starts an empty
    /// tracker.
    pub fn initialize(store: RecordStore) -> Self {
        let jobs = match store.load() {
            Ok(Some(jobs)) => {
                info!(count = jobs.len(), "Loaded tracked jobs");
                jobs
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to load jobs, starting empty: {:#}", e);
                Vec::new()
            }
        };
        let heatmap = heatmap::aggregate(&jobs);
        Self {
            store,
            jobs,
            view: AppView::Dashboard,
            selected: None,
            heatmap,
        }
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Non-rejected jobs in list order.
    pub fn active_jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter().filter(|j| j.status != JobStatus::Rejected)
    }

    pub fn view(&self) -> AppView {
        self.view
    }

    pub fn heatmap(&self) -> &[HeatmapData] {
        &self.heatmap
    }

    pub fn selected_job(&self) -> Option<&Job> {
        let id = self.selected.as_deref()?;
        self.find(id)
    }

    pub fn find(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Resolves a full id or a unique id prefix.
    pub fn resolve_id(&self, id_or_prefix: &str) -> Option<&Job> {
        if let Some(job) = self.find(id_or_prefix) {
            return Some(job);
        }
        let mut matches = self.jobs.iter().filter(|j| j.id.starts_with(id_or_prefix));
        match (matches.next(), matches.next()) {
            (Some(job), None) if !id_or_prefix.is_empty() => Some(job),
            _ => None,
        }
    }

    pub fn navigate(&mut self, view: AppView) {
        self.view = if view == AppView::JobDetail && self.selected_job().is_none() {
            AppView::Dashboard
        } else {
            view
        };
    }

    pub fn add_job(&mut self, job: Job) -> Result<()> {
        info!(id = %job.id, title = %job.title, "Adding job");
        self.selected = Some(job.id.clone());
        self.jobs.insert(0, job);
        self.view = AppView::JobDetail;
        self.commit()
    }

    /// Unknown ids leave the list untouched.
    pub fn update_status(&mut self, job_id: &str, status: JobStatus) -> Result<()> {
        match self.jobs.iter_mut().find(|j| j.id == job_id) {
            Some(job) => {
                info!(id = %job_id, from = %job.status, to = %status, "Updating status");
                job.status = status;
            }
            None => warn!(id = %job_id, "Status update for unknown job ignored"),
        }
        self.commit()
    }

    pub fn delete_job(&mut self, job_id: &str) -> Result<()> {
        let before = self.jobs.len();
        self.jobs.retain(|j| j.id != job_id);
        if self.jobs.len() != before {
            info!(id = %job_id, "Deleted job");
        }
        if self.selected.as_deref() == Some(job_id) {
            self.selected = None;
            self.view = AppView::Dashboard;
        }
        self.commit()
    }

    /// Returns false when no job has this id.
    pub fn select_job(&mut self, job_id: &str) -> bool {
        if self.find(job_id).is_none() {
            return false;
        }
        self.selected = Some(job_id.to_string());
        self.view = AppView::JobDetail;
        true
    }

    fn commit(&mut self) -> Result<()> {
        self.heatmap = heatmap::aggregate(&self.jobs);
        self.store.save(&self.jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobAnalysis, MoscowPriority};
    use crate::store::{JOBS_KEY, KeyValueStore, MemoryStore};

    fn job(id: &str, skills: &[&str]) -> Job {
        Job {
            id: id.to_string(),
            title: format!("Role {}", id),
            company: "Acme".to_string(),
            description: "JD".to_string(),
            status: JobStatus::Draft,
            date_added: "2024-05-01T10:00:00Z".to_string(),
            clarification_answers: None,
            analysis: Some(JobAnalysis {
                skills_required: skills.iter().map(|s| s.to_string()).collect(),
                skills_missing: vec![],
                competency_match_score: 80.0,
                salary_range: "£90k".to_string(),
                rice_score: 42.0,
                moscow_priority: Some(MoscowPriority::Must),
                summary_bullets: vec![],
                red_flags: vec![],
            }),
            market_intel: None,
            artefacts: None,
        }
    }

    fn controller() -> (Controller, MemoryStore) {
        let kv = MemoryStore::new();
        let ctl = Controller::initialize(RecordStore::new(Box::new(kv.clone())));
        (ctl, kv)
    }

    fn reload(kv: &MemoryStore) -> Vec<Job> {
        RecordStore::new(Box::new(kv.clone())).load().unwrap().unwrap()
    }

    #[test]
    fn test_initialize_empty_store() {
        let (ctl, _) = controller();
        assert!(ctl.jobs().is_empty());
        assert_eq!(ctl.view(), AppView::Dashboard);
        assert!(ctl.selected_job().is_none());
    }

    #[test]
    fn test_initialize_corrupt_store_starts_empty() {
        let kv = MemoryStore::new();
        kv.set(JOBS_KEY, "not-json").unwrap();
        let ctl = Controller::initialize(RecordStore::new(Box::new(kv)));
        assert!(ctl.jobs().is_empty());
        assert!(ctl.heatmap().is_empty());
    }

    #[test]
    fn test_drifted_record_survives_initialize_and_next_save() {
        let kv = MemoryStore::new();
        let blob = serde_json::json!([
            serde_json::to_value(job("a", &["Rust"])).unwrap(),
            {"id": "old", "status": "Applied", "analysis": {"skills_required": ["SQL"], "skills_missing": ["SQL"]}},
        ]);
        kv.set(JOBS_KEY, &blob.to_string()).unwrap();

        let mut ctl = Controller::initialize(RecordStore::new(Box::new(kv.clone())));
        assert_eq!(ctl.jobs().len(), 2);
        assert_eq!(ctl.heatmap().len(), 2);

        ctl.update_status("nothing", JobStatus::Offer).unwrap();
        let saved = reload(&kv);
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0], job("a", &["Rust"]));
        assert_eq!(saved[1].id, "old");
        assert_eq!(saved[1].status, JobStatus::Applied);
    }

    #[test]
    fn test_initialize_computes_heatmap_from_saved_jobs() {
        let kv = MemoryStore::new();
        RecordStore::new(Box::new(kv.clone())).save(&[job("a", &["Rust"])]).unwrap();
        let ctl = Controller::initialize(RecordStore::new(Box::new(kv)));
        assert_eq!(ctl.jobs().len(), 1);
        assert_eq!(ctl.heatmap()[0].skill, "Rust");
    }

    #[test]
    fn test_add_job_prepends_selects_and_persists() {
        let (mut ctl, kv) = controller();
        ctl.add_job(job("a", &["Rust"])).unwrap();
        ctl.add_job(job("b", &["Go"])).unwrap();

        assert_eq!(ctl.jobs()[0].id, "b");
        assert_eq!(ctl.view(), AppView::JobDetail);
        assert_eq!(ctl.selected_job().unwrap().id, "b");
        assert_eq!(ctl.heatmap().len(), 2);

        let saved = reload(&kv);
        assert_eq!(saved[0], job("b", &["Go"]));
        assert_eq!(saved.len(), 2);
    }

    #[test]
    fn test_update_status_refreshes_selection_and_heatmap() {
        let (mut ctl, kv) = controller();
        ctl.add_job(job("a", &["Rust"])).unwrap();
        ctl.update_status("a", JobStatus::Rejected).unwrap();

        assert_eq!(ctl.selected_job().unwrap().status, JobStatus::Rejected);
        assert!(ctl.heatmap().is_empty());
        assert_eq!(reload(&kv)[0].status, JobStatus::Rejected);
        assert_eq!(ctl.active_jobs().count(), 0);
    }

    #[test]
    fn test_update_status_unknown_id_is_noop() {
        let (mut ctl, _) = controller();
        ctl.add_job(job("a", &[])).unwrap();
        let before = ctl.jobs().to_vec();
        ctl.update_status("missing", JobStatus::Offer).unwrap();
        assert_eq!(ctl.jobs(), before.as_slice());
    }

    #[test]
    fn test_delete_selected_job_returns_to_dashboard() {
        let (mut ctl, kv) = controller();
        ctl.add_job(job("a", &[])).unwrap();
        ctl.add_job(job("b", &[])).unwrap();
        ctl.delete_job("b").unwrap();

        assert_eq!(ctl.jobs().len(), 1);
        assert_eq!(ctl.jobs()[0].id, "a");
        assert!(ctl.selected_job().is_none());
        assert_eq!(ctl.view(), AppView::Dashboard);
        assert_eq!(reload(&kv).len(), 1);
    }

    #[test]
    fn test_delete_unselected_job_keeps_selection() {
        let (mut ctl, _) = controller();
        ctl.add_job(job("a", &[])).unwrap();
        ctl.add_job(job("b", &[])).unwrap();
        ctl.delete_job("a").unwrap();

        assert_eq!(ctl.selected_job().unwrap().id, "b");
        assert_eq!(ctl.view(), AppView::JobDetail);
    }

    #[test]
    fn test_select_job() {
        let (mut ctl, _) = controller();
        ctl.add_job(job("a", &[])).unwrap();
        ctl.add_job(job("b", &[])).unwrap();
        ctl.navigate(AppView::Dashboard);

        assert!(ctl.select_job("a"));
        assert_eq!(ctl.view(), AppView::JobDetail);
        assert_eq!(ctl.selected_job().unwrap().id, "a");
        assert!(!ctl.select_job("zzz"));
        assert_eq!(ctl.selected_job().unwrap().id, "a");
    }

    #[test]
    fn test_navigate_to_detail_without_selection_falls_back() {
        let (mut ctl, _) = controller();
        ctl.navigate(AppView::JobDetail);
        assert_eq!(ctl.view(), AppView::Dashboard);
        ctl.navigate(AppView::AddJob);
        assert_eq!(ctl.view(), AppView::AddJob);
    }

    #[test]
    fn test_resolve_id_by_prefix() {
        let (mut ctl, _) = controller();
        ctl.add_job(job("abc123", &[])).unwrap();
        ctl.add_job(job("abd456", &[])).unwrap();

        assert_eq!(ctl.resolve_id("abc").unwrap().id, "abc123");
        assert_eq!(ctl.resolve_id("abd456").unwrap().id, "abd456");
        assert!(ctl.resolve_id("ab").is_none());
        assert!(ctl.resolve_id("").is_none());
    }
}
