use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::warn;

use crate::analysis::JobAnalyst;
use crate::models::{Job, JobStatus};

const MAX_HEADING_CHARS: usize = 50;
pub const UNKNOWN_COMPANY: &str = "Unknown Company";
pub const UNTITLED_ROLE: &str = "Untitled Role";
pub const QUESTIONS_FAILED: &str = "Failed to generate questions. Please try again.";
pub const ANALYSIS_FAILED: &str = "Analysis failed. Please try again.";

static TITLE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*title[ \t]*:[ \t]*(.*?)[ \t]*$").expect("valid regex"));
static COMPANY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*company[ \t]*:[ \t]*(.*?)[ \t]*$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    DraftEntry,
    Clarification,
}

/// Two-step intake: paste a description, answer the clarifying questions,
/// then build a fully analysed `Job`.
#[derive(Debug, Clone)]
pub struct IntakeWizard {
    step: WizardStep,
    jd_text: String,
    questions: Vec<String>,
    answers: BTreeMap<usize, String>,
    loading: bool,
    error: Option<String>,
}

impl Default for IntakeWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl IntakeWizard {
    pub fn new() -> Self {
        Self {
            step: WizardStep::DraftEntry,
            jd_text: String::new(),
            questions: Vec::new(),
            answers: BTreeMap::new(),
            loading: false,
            error: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn jd_text(&self) -> &str {
        &self.jd_text
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn answer(&self, index: usize) -> &str {
        self.answers.get(&index).map(String::as_str).unwrap_or("")
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn can_submit(&self) -> bool {
        !self.loading
            && match self.step {
                WizardStep::DraftEntry => !self.jd_text.trim().is_empty(),
                WizardStep::Clarification => true,
            }
    }

    /// Edits are only accepted on the draft step.
    pub fn set_jd_text(&mut self, text: impl Into<String>) {
        if self.step == WizardStep::DraftEntry && !self.loading {
            self.jd_text = text.into();
        }
    }

    pub fn jd_text_mut(&mut self) -> Option<&mut String> {
        (self.step == WizardStep::DraftEntry && !self.loading).then_some(&mut self.jd_text)
    }

    pub fn set_answer(&mut self, index: usize, answer: impl Into<String>) {
        if self.step == WizardStep::Clarification && index < self.questions.len() {
            self.answers.insert(index, answer.into());
        }
    }

    /// Marks a submission in flight so the view can disable its controls
    /// before the blocking call starts. Returns false when submission is not
    /// currently allowed.
    pub fn begin_submit(&mut self) -> bool {
        if !self.can_submit() {
            return false;
        }
        self.loading = true;
        self.error = None;
        true
    }

    /// Draft step → clarification step. On failure the draft text is kept
    /// and an error is shown.
    pub fn request_questions(&mut self, analyst: &dyn JobAnalyst) {
        if self.step != WizardStep::DraftEntry || self.jd_text.trim().is_empty() {
            self.loading = false;
            return;
        }
        self.loading = true;
        self.error = None;

        match analyst.clarifying_questions(&self.jd_text) {
            Ok(questions) => {
                self.questions = questions;
                self.answers.clear();
                self.step = WizardStep::Clarification;
            }
            Err(e) => {
                warn!("Clarifying questions failed: {}", e);
                self.error = Some(QUESTIONS_FAILED.to_string());
            }
        }
        self.loading = false;
    }

    /// Runs the full analysis. Returns the finished job on success; on
    /// failure stays on the clarification step with answers intact.
    pub fn complete(&mut self, analyst: &dyn JobAnalyst) -> Option<Job> {
        if self.step != WizardStep::Clarification {
            self.loading = false;
            return None;
        }
        self.loading = true;
        self.error = None;

        let transcript = self.transcript();
        match analyst.full_analysis(&self.jd_text, &transcript) {
            Ok(result) => {
                self.loading = false;
                let (title, company) = extract_title_company(&self.jd_text);
                Some(Job {
                    id: uuid::Uuid::new_v4().to_string(),
                    title,
                    company,
                    description: self.jd_text.clone(),
                    status: JobStatus::Draft,
                    date_added: chrono::Utc::now().to_rfc3339(),
                    clarification_answers: Some(transcript),
                    analysis: Some(result.analysis),
                    market_intel: Some(result.market_intel),
                    artefacts: Some(result.artefacts),
                })
            }
            Err(e) => {
                warn!("Full analysis failed: {}", e);
                self.error = Some(ANALYSIS_FAILED.to_string());
                self.loading = false;
                None
            }
        }
    }

    /// `Q: ...\nA: ...` blocks separated by a blank line; unanswered questions
    /// read N/A and answers are kept as typed.
    pub fn transcript(&self) -> String {
        self.questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let answer = self.answer(i);
                let answer = if answer.is_empty() { "N/A" } else { answer };
                format!("Q: {}\nA: {}", q, answer)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Title and company from `title:` / `company:` lines, falling back to the
/// first line and a placeholder company.
pub fn extract_title_company(text: &str) -> (String, String) {
    let title = capture(&TITLE_LINE, text).unwrap_or_else(|| {
        let first_line = text.lines().next().unwrap_or("").trim();
        if first_line.is_empty() {
            UNTITLED_ROLE.to_string()
        } else {
            truncate(first_line)
        }
    });
    let company = capture(&COMPANY_LINE, text).unwrap_or_else(|| UNKNOWN_COMPANY.to_string());
    (title, company)
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .find(|value| !value.is_empty())
        .map(truncate)
}

fn truncate(s: &str) -> String {
    s.chars().take(MAX_HEADING_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisError;
    use crate::models::{Artefacts, FullAnalysis, JobAnalysis, MarketIntel, MoscowPriority};
    use std::cell::{Cell, RefCell};

    struct FakeAnalyst {
        questions_fail: bool,
        analysis_fail: Cell<bool>,
        seen_transcript: RefCell<Option<String>>,
    }

    impl FakeAnalyst {
        fn new() -> Self {
            Self {
                questions_fail: false,
                analysis_fail: Cell::new(false),
                seen_transcript: RefCell::new(None),
            }
        }
    }

    impl JobAnalyst for FakeAnalyst {
        fn clarifying_questions(&self, _description: &str) -> Result<Vec<String>, AnalysisError> {
            if self.questions_fail {
                return Err(AnalysisError::Empty);
            }
            Ok(vec!["Team size?".to_string(), "Remote?".to_string()])
        }

        fn full_analysis(
            &self,
            _description: &str,
            clarifications: &str,
        ) -> Result<FullAnalysis, AnalysisError> {
            *self.seen_transcript.borrow_mut() = Some(clarifications.to_string());
            if self.analysis_fail.get() {
                return Err(AnalysisError::Invalid("bad".to_string()));
            }
            Ok(FullAnalysis {
                analysis: JobAnalysis {
                    skills_required: vec!["Python".to_string()],
                    skills_missing: vec![],
                    competency_match_score: 64.0,
                    salary_range: "£100k".to_string(),
                    rice_score: 20.0,
                    moscow_priority: Some(MoscowPriority::Should),
                    summary_bullets: vec![],
                    red_flags: vec![],
                },
                market_intel: MarketIntel::default(),
                artefacts: Artefacts::default(),
            })
        }
    }

    const JD: &str = "Senior PM, Wearables\nCompany: Pulse Labs\nTitle: Head of Product\nBuild things.";

    #[test]
    fn test_happy_path_builds_draft_job() {
        let analyst = FakeAnalyst::new();
        let mut wizard = IntakeWizard::new();
        wizard.set_jd_text(JD);
        assert!(wizard.begin_submit());
        assert!(wizard.is_loading());
        wizard.request_questions(&analyst);

        assert_eq!(wizard.step(), WizardStep::Clarification);
        assert!(!wizard.is_loading());
        wizard.set_answer(0, "8 engineers");

        let job = wizard.complete(&analyst).unwrap();
        assert_eq!(job.title, "Head of Product");
        assert_eq!(job.company, "Pulse Labs");
        assert_eq!(job.status, JobStatus::Draft);
        assert_eq!(job.description, JD);
        assert!(job.analysis.is_some() && job.market_intel.is_some() && job.artefacts.is_some());
        assert!(uuid::Uuid::parse_str(&job.id).is_ok());
        assert!(chrono::DateTime::parse_from_rfc3339(&job.date_added).is_ok());
        assert_eq!(
            job.clarification_answers.as_deref(),
            Some("Q: Team size?\nA: 8 engineers\n\nQ: Remote?\nA: N/A")
        );
        assert_eq!(analyst.seen_transcript.borrow().as_deref(), job.clarification_answers.as_deref());
    }

    #[test]
    fn test_questions_failure_stays_on_draft_with_text() {
        let analyst = FakeAnalyst { questions_fail: true, ..FakeAnalyst::new() };
        let mut wizard = IntakeWizard::new();
        wizard.set_jd_text(JD);
        wizard.begin_submit();
        wizard.request_questions(&analyst);

        assert_eq!(wizard.step(), WizardStep::DraftEntry);
        assert_eq!(wizard.jd_text(), JD);
        assert_eq!(wizard.error(), Some(QUESTIONS_FAILED));
        assert!(!wizard.is_loading());
    }

    #[test]
    fn test_analysis_failure_keeps_answers_and_clears_loading() {
        let analyst = FakeAnalyst::new();
        let mut wizard = IntakeWizard::new();
        wizard.set_jd_text(JD);
        wizard.request_questions(&analyst);
        wizard.set_answer(1, "Hybrid");

        analyst.analysis_fail.set(true);
        assert!(wizard.begin_submit());
        assert!(wizard.complete(&analyst).is_none());

        assert_eq!(wizard.step(), WizardStep::Clarification);
        assert_eq!(wizard.answer(1), "Hybrid");
        assert!(!wizard.is_loading());
        assert_eq!(wizard.error(), Some(ANALYSIS_FAILED));

        // retry from the same step succeeds
        analyst.analysis_fail.set(false);
        assert!(wizard.complete(&analyst).is_some());
        assert!(wizard.error().is_none());
    }

    #[test]
    fn test_blank_text_cannot_submit() {
        let analyst = FakeAnalyst::new();
        let mut wizard = IntakeWizard::new();
        wizard.set_jd_text("   \n ");
        assert!(!wizard.can_submit());
        assert!(!wizard.begin_submit());
        wizard.request_questions(&analyst);
        assert_eq!(wizard.step(), WizardStep::DraftEntry);
        assert!(wizard.error().is_none());
    }

    #[test]
    fn test_loading_blocks_duplicate_submit() {
        let mut wizard = IntakeWizard::new();
        wizard.set_jd_text(JD);
        assert!(wizard.begin_submit());
        assert!(!wizard.begin_submit());
        wizard.set_jd_text("changed");
        assert_eq!(wizard.jd_text(), JD);
    }

    #[test]
    fn test_transcript_marks_unanswered_and_keeps_typed_text() {
        let analyst = FakeAnalyst::new();
        let mut wizard = IntakeWizard::new();
        wizard.set_jd_text(JD);
        wizard.request_questions(&analyst);
        wizard.set_answer(7, "ignored");
        assert_eq!(wizard.transcript(), "Q: Team size?\nA: N/A\n\nQ: Remote?\nA: N/A");

        wizard.set_answer(0, "  about 8 ");
        wizard.set_answer(1, "");
        assert_eq!(wizard.transcript(), "Q: Team size?\nA:   about 8 \n\nQ: Remote?\nA: N/A");
    }

    #[test]
    fn test_extract_prefers_labelled_lines() {
        let (title, company) = extract_title_company("blah\n  TITLE: Staff PM  \ncompany:Acme Health");
        assert_eq!(title, "Staff PM");
        assert_eq!(company, "Acme Health");
    }

    #[test]
    fn test_extract_defaults() {
        let (title, company) = extract_title_company("Lead Product Manager - AI\nWe are hiring");
        assert_eq!(title, "Lead Product Manager - AI");
        assert_eq!(company, UNKNOWN_COMPANY);

        let (title, _) = extract_title_company("\nsecond line");
        assert_eq!(title, UNTITLED_ROLE);
    }

    #[test]
    fn test_extract_bounds_to_fifty_chars() {
        let long = "x".repeat(80);
        let (title, company) = extract_title_company(&format!("{}\nCompany: {}", long, "y".repeat(70)));
        assert_eq!(title.chars().count(), 50);
        assert_eq!(company.chars().count(), 50);
    }

    #[test]
    fn test_extract_requires_line_prefix() {
        let (title, company) = extract_title_company("Job subtitle: nope\nOur company: values");
        assert_eq!(title, "Job subtitle: nope");
        assert_eq!(company, UNKNOWN_COMPANY);
    }
}
