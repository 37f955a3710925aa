use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::ai::AIProvider;
use crate::models::FullAnalysis;

/// Description prefix sent with the clarifying-questions request.
pub const QUESTIONS_PREFIX_CHARS: usize = 5_000;
/// Description prefix sent with the full analysis request.
pub const ANALYSIS_PREFIX_CHARS: usize = 10_000;

pub const BRIEFING_UNAVAILABLE: &str = "Unable to fetch daily briefing. Market signal unavailable.";
pub const BRIEFING_EMPTY: &str = "No briefing available.";
pub const FALLBACK_QUESTIONS: [&str; 2] = [
    "What is your primary motivation for this role?",
    "Do you meet the core technical requirements?",
];

const SYSTEM_INSTRUCTION: &str = "\
You are a job intelligence analyst supporting a job search for Product Management, AI/ML, \
Digital Health and Wearables roles.

Behaviour:
1. Be concise, analytical and metric-driven.
2. Use UK spelling (analyse, behaviour, programme).
3. No fluff, no emojis, no em-dashes.
4. Do not invent facts. Use the provided data.
5. Outputs are bullet-led and structured.

Candidate profile: Senior Product Manager / Head of Product level, expertise in AI/ML, \
Digital Health and Wearables, strong technical background, strategic commercial focus, \
looking for roles in London or remote (UK).

Framework: score with RICE (Reach, Impact, Confidence, Effort) and prioritise with \
MoSCoW (Must, Should, Could, Won't).

When JSON is requested, respond with valid JSON only, without markdown code fences \
or any text outside the JSON.";

const FULL_ANALYSIS_SHAPE: &str = r#"{
  "analysis": {
    "skills_required": [string],
    "skills_missing": [string],
    "competency_match_score": number (0-100),
    "salary_range": string,
    "rice_score": number,
    "moscow_priority": "Must" | "Should" | "Could" | "Won't",
    "summary_bullets": [string],
    "red_flags": [string]
  },
  "marketIntel": {
    "funding_news": [string],
    "competitors": [string],
    "office_locations": [string],
    "hiring_trends_context": string
  },
  "artefacts": {
    "cv_bullets": [string],
    "cover_letter_draft": string,
    "linkedin_outreach": string,
    "interview_prep": [string],
    "star_stories": [string]
  }
}"#;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("AI request failed: {0:#}")]
    Request(#[source] anyhow::Error),

    #[error("AI response was not valid JSON for the expected shape: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("AI response failed validation: {0}")]
    Invalid(String),

    #[error("AI returned an empty response")]
    Empty,
}

/// What the intake wizard needs from the analysis side.
pub trait JobAnalyst {
    fn clarifying_questions(&self, description: &str) -> Result<Vec<String>, AnalysisError>;
    fn full_analysis(
        &self,
        description: &str,
        clarifications: &str,
    ) -> Result<FullAnalysis, AnalysisError>;
}

pub struct AnalysisClient<'a> {
    provider: &'a dyn AIProvider,
}

impl<'a> AnalysisClient<'a> {
    pub fn new(provider: &'a dyn AIProvider) -> Self {
        Self { provider }
    }

    /// Freeform market briefing. Never fails; degrades to placeholder text.
    pub fn fetch_daily_briefing(&self) -> String {
        let prompt = "Summarise the last 24 hours of AI, Digital Health and Product Management \
                      hiring trends in the UK and London market. Focus on funding news and major \
                      leadership moves. Keep it under 5 bullet points.";

        match self.provider.complete(SYSTEM_INSTRUCTION, prompt, 1024) {
            Ok(text) if text.trim().is_empty() => BRIEFING_EMPTY.to_string(),
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("Briefing error: {:#}", e);
                BRIEFING_UNAVAILABLE.to_string()
            }
        }
    }

    /// Questions to ask before the full analysis. Falls back to a fixed pair
    /// of questions on any failure.
    pub fn fetch_clarifying_questions(&self, description: &str) -> Vec<String> {
        match self.request_questions(description) {
            Ok(questions) => questions,
            Err(e) => {
                warn!("Clarifying questions unavailable, using fallback: {}", e);
                FALLBACK_QUESTIONS.iter().map(|q| q.to_string()).collect()
            }
        }
    }

    pub fn fetch_full_analysis(
        &self,
        description: &str,
        clarifications: &str,
    ) -> Result<FullAnalysis, AnalysisError> {
        let prompt = format!(
            "PERFORM FULL JOB ANALYSIS.\n\n\
             JOB DESCRIPTION:\n{}\n\n\
             USER CLARIFICATIONS:\n{}\n\n\
             TASKS:\n\
             1. Extract skills (required vs missing against the candidate profile).\n\
             2. Estimate the UK salary range.\n\
             3. Market scan: funding, competitors, news, office locations.\n\
             4. Generate analysis metrics (RICE, MoSCoW).\n\
             5. Generate artefacts (CV bullets, cover letter draft, LinkedIn outreach, \
             interview prep questions, STAR stories).\n\n\
             Respond with JSON of exactly this shape:\n{}",
            truncate_chars(description, ANALYSIS_PREFIX_CHARS),
            clarifications,
            FULL_ANALYSIS_SHAPE,
        );

        let text = self
            .provider
            .complete_json(SYSTEM_INSTRUCTION, &prompt, 8192)
            .map_err(AnalysisError::Request)?;
        let result = parse_full_analysis(&text)?;
        info!(
            score = result.analysis.competency_match_score,
            priority = result.analysis.priority_label(),
            "Full analysis complete"
        );
        Ok(result)
    }

    fn request_questions(&self, description: &str) -> Result<Vec<String>, AnalysisError> {
        let prompt = format!(
            "Review the following job description (JD).\n\
             Identify 3-5 critical missing pieces of information needed to accurately assess \
             fit, priority (RICE) and strategy. Ask these as direct questions to the user.\n\
             Respond with JSON of the shape {{\"questions\": [string]}}.\n\n\
             JD:\n{}",
            truncate_chars(description, QUESTIONS_PREFIX_CHARS),
        );

        let text = self
            .provider
            .complete_json(SYSTEM_INSTRUCTION, &prompt, 1024)
            .map_err(AnalysisError::Request)?;
        parse_questions(&text)
    }
}

impl JobAnalyst for AnalysisClient<'_> {
    fn clarifying_questions(&self, description: &str) -> Result<Vec<String>, AnalysisError> {
        Ok(self.fetch_clarifying_questions(description))
    }

    fn full_analysis(
        &self,
        description: &str,
        clarifications: &str,
    ) -> Result<FullAnalysis, AnalysisError> {
        self.fetch_full_analysis(description, clarifications)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuestionsPayload {
    List(Vec<String>),
    Wrapped { questions: Vec<String> },
}

pub fn parse_questions(text: &str) -> Result<Vec<String>, AnalysisError> {
    let body = strip_json_fences(text);
    if body.is_empty() {
        return Err(AnalysisError::Empty);
    }
    let questions = match serde_json::from_str::<QuestionsPayload>(body)? {
        QuestionsPayload::List(qs) | QuestionsPayload::Wrapped { questions: qs } => qs,
    };
    let questions: Vec<String> = questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();
    if questions.is_empty() {
        return Err(AnalysisError::Invalid("no questions returned".to_string()));
    }
    Ok(questions)
}

const REQUIRED_ANALYSIS_FIELDS: [&str; 3] =
    ["competency_match_score", "rice_score", "moscow_priority"];

pub fn parse_full_analysis(text: &str) -> Result<FullAnalysis, AnalysisError> {
    let body = strip_json_fences(text);
    if body.is_empty() {
        return Err(AnalysisError::Empty);
    }
    let value: serde_json::Value = serde_json::from_str(body)?;
    let result: FullAnalysis = serde_json::from_value(value.clone())?;

    // Stored records tolerate these being absent; a fresh analysis must carry them.
    let missing = REQUIRED_ANALYSIS_FIELDS
        .iter()
        .find(|field| value["analysis"].get(**field).is_none_or(|v| v.is_null()));
    if let Some(field) = missing {
        return Err(AnalysisError::Invalid(format!("analysis.{} missing", field)));
    }

    let score = result.analysis.competency_match_score;
    if !(0.0..=100.0).contains(&score) {
        return Err(AnalysisError::Invalid(format!(
            "competency_match_score {} outside 0-100",
            score
        )));
    }
    if !result.analysis.rice_score.is_finite() {
        return Err(AnalysisError::Invalid("rice_score is not a finite number".to_string()));
    }
    Ok(result)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim()),
        None => text,
    }
}

/// First `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
