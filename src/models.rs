use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    #[default]
    Draft,
    Applied,
    Interview,
    Offer,
    Rejected,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Draft,
        JobStatus::Applied,
        JobStatus::Interview,
        JobStatus::Offer,
        JobStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Draft => "Draft",
            JobStatus::Applied => "Applied",
            JobStatus::Interview => "Interview",
            JobStatus::Offer => "Offer",
            JobStatus::Rejected => "Rejected",
        }
    }

    /// The status after this one in `ALL`, wrapping around.
    pub fn next(&self) -> JobStatus {
        let idx = Self::ALL.iter().position(|s| s == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| {
                format!(
                    "Unknown status '{}'. Available: draft, applied, interview, offer, rejected",
                    s
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoscowPriority {
    Must,
    Should,
    Could,
    #[serde(rename = "Won't")]
    Wont,
}

impl MoscowPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoscowPriority::Must => "Must",
            MoscowPriority::Should => "Should",
            MoscowPriority::Could => "Could",
            MoscowPriority::Wont => "Won't",
        }
    }
}

impl fmt::Display for MoscowPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(rename = "dateAdded", default)]
    pub date_added: String,
    #[serde(rename = "clarificationAnswers", default, skip_serializing_if = "Option::is_none")]
    pub clarification_answers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<JobAnalysis>,
    #[serde(rename = "marketIntel", default, skip_serializing_if = "Option::is_none")]
    pub market_intel: Option<MarketIntel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artefacts: Option<Artefacts>,
}

impl Job {
    /// Short form of the id for tables and prompts.
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }

    /// `dateAdded` as dd/mm/yyyy, or the raw string if it does not parse.
    pub fn date_added_display(&self) -> String {
        chrono::DateTime::parse_from_rfc3339(&self.date_added)
            .map(|dt| dt.format("%d/%m/%Y").to_string())
            .unwrap_or_else(|_| self.date_added.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobAnalysis {
    #[serde(default)]
    pub skills_required: Vec<String>,
    #[serde(default)]
    pub skills_missing: Vec<String>,
    #[serde(default)]
    pub competency_match_score: f64,
    #[serde(default)]
    pub salary_range: String,
    #[serde(default)]
    pub rice_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moscow_priority: Option<MoscowPriority>,
    #[serde(default)]
    pub summary_bullets: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
}

impl JobAnalysis {
    /// MoSCoW tag for display; `-` when an older record has none.
    pub fn priority_label(&self) -> &'static str {
        self.moscow_priority.map(|p| p.as_str()).unwrap_or("-")
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketIntel {
    #[serde(default)]
    pub funding_news: Vec<String>,
    #[serde(default)]
    pub competitors: Vec<String>,
    #[serde(default)]
    pub office_locations: Vec<String>,
    #[serde(default)]
    pub hiring_trends_context: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Artefacts {
    #[serde(default)]
    pub cv_bullets: Vec<String>,
    #[serde(default)]
    pub cover_letter_draft: String,
    #[serde(default)]
    pub linkedin_outreach: String,
    #[serde(default)]
    pub interview_prep: Vec<String>,
    #[serde(default)]
    pub star_stories: Vec<String>,
}

/// The three records produced together by one full analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullAnalysis {
    pub analysis: JobAnalysis,
    #[serde(rename = "marketIntel")]
    pub market_intel: MarketIntel,
    pub artefacts: Artefacts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatmapData {
    pub skill: String,
    pub frequency: u32,
    pub gap_frequency: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppView {
    Dashboard,
    AddJob,
    JobDetail,
}
