use crate::models::Job;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailTab {
    Analysis,
    MarketIntel,
    Artefacts,
}

impl DetailTab {
    pub const ALL: [DetailTab; 3] = [DetailTab::Analysis, DetailTab::MarketIntel, DetailTab::Artefacts];

    pub fn title(&self) -> &'static str {
        match self {
            DetailTab::Analysis => "Analysis",
            DetailTab::MarketIntel => "Market Intel",
            DetailTab::Artefacts => "Artefacts",
        }
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn next(&self) -> DetailTab {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SectionBody {
    Bullets(Vec<String>),
    Prose(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub heading: &'static str,
    pub body: SectionBody,
}

fn bullets(heading: &'static str, items: &[String]) -> Section {
    Section { heading, body: SectionBody::Bullets(items.to_vec()) }
}

fn prose(heading: &'static str, text: impl Into<String>) -> Section {
    Section { heading, body: SectionBody::Prose(text.into()) }
}

/// Content of one detail tab. Empty when the job was never analysed.
pub fn tab_sections(job: &Job, tab: DetailTab) -> Vec<Section> {
    match tab {
        DetailTab::Analysis => job
            .analysis
            .as_ref()
            .map(|a| {
                vec![
                    prose(
                        "Metrics",
                        format!(
                            "Match {:.0}/100 | RICE {} | MoSCoW {} | Salary {}",
                            a.competency_match_score,
                            a.rice_score,
                            a.priority_label(),
                            if a.salary_range.is_empty() { "-" } else { a.salary_range.as_str() }
                        ),
                    ),
                    bullets("Summary", &a.summary_bullets),
                    bullets("Skills Required", &a.skills_required),
                    bullets("Skills Missing", &a.skills_missing),
                    bullets("Red Flags", &a.red_flags),
                ]
            })
            .unwrap_or_default(),
        DetailTab::MarketIntel => job
            .market_intel
            .as_ref()
            .map(|m| {
                vec![
                    bullets("Funding & News", &m.funding_news),
                    bullets("Competitors", &m.competitors),
                    bullets("Office Locations", &m.office_locations),
                    prose("Hiring Trends", m.hiring_trends_context.clone()),
                ]
            })
            .unwrap_or_default(),
        DetailTab::Artefacts => job
            .artefacts
            .as_ref()
            .map(|a| {
                vec![
                    bullets("CV Bullets", &a.cv_bullets),
                    prose("Cover Letter Draft", a.cover_letter_draft.clone()),
                    prose("LinkedIn Outreach", a.linkedin_outreach.clone()),
                    bullets("Interview Prep", &a.interview_prep),
                    bullets("STAR Stories", &a.star_stories),
                ]
            })
            .unwrap_or_default(),
    }
}

/// Sections wrapped to `width` as plain lines.
pub fn render_plain(sections: &[Section], width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for section in sections {
        lines.push(section.heading.to_uppercase());
        match &section.body {
            SectionBody::Bullets(items) if items.is_empty() => lines.push("  (none)".to_string()),
            SectionBody::Bullets(items) => {
                let options = textwrap::Options::new(width.max(20))
                    .initial_indent("  - ")
                    .subsequent_indent("    ");
                for item in items {
                    lines.extend(textwrap::wrap(item, &options).into_iter().map(|l| l.into_owned()));
                }
            }
            SectionBody::Prose(text) if text.trim().is_empty() => lines.push("  (none)".to_string()),
            SectionBody::Prose(text) => {
                let options = textwrap::Options::new(width.max(20))
                    .initial_indent("  ")
                    .subsequent_indent("  ");
                for paragraph in text.lines() {
                    if paragraph.trim().is_empty() {
                        lines.push(String::new());
                        continue;
                    }
                    lines.extend(textwrap::wrap(paragraph, &options).into_iter().map(|l| l.into_owned()));
                }
            }
        }
        lines.push(String::new());
    }
    lines
}
