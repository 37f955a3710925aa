use std::collections::BTreeMap;

use crate::models::{HeatmapData, Job, JobStatus};

/// Number of skills shown on the dashboard heatmap.
pub const TOP_GAPS: usize = 8;

/// Tallies how often each skill is required and missing across the tracked
/// jobs. Rejected jobs and jobs without an analysis are skipped. Skills are
/// merged case-insensitively; output is ordered by canonical key.
pub fn aggregate(jobs: &[Job]) -> Vec<HeatmapData> {
    let mut counts: BTreeMap<String, (u32, u32)> = BTreeMap::new();

    for job in jobs {
        if job.status == JobStatus::Rejected {
            continue;
        }
        let Some(analysis) = &job.analysis else { continue };

        for skill in &analysis.skills_required {
            counts.entry(canonical_key(skill)).or_default().0 += 1;
        }
        for skill in &analysis.skills_missing {
            counts.entry(canonical_key(skill)).or_default().1 += 1;
        }
    }

    counts
        .into_iter()
        .map(|(key, (frequency, gap_frequency))| HeatmapData {
            skill: capitalize(&key),
            frequency,
            gap_frequency,
        })
        .collect()
}

/// Highest gap counts first, truncated to `limit`. Ties keep their input order.
pub fn top_gaps(data: &[HeatmapData], limit: usize) -> Vec<HeatmapData> {
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| b.gap_frequency.cmp(&a.gap_frequency));
    sorted.truncate(limit);
    sorted
}

/// Bar width for a heatmap row. Not clamped: a skill missing more often than
/// it is required yields more than 100.
pub fn gap_percent(item: &HeatmapData) -> f64 {
    let total = item.frequency.max(1) as f64;
    item.gap_frequency as f64 / total * 100.0
}

/// Filled cells of a `width`-cell bar. Only the drawing is capped at full.
pub fn bar_cells(item: &HeatmapData, width: usize) -> usize {
    ((gap_percent(item).min(100.0) / 100.0) * width as f64).round() as usize
}

/// Lower-cased token, otherwise as the analysis wrote it.
fn canonical_key(skill: &str) -> String {
    skill.to_lowercase()
}

fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobAnalysis, MoscowPriority};

    fn job(status: JobStatus, required: &[&str], missing: &[&str]) -> Job {
        Job {
            id: uuid::Uuid::new_v4().to_string(),
            title: "Role".to_string(),
            company: "Co".to_string(),
            description: String::new(),
            status,
            date_added: String::new(),
            clarification_answers: None,
            analysis: Some(JobAnalysis {
                skills_required: required.iter().map(|s| s.to_string()).collect(),
                skills_missing: missing.iter().map(|s| s.to_string()).collect(),
                competency_match_score: 70.0,
                salary_range: String::new(),
                rice_score: 10.0,
                moscow_priority: Some(MoscowPriority::Should),
                summary_bullets: vec![],
                red_flags: vec![],
            }),
            market_intel: None,
            artefacts: None,
        }
    }

    fn find<'a>(data: &'a [HeatmapData], skill: &str) -> &'a HeatmapData {
        data.iter().find(|d| d.skill == skill).unwrap()
    }

    #[test]
    fn test_empty_list_yields_empty_output() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn test_sql_python_scenario() {
        let jobs = vec![job(JobStatus::Applied, &["SQL", "Python"], &["Python"])];
        let data = aggregate(&jobs);
        assert_eq!(data.len(), 2);
        assert_eq!(
            *find(&data, "Sql"),
            HeatmapData { skill: "Sql".to_string(), frequency: 1, gap_frequency: 0 }
        );
        assert_eq!(
            *find(&data, "Python"),
            HeatmapData { skill: "Python".to_string(), frequency: 1, gap_frequency: 1 }
        );
    }

    #[test]
    fn test_rejected_jobs_contribute_nothing() {
        let jobs = vec![
            job(JobStatus::Rejected, &["Rust", "Go"], &["Kubernetes"]),
            job(JobStatus::Interview, &["Rust"], &[]),
        ];
        let data = aggregate(&jobs);
        assert_eq!(data.len(), 1);
        assert_eq!(find(&data, "Rust").frequency, 1);
    }

    #[test]
    fn test_job_without_analysis_is_skipped() {
        let mut bare = job(JobStatus::Draft, &["Rust"], &["Go"]);
        bare.analysis = None;
        assert!(aggregate(&[bare]).is_empty());
    }

    #[test]
    fn test_case_variants_merge_into_one_entry() {
        let jobs = vec![
            job(JobStatus::Draft, &["Python"], &[]),
            job(JobStatus::Offer, &["python", "PYTHON"], &["pYthon"]),
        ];
        let data = aggregate(&jobs);
        assert_eq!(data.len(), 1);
        let python = find(&data, "Python");
        assert_eq!(python.frequency, 3);
        assert_eq!(python.gap_frequency, 1);
    }

    #[test]
    fn test_missing_only_skill_has_zero_frequency() {
        let data = aggregate(&[job(JobStatus::Applied, &[], &["Figma", "Figma"])]);
        let figma = find(&data, "Figma");
        assert_eq!(figma.frequency, 0);
        assert_eq!(figma.gap_frequency, 2);
        assert_eq!(gap_percent(figma), 200.0);
    }

    #[test]
    fn test_only_case_is_folded() {
        let data = aggregate(&[job(JobStatus::Applied, &["Python", " python", ""], &["PYTHON"])]);
        assert_eq!(data.len(), 3);
        assert_eq!(find(&data, "Python").frequency, 1);
        assert_eq!(find(&data, "Python").gap_frequency, 1);
        assert_eq!(find(&data, " python").frequency, 1);
        assert_eq!(find(&data, "").frequency, 1);
    }

    #[test]
    fn test_one_entry_per_distinct_folded_skill() {
        let jobs = vec![
            job(JobStatus::Applied, &["A", "b", "C"], &["d"]),
            job(JobStatus::Interview, &["a", "B"], &["D", "e"]),
            job(JobStatus::Rejected, &["zzz"], &["yyy"]),
        ];
        let mut skills: Vec<String> = aggregate(&jobs).into_iter().map(|d| d.skill).collect();
        skills.sort();
        assert_eq!(skills, vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_top_gaps_sorts_descending_and_truncates() {
        let data: Vec<HeatmapData> = (0..12)
            .map(|i| HeatmapData { skill: format!("S{}", i), frequency: 1, gap_frequency: i })
            .collect();
        let top = top_gaps(&data, TOP_GAPS);
        assert_eq!(top.len(), 8);
        assert_eq!(top[0].gap_frequency, 11);
        assert_eq!(top[7].gap_frequency, 4);
    }

    #[test]
    fn test_gap_percent_uses_frequency_floor_of_one() {
        let item = HeatmapData { skill: "X".to_string(), frequency: 4, gap_frequency: 1 };
        assert_eq!(gap_percent(&item), 25.0);
        let item = HeatmapData { skill: "Y".to_string(), frequency: 0, gap_frequency: 0 };
        assert_eq!(gap_percent(&item), 0.0);
    }

    #[test]
    fn test_bar_cells_caps_drawing_only() {
        let item = HeatmapData { skill: "Go".to_string(), frequency: 1, gap_frequency: 3 };
        assert_eq!(gap_percent(&item), 300.0);
        assert_eq!(bar_cells(&item, 20), 20);
        let item = HeatmapData { skill: "Sql".to_string(), frequency: 2, gap_frequency: 1 };
        assert_eq!(bar_cells(&item, 20), 10);
    }
}
