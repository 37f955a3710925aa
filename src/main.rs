mod ai;
mod analysis;
mod config;
mod controller;
mod detail;
mod heatmap;
mod models;
mod store;
mod tui;
mod wizard;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::OpenOptions;
use std::io::{IsTerminal, Read, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ai::AIProvider;
use analysis::AnalysisClient;
use config::Config;
use controller::Controller;
use detail::{DetailTab, render_plain, tab_sections};
use models::{Job, JobStatus};
use store::{RecordStore, SqliteStore};
use wizard::{ANALYSIS_FAILED, IntakeWizard, WizardStep};

#[derive(Parser)]
#[command(name = "jobintel")]
#[command(about = "Job application tracker with AI market intelligence and career artefacts")]
struct Cli {
    /// Model to use (gemini-flash, gemini-pro, claude-sonnet, api-sonnet, gpt-4o, ...)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Path to the tracker database
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive dashboard (default)
    Browse,

    /// Print the briefing, priority queue and gap heatmap
    Dashboard {
        /// Skip the AI market briefing
        #[arg(long)]
        no_briefing: bool,
    },

    /// Print today's market briefing
    Briefing,

    /// Analyse a new role and start tracking it
    Add {
        /// File holding the job description (reads stdin when omitted)
        file: Option<PathBuf>,

        /// Answer to the next clarifying question (repeatable, in order)
        #[arg(short, long = "answer")]
        answers: Vec<String>,
    },

    /// List tracked jobs
    List {
        /// Filter by status (draft, applied, interview, offer, rejected)
        #[arg(short, long)]
        status: Option<JobStatus>,
    },

    /// Show job details
    Show {
        /// Job ID or unique prefix
        id: String,

        /// Tab to print (all tabs when omitted)
        #[arg(short, long, value_enum)]
        tab: Option<TabArg>,
    },

    /// Change a job's status
    Status {
        /// Job ID or unique prefix
        id: String,

        /// New status (draft, applied, interview, offer, rejected)
        status: JobStatus,
    },

    /// Stop tracking a job
    Delete {
        /// Job ID or unique prefix
        id: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show skill gap statistics
    Heatmap {
        /// Number of skills to show
        #[arg(short, long, default_value = "8")]
        limit: usize,
    },

    /// Print the stored job list as JSON
    Export,
}

#[derive(Clone, Copy, ValueEnum)]
enum TabArg {
    Analysis,
    Market,
    Artefacts,
}

impl From<TabArg> for DetailTab {
    fn from(tab: TabArg) -> Self {
        match tab {
            TabArg::Analysis => DetailTab::Analysis,
            TabArg::Market => DetailTab::MarketIntel,
            TabArg::Artefacts => DetailTab::Artefacts,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?.with_overrides(cli.model, cli.db);
    let command = cli.command.unwrap_or(Commands::Browse);

    init_logging(&config, matches!(command, Commands::Browse))?;

    let store = SqliteStore::open(&config.db_path)?;
    info!(path = %store.path().display(), "Opened tracker database");
    let records = RecordStore::new(Box::new(store));

    // Export prints the stored blob even when it no longer parses.
    if let Commands::Export = command {
        println!("{}", records.raw()?.unwrap_or_else(|| "[]".to_string()));
        return Ok(());
    }

    let mut ctl = Controller::initialize(records);

    match command {
        Commands::Browse => {
            let provider = load_provider(&config);
            tui::run_browse(&mut ctl, provider.as_deref().map_err(|e| format!("{:#}", e)))?;
        }

        Commands::Dashboard { no_briefing } => {
            if !no_briefing {
                let provider = load_provider(&config)?;
                print_briefing(provider.as_ref());
                println!();
            }
            print_queue(&ctl);
            println!();
            print_heatmap(&ctl, heatmap::TOP_GAPS);
        }

        Commands::Briefing => {
            let provider = load_provider(&config)?;
            print_briefing(provider.as_ref());
        }

        Commands::Add { file, answers } => {
            let description = read_description(file.as_ref())?;
            let provider = load_provider(&config)?;
            let analyst = AnalysisClient::new(provider.as_ref());
            let job = run_intake(&analyst, description, answers)?;
            let (short_id, title, company) =
                (job.short_id().to_string(), job.title.clone(), job.company.clone());
            ctl.add_job(job)?;
            println!("Added job {} - {} at {}", short_id, title, company);
            if let Some(job) = ctl.selected_job() {
                println!();
                print_job(job, None);
            }
        }

        Commands::List { status } => {
            let jobs: Vec<&Job> = ctl
                .jobs()
                .iter()
                .filter(|j| status.is_none_or(|s| j.status == s))
                .collect();
            if jobs.is_empty() {
                println!("No jobs found.");
            } else {
                println!(
                    "{:<10} {:<10} {:<30} {:<20} {:<7} {:>6} {:>10}",
                    "ID", "STATUS", "TITLE", "COMPANY", "MOSCOW", "RICE", "ADDED"
                );
                println!("{}", "-".repeat(99));
                for job in jobs {
                    let (priority, rice) = match &job.analysis {
                        Some(a) => (a.priority_label().to_string(), format!("{}", a.rice_score)),
                        None => ("N/A".to_string(), "-".to_string()),
                    };
                    println!(
                        "{:<10} {:<10} {:<30} {:<20} {:<7} {:>6} {:>10}",
                        job.short_id(),
                        job.status,
                        truncate(&job.title, 28),
                        truncate(&job.company, 18),
                        priority,
                        truncate(&rice, 6),
                        job.date_added_display()
                    );
                }
            }
        }

        Commands::Show { id, tab } => {
            let job = resolve(&ctl, &id)?;
            print_job(job, tab.map(DetailTab::from));
        }

        Commands::Status { id, status } => {
            let job = resolve(&ctl, &id)?;
            let (job_id, short_id) = (job.id.clone(), job.short_id().to_string());
            ctl.update_status(&job_id, status)?;
            println!("Marked job {} as {}.", short_id, status);
        }

        Commands::Delete { id, yes } => {
            let job = resolve(&ctl, &id)?;
            let (job_id, title) = (job.id.clone(), job.title.clone());
            if !yes && !confirm(&format!("Delete '{}'?", title))? {
                println!("Cancelled.");
                return Ok(());
            }
            ctl.delete_job(&job_id)?;
            println!("Deleted '{}'.", title);
        }

        Commands::Heatmap { limit } => print_heatmap(&ctl, limit),

        Commands::Export => unreachable!("handled before the controller loads"),
    }

    Ok(())
}

fn init_logging(config: &Config, to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_filter)
        .with_context(|| format!("Invalid log filter '{}'", config.log_filter))?;

    if to_file {
        let path = config.log_path();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

fn load_provider(config: &Config) -> Result<Box<dyn AIProvider>> {
    let spec = ai::resolve_model(&config.model)?;
    let provider = ai::create_provider(&spec)?;
    info!(model = provider.model_name(), "Using AI provider {}", spec.short_name);
    Ok(provider)
}

fn resolve<'a>(ctl: &'a Controller, id: &str) -> Result<&'a Job> {
    ctl.resolve_id(id)
        .ok_or_else(|| anyhow!("No job matches '{}' (use a full ID or a unique prefix)", id))
}

fn read_description(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job description: {}", path.display())),
        None => {
            let mut stdin = std::io::stdin();
            if stdin.is_terminal() {
                eprintln!("Paste the job description, then press Ctrl-D:");
            }
            let mut text = String::new();
            stdin.read_to_string(&mut text).context("Failed to read job description from stdin")?;
            Ok(text)
        }
    }
}

/// Drives the intake wizard from the command line. Answers come from
/// `answers` first, then from the terminal when one is attached.
fn run_intake(analyst: &AnalysisClient, description: String, answers: Vec<String>) -> Result<Job> {
    let mut wizard = IntakeWizard::new();
    wizard.set_jd_text(description);
    if !wizard.begin_submit() {
        bail!("Job description is empty");
    }

    eprintln!("Scanning...");
    wizard.request_questions(analyst);
    if let Some(err) = wizard.error() {
        bail!("{}", err);
    }
    debug_assert_eq!(wizard.step(), WizardStep::Clarification);

    let interactive = std::io::stdin().is_terminal();
    let mut supplied = answers.into_iter();
    let questions = wizard.questions().to_vec();
    for (i, question) in questions.iter().enumerate() {
        let answer = match supplied.next() {
            Some(answer) => answer,
            None if interactive => prompt(&format!("Q{}: {}\n> ", i + 1, question))?,
            None => String::new(),
        };
        wizard.set_answer(i, answer);
    }

    loop {
        eprintln!("Processing market intel & artefacts...");
        if let Some(job) = wizard.complete(analyst) {
            return Ok(job);
        }
        let err = wizard.error().unwrap_or(ANALYSIS_FAILED).to_string();
        if !interactive || !confirm(&format!("{} Retry?", err))? {
            bail!("{}", err);
        }
    }
}

fn prompt(message: &str) -> Result<String> {
    eprint!("{}", message);
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn confirm(question: &str) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        bail!("Confirmation required; rerun with --yes");
    }
    let answer = prompt(&format!("{} [y/N] ", question))?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_briefing(provider: &dyn AIProvider) {
    println!("DAILY MARKET SIGNAL");
    println!("{}", "-".repeat(60));
    println!("{}", AnalysisClient::new(provider).fetch_daily_briefing());
}

fn print_queue(ctl: &Controller) {
    println!("ACTIVE PRIORITY QUEUE");
    println!("{}", "-".repeat(60));
    let mut any = false;
    for job in ctl.active_jobs() {
        any = true;
        let (priority, rice) = match &job.analysis {
            Some(a) => (a.priority_label().to_string(), format!("{}", a.rice_score)),
            None => ("N/A".to_string(), "-".to_string()),
        };
        println!(
            "{:<10} {:<30} {:<18} [{}] RICE: {}  {}  {}",
            job.short_id(),
            truncate(&job.title, 28),
            truncate(&job.company, 16),
            priority,
            rice,
            job.status,
            job.date_added_display()
        );
    }
    if !any {
        println!("No active applications tracking. Start a new analysis with 'jobintel add'.");
    }
}

fn print_heatmap(ctl: &Controller, limit: usize) {
    const BAR_WIDTH: usize = 20;
    println!("MARKET GAP HEATMAP");
    println!("{}", "-".repeat(60));
    let top = heatmap::top_gaps(ctl.heatmap(), limit);
    if top.is_empty() {
        println!("Add jobs to generate skill gap data.");
        return;
    }
    for item in top {
        let pct = heatmap::gap_percent(&item);
        let filled = heatmap::bar_cells(&item, BAR_WIDTH);
        println!(
            "{:<24} {}{} missing in {} JDs, required in {} ({:.0}%)",
            truncate(&item.skill, 22),
            "#".repeat(filled),
            ".".repeat(BAR_WIDTH - filled),
            item.gap_frequency,
            item.frequency,
            pct
        );
    }
}

fn print_job(job: &Job, tab: Option<DetailTab>) {
    println!("Job {}", job.id);
    println!("Title: {}", job.title);
    println!("Company: {}", job.company);
    println!("Status: {}", job.status);
    println!("Added: {}", job.date_added_display());

    let tabs: Vec<DetailTab> = match tab {
        Some(tab) => vec![tab],
        None => DetailTab::ALL.to_vec(),
    };
    if job.analysis.is_none() {
        println!("\n(No analysis for this job)");
    } else {
        for tab in tabs {
            println!("\n=== {} ===\n", tab.title());
            for line in render_plain(&tab_sections(job, tab), 80) {
                println!("{}", line);
            }
        }
    }

    if tab.is_none() {
        if let Some(transcript) = &job.clarification_answers {
            println!("=== Clarifications ===\n\n{}", transcript);
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Head of Product", 10), "Head of...");
        assert_eq!(truncate("££££££££", 5), "££...");
    }

    #[test]
    fn test_cli_parses_status_and_tab() {
        let cli = Cli::try_parse_from(["jobintel", "status", "abc", "interview"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Status { status: JobStatus::Interview, .. })
        ));

        let cli = Cli::try_parse_from(["jobintel", "show", "abc", "--tab", "market"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Show { tab: Some(TabArg::Market), .. })));

        assert!(Cli::try_parse_from(["jobintel", "status", "abc", "closed"]).is_err());
    }

    #[test]
    fn test_cli_defaults_to_browse() {
        let cli = Cli::try_parse_from(["jobintel", "--model", "gpt-4o"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.model.as_deref(), Some("gpt-4o"));
    }
}
