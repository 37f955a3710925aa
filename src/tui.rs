use anyhow::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};
use std::io::stdout;
use tracing::error;

use crate::ai::AIProvider;
use crate::analysis::AnalysisClient;
use crate::controller::Controller;
use crate::detail::{DetailTab, render_plain, tab_sections};
use crate::heatmap::{TOP_GAPS, bar_cells, gap_percent, top_gaps};
use crate::models::{AppView, Job, JobStatus, MoscowPriority};
use crate::wizard::{IntakeWizard, WizardStep};

struct AppState<'a> {
    analyst: Option<AnalysisClient<'a>>,
    provider_error: Option<String>,
    briefing: String,
    briefing_pending: bool,
    queue_selected: usize,
    wizard: IntakeWizard,
    focused_answer: usize,
    submit_pending: bool,
    tab: DetailTab,
    scroll_offset: u16,
    confirm_delete: bool,
    notice: Option<String>,
}

impl<'a> AppState<'a> {
    fn new(provider: Result<&'a dyn AIProvider, String>) -> Self {
        let (analyst, provider_error) = match provider {
            Ok(p) => (Some(AnalysisClient::new(p)), None),
            Err(e) => (None, Some(e)),
        };
        let briefing = match &provider_error {
            Some(e) => format!("AI provider unavailable: {}", e),
            None => "Analysing market trends...".to_string(),
        };
        Self {
            briefing_pending: analyst.is_some(),
            analyst,
            provider_error,
            briefing,
            queue_selected: 0,
            wizard: IntakeWizard::new(),
            focused_answer: 0,
            submit_pending: false,
            tab: DetailTab::Analysis,
            scroll_offset: 0,
            confirm_delete: false,
            notice: None,
        }
    }

    fn open_detail(&mut self) {
        self.tab = DetailTab::Analysis;
        self.scroll_offset = 0;
        self.confirm_delete = false;
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }
}

pub fn run_browse(ctl: &mut Controller, provider: Result<&dyn AIProvider, String>) -> Result<()> {
    let mut state = AppState::new(provider);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableBracketedPaste)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, ctl, &mut state);

    // Restore terminal
    stdout().execute(DisableBracketedPaste)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    ctl: &mut Controller,
    state: &mut AppState,
) -> Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, ctl, state))?;

        // Blocking AI calls run after a frame showing the loading state.
        if state.briefing_pending {
            state.briefing_pending = false;
            if let Some(analyst) = &state.analyst {
                state.briefing = analyst.fetch_daily_briefing();
            }
            continue;
        }
        if state.submit_pending {
            state.submit_pending = false;
            run_submission(ctl, state);
            continue;
        }

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                let quit = match ctl.view() {
                    AppView::Dashboard => handle_dashboard_key(key, ctl, state),
                    AppView::AddJob => handle_wizard_key(key, ctl, state),
                    AppView::JobDetail => handle_detail_key(key, ctl, state),
                };
                if quit {
                    break;
                }
            }
            Event::Paste(text) if ctl.view() == AppView::AddJob => paste(state, &text),
            _ => {}
        }
    }
    Ok(())
}

fn run_submission(ctl: &mut Controller, state: &mut AppState) {
    let Some(analyst) = &state.analyst else { return };
    match state.wizard.step() {
        WizardStep::DraftEntry => {
            state.wizard.request_questions(analyst);
            state.focused_answer = 0;
        }
        WizardStep::Clarification => {
            if let Some(job) = state.wizard.complete(analyst) {
                state.wizard = IntakeWizard::new();
                state.open_detail();
                if let Err(e) = ctl.add_job(job) {
                    error!("Failed to save new job: {:#}", e);
                    state.notice = Some(format!("Saved in memory only: {:#}", e));
                }
            }
        }
    }
}

// --- Key handling ---

fn handle_dashboard_key(key: KeyEvent, ctl: &mut Controller, state: &mut AppState) -> bool {
    let queue_len = ctl.active_jobs().count();
    state.notice = None;
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Down | KeyCode::Char('j') => {
            if queue_len > 0 && state.queue_selected < queue_len - 1 {
                state.queue_selected += 1;
            }
        }
        KeyCode::Up | KeyCode::Char('k') => {
            state.queue_selected = state.queue_selected.saturating_sub(1);
        }
        KeyCode::Enter => {
            let id = ctl.active_jobs().nth(state.queue_selected).map(|j| j.id.clone());
            if let Some(id) = id {
                ctl.select_job(&id);
                state.open_detail();
            }
        }
        KeyCode::Char('n') | KeyCode::Char('a') => match &state.provider_error {
            Some(e) => state.notice = Some(format!("Cannot analyse new roles: {}", e)),
            None => {
                state.wizard = IntakeWizard::new();
                ctl.navigate(AppView::AddJob);
            }
        },
        KeyCode::Char('r') => state.briefing_pending = state.analyst.is_some(),
        _ => {}
    }
    false
}

fn handle_wizard_key(key: KeyEvent, ctl: &mut Controller, state: &mut AppState) -> bool {
    if state.wizard.is_loading() {
        return false;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => {
            state.wizard = IntakeWizard::new();
            ctl.navigate(AppView::Dashboard);
        }
        KeyCode::Char('s') if ctrl => {
            if state.wizard.begin_submit() {
                state.submit_pending = true;
            }
        }
        KeyCode::Char('c') if ctrl => return true,
        _ => match state.wizard.step() {
            WizardStep::DraftEntry => {
                if let Some(text) = state.wizard.jd_text_mut() {
                    match key.code {
                        KeyCode::Char(c) => text.push(c),
                        KeyCode::Enter => text.push('\n'),
                        KeyCode::Backspace => {
                            text.pop();
                        }
                        _ => {}
                    }
                }
            }
            WizardStep::Clarification => {
                let count = state.wizard.questions().len();
                let idx = state.focused_answer;
                let mut answer = state.wizard.answer(idx).to_string();
                match key.code {
                    KeyCode::Tab | KeyCode::Down | KeyCode::Enter if count > 0 => {
                        state.focused_answer = (idx + 1) % count;
                    }
                    KeyCode::BackTab | KeyCode::Up if count > 0 => {
                        state.focused_answer = (idx + count - 1) % count;
                    }
                    KeyCode::Char(c) => {
                        answer.push(c);
                        state.wizard.set_answer(idx, answer);
                    }
                    KeyCode::Backspace => {
                        answer.pop();
                        state.wizard.set_answer(idx, answer);
                    }
                    _ => {}
                }
            }
        },
    }
    false
}

fn paste(state: &mut AppState, text: &str) {
    if state.wizard.is_loading() {
        return;
    }
    match state.wizard.step() {
        WizardStep::DraftEntry => {
            if let Some(buf) = state.wizard.jd_text_mut() {
                buf.push_str(&text.replace("\r\n", "\n"));
            }
        }
        WizardStep::Clarification => {
            let idx = state.focused_answer;
            let answer = format!("{}{}", state.wizard.answer(idx), text.replace(['\r', '\n'], " "));
            state.wizard.set_answer(idx, answer);
        }
    }
}

fn handle_detail_key(key: KeyEvent, ctl: &mut Controller, state: &mut AppState) -> bool {
    let Some(job_id) = ctl.selected_job().map(|j| j.id.clone()) else {
        ctl.navigate(AppView::Dashboard);
        return false;
    };

    if state.confirm_delete {
        state.confirm_delete = false;
        if key.code == KeyCode::Char('y') {
            if let Err(e) = ctl.delete_job(&job_id) {
                error!("Failed to save after delete: {:#}", e);
                state.notice = Some(format!("Deleted in memory only: {:#}", e));
            }
            state.queue_selected = 0;
        }
        return false;
    }

    state.notice = None;
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Esc | KeyCode::Char('b') => ctl.navigate(AppView::Dashboard),
        KeyCode::Tab => {
            state.tab = state.tab.next();
            state.scroll_offset = 0;
        }
        KeyCode::Char(c @ '1'..='3') => {
            state.tab = DetailTab::ALL[(c as usize) - ('1' as usize)];
            state.scroll_offset = 0;
        }
        KeyCode::Char('s') => {
            let next = ctl.selected_job().map(|j| j.status.next()).unwrap_or(JobStatus::Draft);
            if let Err(e) = ctl.update_status(&job_id, next) {
                error!("Failed to save status change: {:#}", e);
                state.notice = Some(format!("Status changed in memory only: {:#}", e));
            }
        }
        KeyCode::Char('d') => state.confirm_delete = true,
        KeyCode::Down | KeyCode::Char('j') | KeyCode::PageDown => state.scroll_down(),
        KeyCode::Up | KeyCode::Char('k') | KeyCode::PageUp => state.scroll_up(),
        _ => {}
    }
    false
}

// --- Drawing ---

fn draw(frame: &mut Frame, ctl: &Controller, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let help = match ctl.view() {
        AppView::Dashboard => " j/k:navigate  enter:open  n:new role  r:refresh briefing  q:quit",
        AppView::AddJob => match state.wizard.step() {
            WizardStep::DraftEntry => " paste or type the job description  ctrl+s:scan  esc:cancel",
            WizardStep::Clarification => " tab/up/down:question  ctrl+s:run full analysis  esc:cancel",
        },
        AppView::JobDetail => {
            if state.confirm_delete {
                " Delete this job? y:confirm  any other key:cancel"
            } else {
                " tab/1-3:tabs  j/k:scroll  s:cycle status  d:delete  b:back  q:quit"
            }
        }
    };
    let footer = match &state.notice {
        Some(notice) => Paragraph::new(format!(" {}", notice)).style(Style::default().fg(Color::Red)),
        None => Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(footer, chunks[1]);

    match ctl.view() {
        AppView::Dashboard => draw_dashboard(frame, chunks[0], ctl, state),
        AppView::AddJob => draw_wizard(frame, chunks[0], state),
        AppView::JobDetail => match ctl.selected_job() {
            Some(job) => draw_detail(frame, chunks[0], job, state),
            None => draw_dashboard(frame, chunks[0], ctl, state),
        },
    }
}

fn draw_dashboard(frame: &mut Frame, area: Rect, ctl: &Controller, state: &AppState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(0)])
        .split(area);

    let briefing = Paragraph::new(state.briefing.as_str())
        .block(Block::default().borders(Borders::ALL).title(" Daily Market Signal "))
        .wrap(Wrap { trim: false });
    frame.render_widget(briefing, rows[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[1]);

    // Left panel: priority queue
    let items: Vec<ListItem> = ctl
        .active_jobs()
        .map(|job| {
            let (priority, rice) = match &job.analysis {
                Some(a) => (a.priority_label().to_string(), format!("{}", a.rice_score)),
                None => ("N/A".to_string(), "-".to_string()),
            };
            let priority_style = match job.analysis.as_ref().and_then(|a| a.moscow_priority) {
                Some(MoscowPriority::Must) => Style::default().fg(Color::Red),
                Some(MoscowPriority::Should) => Style::default().fg(Color::Yellow),
                _ => Style::default().fg(Color::DarkGray),
            };
            ListItem::new(vec![
                Line::from(vec![
                    Span::styled(job.title.clone(), Style::default().add_modifier(Modifier::BOLD)),
                    Span::raw(format!("  {}", job.company)),
                ]),
                Line::from(vec![
                    Span::styled(format!("  [{}]", priority), priority_style),
                    Span::raw(format!(" RICE: {}  ", rice)),
                    Span::styled(job.status.to_string(), status_style(job.status)),
                    Span::styled(
                        format!("  {}", job.date_added_display()),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]),
            ])
        })
        .collect();

    let queue_title = format!(" Active Priority Queue ({}) ", items.len());
    if items.is_empty() {
        let empty = Paragraph::new("No active applications tracking. Press n to analyse a new role.")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title(queue_title));
        frame.render_widget(empty, columns[0]);
    } else {
        let mut list_state = ListState::default();
        list_state.select(Some(state.queue_selected.min(items.len() - 1)));
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(queue_title))
            .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, columns[0], &mut list_state);
    }

    // Right panel: gap heatmap
    let block = Block::default().borders(Borders::ALL).title(" Market Gap Heatmap ");
    let inner_width = block.inner(columns[1]).width as usize;
    let top = top_gaps(ctl.heatmap(), TOP_GAPS);
    let mut lines: Vec<Line> = Vec::new();
    if top.is_empty() {
        lines.push(Line::from(Span::styled(
            "Add jobs to generate skill gap data.",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for item in &top {
        let pct = gap_percent(item);
        lines.push(Line::from(vec![
            Span::raw(item.skill.clone()),
            Span::styled(
                format!("  missing in {} JDs ({:.0}%)", item.gap_frequency, pct),
                Style::default().fg(Color::Red),
            ),
        ]));
        let filled = bar_cells(item, inner_width);
        lines.push(Line::from(vec![
            Span::styled("█".repeat(filled), Style::default().fg(Color::Red)),
            Span::styled(
                "░".repeat(inner_width.saturating_sub(filled)),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
    }
    frame.render_widget(Paragraph::new(lines).block(block), columns[1]);
}

fn draw_wizard(frame: &mut Frame, area: Rect, state: &AppState) {
    let wizard = &state.wizard;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    match wizard.step() {
        WizardStep::DraftEntry => {
            let block = Block::default()
                .borders(Borders::ALL)
                .title(" New Role Analysis: Job Description (1/2) ");
            let visible = block.inner(rows[0]).height;
            let text = format!("{}▏", wizard.jd_text());
            let line_count = text.lines().count() as u16;
            let input = Paragraph::new(text)
                .block(block)
                .wrap(Wrap { trim: false })
                .scroll((line_count.saturating_sub(visible), 0));
            frame.render_widget(input, rows[0]);
        }
        WizardStep::Clarification => {
            let mut lines: Vec<Line> = vec![
                Line::from(Span::styled(
                    "The engine needs specific details to calibrate the RICE score and artefacts.",
                    Style::default().fg(Color::DarkGray),
                )),
                Line::from(""),
            ];
            for (i, question) in wizard.questions().iter().enumerate() {
                let focused = i == state.focused_answer;
                let marker = if focused { "> " } else { "  " };
                lines.push(Line::from(Span::styled(
                    format!("{}{}", marker, question),
                    Style::default().add_modifier(Modifier::BOLD),
                )));
                let answer = wizard.answer(i);
                let shown = match (answer.is_empty(), focused) {
                    (true, false) => Span::styled("    Your concise answer...", Style::default().fg(Color::DarkGray)),
                    (_, true) => Span::styled(format!("    {}▏", answer), Style::default().fg(Color::Cyan)),
                    (false, false) => Span::raw(format!("    {}", answer)),
                };
                lines.push(Line::from(shown));
                lines.push(Line::from(""));
            }
            let questions = Paragraph::new(lines)
                .block(Block::default().borders(Borders::ALL).title(" Clarifying Context (2/2) "))
                .wrap(Wrap { trim: false });
            frame.render_widget(questions, rows[0]);
        }
    }

    let status = if wizard.is_loading() {
        let label = match wizard.step() {
            WizardStep::DraftEntry => "Scanning...",
            WizardStep::Clarification => "Processing market intel & artefacts...",
        };
        Paragraph::new(label).style(Style::default().fg(Color::Yellow))
    } else if let Some(err) = wizard.error() {
        Paragraph::new(err).style(Style::default().fg(Color::Red))
    } else if !wizard.can_submit() {
        Paragraph::new("Enter a job description to continue.").style(Style::default().fg(Color::DarkGray))
    } else {
        Paragraph::new("Ready. Press ctrl+s to submit.").style(Style::default().fg(Color::Green))
    };
    frame.render_widget(status.block(Block::default().borders(Borders::ALL)), rows[1]);
}

fn draw_detail(frame: &mut Frame, area: Rect, job: &Job, state: &AppState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let mut header = vec![
        Line::from(Span::styled(job.title.as_str(), Style::default().add_modifier(Modifier::BOLD))),
        Line::from(vec![
            Span::raw(format!("{}  ", job.company)),
            Span::styled(format!("Status: {}", job.status), status_style(job.status)),
            Span::styled(format!("  Added {}", job.date_added_display()), Style::default().fg(Color::DarkGray)),
        ]),
    ];
    if let Some(a) = &job.analysis {
        header.push(Line::from(format!(
            "Match {:.0}/100  RICE {}  {}",
            a.competency_match_score,
            a.rice_score,
            a.priority_label()
        )));
    }
    frame.render_widget(Paragraph::new(header), rows[0]);

    let tabs = Tabs::new(DetailTab::ALL.iter().map(|t| t.title()).collect::<Vec<_>>())
        .block(Block::default().borders(Borders::ALL))
        .select(state.tab.index())
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, rows[1]);

    let block = Block::default().borders(Borders::ALL);
    let width = block.inner(rows[2]).width as usize;
    let sections = tab_sections(job, state.tab);
    let lines: Vec<Line> = if sections.is_empty() {
        vec![Line::from(Span::styled("(No analysis for this job)", Style::default().fg(Color::DarkGray)))]
    } else {
        render_plain(&sections, width)
            .into_iter()
            .map(|l| {
                if !l.starts_with(' ') && !l.is_empty() {
                    Line::from(Span::styled(l, Style::default().add_modifier(Modifier::BOLD)))
                } else {
                    Line::from(l)
                }
            })
            .collect()
    };
    let body = Paragraph::new(lines).block(block).scroll((state.scroll_offset, 0));
    frame.render_widget(body, rows[2]);
}

fn status_style(status: JobStatus) -> Style {
    match status {
        JobStatus::Draft => Style::default().fg(Color::Gray),
        JobStatus::Applied => Style::default().fg(Color::Cyan),
        JobStatus::Interview => Style::default().fg(Color::Magenta),
        JobStatus::Offer => Style::default().fg(Color::Green),
        JobStatus::Rejected => Style::default().fg(Color::Red),
    }
}
