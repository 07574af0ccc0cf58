use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};

use exam_catalog::{
    money, spawn_load, CatalogSource, CatalogView, Config, Debouncer, LoadHandle, LoadStatus,
    SelectionStore, SharedEntry,
};

const IDLE_POLL: Duration = Duration::from_millis(250);
const LOADING_POLL: Duration = Duration::from_millis(50);
const PAGE_STEP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Search,
    Selected,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Search => Page::Selected,
            Page::Selected => Page::Search,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Search => "Search",
            Page::Selected => "Selected",
        }
    }
}

/// Latest (count, total) published by the selection store
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SelectionSummary {
    pub count: usize,
    pub total: f64,
}

pub struct App {
    pub view: CatalogView,
    pub store: SelectionStore,
    pub current_page: Page,
    pub results_state: TableState,
    pub selection_state: TableState,
    pub summary: SelectionSummary,
    pub should_quit: bool,
    source: Arc<dyn CatalogSource>,
    catalog_name: String,
    pending_load: Option<LoadHandle>,
    selection_events: Receiver<SelectionSummary>,
}

impl App {
    pub fn new(config: &Config) -> Self {
        Self::with_source(config.catalog_source(), &config.catalog.name, config.debouncer())
    }

    pub fn with_source(
        source: Arc<dyn CatalogSource>,
        catalog_name: &str,
        debouncer: Debouncer,
    ) -> Self {
        let mut store = SelectionStore::new();
        let (sender, selection_events) = mpsc::channel();
        store.subscribe(move |event| {
            let _ = sender.send(SelectionSummary {
                count: event.count,
                total: event.total,
            });
        });

        let mut app = Self {
            view: CatalogView::new(debouncer),
            store,
            current_page: Page::Search,
            results_state: TableState::default(),
            selection_state: TableState::default(),
            summary: SelectionSummary::default(),
            should_quit: false,
            source,
            catalog_name: catalog_name.to_string(),
            pending_load: None,
            selection_events,
        };
        app.start_load();
        app
    }

    // ========================================================================
    // BACKGROUND WORK
    // ========================================================================

    /// Start (or restart) loading the catalog in the background
    pub fn start_load(&mut self) {
        let ticket = self.view.begin_load();
        self.pending_load = Some(spawn_load(self.source.clone(), &self.catalog_name, ticket));
    }

    /// Apply a finished load, if any. Returns true when state changed.
    pub fn poll_load(&mut self) -> bool {
        let Some(handle) = self.pending_load.as_mut() else {
            return false;
        };
        let Some(outcome) = handle.try_take() else {
            return false;
        };

        self.pending_load = None;
        let applied = self.view.finish_load(outcome.ticket, outcome.result);
        if applied {
            self.reset_results_selection();
        }
        applied
    }

    /// Apply the debounced query when due
    pub fn tick(&mut self, now: Instant) {
        if self.view.tick(now) {
            self.reset_results_selection();
        }
    }

    pub fn drain_selection_events(&mut self) {
        while let Ok(summary) = self.selection_events.try_recv() {
            self.summary = summary;
        }
    }

    /// How long the event loop may block waiting for input
    pub fn poll_timeout(&self, now: Instant) -> Duration {
        let base = if self.pending_load.is_some() {
            LOADING_POLL
        } else {
            IDLE_POLL
        };
        match self.view.debouncer().time_until_due(now) {
            Some(due) => due.min(base),
            None => base,
        }
    }

    // ========================================================================
    // SEARCH PAGE
    // ========================================================================

    pub fn push_query_char(&mut self, c: char, now: Instant) {
        let mut query = self.view.query().to_string();
        query.push(c);
        self.view.set_query(query, now);
    }

    pub fn pop_query_char(&mut self, now: Instant) {
        let mut query = self.view.query().to_string();
        if query.pop().is_some() {
            self.view.set_query(query, now);
        }
    }

    pub fn clear_query(&mut self, now: Instant) {
        self.view.set_query("", now);
    }

    pub fn selected_result(&self) -> Option<&SharedEntry> {
        self.results_state
            .selected()
            .and_then(|i| self.view.visible().get(i))
    }

    /// Add the highlighted search result to the selection
    pub fn add_selected_result(&mut self) {
        if let Some(entry) = self.selected_result().cloned() {
            self.store.add(entry);
            self.drain_selection_events();
        }
    }

    fn reset_results_selection(&mut self) {
        if self.view.visible().is_empty() {
            self.results_state.select(None);
        } else {
            self.results_state.select(Some(0));
        }
    }

    // ========================================================================
    // SELECTED PAGE
    // ========================================================================

    fn selected_line_id(&self) -> Option<exam_catalog::LineId> {
        self.selection_state
            .selected()
            .and_then(|i| self.store.lines().get(i))
            .map(|line| line.id)
    }

    pub fn increment_selected_line(&mut self) {
        if let Some(id) = self.selected_line_id() {
            self.store.increment(id);
            self.after_selection_change();
        }
    }

    pub fn decrement_selected_line(&mut self) {
        if let Some(id) = self.selected_line_id() {
            self.store.decrement(id);
            self.after_selection_change();
        }
    }

    pub fn remove_selected_line(&mut self) {
        if let Some(id) = self.selected_line_id() {
            self.store.remove(id);
            self.after_selection_change();
        }
    }

    pub fn clear_selection(&mut self) {
        self.store.clear();
        self.after_selection_change();
    }

    fn after_selection_change(&mut self) {
        self.drain_selection_events();
        let len = self.store.count();
        match self.selection_state.selected() {
            _ if len == 0 => self.selection_state.select(None),
            Some(i) if i >= len => self.selection_state.select(Some(len - 1)),
            None => self.selection_state.select(Some(0)),
            _ => {}
        }
    }

    // ========================================================================
    // NAVIGATION
    // ========================================================================

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
        if self.current_page == Page::Selected && self.selection_state.selected().is_none() {
            self.after_selection_change();
        }
    }

    fn active_table(&mut self) -> (&mut TableState, usize) {
        match self.current_page {
            Page::Search => (&mut self.results_state, self.view.visible().len()),
            Page::Selected => (&mut self.selection_state, self.store.count()),
        }
    }

    pub fn next(&mut self) {
        let (state, len) = self.active_table();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let (state, len) = self.active_table();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let (state, len) = self.active_table();
        if len == 0 {
            return;
        }
        let i = state.selected().map_or(0, |i| (i + PAGE_STEP).min(len - 1));
        state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let (state, len) = self.active_table();
        if len == 0 {
            return;
        }
        let i = state.selected().map_or(0, |i| i.saturating_sub(PAGE_STEP));
        state.select(Some(i));
    }

    // ========================================================================
    // INPUT
    // ========================================================================

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if ctrl => self.should_quit = true,
            KeyCode::Char('r') if ctrl => self.start_load(),
            KeyCode::F(5) => self.start_load(),
            KeyCode::Tab | KeyCode::BackTab => self.next_page(),
            KeyCode::Down => self.next(),
            KeyCode::Up => self.previous(),
            KeyCode::PageDown => self.page_down(),
            KeyCode::PageUp => self.page_up(),
            _ => match self.current_page {
                Page::Search => self.handle_search_key(key, now),
                Page::Selected => self.handle_selected_key(key),
            },
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent, now: Instant) {
        match key.code {
            KeyCode::Enter => {
                // Show results for what was typed before adding
                if self.view.flush() {
                    self.reset_results_selection();
                }
                self.add_selected_result();
            }
            KeyCode::Backspace => self.pop_query_char(now),
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.clear_query(now)
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.push_query_char(c, now)
            }
            _ => {}
        }
    }

    fn handle_selected_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Right => {
                self.increment_selected_line()
            }
            KeyCode::Char('-') | KeyCode::Left => self.decrement_selected_line(),
            KeyCode::Char('d') | KeyCode::Delete => self.remove_selected_line(),
            KeyCode::Char('C') => self.clear_selection(),
            KeyCode::Char('j') => self.next(),
            KeyCode::Char('k') => self.previous(),
            _ => {}
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = %err, "terminal UI failed");
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        app.poll_load();
        app.tick(Instant::now());
        app.drain_selection_events();

        terminal.draw(|f| ui(f, app))?;

        if event::poll(app.poll_timeout(Instant::now()))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key, Instant::now());
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar / total
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Search => render_search(f, chunks[1], app),
        Page::Selected => render_selected(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::Search, Page::Selected].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        let label = match page {
            Page::Selected if app.summary.count > 0 => {
                format!("{} ({})", page.title(), app.summary.count)
            }
            _ => page.title().to_string(),
        };
        tab_spans.push(Span::styled(label, style));
    }

    tab_spans.push(Span::raw("  |  "));
    let catalog_label = match app.view.status() {
        LoadStatus::Idle => "Catalog: -".to_string(),
        LoadStatus::Loading => "Catalog: loading…".to_string(),
        LoadStatus::Loaded { count, loaded_at } => {
            format!("Catalog: {} tests (loaded {})", count, loaded_at.format("%H:%M:%S"))
        }
        LoadStatus::Failed { .. } => "Catalog: error".to_string(),
    };
    tab_spans.push(Span::styled(catalog_label, Style::default().fg(Color::White)));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_search(f: &mut Frame, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let input = Paragraph::new(Line::from(vec![
        Span::styled("🔍 ", Style::default().fg(Color::Cyan)),
        Span::raw(app.view.query().to_string()),
        Span::styled("▏", Style::default().fg(Color::Yellow)),
    ]))
    .block(Block::default().borders(Borders::ALL).title(" Search by name or code "));
    f.render_widget(input, chunks[0]);

    match app.view.status() {
        LoadStatus::Idle | LoadStatus::Loading if app.view.entries().is_empty() => {
            render_message(f, chunks[1], "Loading catalog…", Color::Cyan);
            return;
        }
        LoadStatus::Failed { message } if app.view.entries().is_empty() => {
            let text = format!("{}\n\nPress Ctrl+R (or F5) to retry.", message);
            render_message(f, chunks[1], &text, Color::Red);
            return;
        }
        _ => {}
    }

    if app.view.visible().is_empty() {
        render_message(f, chunks[1], "No tests match your search.", Color::DarkGray);
        return;
    }

    let header = Row::new(["Code", "Name", "Price", "In cart"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    }))
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let rows: Vec<Row> = app
        .view
        .visible()
        .iter()
        .map(|entry| {
            let in_cart = app
                .store
                .line_for_entry(entry.id)
                .map(|line| format!("×{}", line.quantity))
                .unwrap_or_default();
            let price_style = if entry.amount.is_some() {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::DarkGray)
            };

            Row::new(vec![
                Cell::from(entry.code.clone()),
                Cell::from(truncate(&entry.name, 50)),
                Cell::from(entry.formatted_amount()).style(price_style),
                Cell::from(in_cart).style(Style::default().fg(Color::Cyan)),
            ])
            .height(1)
        })
        .collect();

    let title = format!(" Tests ({}) ", app.view.visible().len());
    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Min(30),
            Constraint::Length(14),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(title))
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, chunks[1], &mut app.results_state);
}

fn render_selected(f: &mut Frame, area: Rect, app: &mut App) {
    if app.store.is_empty() {
        render_message(
            f,
            area,
            "No tests selected.\n\nGo to Search (Tab) and press Enter on a test to add it.",
            Color::DarkGray,
        );
        return;
    }

    let header = Row::new(["Code", "Name", "Qty", "Price", "Line total"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    }))
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let rows: Vec<Row> = app
        .store
        .lines()
        .iter()
        .map(|line| {
            Row::new(vec![
                Cell::from(line.entry.code.clone()),
                Cell::from(truncate(&line.entry.name, 44)),
                Cell::from(line.quantity.to_string()),
                Cell::from(line.entry.formatted_amount()),
                Cell::from(line.formatted_line_total()).style(Style::default().fg(Color::Green)),
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Min(30),
            Constraint::Length(5),
            Constraint::Length(14),
            Constraint::Length(14),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(" Selected tests "))
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.selection_state);
}

fn render_message(f: &mut Frame, area: Rect, text: &str, color: Color) {
    let paragraph = Paragraph::new(text.to_string())
        .style(Style::default().fg(color))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![
        Span::styled(
            format!(" Sum of selected tests: {} ", money::format_amount(app.summary.total)),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
    ];

    let keys: &[(&str, &str)] = match app.current_page {
        Page::Search => &[("Enter", "Add"), ("↑/↓", "Nav"), ("Tab", "Selected")],
        Page::Selected => &[
            ("+/-", "Qty"),
            ("d", "Remove"),
            ("C", "Clear"),
            ("Tab", "Search"),
        ],
    };
    for (key, label) in keys {
        status_spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(format!(" {} | ", label)));
    }
    if app.view.status().error_message().is_some() {
        status_spans.push(Span::styled("Ctrl+R", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" Retry | "));
    }
    status_spans.push(Span::styled("Esc", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

/// Cut to `max_len` characters, ending with "..." when shortened
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
