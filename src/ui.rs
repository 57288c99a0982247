use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use registry_insights::{DatasetHandle, EnrichedRecord, FilterOptions, SearchQuery};
use std::collections::BTreeMap;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Companies,
    Summary,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Companies => Page::Summary,
            Page::Summary => Page::Companies,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Companies => "Companies",
            Page::Summary => "Summary",
        }
    }
}

/// What typed characters go to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
    Question,
}

pub struct App {
    pub dataset: DatasetHandle,
    pub query: SearchQuery,
    pub filtered: Vec<EnrichedRecord>,
    pub options: FilterOptions,
    pub state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
    pub input_mode: InputMode,
    pub input: String,
    pub answer: Option<String>,
    pub message: Option<String>,
}

impl App {
    pub fn new(dataset: DatasetHandle) -> Self {
        let mut app = Self {
            dataset,
            query: SearchQuery::new(),
            filtered: Vec::new(),
            options: FilterOptions::default(),
            state: TableState::default(),
            current_page: Page::Companies,
            show_detail: false,
            input_mode: InputMode::Normal,
            input: String::new(),
            answer: None,
            message: None,
        };
        app.refresh();
        app
    }

    /// Re-apply the current query to the loaded records
    pub fn refresh(&mut self) {
        self.options = self.dataset.filter_options();
        self.filtered = self.dataset.search(&self.query).into_iter().cloned().collect();

        // Reset selection to first item
        if self.filtered.is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(0));
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_record(&self) -> Option<&EnrichedRecord> {
        self.state.selected().and_then(|i| self.filtered.get(i))
    }

    pub fn cycle_state_filter(&mut self) {
        self.query.state = cycle(&self.query.state, &self.options.states);
        self.refresh();
    }

    pub fn cycle_status_filter(&mut self) {
        self.query.status = cycle(&self.query.status, &self.options.statuses);
        self.refresh();
    }

    pub fn set_search(&mut self, text: &str) {
        self.query.text = Some(text.to_string()).filter(|t| !t.is_empty());
        self.refresh();
    }

    pub fn clear_filter(&mut self) {
        self.query = SearchQuery::new();
        self.refresh();
    }

    pub fn reload(&mut self) {
        self.message = Some(match self.dataset.reload() {
            Ok(n) => format!("Reloaded {} records", n),
            Err(e) => format!("Reload failed: {}", e),
        });
        self.refresh();
    }

    pub fn ask(&mut self, question: &str) {
        self.answer = Some(self.dataset.answer(question));
    }

    pub fn has_filter(&self) -> bool {
        self.query != SearchQuery::new()
    }

    // ------------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------------

    pub fn start_input(&mut self, mode: InputMode) {
        self.input = match mode {
            InputMode::Search => self.query.text.clone().unwrap_or_default(),
            _ => String::new(),
        };
        self.input_mode = mode;
    }

    /// Feed one key while an input prompt is open
    pub fn handle_input_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                if self.input_mode == InputMode::Search {
                    self.set_search("");
                }
                self.input.clear();
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Enter => {
                if self.input_mode == InputMode::Question {
                    let question = self.input.clone();
                    self.ask(&question);
                }
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Backspace => {
                self.input.pop();
                self.on_input_changed();
            }
            KeyCode::Char(c) => {
                self.input.push(c);
                self.on_input_changed();
            }
            _ => {}
        }
    }

    fn on_input_changed(&mut self) {
        // Search filters live as the user types
        if self.input_mode == InputMode::Search {
            let text = self.input.clone();
            self.set_search(&text);
        }
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    pub fn next(&mut self) {
        let len = self.filtered.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.filtered.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.filtered.len();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map_or(0, |i| (i + 20).min(len - 1));
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        if self.filtered.is_empty() {
            return;
        }
        let i = self.state.selected().map_or(0, |i| i.saturating_sub(20));
        self.state.select(Some(i));
    }

    /// Rows per STATUS across the whole dataset
    pub fn status_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in self.dataset.records() {
            *counts.entry(record.status.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Next filter value: None → first → ... → last → None
fn cycle(current: &Option<String>, values: &[String]) -> Option<String> {
    match current {
        None => values.first().cloned(),
        Some(value) => values
            .iter()
            .position(|v| v == value)
            .and_then(|i| values.get(i + 1))
            .cloned(),
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        let key = match event::read()? {
            Event::Key(key) => key,
            _ => continue,
        };

        if app.input_mode != InputMode::Normal {
            app.handle_input_key(key);
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
            KeyCode::Enter => app.toggle_detail(),
            KeyCode::Tab | KeyCode::BackTab => app.current_page = app.current_page.next(),
            KeyCode::Char('/') => {
                app.current_page = Page::Companies;
                app.start_input(InputMode::Search);
            }
            KeyCode::Char('?') => {
                app.current_page = Page::Summary;
                app.start_input(InputMode::Question);
            }
            KeyCode::Char('s') => app.cycle_state_filter(),
            KeyCode::Char('t') => app.cycle_status_filter(),
            KeyCode::Char('c') => app.clear_filter(),
            KeyCode::Char('r') => app.reload(),
            KeyCode::Down | KeyCode::Char('j') => app.next(),
            KeyCode::Up | KeyCode::Char('k') => app.previous(),
            KeyCode::PageDown => app.page_down(),
            KeyCode::PageUp => app.page_up(),
            KeyCode::Home if !app.filtered.is_empty() => app.state.select(Some(0)),
            KeyCode::End if !app.filtered.is_empty() => {
                app.state.select(Some(app.filtered.len() - 1))
            }
            _ => {}
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar / prompt
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Companies if app.show_detail => {
            let content_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[1]);

            render_table(f, content_chunks[0], app);
            render_detail_panel(f, content_chunks[1], app);
        }
        Page::Companies => render_table(f, chunks[1], app),
        Page::Summary => render_summary(f, chunks[1], app),
    }

    if app.input_mode == InputMode::Normal {
        render_status_bar(f, chunks[2], app);
    } else {
        render_prompt(f, chunks[2], app);
    }
}

fn key_style() -> Style {
    Style::default().fg(Color::Yellow)
}

fn label_style() -> Style {
    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
}

fn status_color(status: &str) -> Color {
    match status {
        "New Incorporation" => Color::Green,
        "Deregistered" => Color::Red,
        "Field Update" => Color::Yellow,
        _ => Color::White,
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::Companies, Page::Summary].iter().enumerate() {
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

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Loaded: {}", app.dataset.records().len()),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("State: {}", app.query.state.as_deref().unwrap_or("All")),
        Style::default().fg(Color::Green),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("Status: {}", app.query.status.as_deref().unwrap_or("All")),
        Style::default().fg(Color::Green),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Registry Insights "),
    );

    f.render_widget(header, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    if !app.dataset.is_loaded() {
        let empty = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(
                "  No data found. Run the enrichment stage first, then press r to reload.",
                Style::default().fg(Color::Yellow),
            )),
        ])
        .block(Block::default().borders(Borders::ALL).title(" Companies "));
        f.render_widget(empty, area);
        return;
    }

    let header_cells = ["CIN", "Company", "State", "Status", "Sector", "Field"]
        .iter()
        .map(|h| Cell::from(*h).style(key_style().add_modifier(Modifier::BOLD)));

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.filtered.iter().map(|r| {
        let color = status_color(&r.status);
        Row::new(vec![
            Cell::from(r.cin.clone()),
            Cell::from(truncate(&r.company_name, 30)),
            Cell::from(truncate(&r.state, 16)),
            Cell::from(r.status.clone()).style(Style::default().fg(color)),
            Cell::from(r.sector.clone()),
            Cell::from(truncate(&r.field, 18)),
        ])
        .height(1)
    });

    let title = format!(" Companies ({}/{}) ", app.filtered.len(), app.dataset.records().len());
    let table = Table::new(
        rows,
        [
            Constraint::Length(23),
            Constraint::Length(32),
            Constraint::Length(18),
            Constraint::Length(19),
            Constraint::Length(15),
            Constraint::Length(20),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Company Details ");

    let record = match app.selected_record() {
        Some(r) => r,
        None => {
            f.render_widget(Paragraph::new("No company selected").block(block), area);
            return;
        }
    };

    let field = |label: &str, value: &str| {
        Line::from(vec![
            Span::styled(format!("  {}: ", label), label_style()),
            Span::raw(value.to_string()),
        ])
    };

    let content = vec![
        Line::from(""),
        field("CIN", &record.cin),
        field("Name", &record.company_name),
        field("State", &record.state),
        Line::from(vec![
            Span::styled("  Status: ", label_style()),
            Span::styled(
                record.status.clone(),
                Style::default().fg(status_color(&record.status)),
            ),
        ]),
        field("Field", &record.field),
        Line::from(""),
        field("Sector", &record.sector),
        field("Type", &record.company_type),
        field("Directors", &record.directors),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(Span::styled(
            "  PROVENANCE",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )),
        field("Source", &record.source),
        Line::from(vec![
            Span::styled("  URL: ", label_style()),
            Span::styled(record.source_url.clone(), Style::default().fg(Color::Green)),
        ]),
        Line::from(""),
        Line::from(Span::styled("  REGISTERED OFFICE", label_style())),
        Line::from(Span::styled(
            format!("  {}", wrap_text(&record.registered_office, 35)),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn render_summary(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let report = app
        .dataset
        .summary()
        .unwrap_or("No summary report found. Run the summary stage first.");
    let report_panel = Paragraph::new(report.to_string())
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Daily Summary "),
        );
    f.render_widget(report_panel, chunks[0]);

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled("  Rows by status", label_style())),
        Line::from(""),
    ];
    for (status, count) in app.status_counts() {
        lines.push(Line::from(vec![
            Span::styled(format!("  {:<20}", status), Style::default().fg(status_color(&status))),
            Span::raw(format!("{:>5}", count)),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from("  ─────────────────────────────"));
    lines.push(Line::from(vec![
        Span::styled("  Ask: ", label_style()),
        Span::styled("?", key_style()),
        Span::raw(" then type a question"),
    ]));
    if let Some(answer) = &app.answer {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  {}", wrap_text(answer, 35)),
            Style::default().fg(Color::Green),
        )));
    }

    let side = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Overview "),
    );
    f.render_widget(side, chunks[1]);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, app.filtered.len()),
        Style::default().fg(Color::Cyan),
    )];

    if let Some(message) = &app.message {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(message.clone(), Style::default().fg(Color::Magenta)));
    }

    if app.has_filter() {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled("c", key_style()));
        status_spans.push(Span::raw(" clear"));
    }

    for (key, label) in [
        ("/", " Search"),
        ("s", " State"),
        ("t", " Status"),
        ("r", " Reload"),
        ("Enter", " Details"),
        ("Tab", " Page"),
    ] {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(key, key_style()));
        status_spans.push(Span::raw(label));
    }
    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_prompt(f: &mut Frame, area: Rect, app: &App) {
    let label = match app.input_mode {
        InputMode::Question => " Ask: ",
        _ => " Search name or CIN: ",
    };

    let prompt = Paragraph::new(Line::from(vec![
        Span::styled(label, label_style()),
        Span::raw(app.input.clone()),
        Span::styled("█", key_style()),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Enter to confirm, Esc to cancel "),
    );

    f.render_widget(prompt, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn wrap_text(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if !current_line.is_empty() && current_line.len() + word.len() + 1 > width {
            lines.push(std::mem::take(&mut current_line));
        }
        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }
    if !current_line.is_empty() {
        lines.push(current_line);
    }

    lines.join("\n  ")
}
