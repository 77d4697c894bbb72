mod app;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use app::{
    clock_part, format_remaining, format_vnd, stream_url, truncate, AppState, ConnectionStatus,
    StreamEvent, StreamFrame,
};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let admin_session = std::env::var("ADMIN_SESSION").ok().filter(|s| !s.is_empty());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("failed to build HTTP client");

    let mut app = AppState::new(base_url.clone(), admin_session);

    let (stream_tx, mut stream_rx) = mpsc::channel::<StreamEvent>(16);
    tokio::spawn(follow_stream(stream_url(&base_url), stream_tx));

    // Initial fetch before rendering
    app.refresh(&client).await;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app, &client, &mut stream_rx).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Session stream
// ---------------------------------------------------------------------------

/// Follows the server's session stream, reconnecting after drops.
async fn follow_stream(url: String, tx: mpsc::Sender<StreamEvent>) {
    loop {
        let reason = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((mut socket, _)) => loop {
                match socket.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(frame) = serde_json::from_str::<StreamFrame>(&text) {
                            if tx.send(StreamEvent::Frame(frame)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break "stream closed".to_string(),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break format!("{e}"),
                }
            },
            Err(e) => format!("{e}"),
        };
        if tx.send(StreamEvent::Disconnected(reason)).await.is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
    stream_rx: &mut mpsc::Receiver<StreamEvent>,
) -> io::Result<()> {
    let refresh_interval = Duration::from_secs(5);
    let frame_interval = Duration::from_millis(250);
    let mut last_tick = std::time::Instant::now();

    loop {
        while let Ok(event) = stream_rx.try_recv() {
            app.apply_stream(event);
        }

        terminal.draw(|f| render(f, app))?;

        if event::poll(frame_interval)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                        KeyCode::Char('r') | KeyCode::Char('R') => {
                            app.refresh(client).await;
                            last_tick = std::time::Instant::now();
                        }
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= refresh_interval {
            app.refresh(client).await;
            last_tick = std::time::Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState) {
    let area = f.area();

    // Outer vertical split: header | countdown | body | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Length(3), // countdown
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_countdown(f, app, chunks[1]);
    render_body(f, app, chunks[2]);
    render_footer(f, chunks[3]);
}

fn status_span(label: &str, status: &ConnectionStatus) -> Span<'static> {
    let (text, color) = match status {
        ConnectionStatus::Connected => (format!("● {label}"), Color::Green),
        ConnectionStatus::Connecting => (format!("◌ {label}"), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {label}: {}", truncate(e, 30)), Color::Red),
    };
    Span::styled(text, Style::default().fg(color))
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let server_time = app.server_time.as_deref().map_or("—", clock_part);
    let p99 = app
        .latency
        .p99_ms
        .map_or("—".to_string(), |v| format!("{v:.1}ms p99"));
    let queue = app
        .health
        .write_queue_pending
        .map_or("—".to_string(), |q| format!("queue {q}"));

    let title_spans = vec![
        Span::styled(
            " Session Desk  ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        status_span("api", &app.status),
        Span::raw("  "),
        status_span("stream", &app.stream_status),
        Span::raw("  │  "),
        Span::styled(format!("UTC {server_time}"), Style::default().fg(Color::White)),
        Span::raw("  │  "),
        Span::styled(queue, Style::default().fg(Color::White)),
        Span::raw("  │  "),
        Span::styled(p99, Style::default().fg(Color::White)),
    ];

    let paragraph = Paragraph::new(Line::from(title_spans))
        .block(Block::default().borders(Borders::ALL).border_style(
            Style::default().fg(Color::DarkGray),
        ));

    f.render_widget(paragraph, area);
}

fn render_countdown(f: &mut Frame, app: &AppState, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " CURRENT SESSION ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    let Some(session) = &app.current else {
        f.render_widget(Paragraph::new("waiting for session data…").block(block), area);
        return;
    };

    let color = match session.status.as_str() {
        "active" => Color::Green,
        "upcoming" => Color::Yellow,
        _ => Color::DarkGray,
    };
    let label = format!(
        "{}  {}  {:.0}%  {} left",
        session.label,
        session.status,
        session.progress,
        format_remaining(session.remaining_ms),
    );
    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(color).bg(Color::Black))
        .ratio((session.progress / 100.0).clamp(0.0, 1.0))
        .label(label);

    f.render_widget(gauge, area);
}

fn render_body(f: &mut Frame, app: &AppState, area: Rect) {
    // Horizontal split: upcoming (30%) | recent sessions (30%) | recent users (40%)
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(30),
            Constraint::Percentage(40),
        ])
        .split(area);

    render_upcoming_table(f, app, columns[0]);
    render_recent_sessions(f, app, columns[1]);
    render_recent_users(f, app, columns[2]);
}

fn table_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
}

fn header_row(cells: &[&'static str]) -> Row<'static> {
    Row::new(
        cells
            .iter()
            .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))),
    )
    .height(1)
}

fn admin_placeholder(f: &mut Frame, app: &AppState, title: &'static str, area: Rect) -> bool {
    match &app.admin_error {
        Some(msg) => {
            let p = Paragraph::new(Span::styled(msg.clone(), Style::default().fg(Color::DarkGray)))
                .block(table_block(title));
            f.render_widget(p, area);
            true
        }
        None => false,
    }
}

fn render_upcoming_table(f: &mut Frame, app: &AppState, area: Rect) {
    let rows: Vec<Row> = app
        .next_sessions
        .iter()
        .map(|s| {
            Row::new(vec![
                Cell::from(s.label.clone()),
                Cell::from(s.id.clone()).style(Style::default().fg(Color::DarkGray)),
                Cell::from(s.status.clone()).style(Style::default().fg(Color::Yellow)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [Constraint::Length(6), Constraint::Min(12), Constraint::Length(9)],
    )
    .header(header_row(&["Time", "Id", "Status"]))
    .block(table_block(" UPCOMING "));

    f.render_widget(table, area);
}

fn render_recent_sessions(f: &mut Frame, app: &AppState, area: Rect) {
    if admin_placeholder(f, app, " RECENT SESSIONS ", area) {
        return;
    }

    let rows: Vec<Row> = app
        .recent_sessions
        .iter()
        .map(|s| {
            let result = s.result_label.as_deref().unwrap_or("—");
            let result_color = match s.result.as_deref() {
                Some("up") => Color::Green,
                Some("down") => Color::Red,
                _ => Color::DarkGray,
            };
            Row::new(vec![
                Cell::from(clock_part(&s.start_time).to_string())
                    .style(Style::default().fg(Color::DarkGray)),
                Cell::from(result.to_string()).style(Style::default().fg(result_color)),
                Cell::from(s.status.clone()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [Constraint::Length(9), Constraint::Length(7), Constraint::Min(9)],
    )
    .header(header_row(&["Start", "Result", "Status"]))
    .block(table_block(" RECENT SESSIONS "));

    f.render_widget(table, area);
}

fn render_recent_users(f: &mut Frame, app: &AppState, area: Rect) {
    if admin_placeholder(f, app, " RECENT USERS ", area) {
        return;
    }

    let rows: Vec<Row> = app
        .recent_users
        .iter()
        .map(|u| {
            let flags = format!(
                "{}{}{}",
                if u.verified { "V" } else { "-" },
                if u.status.bet_locked { "B" } else { "-" },
                if u.status.withdraw_locked { "W" } else { "-" },
            );
            let name_color = if u.status.active { Color::White } else { Color::DarkGray };
            Row::new(vec![
                Cell::from(truncate(&u.username, 12)).style(Style::default().fg(name_color)),
                Cell::from(truncate(u.full_name.as_deref().unwrap_or("—"), 16)),
                Cell::from(format_vnd(u.balance.available)).style(Style::default().fg(Color::Cyan)),
                Cell::from(flags).style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Min(10),
            Constraint::Length(14),
            Constraint::Length(5),
        ],
    )
    .header(header_row(&["User", "Name", "Balance", "Flags"]))
    .block(table_block(" RECENT USERS "));

    f.render_widget(table, area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("refresh  "),
        Span::styled("flags: V verified  B bet-locked  W withdraw-locked  ", Style::default().fg(Color::DarkGray)),
        Span::styled("auto-refresh: 5s", Style::default().fg(Color::DarkGray)),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
