use std::{collections::VecDeque, io, thread, time::Duration};

use anyhow::{Context, Result};
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use fluidport_core::{
    sandbox::{TankLevel, PORT_FACING, PORT_POSITION},
    world::{HostEvent, World},
    AppConfig, FluidPort, IoDirection, IoMode,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::sim::{self, Command};

const INPUT_POLL: Duration = Duration::from_millis(100);
const MAX_LOG_LINES: usize = 200;

const VARIANT_LABELS: [&str; 4] = [
    "input · open",
    "input · linked",
    "output · open",
    "output · linked",
];

enum AppEvent {
    Input(Event),
    Tick,
}

/// Presentation side: mirrors the port from sync blobs and renders it.
pub struct PortApp {
    commands: mpsc::Sender<Command>,
    frames: Option<mpsc::Receiver<sim::Frame>>,
    mirror: FluidPort,
    mirror_world: World,
    latest: Option<sim::Frame>,
    render_marks: u64,
    log: VecDeque<String>,
    status: String,
    should_quit: bool,
}

impl PortApp {
    pub fn new(config: &AppConfig, commands: mpsc::Sender<Command>) -> Self {
        Self {
            commands,
            frames: None,
            mirror: FluidPort::new(PORT_POSITION, PORT_FACING, config.port_kind, IoMode::Passive),
            mirror_world: World::presentation(),
            latest: None,
            render_marks: 0,
            log: VecDeque::new(),
            status: "Waiting for simulation".to_string(),
            should_quit: false,
        }
    }

    pub fn attach_frames(&mut self, receiver: mpsc::Receiver<sim::Frame>) {
        self.frames = Some(receiver);
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut frames = self
            .frames
            .take()
            .context("simulation frames were not attached")?;

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx);

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.should_quit {
                break;
            }

            tokio::select! {
                maybe_event = event_rx.recv() => {
                    match maybe_event {
                        Some(AppEvent::Input(Event::Key(key))) => self.handle_key(key).await,
                        Some(AppEvent::Input(_)) | Some(AppEvent::Tick) => {}
                        None => break,
                    }
                }
                maybe_frame = frames.recv() => {
                    match maybe_frame {
                        Some(frame) => self.handle_frame(frame),
                        None => {
                            self.status = "Simulation stopped".to_string();
                            break;
                        }
                    }
                }
            }
        }

        restore_terminal(&mut terminal)?;
        Ok(())
    }

    async fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        let command = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                return;
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
                return;
            }
            KeyCode::Char('d') => Command::ToggleDirection,
            KeyCode::Char('a') => Command::ToggleAssembly,
            KeyCode::Char('t') => Command::ToggleAttachment,
            KeyCode::Char('n') => Command::ToggleNeighbor,
            KeyCode::Char('k') => Command::SwapNeighborKind,
            KeyCode::Char('p') | KeyCode::Char(' ') => Command::TogglePause,
            KeyCode::Char('.') => Command::Step,
            KeyCode::Char('s') => Command::Save,
            KeyCode::Char('l') => Command::LoadLatest,
            _ => return,
        };
        debug!(?command, "key command");
        if self.commands.send(command).await.is_err() {
            self.status = "Simulation is gone".to_string();
            self.should_quit = true;
        }
    }

    fn handle_frame(&mut self, frame: sim::Frame) {
        self.mirror.sync_data_from(&frame.sync, &mut self.mirror_world);
        for event in self.mirror_world.take_events() {
            if matches!(event, HostEvent::RenderUpdateMarked(_)) {
                self.render_marks += 1;
            }
        }

        for event in &frame.events {
            self.push_log(describe_event(event));
        }
        if let Some(report) = frame.report.filter(|report| report.pushed > 0 || report.pumped > 0) {
            self.push_log(format!(
                "tick {}: pushed {} · pumped {}",
                report.tick, report.pushed, report.pumped
            ));
        }
        if let Some(note) = &frame.note {
            info!(note = %note, "simulation note");
            self.status = note.clone();
            self.push_log(note.clone());
        } else if self.latest.is_none() {
            self.status = "Ready".to_string();
        }
        self.latest = Some(frame);
    }

    fn push_log(&mut self, line: String) {
        let stamp = Local::now().format("%H:%M:%S");
        self.log.push_front(format!("{stamp} {line}"));
        self.log.truncate(MAX_LOG_LINES);
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(3),
            ])
            .split(area);

        self.render_header(frame, chunks[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(chunks[1]);
        self.render_structure(frame, body[0]);
        self.render_log(frame, body[1]);
        self.render_footer(frame, chunks[2]);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let (tick, paused) = self
            .latest
            .as_ref()
            .map(|latest| (latest.view.tick, latest.paused))
            .unwrap_or((0, false));
        let state = if paused { "paused" } else { "running" };
        let header = Paragraph::new(Line::from(vec![
            Span::styled(
                "FLUIDPORT",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("  tick {tick} · {state}")),
        ]))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
        frame.render_widget(header, area);
    }

    fn render_structure(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Port");
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let Some(latest) = &self.latest else {
            frame.render_widget(Paragraph::new("Waiting for the first frame…"), inner);
            return;
        };
        let view = &latest.view;
        let status = &view.status;

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(6),
            ])
            .split(inner);

        frame.render_widget(tank_gauge("Reservoir", &view.reservoir, Color::Blue), rows[0]);
        match &view.neighbor {
            Some(neighbor) => frame.render_widget(
                tank_gauge(
                    &format!("Neighbor ({})", neighbor.kind.label()),
                    neighbor,
                    Color::Magenta,
                ),
                rows[1],
            ),
            None => frame.render_widget(
                Paragraph::new("no neighbor placed")
                    .block(Block::default().borders(Borders::ALL).title("Neighbor")),
                rows[1],
            ),
        }

        let variant = usize::from(status.variant).min(VARIANT_LABELS.len() - 1);
        let variant_label = if status.assembled {
            VARIANT_LABELS[variant]
        } else {
            "neutral (not assembled)"
        };
        let mirror_note = if self.mirror.direction() == status.direction {
            "in sync".to_string()
        } else {
            format!("stale ({})", self.mirror.direction().label())
        };
        let lines = vec![
            labeled("Direction", status.direction.label(), direction_color(status.direction)),
            labeled(
                "Kind / mode",
                &format!(
                    "{} / {}",
                    status.kind.label(),
                    if status.mode.is_active() { "active" } else { "passive" }
                ),
                Color::White,
            ),
            labeled("Faces", status.outward.label(), Color::White),
            labeled("Connected", yes_no(status.connected), flag_color(status.connected)),
            labeled("Assembled", yes_no(status.assembled), flag_color(status.assembled)),
            labeled("Attached", yes_no(view.attached), flag_color(view.attached)),
            labeled(
                "Variant",
                &format!("{} · {variant_label}", status.variant),
                Color::Cyan,
            ),
            labeled(
                "Mirror",
                &format!("{mirror_note} · {} render marks", self.render_marks),
                Color::Gray,
            ),
        ];
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), rows[2]);
    }

    fn render_log(&self, frame: &mut Frame, area: Rect) {
        let height = area.height.saturating_sub(2) as usize;
        let items: Vec<ListItem> = self
            .log
            .iter()
            .take(height)
            .map(|line| ListItem::new(line.as_str()))
            .collect();
        let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Events"));
        frame.render_widget(list, area);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let help = concat!(
            "d dir · a assemble · t attach · n neighbor · k kind · ",
            "space pause · . step · s save · l load · q quit"
        );
        let footer = Paragraph::new(vec![Line::from(vec![
            Span::styled(self.status.clone(), Style::default().fg(Color::Yellow)),
            Span::raw("   "),
            Span::styled(help, Style::default().fg(Color::DarkGray)),
        ])])
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true });
        frame.render_widget(footer, area);
    }
}

fn tank_gauge<'a>(title: &str, tank: &TankLevel, color: Color) -> Gauge<'a> {
    let ratio = if tank.capacity == 0 {
        0.0
    } else {
        (tank.amount as f64 / tank.capacity as f64).clamp(0.0, 1.0)
    };
    Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title.to_string()),
        )
        .gauge_style(Style::default().fg(color))
        .ratio(ratio)
        .label(format!("{} / {}", tank.amount, tank.capacity))
}

fn labeled(label: &str, value: &str, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:<12}"), Style::default().fg(Color::DarkGray)),
        Span::styled(value.to_string(), Style::default().fg(color)),
    ])
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn flag_color(flag: bool) -> Color {
    if flag {
        Color::Green
    } else {
        Color::Red
    }
}

fn direction_color(direction: IoDirection) -> Color {
    match direction {
        IoDirection::Input => Color::Green,
        IoDirection::Output => Color::Yellow,
    }
}

fn describe_event(event: &HostEvent) -> String {
    match event {
        HostEvent::BlockUpdate(pos) => format!("block update at {pos}"),
        HostEvent::OutwardNeighborsNotified { pos, outward } => {
            format!("neighbors of {pos} notified via {}", outward.label())
        }
        HostEvent::MarkedDirty(pos) => format!("{pos} marked dirty"),
        HostEvent::RenderUpdateMarked(pos) => format!("{pos} marked for render"),
        HostEvent::RenderUpdateRequested(pos) => format!("render refresh requested for {pos}"),
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(INPUT_POLL) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}
