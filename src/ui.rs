use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, Paragraph};
use ratatui::Frame;

use scpi_link::command::COMMON_COMMANDS;
use scpi_link::journal::Direction as LogDirection;
use scpi_link::state::{level_text, ANALOG_FULL_SCALE_MV};
use scpi_link::Console;

use crate::App;

const HELP: &str = " F1 AIN  F2 DIN  F3 INT  F4 Monitor  F5 *IDN?  F6 Connect/Disconnect  \
F7 Blink  F8 Wave  F9 Chase  F10/F11 LEDs on/off  F12 PWM preset  Ctrl+L Clear log  Esc Quit";

pub fn draw(frame: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(12),
            Constraint::Length(3),
            Constraint::Length(2),
        ])
        .split(frame.size());

    draw_status(frame, rows[0], &app.console);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[1]);
    draw_instrument(frame, columns[0], &app.console);
    draw_log(frame, columns[1], &app.console);

    draw_input(frame, rows[2], &app.input);
    let shortcuts: Vec<String> = COMMON_COMMANDS
        .iter()
        .enumerate()
        .map(|(i, (_, description))| format!("Alt+{} {}", i + 1, description))
        .collect();
    let help = vec![Line::from(HELP), Line::from(format!(" {}", shortcuts.join("  ")))];
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        rows[3],
    );
}

fn draw_status(frame: &mut Frame, area: Rect, console: &Console) {
    let (label, color) = if console.is_connected() {
        ("Connected", Color::Green)
    } else {
        ("Disconnected", Color::Red)
    };
    let mut spans = vec![Span::styled(
        label,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )];
    if let Some(endpoint) = console.endpoint() {
        spans.push(Span::raw(format!("  {}", endpoint)));
    }
    if console.monitor().is_running() {
        spans.push(Span::styled(
            format!("  Monitoring every {} ms", console.monitor().interval().as_millis()),
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some(pattern) = console.pattern() {
        spans.push(Span::styled(
            format!("  Pattern: {}", pattern.name()),
            Style::default().fg(Color::Magenta),
        ));
    }
    let block = Block::default()
        .title("ESP32 GPIO Controller - IEEE 488.2/SCPI")
        .borders(Borders::ALL);
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn draw_instrument(frame: &mut Frame, area: Rect, console: &Console) {
    let state = console.state();
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Length(3),
            Constraint::Min(5),
        ])
        .split(area);

    for (i, (name, mv)) in [("CH1", state.analog.ch1_mv), ("CH2", state.analog.ch2_mv)]
        .into_iter()
        .enumerate()
    {
        let ratio = (f64::from(mv) / f64::from(ANALOG_FULL_SCALE_MV)).clamp(0.0, 1.0);
        let gauge = Gauge::default()
            .block(Block::default().title(format!("Analog {}", name)).borders(Borders::ALL))
            .gauge_style(Style::default().fg(Color::Cyan))
            .ratio(ratio)
            .label(format!("{} mV", mv));
        frame.render_widget(gauge, parts[i]);
    }

    let digital: Vec<Line> = state
        .digital
        .iter()
        .map(|(input, high)| {
            let color = if high { Color::Green } else { Color::DarkGray };
            Line::from(vec![
                Span::styled("● ", Style::default().fg(color)),
                Span::raw(format!("{:<9} {}", input.display_name(), level_text(high))),
            ])
        })
        .collect();
    frame.render_widget(
        Paragraph::new(digital).block(Block::default().title("Digital Inputs").borders(Borders::ALL)),
        parts[2],
    );

    frame.render_widget(
        Paragraph::new(format!("{:>8}", state.interrupt_count))
            .block(Block::default().title("Interrupt Counter").borders(Borders::ALL)),
        parts[3],
    );

    let outputs = &state.outputs;
    let switches = |values: &[bool]| -> String {
        values
            .iter()
            .enumerate()
            .map(|(i, on)| format!("{}:{}", i + 1, if *on { "ON" } else { "OFF" }))
            .collect::<Vec<_>>()
            .join("  ")
    };
    let mut lines = vec![
        Line::from(format!("LEDs    {}", switches(&outputs.leds[..]))),
        Line::from(format!("Relays  {}", switches(&outputs.relays[..]))),
    ];
    for (i, pwm) in outputs.pwm.iter().enumerate() {
        lines.push(Line::from(format!(
            "PWM{}    {:>3}%  {} Hz",
            i + 1,
            pwm.duty_percent,
            pwm.frequency_hz
        )));
    }
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().title("Outputs").borders(Borders::ALL)),
        parts[4],
    );
}

fn draw_log(frame: &mut Frame, area: Rect, console: &Console) {
    let journal = console.journal();
    let visible = area.height.saturating_sub(2) as usize;
    let skip = journal.len().saturating_sub(visible);
    let items: Vec<ListItem> = journal
        .entries()
        .skip(skip)
        .map(|entry| {
            let color = match entry.direction() {
                LogDirection::Sent => Color::Blue,
                LogDirection::Received => Color::Green,
                LogDirection::Error => Color::Red,
                LogDirection::Info => Color::Reset,
            };
            ListItem::new(entry.to_string()).style(Style::default().fg(color))
        })
        .collect();
    frame.render_widget(
        List::new(items).block(Block::default().title("Communication Log").borders(Borders::ALL)),
        area,
    );
}

fn draw_input(frame: &mut Frame, area: Rect, input: &str) {
    frame.render_widget(
        Paragraph::new(format!("> {}", input))
            .block(Block::default().title("Command").borders(Borders::ALL)),
        area,
    );
    let typed = u16::try_from(input.chars().count()).unwrap_or(u16::MAX);
    let x = area.x.saturating_add(3).saturating_add(typed);
    frame.set_cursor(x.min(area.right().saturating_sub(2)), area.y + 1);
}
