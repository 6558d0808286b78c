mod config;
mod ui;

use std::error::Error;
use std::fs::File;
use std::io;
use std::time::{Duration, Instant};

use clap::Parser;
use crossterm::cursor::Show;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use log::{error, info};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use config::Cli;
use scpi_link::command::{COMMON_COMMANDS, PWM_PRESETS};
use scpi_link::{Command, Console, LedPattern};

/// Front-end state: the console plus the command being typed.
pub struct App {
    pub console: Console,
    pub input: String,
    /// Last port requested, reused by the reconnect key.
    target: Option<(String, u32)>,
}

// The main entry point for the terminal console.
fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if cli.list_ports {
        return list_ports();
    }

    setup_logging(&cli)?;
    info!("scpi_console starting");

    let mut app = App {
        console: Console::new(cli.link_config(), cli.monitor_schedule())
            .with_journal(cli.journal()),
        input: String::new(),
        target: cli.port.clone().map(|port| (port, cli.baud)),
    };
    if let Some((port, baud)) = app.target.clone() {
        // A failed open is already in the communication log.
        if let Err(e) = app.console.connect(&port, baud) {
            error!("{}", e);
        }
    }

    install_panic_hook();
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = run(&mut terminal, &mut app);

    app.console.disconnect();
    restore_terminal()?;

    result.map_err(Into::into)
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, Show)
}

/// Puts the terminal back before the panic message is printed.
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        previous(info);
    }));
}

fn setup_logging(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let file = File::create(&cli.log_file)?;
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(filter) = &cli.log_level {
        builder.parse_filters(filter);
    }
    builder
        .format_timestamp_millis()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn list_ports() -> Result<(), Box<dyn Error>> {
    let ports = serialport::available_ports()?;
    if ports.is_empty() {
        eprintln!("[ERROR] No serial ports found.");
        return Ok(());
    }
    println!("Available serial ports:");
    for (i, port) in ports.iter().enumerate() {
        println!("  {}: {}", i, port.port_name);
    }
    Ok(())
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> io::Result<()> {
    loop {
        app.console.pump();
        // Send failures are recorded in the communication log.
        let _ = app.console.tick(Instant::now());

        terminal.draw(|frame| ui::draw(frame, app))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && handle_key(app, key) {
                    return Ok(());
                }
            }
        }
    }
}

/// Applies one key press. Returns true when the user asked to quit.
fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    let console = &mut app.console;
    let now = Instant::now();
    if key.modifiers.contains(KeyModifiers::ALT) {
        if let KeyCode::Char(c) = key.code {
            if let Some(command) = common_command(c) {
                let _ = console.send(command);
            }
        }
        return false;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => return true,
            KeyCode::Char('l') => console.clear_journal(),
            _ => {}
        }
        return false;
    }

    match key.code {
        KeyCode::Esc => return true,
        KeyCode::Enter => {
            let text = std::mem::take(&mut app.input);
            if !text.trim().is_empty() {
                match Command::parse(&text) {
                    Ok(command) => {
                        let _ = console.send(command);
                    }
                    Err(e) => console.log_error(e.to_string()),
                }
            }
        }
        KeyCode::Backspace => {
            app.input.pop();
        }
        KeyCode::Char(c) => app.input.push(c),
        KeyCode::F(1) => {
            let _ = console.send(Command::AnalogAll);
        }
        KeyCode::F(2) => {
            let _ = console.send(Command::DigitalAll);
        }
        KeyCode::F(3) => {
            let _ = console.send(Command::InterruptCount);
        }
        KeyCode::F(4) => {
            let _ = console.toggle_monitoring(now);
        }
        KeyCode::F(5) => {
            let _ = console.send(Command::Identify);
        }
        KeyCode::F(6) => {
            if console.endpoint().is_some() {
                console.disconnect();
            } else if let Some((port, baud)) = &app.target {
                let _ = console.connect(port, *baud);
            } else {
                console.log_error("No port selected: start with --port <PATH>");
            }
        }
        KeyCode::F(n @ 7..=9) => {
            let pattern = LedPattern::ALL[usize::from(n - 7)];
            let _ = console.play_pattern(pattern, now);
        }
        KeyCode::F(10) => {
            let _ = console.send_all(Command::all_leds(true));
        }
        KeyCode::F(11) => {
            let _ = console.send_all(Command::all_leds(false));
        }
        KeyCode::F(12) => {
            let percent = next_pwm_preset(console.state().outputs.pwm[0].duty_percent);
            match Command::pwm_preset(percent) {
                Ok(commands) => {
                    let _ = console.send_all(commands);
                }
                Err(e) => console.log_error(e.to_string()),
            }
        }
        _ => {}
    }
    false
}

/// Alt+1 .. Alt+8 pick from the common command catalogue.
fn common_command(key: char) -> Option<Command> {
    let slot = key.to_digit(10)?.checked_sub(1)?;
    COMMON_COMMANDS
        .get(usize::try_from(slot).ok()?)
        .map(|(command, _)| command.clone())
}

/// The preset after `current`, wrapping back to the first.
fn next_pwm_preset(current: u8) -> u8 {
    PWM_PRESETS
        .iter()
        .copied()
        .find(|&percent| percent > current)
        .unwrap_or(PWM_PRESETS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_map_to_common_commands() {
        assert_eq!(common_command('1'), Some(Command::Identify));
        assert_eq!(common_command('8'), Some(Command::SystemError));
        assert_eq!(common_command('0'), None);
        assert_eq!(common_command('9'), None);
        assert_eq!(common_command('x'), None);
    }

    #[test]
    fn presets_cycle() {
        assert_eq!(next_pwm_preset(0), 25);
        assert_eq!(next_pwm_preset(30), 50);
        assert_eq!(next_pwm_preset(75), 100);
        assert_eq!(next_pwm_preset(100), 0);
    }

    #[test]
    fn alt_digit_sends_catalogue_entry() {
        let mut app = App {
            console: Console::default(),
            input: String::new(),
            target: None,
        };
        let key = KeyEvent::new(KeyCode::Char('1'), KeyModifiers::ALT);
        assert!(!handle_key(&mut app, key));
        // Nothing is typed, and the failed send is logged.
        assert!(app.input.is_empty());
        assert_eq!(app.console.journal().len(), 1);
    }
}
