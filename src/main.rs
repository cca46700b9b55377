//! termline demo REPL
//!
//! Drives the line editor against the local console: stdin is fed into a
//! transport bridge from a reader thread, the capability probe interrogates
//! the terminal once at startup, and a handful of built-in commands
//! exercise history and autocomplete.

use std::env;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::thread;

use crossterm::terminal;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use termline::config::Config;
use termline::core::{
    AnsiMode, CancelToken, CapabilityProbe, SessionOverrides, SessionStore, TextBridge,
};
use termline::history::{CommandHistory, HistoryProvider};
use termline::ui::{LineEditor, ReadOutcome, Suggestion, WordListResolver};

const SESSION_ID: u64 = 1;

/// Command line options
struct CliArgs {
    /// ANSI policy override (`--ansi always|never|auto`)
    ansi: Option<AnsiMode>,
    /// Skip the startup capability probe
    no_probe: bool,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            ansi: None,
            no_probe: false,
        }
    }
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("termline {}", VERSION);
}

fn print_help() {
    eprintln!("termline {} - interactive line editor demo", VERSION);
    eprintln!();
    eprintln!("Usage: termline [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --ansi <MODE>         ANSI policy: always, never, auto (default: auto)");
    eprintln!("  --no-probe            Skip the terminal capability probe");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("At the prompt:");
    eprintln!("  Tab                   Complete a command; press twice for the menu");
    eprintln!("  Up/Down               Navigate command history");
    eprintln!("  exit                  Leave the demo");
    eprintln!();
    eprintln!("Configuration: ~/.termline/config.toml");
    eprintln!("History:       ~/.termline/history");
}

fn parse_args() -> Result<CliArgs, String> {
    let args: Vec<String> = env::args().collect();
    let mut cli = CliArgs::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "--ansi" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing mode after --ansi".to_string());
                }
                cli.ansi = Some(match args[i].as_str() {
                    "always" => AnsiMode::Always,
                    "never" => AnsiMode::Never,
                    "auto" => AnsiMode::Auto,
                    other => return Err(format!("Unknown ANSI mode: {}", other)),
                });
            }
            "--no-probe" => {
                cli.no_probe = true;
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(cli)
}

fn init_logging() {
    let log_path = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(std::path::PathBuf::from)
        .map(|h| h.join(".termline").join("termline.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("termline.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = match parse_args() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("termline starting...");

    let config = Config::load();
    let ansi_mode = cli.ansi.unwrap_or(config.ansi_mode);
    let store = SessionStore::new(ansi_mode, config.fallback_width);

    terminal::enable_raw_mode()?;
    let result = run_repl(&store, &config, &cli);
    terminal::disable_raw_mode()?;
    store.remove(SESSION_ID);
    info!("termline exiting");
    result
}

fn run_repl(store: &SessionStore, config: &Config, cli: &CliArgs) -> anyhow::Result<()> {
    store.ensure(SESSION_ID, "console");

    // Local terminal facts are host overrides: they beat later detection.
    let mut overrides = SessionOverrides::default();
    if let Ok((cols, rows)) = terminal::size() {
        overrides.window_size = Some((cols, rows));
    }
    store.apply_overrides(SESSION_ID, &overrides);

    // Feed stdin into the bridge until it closes.
    let bridge = Arc::new(TextBridge::new());
    let feeder = bridge.clone();
    thread::spawn(move || {
        let mut stdin = io::stdin();
        let mut buf = [0u8; 1024];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) | Err(_) => {
                    feeder.complete();
                    break;
                }
                Ok(n) => feeder.push(&String::from_utf8_lossy(&buf[..n])),
            }
        }
    });

    let mut stdout = io::stdout();
    let cancel = CancelToken::new();

    if !cli.no_probe {
        let probe = CapabilityProbe::new(config.probe_timeout());
        match probe.run(&bridge, &mut stdout, &cancel) {
            Ok(report) => store.apply_probe(SESSION_ID, &report),
            Err(e) => warn!("capability probe failed: {}", e),
        }
    }

    let mut history = if config.history.persist {
        CommandHistory::new()
    } else {
        CommandHistory::in_memory(config.history.limit)
    };

    let resolver = WordListResolver::new(vec![
        Suggestion::with_description("help", "list commands"),
        Suggestion::with_description("hello", "print a greeting"),
        Suggestion::with_description("history", "show recent commands"),
        Suggestion::with_description("session", "show terminal metadata"),
        Suggestion::with_description("version", "print the version"),
        Suggestion::with_description("exit", "leave the demo"),
    ]);

    loop {
        let mut editor = LineEditor::new(store, SESSION_ID)
            .with_escape_timeout(config.escape_timeout())
            .with_resolver(&resolver)
            .with_history(&mut history, config.history_window);
        let outcome = editor.read_line(&bridge, &mut stdout, "termline> ", &cancel)?;
        drop(editor);

        match outcome {
            ReadOutcome::Submitted(line) => match line.trim() {
                "" => {}
                "exit" | "quit" => break,
                "help" => {
                    write!(
                        stdout,
                        "commands: help, hello, history, session, version, exit\r\n"
                    )?;
                    stdout.flush()?;
                }
                "hello" => {
                    write!(stdout, "hello!\r\n")?;
                    stdout.flush()?;
                }
                "version" => {
                    write!(stdout, "termline {}\r\n", VERSION)?;
                    stdout.flush()?;
                }
                "history" => {
                    for entry in history.recent(10) {
                        write!(stdout, "{}\r\n", entry)?;
                    }
                    stdout.flush()?;
                }
                "session" => {
                    if let Some(session) = store.get(SESSION_ID) {
                        write!(
                            stdout,
                            "transport={} size={:?} ansi={} capabilities={:?}\r\n",
                            session.transport_name,
                            session.window_size,
                            store.ansi_enabled(SESSION_ID),
                            session.capabilities,
                        )?;
                        stdout.flush()?;
                    }
                }
                other => {
                    write!(stdout, "unknown command: {} (try 'help')\r\n", other)?;
                    stdout.flush()?;
                }
            },
            ReadOutcome::Cancelled | ReadOutcome::Eof => break,
        }
    }

    Ok(())
}
