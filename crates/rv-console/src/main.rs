mod app;
mod view;

use app::{Action, App};
use clap::Parser;
use crossterm::{
    event::EventStream,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use rv_console::config::{load_config, Args, ConsoleConfig};
use rv_console::{AlertPoller, CommandLinkClient, HttpMonitoringApi};
use rv_core::logfile::open_log_file;
use std::{
    error::Error,
    io,
    sync::{Arc, Mutex},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = match load_config(Args::parse()) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("rv-console: {err}");
            std::process::exit(2);
        }
    };
    init_logging(&config);
    info!(
        event = "console_start",
        api = %config.api_url,
        link = %config.link.endpoint,
        operator = %config.operator
    );

    let api = match HttpMonitoringApi::new(config.api_url.clone(), config.http_timeout) {
        Ok(value) => Arc::new(value),
        Err(err) => {
            error!(event = "console_config_error", error = %err);
            eprintln!("rv-console: {err}");
            std::process::exit(2);
        }
    };

    let mut app = App::new(config.operator.clone());
    let (mut link, mut link_events) = CommandLinkClient::spawn(config.link.clone());
    let poller = AlertPoller::new();
    let mut feed_revisions = poller.subscribe();
    poller.start(api, config.poll_interval);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let mut events = EventStream::new();

    loop {
        terminal.draw(|frame| view::render_ui(frame, &app))?;
        tokio::select! {
            Some(event) = link_events.recv() => {
                app.apply_link_event(event);
            }
            changed = feed_revisions.changed() => {
                if changed.is_ok() {
                    app.set_feed(poller.snapshot());
                }
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(event)) => match app.handle_input(event) {
                        Action::Quit => break,
                        Action::Submit(frame) => {
                            if let Err(err) = link.submit(frame) {
                                warn!(event = "submit_failed", error = %err);
                                app.status_note = Some(format!("not sent: {err}"));
                            }
                        }
                        Action::None => {}
                    },
                    Some(Err(err)) => {
                        warn!(event = "terminal_event_error", error = %err);
                    }
                    None => break,
                }
            }
        }
    }

    poller.stop();
    link.close().await;
    app.link.close();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    info!(event = "console_stop");
    Ok(())
}

/// Stdout belongs to the terminal view, so logs go to a file unless
/// `RV_LOG_STDOUT` asks for them.
fn init_logging(config: &ConsoleConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(std::env::var("RV_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()))
    });
    if rv_console::config::env_true("RV_LOG_STDOUT") {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        return;
    }
    match open_log_file(&config.log_dir, "rv-console.log") {
        Ok(Some(file)) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        Ok(None) | Err(_) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
}
