mod bar;
mod client;
mod config;
mod events;
mod keys;
mod launcher;
mod layout;
mod reaper;
mod state;
mod status;
mod workspace;
mod xconn;

use bar::{Bar, StatusBar};
use config::Config;
use events::{Atoms, Dispatcher, Flow, WmEvent};
use launcher::XLauncher;
use reaper::Spawner;
use simplelog::{
    ColorChoice, CombinedLogger, Config as LogConfig, LevelFilter, TermLogger, TerminalMode,
    WriteLogger,
};
use state::WindowManager;
use std::fs::File;
use std::thread;
use std::time::Duration;
use x11rb::connection::Connection;
use x11rb::errors::ConnectionError;
use x11rb::protocol::xproto::{
    Atom, ClientMessageData, ClientMessageEvent, ConnectionExt, EventMask, Window,
};
use x11rb::rust_connection::RustConnection;
use xconn::{X11, XConn};

const LOG_FILE: &str = "/tmp/qwm.log";

type Conn = X11<RustConnection>;

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let level = std::env::var("QWM_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LevelFilter::Info);

    CombinedLogger::init(vec![
        TermLogger::new(
            level,
            LogConfig::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(level, LogConfig::default(), File::create(LOG_FILE)?),
    ])?;
    Ok(())
}

/// Wake the event loop once a second with a tick message sent to `target`.
fn start_timer(target: Window, tick: Atom) {
    thread::spawn(move || {
        // A separate connection so the main one stays single-threaded.
        let timer_conn = match x11rb::connect(None) {
            Ok((conn, _)) => conn,
            Err(e) => {
                log::error!("Timer thread failed to connect to X11: {}", e);
                return;
            }
        };
        loop {
            thread::sleep(Duration::from_secs(1));
            let event = ClientMessageEvent {
                response_type: x11rb::protocol::xproto::CLIENT_MESSAGE_EVENT,
                format: 32,
                sequence: 0,
                window: target,
                type_: tick,
                data: ClientMessageData::from([0u32; 5]),
            };
            let sent = timer_conn
                .send_event(false, target, EventMask::NO_EVENT, &event)
                .and_then(|_| timer_conn.flush());
            if let Err(e) = sent {
                log::error!("Timer thread lost the X connection: {}", e);
                return;
            }
        }
    });
}

fn run(
    conn: &Conn,
    wm: &mut WindowManager,
    dispatcher: &mut Dispatcher<XLauncher, Bar, Spawner>,
    atoms: &Atoms,
) -> Result<(), ConnectionError> {
    dispatcher.handle(wm, conn, WmEvent::Tick)?;
    loop {
        let event = conn.inner().wait_for_event()?;
        let Some(event) = events::classify(event, atoms) else {
            continue;
        };
        if dispatcher.handle(wm, conn, event)? == Flow::Quit {
            return Ok(());
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;

    let config = Config::load();

    let (raw, screen_num) = x11rb::connect(None)?;
    let conn = X11::new(raw);
    let screen = conn.inner().setup().roots[screen_num].clone();

    log::info!(
        "Connected. Screen: {}x{}",
        screen.width_in_pixels,
        screen.height_in_pixels
    );

    conn.become_wm(screen.root)?;
    let atoms = Atoms::intern(conn.inner())?;

    let bar = Bar::new(conn.inner(), &screen, &config.appearance)?;
    let launcher = XLauncher::new(conn.inner(), &screen, &config.appearance)?;
    conn.grab_keys(screen.root, keys::KEYBINDINGS)?;
    conn.flush()?;

    start_timer(StatusBar::<Conn>::window(&bar), atoms.tick);

    let mut wm = WindowManager::new(
        screen.width_in_pixels,
        screen.height_in_pixels,
        StatusBar::<Conn>::height(&bar),
        &config,
    );
    let mut dispatcher = Dispatcher::new(
        launcher,
        bar,
        Spawner::new()?,
        config,
        keys::KEYBINDINGS,
    );
    log::info!("qwm started with {} keybinds", keys::KEYBINDINGS.len());

    let result = run(&conn, &mut wm, &mut dispatcher, &atoms);
    match &result {
        Ok(()) => log::info!("Shutting down"),
        Err(e) => log::error!("Lost the X connection: {}", e),
    }
    dispatcher.shutdown(&conn, result)?;
    Ok(())
}
