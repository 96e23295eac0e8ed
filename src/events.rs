use crate::bar::StatusBar;
use crate::config::Config;
use crate::keys::{self, Action, Keybinding};
use crate::launcher::Launcher;
use crate::reaper::Spawn;
use crate::state::WindowManager;
use crate::workspace::FocusDirection;
use crate::xconn::{WindowChanges, XConn};
use x11rb::connection::Connection;
use x11rb::errors::{ConnectionError, ReplyError};
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{Atom, ConfigWindow, ConnectionExt, NotifyMode, Window};
use x11rb::x11_utils::X11Error;

pub const TICK_ATOM: &str = "_QWM_TICK";

/// Atoms the dispatcher recognises in client messages.
#[derive(Clone, Copy, Debug)]
pub struct Atoms {
    pub net_close_window: Atom,
    pub tick: Atom,
}

impl Atoms {
    pub fn intern<C: Connection>(conn: &C) -> Result<Self, ReplyError> {
        let net_close_window = conn.intern_atom(false, b"_NET_CLOSE_WINDOW")?;
        let tick = conn.intern_atom(false, TICK_ATOM.as_bytes())?;
        Ok(Self {
            net_close_window: net_close_window.reply()?.atom,
            tick: tick.reply()?.atom,
        })
    }
}

/// The events the window manager reacts to.
#[derive(Clone, Debug)]
pub enum WmEvent {
    MapRequest(Window),
    DestroyNotify(Window),
    ConfigureRequest { window: Window, changes: WindowChanges },
    EnterNotify(Window),
    CloseRequest(Window),
    Tick,
    KeyPress { state: u16, keycode: u8 },
    Expose { window: Window, count: u16 },
    ProtocolError(X11Error),
}

/// Reduce a raw event to a [`WmEvent`]. Anything else is dropped.
pub fn classify(event: Event, atoms: &Atoms) -> Option<WmEvent> {
    match event {
        Event::MapRequest(e) => Some(WmEvent::MapRequest(e.window)),
        Event::DestroyNotify(e) => Some(WmEvent::DestroyNotify(e.window)),
        Event::ConfigureRequest(e) => Some(WmEvent::ConfigureRequest {
            window: e.window,
            changes: requested_changes(u16::from(e.value_mask), e.x, e.y, e.width, e.height),
        }),
        Event::EnterNotify(e) if e.mode == NotifyMode::NORMAL => {
            Some(WmEvent::EnterNotify(e.event))
        }
        Event::ClientMessage(e) if e.type_ == atoms.net_close_window => {
            Some(WmEvent::CloseRequest(e.window))
        }
        Event::ClientMessage(e) if e.type_ == atoms.tick => Some(WmEvent::Tick),
        Event::KeyPress(e) => Some(WmEvent::KeyPress {
            state: u16::from(e.state),
            keycode: e.detail,
        }),
        Event::Expose(e) => Some(WmEvent::Expose {
            window: e.window,
            count: e.count,
        }),
        Event::Error(e) => Some(WmEvent::ProtocolError(e)),
        _ => None,
    }
}

/// Keep only the geometry fields named in a configure request's mask.
pub fn requested_changes(mask: u16, x: i16, y: i16, width: u16, height: u16) -> WindowChanges {
    let has = |bit: ConfigWindow| mask & u16::from(bit) != 0;
    WindowChanges {
        x: has(ConfigWindow::X).then_some(i32::from(x)),
        y: has(ConfigWindow::Y).then_some(i32::from(y)),
        width: has(ConfigWindow::WIDTH).then_some(u32::from(width)),
        height: has(ConfigWindow::HEIGHT).then_some(u32::from(height)),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Routes events to the window manager and its overlays.
pub struct Dispatcher<L, B, S> {
    pub launcher: L,
    pub bar: B,
    spawner: S,
    config: Config,
    bindings: &'static [Keybinding],
}

impl<L, B, S: Spawn> Dispatcher<L, B, S> {
    pub fn new(
        launcher: L,
        bar: B,
        spawner: S,
        config: Config,
        bindings: &'static [Keybinding],
    ) -> Self {
        Self {
            launcher,
            bar,
            spawner,
            config,
            bindings,
        }
    }

    /// Handle one event, then flush the connection.
    pub fn handle<X>(
        &mut self,
        wm: &mut WindowManager,
        conn: &X,
        event: WmEvent,
    ) -> Result<Flow, ConnectionError>
    where
        X: XConn,
        L: Launcher<X>,
        B: StatusBar<X>,
    {
        let flow = self.dispatch(wm, conn, event)?;
        conn.flush()?;
        Ok(flow)
    }

    fn dispatch<X>(
        &mut self,
        wm: &mut WindowManager,
        conn: &X,
        event: WmEvent,
    ) -> Result<Flow, ConnectionError>
    where
        X: XConn,
        L: Launcher<X>,
        B: StatusBar<X>,
    {
        match event {
            WmEvent::MapRequest(window) => {
                if window == self.bar.window() || self.launcher.owns(window) {
                    return Ok(Flow::Continue);
                }
                wm.handle_map_request(conn, window)?;
            }
            WmEvent::DestroyNotify(window) => wm.handle_destroy_notify(conn, window)?,
            WmEvent::ConfigureRequest { window, changes } => {
                wm.handle_configure_request(conn, window, changes)?
            }
            WmEvent::EnterNotify(window) => {
                // The launcher keeps the keyboard until it closes.
                if !self.launcher.is_open() {
                    wm.handle_enter_notify(conn, window)?;
                }
            }
            WmEvent::CloseRequest(window) => wm.close_window(conn, window)?,
            WmEvent::Tick => {}
            WmEvent::KeyPress { state, keycode } => {
                if self.launcher.is_open() {
                    self.launcher_key(wm, conn, keycode)?;
                } else if let Some(action) = keys::lookup(self.bindings, state, keycode) {
                    log::debug!("Key {} state {:#x}: {:?}", keycode, state, action);
                    if self.run(wm, conn, action)? == Flow::Quit {
                        return Ok(Flow::Quit);
                    }
                }
            }
            WmEvent::Expose { window, count } => {
                if window == self.bar.window() {
                    self.bar.handle_expose(conn, count)?;
                } else if self.launcher.owns(window) && count == 0 {
                    self.launcher.draw(conn)?;
                }
                return Ok(Flow::Continue);
            }
            WmEvent::ProtocolError(e) => {
                log::warn!("X error: {:?}", e);
                return Ok(Flow::Continue);
            }
        }
        self.refresh_bar(wm, conn)?;
        Ok(Flow::Continue)
    }

    fn run<X>(
        &mut self,
        wm: &mut WindowManager,
        conn: &X,
        action: Action,
    ) -> Result<Flow, ConnectionError>
    where
        X: XConn,
        L: Launcher<X>,
    {
        match action {
            Action::Quit => {
                log::info!("Quit requested");
                return Ok(Flow::Quit);
            }
            Action::KillFocused => wm.kill_focused(conn)?,
            Action::Workspace(index) => wm.switch_workspace(conn, index)?,
            Action::MoveToWorkspace(index) => wm.move_focused_to_workspace(conn, index)?,
            Action::ToggleLayout => wm.toggle_layout(conn)?,
            Action::ToggleOrientation => wm.toggle_orientation(conn)?,
            Action::FocusNext => wm.cycle_focus(conn, FocusDirection::Next)?,
            Action::FocusPrev => wm.cycle_focus(conn, FocusDirection::Prev)?,
            Action::SwapMaster => wm.swap_master(conn)?,
            Action::OpenLauncher => {
                self.launcher.open(conn)?;
                self.launcher.draw(conn)?;
            }
            Action::Spawn(name) => match self.config.spawn_command(name) {
                Some(argv) => self.spawn(argv),
                None => log::warn!("No spawn command named {:?}", name),
            },
        }
        Ok(Flow::Continue)
    }

    /// Close the overlays and free their resources, whether the loop ended
    /// on request or on a lost connection. The loop's own outcome wins.
    pub fn shutdown<X>(
        &mut self,
        conn: &X,
        outcome: Result<(), ConnectionError>,
    ) -> Result<(), ConnectionError>
    where
        X: XConn,
        L: Launcher<X>,
        B: StatusBar<X>,
    {
        let teardown = self
            .launcher
            .close(conn)
            .and_then(|()| self.launcher.release(conn))
            .and_then(|()| self.bar.destroy(conn))
            .and_then(|()| conn.flush());
        if let Err(e) = teardown {
            log::warn!("Teardown failed: {}", e);
        }
        outcome
    }

    fn launcher_key<X>(
        &mut self,
        wm: &WindowManager,
        conn: &X,
        keycode: u8,
    ) -> Result<(), ConnectionError>
    where
        X: XConn,
        L: Launcher<X>,
    {
        if let Some(argv) = self.launcher.handle_key(conn, keycode)? {
            self.spawn(&argv);
        }
        if !self.launcher.is_open() {
            wm.refocus(conn)?;
        }
        Ok(())
    }

    fn spawn(&self, argv: &[String]) {
        if let Err(e) = self.spawner.spawn(argv) {
            log::error!("Failed to spawn {:?}: {}", argv, e);
        }
    }

    fn refresh_bar<X>(&mut self, wm: &WindowManager, conn: &X) -> Result<(), ConnectionError>
    where
        X: XConn,
        B: StatusBar<X>,
    {
        if self.bar.update(&wm.bar_view()) {
            self.bar.draw(conn)?;
        }
        Ok(())
    }
}
