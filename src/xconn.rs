use crate::keys::{Keybinding, LOCK_MASKS};
use x11rb::connection::Connection;
use x11rb::errors::ConnectionError;
use x11rb::protocol::xproto::{
    self, ChangeWindowAttributesAux, ConfigureWindowAux, ConnectionExt, EventMask, InputFocus,
    ModMask, StackMode, Window,
};

/// Geometry fields of a configure request. `None` leaves a field untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowChanges {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl WindowChanges {
    pub fn from_rect(rect: crate::layout::Rect) -> Self {
        Self {
            x: Some(rect.x),
            y: Some(rect.y),
            width: Some(rect.width),
            height: Some(rect.height),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The requests the window manager core issues to the X server.
pub trait XConn {
    fn map_window(&self, window: Window) -> Result<(), ConnectionError>;
    fn unmap_window(&self, window: Window) -> Result<(), ConnectionError>;
    fn configure_window(&self, window: Window, changes: &WindowChanges)
    -> Result<(), ConnectionError>;
    fn set_border(&self, window: Window, width: u32, color: u32) -> Result<(), ConnectionError>;
    fn set_input_focus(&self, window: Window) -> Result<(), ConnectionError>;
    fn raise_window(&self, window: Window) -> Result<(), ConnectionError>;
    /// Ask for enter, focus-change and property-change events on a client.
    fn select_client_events(&self, window: Window) -> Result<(), ConnectionError>;
    fn kill_client(&self, window: Window) -> Result<(), ConnectionError>;
    fn destroy_window(&self, window: Window) -> Result<(), ConnectionError>;
    fn flush(&self) -> Result<(), ConnectionError>;
}

/// Production [`XConn`] backed by an x11rb connection.
pub struct X11<C> {
    conn: C,
}

impl<C: Connection> X11<C> {
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    pub fn inner(&self) -> &C {
        &self.conn
    }

    /// Select substructure redirect on the root. Fails if another window
    /// manager already owns it.
    pub fn become_wm(&self, root: Window) -> Result<(), Box<dyn std::error::Error>> {
        let change = ChangeWindowAttributesAux::new()
            .event_mask(EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY);
        if let Err(e) = self.conn.change_window_attributes(root, &change)?.check() {
            log::error!("Another window manager is already running: {:?}", e);
            return Err(Box::new(e));
        }
        Ok(())
    }

    /// Grab every binding on the root, once per lock-key combination.
    pub fn grab_keys(&self, root: Window, bindings: &[Keybinding]) -> Result<(), ConnectionError> {
        for binding in bindings {
            for ignored in LOCK_MASKS {
                self.conn.grab_key(
                    true,
                    root,
                    ModMask::from(binding.modifiers | ignored),
                    binding.keycode,
                    xproto::GrabMode::ASYNC,
                    xproto::GrabMode::ASYNC,
                )?;
            }
        }
        Ok(())
    }
}

impl<C: Connection> XConn for X11<C> {
    fn map_window(&self, window: Window) -> Result<(), ConnectionError> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap_window(&self, window: Window) -> Result<(), ConnectionError> {
        self.conn.unmap_window(window)?;
        Ok(())
    }

    fn configure_window(
        &self,
        window: Window,
        changes: &WindowChanges,
    ) -> Result<(), ConnectionError> {
        if changes.is_empty() {
            return Ok(());
        }
        let aux = ConfigureWindowAux::new()
            .x(changes.x)
            .y(changes.y)
            .width(changes.width)
            .height(changes.height);
        self.conn.configure_window(window, &aux)?;
        Ok(())
    }

    fn set_border(&self, window: Window, width: u32, color: u32) -> Result<(), ConnectionError> {
        self.conn
            .configure_window(window, &ConfigureWindowAux::new().border_width(width))?;
        self.conn.change_window_attributes(
            window,
            &ChangeWindowAttributesAux::new().border_pixel(color),
        )?;
        Ok(())
    }

    fn set_input_focus(&self, window: Window) -> Result<(), ConnectionError> {
        self.conn
            .set_input_focus(InputFocus::POINTER_ROOT, window, x11rb::CURRENT_TIME)?;
        Ok(())
    }

    fn raise_window(&self, window: Window) -> Result<(), ConnectionError> {
        let stack = ConfigureWindowAux::new().stack_mode(StackMode::ABOVE);
        self.conn.configure_window(window, &stack)?;
        Ok(())
    }

    fn select_client_events(&self, window: Window) -> Result<(), ConnectionError> {
        let change = ChangeWindowAttributesAux::new().event_mask(
            EventMask::ENTER_WINDOW | EventMask::FOCUS_CHANGE | EventMask::PROPERTY_CHANGE,
        );
        self.conn.change_window_attributes(window, &change)?;
        Ok(())
    }

    fn kill_client(&self, window: Window) -> Result<(), ConnectionError> {
        self.conn.kill_client(window)?;
        Ok(())
    }

    fn destroy_window(&self, window: Window) -> Result<(), ConnectionError> {
        self.conn.destroy_window(window)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), ConnectionError> {
        self.conn.flush()
    }
}

#[cfg(test)]
pub mod testing {
    use super::{WindowChanges, XConn};
    use std::cell::RefCell;
    use x11rb::errors::ConnectionError;
    use x11rb::protocol::xproto::Window;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Request {
        Map(Window),
        Unmap(Window),
        Configure(Window, WindowChanges),
        Border(Window, u32, u32),
        Focus(Window),
        Raise(Window),
        SelectInput(Window),
        Kill(Window),
        Destroy(Window),
        Flush,
    }

    /// Records every request instead of talking to a server.
    #[derive(Default)]
    pub struct Recorder {
        requests: RefCell<Vec<Request>>,
    }

    impl Recorder {
        pub fn take(&self) -> Vec<Request> {
            self.requests.take()
        }

        pub fn clear(&self) {
            self.requests.borrow_mut().clear();
        }

        fn push(&self, request: Request) -> Result<(), ConnectionError> {
            self.requests.borrow_mut().push(request);
            Ok(())
        }
    }

    impl XConn for Recorder {
        fn map_window(&self, window: Window) -> Result<(), ConnectionError> {
            self.push(Request::Map(window))
        }

        fn unmap_window(&self, window: Window) -> Result<(), ConnectionError> {
            self.push(Request::Unmap(window))
        }

        fn configure_window(
            &self,
            window: Window,
            changes: &WindowChanges,
        ) -> Result<(), ConnectionError> {
            self.push(Request::Configure(window, *changes))
        }

        fn set_border(&self, window: Window, width: u32, color: u32) -> Result<(), ConnectionError> {
            self.push(Request::Border(window, width, color))
        }

        fn set_input_focus(&self, window: Window) -> Result<(), ConnectionError> {
            self.push(Request::Focus(window))
        }

        fn raise_window(&self, window: Window) -> Result<(), ConnectionError> {
            self.push(Request::Raise(window))
        }

        fn select_client_events(&self, window: Window) -> Result<(), ConnectionError> {
            self.push(Request::SelectInput(window))
        }

        fn kill_client(&self, window: Window) -> Result<(), ConnectionError> {
            self.push(Request::Kill(window))
        }

        fn destroy_window(&self, window: Window) -> Result<(), ConnectionError> {
            self.push(Request::Destroy(window))
        }

        fn flush(&self) -> Result<(), ConnectionError> {
            self.push(Request::Flush)
        }
    }
}
