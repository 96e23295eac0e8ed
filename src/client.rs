use crate::config::Appearance;
use crate::layout::Rect;
use crate::xconn::{WindowChanges, XConn};
use slotmap::{SlotMap, new_key_type};
use x11rb::errors::ConnectionError;
use x11rb::protocol::xproto::Window;

new_key_type! {
    pub struct ClientId;
}

/// A managed top-level window.
#[derive(Clone, Debug)]
pub struct Client {
    pub window: Window,
    /// Last geometry sent to the server.
    pub geometry: Rect,
    pub workspace: usize,
}

/// Owns every client. Workspaces refer to clients by [`ClientId`].
pub struct Registry {
    clients: SlotMap<ClientId, Client>,
    capacity: usize,
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        Self {
            clients: SlotMap::with_capacity_and_key(capacity.min(64)),
            capacity,
        }
    }

    /// Start managing `window` on `workspace`.
    ///
    /// Returns `None` when the registry is full or the window is already
    /// managed; the caller leaves the window alone in that case.
    pub fn create<X: XConn>(
        &mut self,
        conn: &X,
        workspace: usize,
        window: Window,
    ) -> Result<Option<ClientId>, ConnectionError> {
        if self.find(window).is_some() {
            return Ok(None);
        }
        if self.clients.len() >= self.capacity {
            log::warn!(
                "Client limit of {} reached, leaving window {:#x} unmanaged",
                self.capacity,
                window
            );
            return Ok(None);
        }

        let id = self.clients.insert(Client {
            window,
            geometry: Rect::default(),
            workspace,
        });
        conn.select_client_events(window)?;
        log::debug!("Client added: {:#x} (ws {})", window, workspace);
        Ok(Some(id))
    }

    /// Release a client. The caller must already have unlinked it from its
    /// workspace.
    pub fn destroy(&mut self, id: ClientId) -> Option<Client> {
        let client = self.clients.remove(id)?;
        log::debug!(
            "Client removed: {:#x} (ws {})",
            client.window,
            client.workspace
        );
        Some(client)
    }

    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.clients.get_mut(id)
    }

    pub fn window(&self, id: ClientId) -> Option<Window> {
        self.clients.get(id).map(|c| c.window)
    }

    pub fn find(&self, window: Window) -> Option<ClientId> {
        self.clients
            .iter()
            .find(|(_, c)| c.window == window)
            .map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Record a new geometry and move/resize the window to match.
    pub fn reconfigure<X: XConn>(
        &mut self,
        conn: &X,
        id: ClientId,
        rect: Rect,
    ) -> Result<(), ConnectionError> {
        let Some(client) = self.clients.get_mut(id) else {
            return Ok(());
        };
        client.geometry = rect;
        conn.configure_window(client.window, &WindowChanges::from_rect(rect))
    }

    pub fn set_focus_decoration<X: XConn>(
        &self,
        conn: &X,
        id: ClientId,
        focused: bool,
        appearance: &Appearance,
    ) -> Result<(), ConnectionError> {
        let Some(client) = self.clients.get(id) else {
            return Ok(());
        };
        let (width, color) = if focused {
            (appearance.border_width, appearance.border_focus)
        } else {
            (0, appearance.border_unfocus)
        };
        conn.set_border(client.window, width, color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xconn::testing::{Recorder, Request};
    use pretty_assertions::assert_eq;

    #[test]
    fn create_selects_client_events() {
        let conn = Recorder::default();
        let mut registry = Registry::new(8);
        let id = registry.create(&conn, 2, 0x100).unwrap().unwrap();

        assert_eq!(registry.get(id).unwrap().workspace, 2);
        assert_eq!(registry.find(0x100), Some(id));
        assert_eq!(conn.take(), vec![Request::SelectInput(0x100)]);
    }

    #[test]
    fn duplicate_window_is_rejected() {
        let conn = Recorder::default();
        let mut registry = Registry::new(8);
        registry.create(&conn, 0, 0x100).unwrap();
        assert_eq!(registry.create(&conn, 1, 0x100).unwrap(), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn full_registry_drops_new_windows() {
        let conn = Recorder::default();
        let mut registry = Registry::new(1);
        registry.create(&conn, 0, 0x100).unwrap();
        conn.clear();

        assert_eq!(registry.create(&conn, 0, 0x200).unwrap(), None);
        assert_eq!(registry.find(0x200), None);
        assert!(conn.take().is_empty());
    }

    #[test]
    fn destroy_is_idempotent() {
        let conn = Recorder::default();
        let mut registry = Registry::new(8);
        let id = registry.create(&conn, 0, 0x100).unwrap().unwrap();

        assert!(registry.destroy(id).is_some());
        assert!(registry.destroy(id).is_none());
        assert_eq!(registry.find(0x100), None);
    }

    #[test]
    fn reconfigure_records_geometry() {
        let conn = Recorder::default();
        let mut registry = Registry::new(8);
        let id = registry.create(&conn, 0, 0x100).unwrap().unwrap();
        conn.clear();

        let rect = Rect::new(5, 6, 700, 800);
        registry.reconfigure(&conn, id, rect).unwrap();
        assert_eq!(registry.get(id).unwrap().geometry, rect);
        assert_eq!(
            conn.take(),
            vec![Request::Configure(0x100, WindowChanges::from_rect(rect))]
        );
    }

    #[test]
    fn decoration_uses_palette() {
        let conn = Recorder::default();
        let mut registry = Registry::new(8);
        let appearance = Appearance::default();
        let id = registry.create(&conn, 0, 0x100).unwrap().unwrap();
        conn.clear();

        registry
            .set_focus_decoration(&conn, id, true, &appearance)
            .unwrap();
        registry
            .set_focus_decoration(&conn, id, false, &appearance)
            .unwrap();
        assert_eq!(
            conn.take(),
            vec![
                Request::Border(0x100, appearance.border_width, appearance.border_focus),
                Request::Border(0x100, 0, appearance.border_unfocus),
            ]
        );
    }
}
