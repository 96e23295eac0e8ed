use crate::bar::BarView;
use crate::client::{ClientId, Registry};
use crate::config::{Appearance, Config};
use crate::layout::{self, Rect};
use crate::workspace::{FocusDirection, WORKSPACE_COUNT, Workspace};
use crate::xconn::{WindowChanges, XConn};
use x11rb::errors::ConnectionError;
use x11rb::protocol::xproto::Window;

pub struct WindowManager {
    registry: Registry,
    workspaces: [Workspace; WORKSPACE_COUNT],
    current: usize,
    /// Screen area left for clients once the taskbar is taken out.
    bounds: Rect,
    appearance: Appearance,
    clamp_configure: bool,
}

impl WindowManager {
    pub fn new(screen_width: u16, screen_height: u16, bar_height: u16, config: &Config) -> Self {
        let layout = config.behaviour.default_layout;
        Self {
            registry: Registry::new(config.behaviour.max_clients),
            workspaces: std::array::from_fn(|_| Workspace::new(layout)),
            current: 0,
            bounds: Rect::new(
                0,
                0,
                u32::from(screen_width),
                u32::from(screen_height.saturating_sub(bar_height)),
            ),
            appearance: config.appearance.clone(),
            clamp_configure: config.behaviour.clamp_configure_requests,
        }
    }

    #[cfg(test)]
    pub fn current(&self) -> usize {
        self.current
    }

    #[cfg(test)]
    pub fn workspace(&self, index: usize) -> &Workspace {
        &self.workspaces[index]
    }

    #[cfg(test)]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn bar_view(&self) -> BarView {
        let ws = &self.workspaces[self.current];
        BarView {
            current: self.current,
            layout: ws.layout,
            clients: ws.clients().len(),
            occupied: std::array::from_fn(|i| !self.workspaces[i].is_empty()),
        }
    }

    /// A top-level window asked to be mapped.
    pub fn handle_map_request<X: XConn>(
        &mut self,
        conn: &X,
        window: Window,
    ) -> Result<(), ConnectionError> {
        if let Some(id) = self.registry.find(window) {
            // Already managed: only show it if it belongs on screen.
            if self.registry.get(id).map(|c| c.workspace) == Some(self.current) {
                conn.map_window(window)?;
            }
            return Ok(());
        }

        let Some(id) = self.registry.create(conn, self.current, window)? else {
            return Ok(());
        };

        let ws = &mut self.workspaces[self.current];
        let previous = ws.focused();
        ws.push_front(id);
        ws.set_focused(id);

        if let Some(prev) = previous {
            self.decorate(conn, prev, false)?;
        }
        self.decorate(conn, id, true)?;
        conn.map_window(window)?;
        self.arrange(conn, self.current)?;
        conn.set_input_focus(window)?;
        self.check_focus(self.current);
        log::info!(
            "Managing {:#x} on workspace {} ({} clients)",
            window,
            self.current + 1,
            self.registry.len()
        );
        Ok(())
    }

    /// A window is gone. Unknown windows are ignored.
    pub fn handle_destroy_notify<X: XConn>(
        &mut self,
        conn: &X,
        window: Window,
    ) -> Result<(), ConnectionError> {
        let Some(id) = self.registry.find(window) else {
            log::debug!("Destroy for unmanaged window {:#x}", window);
            return Ok(());
        };
        let Some(ws) = self.workspaces.iter().position(|w| w.contains(id)) else {
            self.registry.destroy(id);
            return Ok(());
        };

        let was_focused = self.workspaces[ws].focused() == Some(id);
        self.workspaces[ws].remove(id);
        self.registry.destroy(id);

        if was_focused {
            self.adopt_fallback_focus(conn, ws)?;
        }
        self.arrange(conn, ws)?;
        self.check_focus(ws);
        Ok(())
    }

    /// Pointer entered a window: focus follows if the window is visible.
    pub fn handle_enter_notify<X: XConn>(
        &mut self,
        conn: &X,
        window: Window,
    ) -> Result<(), ConnectionError> {
        let Some(id) = self.registry.find(window) else {
            return Ok(());
        };
        if !self.workspaces[self.current].contains(id) {
            return Ok(());
        }
        self.change_focus(conn, self.current, id)
    }

    /// Re-issue a client's configure request, optionally clamped to the
    /// usable area. Only the requested geometry fields are sent.
    pub fn handle_configure_request<X: XConn>(
        &mut self,
        conn: &X,
        window: Window,
        requested: WindowChanges,
    ) -> Result<(), ConnectionError> {
        let id = self.registry.find(window);
        let last = id
            .and_then(|id| self.registry.get(id))
            .map(|c| c.geometry)
            .unwrap_or_default();

        let changes = if self.clamp_configure {
            clamp_changes(requested, last, self.bounds)
        } else {
            requested
        };
        conn.configure_window(window, &changes)?;

        if let Some(client) = id.and_then(|id| self.registry.get_mut(id)) {
            let g = &mut client.geometry;
            g.x = changes.x.unwrap_or(g.x);
            g.y = changes.y.unwrap_or(g.y);
            g.width = changes.width.unwrap_or(g.width);
            g.height = changes.height.unwrap_or(g.height);
        }
        Ok(())
    }

    /// A `_NET_CLOSE_WINDOW` request: ask the server to destroy the window.
    pub fn close_window<X: XConn>(&self, conn: &X, window: Window) -> Result<(), ConnectionError> {
        if self.registry.find(window).is_some() {
            log::info!("Closing {:#x}", window);
            conn.destroy_window(window)?;
        }
        Ok(())
    }

    pub fn switch_workspace<X: XConn>(
        &mut self,
        conn: &X,
        target: usize,
    ) -> Result<(), ConnectionError> {
        if target >= WORKSPACE_COUNT || target == self.current {
            return Ok(());
        }

        for window in self.windows_of(self.current) {
            conn.unmap_window(window)?;
        }
        self.current = target;
        for window in self.windows_of(target) {
            conn.map_window(window)?;
        }
        self.refocus(conn)?;
        log::info!("Switched to workspace {}", target + 1);
        Ok(())
    }

    pub fn move_focused_to_workspace<X: XConn>(
        &mut self,
        conn: &X,
        dst: usize,
    ) -> Result<(), ConnectionError> {
        match self.workspaces[self.current].focused() {
            Some(id) => self.move_client(conn, id, dst),
            None => Ok(()),
        }
    }

    pub fn move_client<X: XConn>(
        &mut self,
        conn: &X,
        id: ClientId,
        dst: usize,
    ) -> Result<(), ConnectionError> {
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        let (src, window) = (client.workspace, client.window);
        if dst >= WORKSPACE_COUNT || dst == src {
            return Ok(());
        }

        let was_focused = self.workspaces[src].focused() == Some(id);
        self.workspaces[src].remove(id);
        if was_focused {
            self.adopt_fallback_focus(conn, src)?;
        }

        let previous = self.workspaces[dst].focused();
        self.workspaces[dst].push_front(id);
        self.workspaces[dst].set_focused(id);
        if let Some(client) = self.registry.get_mut(id) {
            client.workspace = dst;
        }
        if let Some(prev) = previous {
            self.decorate(conn, prev, false)?;
        }
        self.decorate(conn, id, true)?;

        if dst != self.current {
            conn.unmap_window(window)?;
        } else if src != self.current {
            conn.map_window(window)?;
            conn.set_input_focus(window)?;
        }

        self.arrange(conn, src)?;
        self.arrange(conn, dst)?;
        self.check_focus(src);
        self.check_focus(dst);
        log::info!("Moved {:#x} to workspace {}", window, dst + 1);
        Ok(())
    }

    pub fn cycle_focus<X: XConn>(
        &mut self,
        conn: &X,
        dir: FocusDirection,
    ) -> Result<(), ConnectionError> {
        match self.workspaces[self.current].neighbour(dir) {
            Some(next) => self.change_focus(conn, self.current, next),
            None => Ok(()),
        }
    }

    /// Promote the focused client to master.
    pub fn swap_master<X: XConn>(&mut self, conn: &X) -> Result<(), ConnectionError> {
        if self.workspaces[self.current].promote_focused() {
            self.arrange(conn, self.current)?;
        }
        self.check_focus(self.current);
        Ok(())
    }

    /// Kill the focused client's connection. Its state goes away when the
    /// destroy notification arrives.
    pub fn kill_focused<X: XConn>(&self, conn: &X) -> Result<(), ConnectionError> {
        let focused = self.workspaces[self.current].focused();
        if let Some(window) = focused.and_then(|id| self.registry.window(id)) {
            log::info!("Killing {:#x}", window);
            conn.kill_client(window)?;
        }
        Ok(())
    }

    pub fn toggle_layout<X: XConn>(&mut self, conn: &X) -> Result<(), ConnectionError> {
        let ws = &mut self.workspaces[self.current];
        ws.layout = ws.layout.next();
        log::info!("Layout is now {}", ws.layout.name());
        self.arrange(conn, self.current)
    }

    pub fn toggle_orientation<X: XConn>(&mut self, conn: &X) -> Result<(), ConnectionError> {
        let ws = &mut self.workspaces[self.current];
        ws.axis = ws.axis.flip();
        if ws.layout == layout::Layout::Tiling {
            self.arrange(conn, self.current)?;
        }
        Ok(())
    }

    /// Give input focus back to the current workspace's focused client.
    pub fn refocus<X: XConn>(&self, conn: &X) -> Result<(), ConnectionError> {
        let focused = self.workspaces[self.current].focused();
        if let Some(window) = focused.and_then(|id| self.registry.window(id)) {
            conn.set_input_focus(window)?;
        }
        Ok(())
    }

    /// Recompute geometry for every client of a workspace.
    pub fn arrange<X: XConn>(&mut self, conn: &X, index: usize) -> Result<(), ConnectionError> {
        let ws = &self.workspaces[index];
        let clients: Vec<(ClientId, Rect)> = ws
            .clients()
            .iter()
            .filter_map(|&id| self.registry.get(id).map(|c| (id, c.geometry)))
            .collect();
        let placed = layout::apply(
            &clients,
            self.bounds,
            ws.layout,
            ws.axis,
            self.appearance.border_width,
        );
        for (id, rect) in placed {
            self.registry.reconfigure(conn, id, rect)?;
        }
        Ok(())
    }

    /// Move focus within a workspace: undecorate, decorate, focus, raise.
    fn change_focus<X: XConn>(
        &mut self,
        conn: &X,
        index: usize,
        id: ClientId,
    ) -> Result<(), ConnectionError> {
        let old = self.workspaces[index].focused();
        if old == Some(id) || !self.workspaces[index].set_focused(id) {
            return Ok(());
        }
        if let Some(old) = old {
            self.decorate(conn, old, false)?;
        }
        self.decorate(conn, id, true)?;
        if let Some(window) = self.registry.window(id) {
            conn.set_input_focus(window)?;
            conn.raise_window(window)?;
        }
        self.check_focus(index);
        Ok(())
    }

    /// After the focused client left a workspace, decorate its new focus
    /// and hand it input focus if the workspace is on screen.
    fn adopt_fallback_focus<X: XConn>(
        &mut self,
        conn: &X,
        index: usize,
    ) -> Result<(), ConnectionError> {
        let Some(head) = self.workspaces[index].focused() else {
            return Ok(());
        };
        self.decorate(conn, head, true)?;
        if index == self.current {
            if let Some(window) = self.registry.window(head) {
                conn.set_input_focus(window)?;
            }
        }
        Ok(())
    }

    /// A workspace's focus must name one of its members, or be empty with it.
    fn check_focus(&self, index: usize) {
        debug_assert!(
            self.workspaces[index].focus_is_valid(),
            "workspace {} focus does not match its clients",
            index + 1
        );
    }

    fn decorate<X: XConn>(
        &self,
        conn: &X,
        id: ClientId,
        focused: bool,
    ) -> Result<(), ConnectionError> {
        self.registry
            .set_focus_decoration(conn, id, focused, &self.appearance)
    }

    fn windows_of(&self, index: usize) -> Vec<Window> {
        self.workspaces[index]
            .clients()
            .iter()
            .filter_map(|&id| self.registry.window(id))
            .collect()
    }
}

/// Keep a requested geometry inside `bounds`. Fields the client did not ask
/// for stay unset; `last` fills in the size when only a position was asked.
fn clamp_changes(requested: WindowChanges, last: Rect, bounds: Rect) -> WindowChanges {
    let width = requested.width.map(|w| w.min(bounds.width));
    let height = requested.height.map(|h| h.min(bounds.height));
    let eff_w = width.unwrap_or(last.width).min(bounds.width);
    let eff_h = height.unwrap_or(last.height).min(bounds.height);
    let max_x = bounds.x + (bounds.width - eff_w) as i32;
    let max_y = bounds.y + (bounds.height - eff_h) as i32;

    WindowChanges {
        x: requested.x.map(|x| x.clamp(bounds.x, max_x)),
        y: requested.y.map(|y| y.clamp(bounds.y, max_y)),
        width,
        height,
    }
}
