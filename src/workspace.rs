use crate::client::ClientId;
use crate::layout::{Layout, SplitAxis};

pub const WORKSPACE_COUNT: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusDirection {
    Next,
    Prev,
}

/// One virtual desktop. `clients[0]` is the head: the newest client and the
/// tiling master.
#[derive(Debug, Default)]
pub struct Workspace {
    clients: Vec<ClientId>,
    focused: Option<ClientId>,
    pub layout: Layout,
    pub axis: SplitAxis,
}

impl Workspace {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    pub fn clients(&self) -> &[ClientId] {
        &self.clients
    }

    pub fn focused(&self) -> Option<ClientId> {
        self.focused
    }

    pub fn head(&self) -> Option<ClientId> {
        self.clients.first().copied()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Link a client at the head of the list.
    pub fn push_front(&mut self, id: ClientId) {
        self.clients.insert(0, id);
        if self.focused.is_none() {
            self.focused = Some(id);
        }
    }

    /// Unlink a client. If it held focus, focus falls back to the new head.
    /// Returns whether the client was a member.
    pub fn remove(&mut self, id: ClientId) -> bool {
        let Some(pos) = self.clients.iter().position(|&c| c == id) else {
            return false;
        };
        self.clients.remove(pos);
        if self.focused == Some(id) {
            self.focused = self.head();
        }
        true
    }

    /// Point focus at a member. Non-members are ignored.
    pub fn set_focused(&mut self, id: ClientId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.focused = Some(id);
        true
    }

    /// Neighbour of the focused client, wrapping at both ends.
    pub fn neighbour(&self, dir: FocusDirection) -> Option<ClientId> {
        let current = self.focused?;
        let pos = self.clients.iter().position(|&c| c == current)?;
        let len = self.clients.len();
        let next = match dir {
            FocusDirection::Next => (pos + 1) % len,
            FocusDirection::Prev => (pos + len - 1) % len,
        };
        Some(self.clients[next])
    }

    /// Move the focused client to the head. Returns false if it already was.
    pub fn promote_focused(&mut self) -> bool {
        let Some(current) = self.focused else {
            return false;
        };
        match self.clients.iter().position(|&c| c == current) {
            Some(0) | None => false,
            Some(pos) => {
                let id = self.clients.remove(pos);
                self.clients.insert(0, id);
                true
            }
        }
    }

    /// `focused` is set exactly when the list is non-empty, and names a member.
    pub fn focus_is_valid(&self) -> bool {
        match self.focused {
            Some(id) => self.contains(id),
            None => self.clients.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    /// Workspace holding a, b, c in that order with `a` focused.
    fn abc() -> (Workspace, [ClientId; 3]) {
        let mut arena: SlotMap<ClientId, ()> = SlotMap::with_key();
        let ids = [arena.insert(()), arena.insert(()), arena.insert(())];
        let mut ws = Workspace::default();
        for &id in ids.iter().rev() {
            ws.push_front(id);
        }
        ws.set_focused(ids[0]);
        (ws, ids)
    }

    #[test]
    fn push_front_links_at_head() {
        let (ws, [a, b, c]) = abc();
        assert_eq!(ws.clients(), &[a, b, c]);
        assert_eq!(ws.focused(), Some(a));
        assert!(ws.focus_is_valid());
    }

    #[test]
    fn neighbour_wraps_both_ways() {
        let (mut ws, [a, b, c]) = abc();
        ws.set_focused(c);
        assert_eq!(ws.neighbour(FocusDirection::Next), Some(a));
        ws.set_focused(a);
        assert_eq!(ws.neighbour(FocusDirection::Prev), Some(c));
        assert_eq!(ws.neighbour(FocusDirection::Next), Some(b));
    }

    #[test]
    fn next_then_prev_returns_home() {
        let (mut ws, ids) = abc();
        for &start in &ids {
            ws.set_focused(start);
            let next = ws.neighbour(FocusDirection::Next).unwrap();
            ws.set_focused(next);
            let back = ws.neighbour(FocusDirection::Prev).unwrap();
            assert_eq!(back, start);
        }
    }

    #[test]
    fn removing_focus_falls_back_to_head() {
        let (mut ws, [a, b, c]) = abc();
        ws.set_focused(b);
        assert!(ws.remove(b));
        assert_eq!(ws.focused(), Some(a));
        assert!(ws.remove(a));
        assert_eq!(ws.focused(), Some(c));
        assert!(ws.remove(c));
        assert_eq!(ws.focused(), None);
        assert!(ws.is_empty());
        assert!(ws.focus_is_valid());
        assert!(!ws.remove(c));
    }

    #[test]
    fn promote_moves_focus_to_head() {
        let (mut ws, [a, b, c]) = abc();
        assert!(!ws.promote_focused());
        ws.set_focused(b);
        assert!(ws.promote_focused());
        assert_eq!(ws.clients(), &[b, a, c]);
        assert_eq!(ws.focused(), Some(b));
    }

    #[test]
    fn focus_rejects_non_members() {
        let (mut ws, [a, b, _]) = abc();
        ws.remove(b);
        assert!(!ws.set_focused(b));
        assert_eq!(ws.focused(), Some(a));
    }

    #[test]
    fn stale_focus_is_reported() {
        let (mut ws, [_, b, _]) = abc();
        ws.clients.retain(|&c| c != b);
        ws.focused = Some(b);
        assert!(!ws.focus_is_valid());

        let mut empty = Workspace::default();
        assert!(empty.focus_is_valid());
        empty.focused = Some(b);
        assert!(!empty.focus_is_valid());
    }
}
