//! Static keybinding table.
//!
//! Keycodes are raw X keycodes for a US-QWERTY layout.

pub const SHIFT: u16 = 1 << 0;
pub const LOCK: u16 = 1 << 1;
pub const ALT: u16 = 1 << 3;
pub const NUM_LOCK: u16 = 1 << 4;

/// Every modifier bit; anything above is a pointer button.
const MODIFIER_BITS: u16 = 0x00ff;

/// Lock-key combinations grabbed alongside each binding.
pub const LOCK_MASKS: [u16; 4] = [0, LOCK, NUM_LOCK, LOCK | NUM_LOCK];

pub const KEY_ESCAPE: u8 = 9;
pub const KEY_BACKSPACE: u8 = 22;
pub const KEY_ENTER: u8 = 36;
pub const KEY_SPACE: u8 = 65;
pub const KEY_UP: u8 = 111;
pub const KEY_DOWN: u8 = 116;

pub const KEY_1: u8 = 10;
pub const KEY_2: u8 = 11;
pub const KEY_3: u8 = 12;
pub const KEY_4: u8 = 13;
pub const KEY_5: u8 = 14;

pub const KEY_J: u8 = 44;
pub const KEY_K: u8 = 45;
pub const KEY_L: u8 = 46;
pub const KEY_M: u8 = 58;
pub const KEY_O: u8 = 32;
pub const KEY_Q: u8 = 24;
pub const KEY_W: u8 = 25;

/// Row-ordered keycodes for the characters the launcher accepts.
const CHAR_ROWS: [(u8, &str); 4] = [
    (10, "1234567890-"),
    (24, "qwertyuiop"),
    (38, "asdfghjkl"),
    (52, "zxcvbnm"),
];

/// Map a keycode to the character it types, ignoring modifiers.
pub fn keycode_to_char(code: u8) -> Option<char> {
    if code == KEY_SPACE {
        return Some(' ');
    }
    CHAR_ROWS.iter().find_map(|&(start, row)| {
        let offset = usize::from(code.checked_sub(start)?);
        row.chars().nth(offset)
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    KillFocused,
    /// Zero-based workspace index.
    Workspace(usize),
    MoveToWorkspace(usize),
    ToggleLayout,
    ToggleOrientation,
    FocusNext,
    FocusPrev,
    SwapMaster,
    OpenLauncher,
    /// Name of an entry in the spawn table.
    Spawn(&'static str),
}

#[derive(Clone, Copy, Debug)]
pub struct Keybinding {
    pub modifiers: u16,
    pub keycode: u8,
    pub action: Action,
}

const fn bind(modifiers: u16, keycode: u8, action: Action) -> Keybinding {
    Keybinding {
        modifiers,
        keycode,
        action,
    }
}

pub static KEYBINDINGS: &[Keybinding] = &[
    bind(ALT, KEY_Q, Action::Quit),
    bind(ALT, KEY_W, Action::KillFocused),
    bind(ALT, KEY_1, Action::Workspace(0)),
    bind(ALT, KEY_2, Action::Workspace(1)),
    bind(ALT, KEY_3, Action::Workspace(2)),
    bind(ALT, KEY_4, Action::Workspace(3)),
    bind(ALT, KEY_5, Action::Workspace(4)),
    bind(ALT | SHIFT, KEY_1, Action::MoveToWorkspace(0)),
    bind(ALT | SHIFT, KEY_2, Action::MoveToWorkspace(1)),
    bind(ALT | SHIFT, KEY_3, Action::MoveToWorkspace(2)),
    bind(ALT | SHIFT, KEY_4, Action::MoveToWorkspace(3)),
    bind(ALT | SHIFT, KEY_5, Action::MoveToWorkspace(4)),
    bind(ALT, KEY_L, Action::ToggleLayout),
    bind(ALT, KEY_O, Action::ToggleOrientation),
    bind(ALT, KEY_K, Action::FocusNext),
    bind(ALT, KEY_J, Action::FocusPrev),
    bind(ALT | SHIFT, KEY_ENTER, Action::SwapMaster),
    bind(ALT, KEY_SPACE, Action::OpenLauncher),
    bind(ALT, KEY_ENTER, Action::Spawn("terminal")),
    bind(ALT, KEY_M, Action::Spawn("editor")),
];

/// Strip lock keys and pointer buttons from a key event's state.
pub fn normalize(state: u16) -> u16 {
    state & MODIFIER_BITS & !(LOCK | NUM_LOCK)
}

/// First binding whose modifiers and keycode match exactly.
pub fn lookup(bindings: &[Keybinding], state: u16, keycode: u8) -> Option<Action> {
    let modifiers = normalize(state);
    bindings
        .iter()
        .find(|b| b.keycode == keycode && b.modifiers == modifiers)
        .map(|b| b.action)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTROL: u16 = 1 << 2;

    #[test]
    fn lock_keys_do_not_change_lookup() {
        let plain = lookup(KEYBINDINGS, ALT, KEY_K);
        assert_eq!(plain, Some(Action::FocusNext));
        assert_eq!(lookup(KEYBINDINGS, ALT | NUM_LOCK, KEY_K), plain);
        assert_eq!(lookup(KEYBINDINGS, ALT | LOCK | NUM_LOCK, KEY_K), plain);
        // Button1 held while pressing the key.
        assert_eq!(lookup(KEYBINDINGS, ALT | 0x100, KEY_K), plain);
    }

    #[test]
    fn modifiers_must_match_exactly() {
        assert_eq!(lookup(KEYBINDINGS, ALT | SHIFT, KEY_1), Some(Action::MoveToWorkspace(0)));
        assert_eq!(lookup(KEYBINDINGS, ALT, KEY_1), Some(Action::Workspace(0)));
        assert_eq!(lookup(KEYBINDINGS, ALT | CONTROL, KEY_1), None);
        assert_eq!(lookup(KEYBINDINGS, 0, KEY_1), None);
    }

    #[test]
    fn first_match_wins() {
        let table = [
            bind(ALT, KEY_Q, Action::Quit),
            bind(ALT, KEY_Q, Action::KillFocused),
        ];
        assert_eq!(lookup(&table, ALT, KEY_Q), Some(Action::Quit));
    }

    #[test]
    fn keycodes_map_to_characters() {
        assert_eq!(keycode_to_char(KEY_Q), Some('q'));
        assert_eq!(keycode_to_char(KEY_M), Some('m'));
        assert_eq!(keycode_to_char(KEY_1), Some('1'));
        assert_eq!(keycode_to_char(19), Some('0'));
        assert_eq!(keycode_to_char(20), Some('-'));
        assert_eq!(keycode_to_char(KEY_SPACE), Some(' '));
        assert_eq!(keycode_to_char(KEY_ENTER), None);
        assert_eq!(keycode_to_char(KEY_ESCAPE), None);
    }
}
