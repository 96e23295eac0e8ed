//! Application launcher overlay.
//!
//! While open it owns the keyboard: the event loop hands it every key press
//! until it closes.

use crate::config::Appearance;
use crate::keys::{self, KEY_BACKSPACE, KEY_DOWN, KEY_ENTER, KEY_ESCAPE, KEY_UP};
use crate::xconn::X11;
use std::collections::HashSet;
use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use x11rb::connection::Connection;
use x11rb::errors::ConnectionError;
use x11rb::protocol::xproto::{
    ConfigureWindowAux, ConnectionExt, CreateGCAux, CreateWindowAux, EventMask, Font, Gcontext,
    InputFocus, Rectangle, Screen, StackMode, Window, WindowClass,
};

const MAX_INPUT: usize = 63;
const MAX_MATCH: usize = 5;
const LINE_HEIGHT: i16 = 16;
const PADDING: i16 = 4;

/// Commands the launcher refuses to start.
const BANNED: &[&str] = &[
    "rm", "rmdir", "mkfs", "dd", "sudo", "doas", "chmod", "chown", "chgrp", "truncate",
    "shutdown", "reboot", "halt", "poweroff", "apt-get", "apt", "dnf", "yum", "pacman",
    "zypper", "emerge", "xbps", "mount", "umount", "kill", "killall", "pkill", "iptables",
    "ip6tables", "systemctl", "service", "rfkill", "wipe", "shred", "fsck", "mkfs.ext4",
    "mkfs.fat", "mkfs.ntfs", "ddrescue",
];

/// The launcher as seen from the event loop.
pub trait Launcher<X> {
    fn is_open(&self) -> bool;
    fn owns(&self, window: Window) -> bool;
    fn open(&mut self, conn: &X) -> Result<(), ConnectionError>;
    fn close(&mut self, conn: &X) -> Result<(), ConnectionError>;
    /// Feed a key press. Returns the argv of a command to start, if any.
    fn handle_key(&mut self, conn: &X, keycode: u8) -> Result<Option<Vec<String>>, ConnectionError>;
    fn draw(&mut self, conn: &X) -> Result<(), ConnectionError>;
    /// Free server-side resources for good. Call after `close`.
    fn release(&mut self, conn: &X) -> Result<(), ConnectionError>;
}

pub fn is_banned(command: &str) -> bool {
    let base = Path::new(command)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(command);
    BANNED.contains(&base)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub path: PathBuf,
}

/// Executables found on `$PATH`, one per name; earlier directories win.
#[derive(Debug, Default)]
pub struct CommandIndex {
    entries: Vec<Entry>,
    scanned_path: Option<String>,
}

impl CommandIndex {
    pub fn scan(search_path: &str) -> Self {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for dir in env::split_paths(search_path) {
            let Ok(read) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in read.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') || seen.contains(&name) {
                    continue;
                }
                let path = entry.path();
                let executable = fs::metadata(&path)
                    .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
                    .unwrap_or(false);
                if executable {
                    seen.insert(name.clone());
                    entries.push(Entry { name, path });
                }
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        log::debug!("Indexed {} commands", entries.len());

        Self {
            entries,
            scanned_path: Some(search_path.to_string()),
        }
    }

    /// Rescan only when `$PATH` changed since the last scan.
    pub fn refresh(&mut self) {
        let current = env::var("PATH").unwrap_or_default();
        if self.scanned_path.as_deref() != Some(current.as_str()) {
            *self = Self::scan(&current);
        }
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    /// Prefix matches first, then substring matches, at most `MAX_MATCH`.
    pub fn matches(&self, query: &str) -> Vec<usize> {
        let prefix = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.name.starts_with(query));
        let inner = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.name.starts_with(query) && e.name.contains(query));
        prefix.chain(inner).map(|(i, _)| i).take(MAX_MATCH).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    Changed,
    Close,
    Launch(Vec<String>),
}

/// Query text and selection; no X resources.
#[derive(Debug, Default)]
pub struct Prompt {
    pub input: String,
    pub matches: Vec<usize>,
    pub selected: usize,
}

impl Prompt {
    pub fn reset(&mut self, index: &CommandIndex) {
        self.input.clear();
        self.selected = 0;
        self.matches = index.matches("");
    }

    pub fn handle_key(&mut self, keycode: u8, index: &CommandIndex) -> KeyOutcome {
        match keycode {
            KEY_ESCAPE => KeyOutcome::Close,
            KEY_ENTER => self.submit(index),
            KEY_DOWN => {
                if self.selected + 1 < self.matches.len() {
                    self.selected += 1;
                }
                KeyOutcome::Changed
            }
            KEY_UP => {
                self.selected = self.selected.saturating_sub(1);
                KeyOutcome::Changed
            }
            KEY_BACKSPACE => {
                if self.input.pop().is_none() {
                    return KeyOutcome::Ignored;
                }
                self.rematch(index);
                KeyOutcome::Changed
            }
            code => match keys::keycode_to_char(code) {
                Some(ch) if self.input.len() < MAX_INPUT => {
                    self.input.push(ch);
                    self.rematch(index);
                    KeyOutcome::Changed
                }
                _ => KeyOutcome::Ignored,
            },
        }
    }

    fn rematch(&mut self, index: &CommandIndex) {
        self.matches = index.matches(&self.input);
        self.selected = 0;
    }

    fn submit(&self, index: &CommandIndex) -> KeyOutcome {
        let argv: Vec<String> = match self.matches.get(self.selected).and_then(|&i| index.get(i)) {
            Some(entry) => vec![entry.path.to_string_lossy().into_owned()],
            None => self.input.split_whitespace().map(str::to_string).collect(),
        };
        match argv.first() {
            Some(cmd) if is_banned(cmd) => {
                log::warn!("Refusing to launch {:?}", cmd);
                KeyOutcome::Close
            }
            Some(_) => KeyOutcome::Launch(argv),
            None => KeyOutcome::Close,
        }
    }
}

/// The launcher window and its graphics contexts.
pub struct XLauncher {
    window: Window,
    font: Font,
    text_gc: Gcontext,
    sel_fill_gc: Gcontext,
    sel_text_gc: Gcontext,
    root: Window,
    root_visual: u32,
    depth: u8,
    x: i16,
    y: i16,
    width: u16,
    height: u16,
    background: u32,
    opened: bool,
    index: CommandIndex,
    prompt: Prompt,
}

impl XLauncher {
    pub fn new<C: Connection>(
        conn: &C,
        screen: &Screen,
        appearance: &Appearance,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let window = conn.generate_id()?;
        let font = conn.generate_id()?;
        let text_gc = conn.generate_id()?;
        let sel_fill_gc = conn.generate_id()?;
        let sel_text_gc = conn.generate_id()?;

        conn.open_font(font, appearance.font.as_bytes())?;
        conn.create_gc(
            text_gc,
            screen.root,
            &CreateGCAux::new()
                .foreground(appearance.taskbar_font_color)
                .background(appearance.launcher_bg)
                .font(font)
                .graphics_exposures(0),
        )?;
        conn.create_gc(
            sel_fill_gc,
            screen.root,
            &CreateGCAux::new()
                .foreground(appearance.launcher_fg)
                .graphics_exposures(0),
        )?;
        conn.create_gc(
            sel_text_gc,
            screen.root,
            &CreateGCAux::new()
                .foreground(appearance.launcher_font_color)
                .background(appearance.launcher_fg)
                .font(font)
                .graphics_exposures(0),
        )?;

        let width = appearance.launcher_width.min(screen.width_in_pixels);
        Ok(Self {
            window,
            font,
            text_gc,
            sel_fill_gc,
            sel_text_gc,
            root: screen.root,
            root_visual: screen.root_visual,
            depth: screen.root_depth,
            x: ((screen.width_in_pixels - width) / 2) as i16,
            y: appearance.launcher_y,
            width,
            height: 0,
            background: appearance.launcher_bg,
            opened: false,
            index: CommandIndex::default(),
            prompt: Prompt::default(),
        })
    }

    fn wanted_height(&self) -> u16 {
        let lines = 1 + self.prompt.matches.len() as i16;
        (lines * LINE_HEIGHT + PADDING * 2) as u16
    }

}

impl<C: Connection> Launcher<X11<C>> for XLauncher {
    fn is_open(&self) -> bool {
        self.opened
    }

    fn owns(&self, window: Window) -> bool {
        self.opened && window == self.window
    }

    fn open(&mut self, conn: &X11<C>) -> Result<(), ConnectionError> {
        if self.opened {
            return Ok(());
        }
        self.index.refresh();
        self.prompt.reset(&self.index);
        self.height = self.wanted_height();

        let conn = conn.inner();
        let aux = CreateWindowAux::new()
            .background_pixel(self.background)
            .override_redirect(1)
            .event_mask(EventMask::KEY_PRESS | EventMask::EXPOSURE);
        conn.create_window(
            self.depth,
            self.window,
            self.root,
            self.x,
            self.y,
            self.width,
            self.height,
            0,
            WindowClass::INPUT_OUTPUT,
            self.root_visual,
            &aux,
        )?;
        conn.configure_window(
            self.window,
            &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
        )?;
        conn.map_window(self.window)?;
        conn.set_input_focus(InputFocus::POINTER_ROOT, self.window, x11rb::CURRENT_TIME)?;
        self.opened = true;
        log::debug!("Launcher opened");
        Ok(())
    }

    fn close(&mut self, conn: &X11<C>) -> Result<(), ConnectionError> {
        if !self.opened {
            return Ok(());
        }
        let conn = conn.inner();
        conn.unmap_window(self.window)?;
        conn.destroy_window(self.window)?;
        self.opened = false;
        log::debug!("Launcher closed");
        Ok(())
    }

    fn release(&mut self, conn: &X11<C>) -> Result<(), ConnectionError> {
        let conn = conn.inner();
        for gc in [self.text_gc, self.sel_fill_gc, self.sel_text_gc] {
            conn.free_gc(gc)?;
        }
        conn.close_font(self.font)?;
        Ok(())
    }

    fn handle_key(
        &mut self,
        conn: &X11<C>,
        keycode: u8,
    ) -> Result<Option<Vec<String>>, ConnectionError> {
        match self.prompt.handle_key(keycode, &self.index) {
            KeyOutcome::Ignored => Ok(None),
            KeyOutcome::Changed => {
                let height = self.wanted_height();
                if height != self.height {
                    self.height = height;
                    conn.inner().configure_window(
                        self.window,
                        &ConfigureWindowAux::new().height(u32::from(height)),
                    )?;
                }
                self.draw(conn)?;
                Ok(None)
            }
            KeyOutcome::Close => {
                self.close(conn)?;
                Ok(None)
            }
            KeyOutcome::Launch(argv) => {
                self.close(conn)?;
                Ok(Some(argv))
            }
        }
    }

    fn draw(&mut self, conn: &X11<C>) -> Result<(), ConnectionError> {
        if !self.opened {
            return Ok(());
        }
        let conn = conn.inner();
        conn.clear_area(false, self.window, 0, 0, self.width, self.height)?;
        conn.image_text8(
            self.window,
            self.text_gc,
            PADDING * 2,
            PADDING + LINE_HEIGHT - 4,
            self.prompt.input.as_bytes(),
        )?;

        let mut y = PADDING + LINE_HEIGHT;
        for (row, &i) in self.prompt.matches.iter().enumerate() {
            let Some(entry) = self.index.get(i) else {
                continue;
            };
            y += LINE_HEIGHT;
            let gc = if row == self.prompt.selected {
                let band = Rectangle {
                    x: 0,
                    y: y - LINE_HEIGHT + 4,
                    width: self.width,
                    height: LINE_HEIGHT as u16,
                };
                conn.poly_fill_rectangle(self.window, self.sel_fill_gc, &[band])?;
                self.sel_text_gc
            } else {
                self.text_gc
            };
            let name = entry.name.as_bytes();
            conn.image_text8(self.window, gc, PADDING, y, &name[..name.len().min(255)])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs::File;

    const KEY_F: u8 = 41;
    const KEY_I: u8 = 31;
    const KEY_R: u8 = 27;
    const KEY_M: u8 = 58;

    fn touch(dir: &Path, name: &str, mode: u32) {
        let path = dir.join(name);
        File::create(&path).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
    }

    fn index_of(names: &[&str]) -> CommandIndex {
        CommandIndex {
            entries: names
                .iter()
                .map(|n| Entry {
                    name: n.to_string(),
                    path: PathBuf::from("/usr/bin").join(n),
                })
                .collect(),
            scanned_path: None,
        }
    }

    #[test]
    fn scan_keeps_first_executable_per_name() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        touch(first.path(), "firefox", 0o755);
        touch(first.path(), "notes.txt", 0o644);
        touch(first.path(), ".hidden", 0o755);
        touch(second.path(), "firefox", 0o755);
        touch(second.path(), "mousepad", 0o755);

        let search = env::join_paths([first.path(), second.path(), Path::new("/nonexistent")])
            .unwrap()
            .into_string()
            .unwrap();
        let index = CommandIndex::scan(&search);

        let names: Vec<&str> = index.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["firefox", "mousepad"]);
        assert_eq!(index.entries[0].path, first.path().join("firefox"));
    }

    #[test]
    fn prefix_matches_come_first() {
        let index = index_of(&["bash", "firefox", "fish", "lf", "xfce4-terminal"]);
        let names: Vec<&str> = index
            .matches("f")
            .into_iter()
            .map(|i| index.entries[i].name.as_str())
            .collect();
        assert_eq!(names, vec!["firefox", "fish", "lf", "xfce4-terminal"]);
    }

    #[test]
    fn matches_are_capped() {
        let index = index_of(&["a1", "a2", "a3", "a4", "a5", "a6", "a7"]);
        assert_eq!(index.matches("").len(), MAX_MATCH);
    }

    #[test]
    fn typing_filters_and_enter_launches_selection() {
        let index = index_of(&["firefox", "fish", "mousepad"]);
        let mut prompt = Prompt::default();
        prompt.reset(&index);

        assert_eq!(prompt.handle_key(KEY_F, &index), KeyOutcome::Changed);
        assert_eq!(prompt.handle_key(KEY_I, &index), KeyOutcome::Changed);
        assert_eq!(prompt.input, "fi");
        assert_eq!(prompt.matches.len(), 2);

        assert_eq!(prompt.handle_key(KEY_DOWN, &index), KeyOutcome::Changed);
        assert_eq!(prompt.handle_key(KEY_DOWN, &index), KeyOutcome::Changed);
        assert_eq!(prompt.selected, 1);

        assert_eq!(
            prompt.handle_key(KEY_ENTER, &index),
            KeyOutcome::Launch(vec!["/usr/bin/fish".to_string()])
        );
    }

    #[test]
    fn backspace_on_empty_input_is_ignored() {
        let index = index_of(&["fish"]);
        let mut prompt = Prompt::default();
        prompt.reset(&index);
        assert_eq!(prompt.handle_key(KEY_BACKSPACE, &index), KeyOutcome::Ignored);
        prompt.handle_key(KEY_F, &index);
        assert_eq!(prompt.handle_key(KEY_BACKSPACE, &index), KeyOutcome::Changed);
        assert_eq!(prompt.input, "");
    }

    #[test]
    fn raw_query_launches_when_nothing_matches() {
        let index = index_of(&["fish"]);
        let mut prompt = Prompt::default();
        prompt.reset(&index);
        for key in [KEY_M, KEY_M] {
            prompt.handle_key(key, &index);
        }
        assert!(prompt.matches.is_empty());
        assert_eq!(
            prompt.handle_key(KEY_ENTER, &index),
            KeyOutcome::Launch(vec!["mm".to_string()])
        );
    }

    #[test]
    fn banned_commands_never_launch() {
        let index = index_of(&["rm", "rmdir"]);
        let mut prompt = Prompt::default();
        prompt.reset(&index);
        prompt.handle_key(KEY_R, &index);
        prompt.handle_key(KEY_M, &index);
        assert_eq!(prompt.handle_key(KEY_ENTER, &index), KeyOutcome::Close);
        assert!(is_banned("/usr/bin/sudo"));
        assert!(!is_banned("/usr/bin/firefox"));
    }

    #[test]
    fn escape_closes() {
        let index = index_of(&[]);
        let mut prompt = Prompt::default();
        assert_eq!(prompt.handle_key(KEY_ESCAPE, &index), KeyOutcome::Close);
        assert_eq!(prompt.handle_key(KEY_ENTER, &index), KeyOutcome::Close);
    }
}
