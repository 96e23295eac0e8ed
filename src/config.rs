use crate::layout::Layout;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Built-in spawn table: command name to argv.
const DEFAULT_SPAWN: &[(&str, &[&str])] = &[
    ("terminal", &["xfce4-terminal"]),
    ("editor", &["mousepad"]),
];

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub appearance: Appearance,
    #[serde(default)]
    pub behaviour: Behaviour,
    #[serde(default)]
    pub spawn: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Appearance {
    pub border_width: u32,
    pub border_focus: u32,
    pub border_unfocus: u32,
    pub taskbar_height: u16,
    pub taskbar_color: u32,
    pub taskbar_font_color: u32,
    /// Core X font used by the taskbar and the launcher.
    pub font: String,
    pub launcher_width: u16,
    pub launcher_y: i16,
    pub launcher_bg: u32,
    pub launcher_fg: u32,
    pub launcher_font_color: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Behaviour {
    pub default_layout: Layout,
    /// Keep configure requests inside the usable area.
    pub clamp_configure_requests: bool,
    pub max_clients: usize,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            border_width: 2,
            border_focus: 0xFF0000,
            border_unfocus: 0x222222,
            taskbar_height: 20,
            taskbar_color: 0x444444,
            taskbar_font_color: 0xFFFFFF,
            font: "fixed".to_string(),
            launcher_width: 400,
            launcher_y: 100,
            launcher_bg: 0x444444,
            launcher_fg: 0x808080,
            launcher_font_color: 0xFF0000,
        }
    }
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            default_layout: Layout::Tiling,
            clamp_configure_requests: true,
            max_clients: 256,
        }
    }
}

impl Config {
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("qwm").join("qwm.toml"))
            .unwrap_or_else(|| PathBuf::from("qwm.toml"))
    }

    /// Defaults overlaid with the user's file, if there is one.
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Self {
        let mut config = Self::default();
        config.apply_default_spawns();

        if !path.exists() {
            log::info!("Config not found at {:?}, using defaults", path);
            return config;
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                log::error!("Failed to read config {:?}: {}", path, e);
                return config;
            }
        };
        match Self::parse(&content) {
            Ok(cfg) => {
                config = cfg;
                log::info!("Loaded config from {:?}", path);
            }
            Err(e) => log::error!("Failed to parse config: {}", e),
        }
        config
    }

    /// Parse a config file. Spawn entries are merged over the built-in table.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Config = toml::from_str(content)?;
        let user = std::mem::take(&mut config.spawn);
        config.apply_default_spawns();
        for (name, argv) in user {
            if argv.is_empty() {
                log::warn!("Ignoring empty spawn command {:?}", name);
                continue;
            }
            config.spawn.insert(name, argv);
        }
        Ok(config)
    }

    fn apply_default_spawns(&mut self) {
        for (name, argv) in DEFAULT_SPAWN {
            self.spawn.insert(
                name.to_string(),
                argv.iter().map(|s| s.to_string()).collect(),
            );
        }
    }

    pub fn spawn_command(&self, name: &str) -> Option<&[String]> {
        self.spawn.get(name).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.appearance.border_width, 2);
        assert_eq!(config.behaviour.default_layout, Layout::Tiling);
        assert!(config.behaviour.clamp_configure_requests);
        assert_eq!(
            config.spawn_command("terminal"),
            Some(&["xfce4-terminal".to_string()][..])
        );
    }

    #[test]
    fn user_values_override_defaults() {
        let config = Config::parse(
            r#"
            [appearance]
            border_width = 4
            border_focus = 0x00ff00

            [behaviour]
            default_layout = "monocle"
            clamp_configure_requests = false

            [spawn]
            terminal = ["kitty", "--single-instance"]
            browser = ["firefox"]
            broken = []
            "#,
        )
        .unwrap();

        assert_eq!(config.appearance.border_width, 4);
        assert_eq!(config.appearance.border_focus, 0x00ff00);
        assert_eq!(config.appearance.taskbar_height, 20);
        assert_eq!(config.behaviour.default_layout, Layout::Monocle);
        assert!(!config.behaviour.clamp_configure_requests);
        assert_eq!(config.behaviour.max_clients, 256);
        assert_eq!(
            config.spawn_command("terminal").unwrap(),
            &["kitty".to_string(), "--single-instance".to_string()]
        );
        assert!(config.spawn_command("browser").is_some());
        assert!(config.spawn_command("editor").is_some());
        assert!(config.spawn_command("broken").is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::parse("[appearance\nborder_width = ").is_err());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = Config::load_from(Path::new("/nonexistent/qwm/qwm.toml"));
        assert!(config.spawn_command("editor").is_some());
    }
}
