//! Taskbar status fields, each polled on its own cadence.

use crate::bar::BarView;
use chrono::{DateTime, Local, Timelike};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const BATTERY_INTERVAL: Duration = Duration::from_secs(30);
const GOVERNOR_INTERVAL: Duration = Duration::from_secs(10);
const CPU_INTERVAL: Duration = Duration::from_secs(5);
const MEMORY_INTERVAL: Duration = Duration::from_secs(30);
const UPTIME_INTERVAL: Duration = Duration::from_secs(60);
const NETWORK_INTERVAL: Duration = Duration::from_secs(10);

/// Frequency changes smaller than this are not worth a redraw.
const CPU_HYSTERESIS_MHZ: u32 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatteryState {
    Charging,
    Discharging,
    Full,
    Unknown,
}

impl BatteryState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Charging" => BatteryState::Charging,
            "Discharging" => BatteryState::Discharging,
            "Full" => BatteryState::Full,
            _ => BatteryState::Unknown,
        }
    }

    fn label(self) -> &'static str {
        match self {
            BatteryState::Charging => "charging",
            BatteryState::Discharging => "discharging",
            BatteryState::Full => "full",
            BatteryState::Unknown => "n/a",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Battery {
    pub capacity: u8,
    pub state: BatteryState,
}

/// Used and total memory in MiB.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Memory {
    pub used: u32,
    pub total: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkKind {
    Wifi,
    Lan,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Network {
    pub name: String,
    pub kind: LinkKind,
}

/// Where status readings come from.
pub trait Sensors {
    fn battery(&self) -> Option<Battery>;
    fn governor(&self) -> Option<String>;
    fn cpu_mhz(&self) -> Option<u32>;
    fn memory(&self) -> Option<Memory>;
    fn uptime_minutes(&self) -> Option<u64>;
    fn network(&self) -> Option<Network>;
}

/// Reads `/sys` and `/proc`.
pub struct SysSensors {
    sys: PathBuf,
    proc: PathBuf,
}

impl Default for SysSensors {
    fn default() -> Self {
        Self::with_roots("/sys", "/proc")
    }
}

impl SysSensors {
    pub fn with_roots(sys: impl Into<PathBuf>, proc: impl Into<PathBuf>) -> Self {
        Self {
            sys: sys.into(),
            proc: proc.into(),
        }
    }

    fn read(path: &Path) -> Option<String> {
        fs::read_to_string(path).ok().map(|s| s.trim().to_string())
    }
}

impl Sensors for SysSensors {
    fn battery(&self) -> Option<Battery> {
        let dir = self.sys.join("class/power_supply/BAT0");
        let capacity = Self::read(&dir.join("capacity"))?.parse().ok()?;
        let state = Self::read(&dir.join("status"))
            .map(|s| BatteryState::parse(&s))
            .unwrap_or(BatteryState::Unknown);
        Some(Battery { capacity, state })
    }

    fn governor(&self) -> Option<String> {
        Self::read(&self.sys.join("devices/system/cpu/cpu0/cpufreq/scaling_governor"))
            .filter(|s| !s.is_empty())
    }

    fn cpu_mhz(&self) -> Option<u32> {
        let khz: u32 =
            Self::read(&self.sys.join("devices/system/cpu/cpu0/cpufreq/scaling_cur_freq"))?
                .parse()
                .ok()?;
        Some(khz / 1000)
    }

    fn memory(&self) -> Option<Memory> {
        parse_meminfo(&fs::read_to_string(self.proc.join("meminfo")).ok()?)
    }

    fn uptime_minutes(&self) -> Option<u64> {
        parse_uptime(&fs::read_to_string(self.proc.join("uptime")).ok()?)
    }

    /// First interface that is up, by name. Loopback is skipped.
    fn network(&self) -> Option<Network> {
        let net = self.sys.join("class/net");
        let mut names: Vec<String> = fs::read_dir(&net)
            .ok()?
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name != "lo")
            .collect();
        names.sort();

        names.into_iter().find_map(|name| {
            let dir = net.join(&name);
            if Self::read(&dir.join("operstate")).as_deref() != Some("up") {
                return None;
            }
            let kind = if dir.join("wireless").exists() {
                LinkKind::Wifi
            } else {
                LinkKind::Lan
            };
            Some(Network { name, kind })
        })
    }
}

/// Used memory from a `/proc/meminfo` dump: total minus available.
pub fn parse_meminfo(text: &str) -> Option<Memory> {
    let field = |key: &str| -> Option<u64> {
        text.lines()
            .find_map(|line| line.strip_prefix(key))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|kb| kb.parse().ok())
    };
    let total = field("MemTotal:")? / 1024;
    let available = field("MemAvailable:")? / 1024;
    if total == 0 {
        return None;
    }
    Some(Memory {
        used: total.saturating_sub(available) as u32,
        total: total as u32,
    })
}

pub fn parse_uptime(text: &str) -> Option<u64> {
    let seconds: f64 = text.split_whitespace().next()?.parse().ok()?;
    Some((seconds / 60.0) as u64)
}

/// A reading refreshed no more often than `every`.
#[derive(Debug)]
struct Polled<T> {
    value: Option<T>,
    checked: Option<Instant>,
    every: Duration,
}

impl<T: PartialEq> Polled<T> {
    fn new(every: Duration) -> Self {
        Self {
            value: None,
            checked: None,
            every,
        }
    }

    /// Re-read when due. Returns true when the value changed.
    fn poll(&mut self, now: Instant, read: impl FnOnce(Option<&T>) -> Option<T>) -> bool {
        let due = self
            .checked
            .is_none_or(|at| now.saturating_duration_since(at) >= self.every);
        if !due {
            return false;
        }
        self.checked = Some(now);
        let value = read(self.value.as_ref());
        if value == self.value {
            return false;
        }
        self.value = value;
        true
    }
}

/// Move halfway toward a new frequency, ignoring small jitter.
fn smooth_mhz(previous: Option<&u32>, reading: u32) -> u32 {
    match previous {
        None => reading,
        Some(&prev) if prev.abs_diff(reading) >= CPU_HYSTERESIS_MHZ => {
            (i64::from(prev) + (i64::from(reading) - i64::from(prev)) / 2) as u32
        }
        Some(&prev) => prev,
    }
}

#[derive(Debug)]
pub struct Status {
    pub(crate) view: Option<BarView>,
    minute: Option<u32>,
    clock: String,
    battery: Polled<Battery>,
    governor: Polled<String>,
    cpu: Polled<u32>,
    memory: Polled<Memory>,
    uptime: Polled<u64>,
    network: Polled<Network>,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            view: None,
            minute: None,
            clock: String::new(),
            battery: Polled::new(BATTERY_INTERVAL),
            governor: Polled::new(GOVERNOR_INTERVAL),
            cpu: Polled::new(CPU_INTERVAL),
            memory: Polled::new(MEMORY_INTERVAL),
            uptime: Polled::new(UPTIME_INTERVAL),
            network: Polled::new(NETWORK_INTERVAL),
        }
    }
}

impl Status {
    /// Bring every field up to date. Returns true when a redraw is due.
    pub fn refresh(
        &mut self,
        view: &BarView,
        wall: DateTime<Local>,
        now: Instant,
        sensors: &impl Sensors,
    ) -> bool {
        let mut dirty = false;

        if self.view.as_ref() != Some(view) {
            self.view = Some(*view);
            dirty = true;
        }

        let minute = wall.hour() * 60 + wall.minute();
        if self.minute != Some(minute) {
            self.minute = Some(minute);
            self.clock = wall.format("%a %d %b %H:%M").to_string();
            dirty = true;
        }

        dirty |= self.battery.poll(now, |_| sensors.battery());
        dirty |= self.governor.poll(now, |_| sensors.governor());
        dirty |= self
            .cpu
            .poll(now, |prev| sensors.cpu_mhz().map(|mhz| smooth_mhz(prev, mhz)));
        dirty |= self.memory.poll(now, |_| sensors.memory());
        dirty |= self.uptime.poll(now, |_| sensors.uptime_minutes());
        dirty |= self.network.poll(now, |_| sensors.network());
        dirty
    }

    pub fn left_text(&self) -> String {
        match &self.view {
            Some(view) => format!("{} [{}]", view.layout.name(), view.clients),
            None => String::new(),
        }
    }

    pub fn right_text(&self) -> String {
        let mut parts = Vec::new();

        if let Some(net) = &self.network.value {
            let kind = match net.kind {
                LinkKind::Wifi => "wifi",
                LinkKind::Lan => "lan",
            };
            parts.push(format!("{} {}", kind, net.name));
        }
        match (&self.governor.value, self.cpu.value) {
            (Some(gov), Some(mhz)) => parts.push(format!("{} {}MHz", gov, mhz)),
            (Some(gov), None) => parts.push(gov.clone()),
            (None, Some(mhz)) => parts.push(format!("{}MHz", mhz)),
            (None, None) => {}
        }
        if let Some(mem) = self.memory.value {
            parts.push(format!("mem {}/{}M", mem.used, mem.total));
        }
        if let Some(minutes) = self.uptime.value {
            parts.push(format!("up {}", format_uptime(minutes)));
        }
        if let Some(bat) = self.battery.value {
            parts.push(format!("BAT {}% {}", bat.capacity, bat.state.label()));
        }
        parts.push(self.clock.clone());
        parts.join(" | ")
    }
}

fn format_uptime(minutes: u64) -> String {
    let (days, hours, mins) = (minutes / 1440, minutes / 60 % 24, minutes % 60);
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else {
        format!("{}h{:02}m", hours, mins)
    }
}
