//! Starting programs and collecting them when they exit.

use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;
use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

/// Something that can start a command line.
pub trait Spawn {
    fn spawn(&self, argv: &[String]) -> io::Result<u32>;
}

/// Launches children; a background thread waits on them.
pub struct Spawner {
    started: Sender<u32>,
}

impl Spawner {
    pub fn new() -> io::Result<Self> {
        let (started, rx) = mpsc::channel();
        thread::Builder::new()
            .name("reaper".into())
            .spawn(move || reap(rx))?;
        Ok(Self { started })
    }
}

impl Spawn for Spawner {
    /// Start `argv` in its own process group. Returns the child pid.
    fn spawn(&self, argv: &[String]) -> io::Result<u32> {
        let Some((program, args)) = argv.split_first() else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command"));
        };
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .process_group(0)
            .spawn()?;
        let pid = child.id();
        log::info!("Spawned {} (pid {})", program, pid);
        if self.started.send(pid).is_err() {
            log::warn!("Reaper is gone; pid {} will not be collected", pid);
        }
        Ok(pid)
    }
}

/// Wake on every spawn, then collect children until none are left.
fn reap(started: Receiver<u32>) {
    while started.recv().is_ok() {
        loop {
            match waitpid(Pid::from_raw(-1), None) {
                Ok(WaitStatus::Exited(pid, code)) => {
                    log::debug!("Child {} exited with {}", pid, code);
                }
                Ok(WaitStatus::Signaled(pid, signal, _)) => {
                    log::debug!("Child {} killed by {:?}", pid, signal);
                }
                Ok(_) => {}
                Err(Errno::EINTR) => {}
                Err(Errno::ECHILD) => break,
                Err(e) => {
                    log::error!("waitpid failed: {}", e);
                    break;
                }
            }
        }
    }
}
