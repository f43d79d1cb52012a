//! Spawning extracted payloads as detached processes.

use std::{
    ffi::{OsStr, OsString},
    io,
    process::{Command, Stdio},
};

use log::debug;

/// Starts programs without waiting for them.
pub trait Launcher {
    /// Spawn `program` with `args` and return without waiting for it to exit.
    /// Implementations must pass the arguments to the program verbatim and never route them through a shell.
    fn spawn_detached(&self, program: &OsStr, args: &[&OsStr]) -> io::Result<()>;
}

/// Launches programs as detached child processes with their standard streams closed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedProcess;
impl Launcher for DetachedProcess {
    fn spawn_detached(&self, program: &OsStr, args: &[&OsStr]) -> io::Result<()> {
        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(crate::constants::DETACHED_PROCESS);
        }
        let child = command.spawn()?;
        debug!("spawned {} {:?} as process {}", program.to_string_lossy(), args, child.id());
        Ok(())
    }
}

/// How an extracted payload is started.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PayloadKind {
    /// The payload is a program and is spawned directly.
    Executable,
    /// The payload is a script and is passed as the only argument to the interpreter.
    Script {
        interpreter: OsString,
        extension:   String,
    },
}
impl PayloadKind {
    /// Python script run without a console window where the platform has one.
    pub fn python() -> Self {
        let interpreter = if cfg!(windows) { "pythonw" } else { "python3" };
        PayloadKind::Script {
            interpreter: interpreter.into(),
            extension:   "pyw".into(),
        }
    }

    /// Returns the file extension the payload is extracted with.
    pub fn extension(&self) -> &str {
        match self {
            PayloadKind::Executable => "exe",
            PayloadKind::Script { extension, .. } => extension,
        }
    }

    /// Returns whether the payload needs an interpreter to run.
    pub fn is_interpreted(&self) -> bool { matches!(self, PayloadKind::Script { .. }) }
}
