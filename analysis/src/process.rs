//! Ownership of a single engine subprocess.
//!
//! An [`EngineProcess`] is the only thing allowed to touch an engine's pipes.
//! It tracks where the instance is in its lifecycle and refuses transitions
//! that the lifecycle does not allow; in particular a `Crashed` instance never
//! becomes usable again and has to be replaced by a freshly started one.

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use uci::{Decoder, Encoder, EngineOutput, UciCommand};

use crate::config::{EngineConfig, Timeouts};
use crate::error::{AnalysisError, EngineId, Result};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Lifecycle of one engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Starting,
    Ready,
    Busy,
    Crashed,
}

impl EngineState {
    pub fn can_transition(self, next: EngineState) -> bool {
        use EngineState::*;

        matches!(
            (self, next),
            (Stopped, Starting)
                | (Starting, Ready)
                | (Starting, Crashed)
                | (Ready, Busy)
                | (Ready, Crashed)
                | (Ready, Stopped)
                | (Busy, Ready)
                | (Busy, Crashed)
                | (Busy, Stopped)
        )
    }
}

/// Result of waiting for one line of engine output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    TimedOut,
    EndOfStream,
}

/// Line-level access to a running engine.
pub trait EngineIo: Send {
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Blocks until a line arrives, the output stream closes or `timeout` elapses.
    fn read_line(&mut self, timeout: Duration) -> ReadOutcome;

    fn has_exited(&mut self) -> bool;

    /// Forcibly stops the engine. Must be safe to call on an exited engine.
    fn kill(&mut self);

    /// Waits up to `grace` for the engine to exit on its own.
    fn wait_exit(&mut self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        loop {
            if self.has_exited() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }
}

/// Produces fresh engine connections. The supervisor calls it on startup and for every restart.
pub trait Launcher: Send + Sync {
    fn launch(&self) -> io::Result<Box<dyn EngineIo>>;
}

/// Launches the engine as a child process with piped stdin/stdout.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    path: PathBuf,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            path: config.path.clone(),
            args: config.args.clone(),
        }
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self) -> io::Result<Box<dyn EngineIo>> {
        Ok(Box::new(ChildIo::spawn(&self.path, &self.args)?))
    }
}

/// Pipes of a spawned child. A reader thread forwards stdout lines into a
/// channel so reads can be bounded by a timeout.
pub struct ChildIo {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    lines: Receiver<String>,
}

impl ChildIo {
    pub fn spawn(path: &Path, args: &[String]) -> io::Result<Self> {
        let mut child = Command::new(path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let missing = |stream| io::Error::new(io::ErrorKind::BrokenPipe, stream);
        let stdin = BufWriter::new(child.stdin.take().ok_or_else(|| missing("stdin"))?);
        let stdout = BufReader::new(child.stdout.take().ok_or_else(|| missing("stdout"))?);

        let (tx, lines) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name(format!("engine-stdout-{}", child.id()))
            .spawn(move || {
                for line in stdout.lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });

        if let Err(e) = spawned {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }

        Ok(Self {
            child,
            stdin,
            lines,
        })
    }
}

impl EngineIo for ChildIo {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()
    }

    fn read_line(&mut self, timeout: Duration) -> ReadOutcome {
        match self.lines.recv_timeout(timeout) {
            Ok(line) => ReadOutcome::Line(line),
            Err(RecvTimeoutError::Timeout) => ReadOutcome::TimedOut,
            Err(RecvTimeoutError::Disconnected) => ReadOutcome::EndOfStream,
        }
    }

    fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    fn kill(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for ChildIo {
    fn drop(&mut self) {
        if !self.has_exited() {
            self.kill();
        }
    }
}

/// One supervised engine instance.
pub struct EngineProcess {
    id: EngineId,
    state: EngineState,
    io: Box<dyn EngineIo>,
    name: Option<String>,
    options: Vec<(String, String)>,
    last_activity: Instant,
    quit_grace: Duration,
    terminated: bool,
    encoder: Encoder,
    decoder: Decoder,
}

impl EngineProcess {
    /// Launches an engine, applies `options` and waits until it reports ready.
    pub fn start(
        id: EngineId,
        launcher: &dyn Launcher,
        options: &[(String, String)],
        timeouts: &Timeouts,
    ) -> Result<Self> {
        let io = launcher.launch().map_err(|e| AnalysisError::StartupError {
            engine: id,
            reason: format!("failed to launch: {}", e),
        })?;

        let mut process = Self {
            id,
            state: EngineState::Stopped,
            io,
            name: None,
            options: options.to_vec(),
            last_activity: Instant::now(),
            quit_grace: timeouts.quit_grace,
            terminated: false,
            encoder: Encoder {},
            decoder: Decoder::new(),
        };
        process.transition(EngineState::Starting);

        if let Err(e) = process.handshake(timeouts.handshake) {
            process.mark_crashed();
            process.terminate();
            return Err(AnalysisError::StartupError {
                engine: id,
                reason: e.to_string(),
            });
        }

        process.transition(EngineState::Ready);
        info!(
            "Engine {} ready ({})",
            id,
            process.name.as_deref().unwrap_or("unnamed")
        );
        Ok(process)
    }

    fn handshake(&mut self, timeout: Duration) -> Result<()> {
        self.send(&UciCommand::Uci)?;
        let mut name = None;
        self.wait_for(timeout, |output| match output {
            EngineOutput::IdName(id_name) => {
                name = Some(id_name.clone());
                false
            }
            output => *output == EngineOutput::UciOk,
        })?;
        self.name = name;

        for (name, value) in self.options.clone() {
            self.send(&UciCommand::SetOption {
                name,
                value: Some(value),
            })?;
        }

        self.sync(timeout)
    }

    pub fn id(&self) -> EngineId {
        self.id
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Name from the engine's `id name` line.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Checks the instance has not exited behind our back.
    pub fn is_alive(&mut self) -> bool {
        self.state != EngineState::Crashed && !self.io.has_exited()
    }

    /// Whether the underlying process has exited.
    pub fn has_exited(&mut self) -> bool {
        self.io.has_exited()
    }

    fn transition(&mut self, next: EngineState) -> bool {
        if self.state == next {
            return true;
        }
        if !self.state.can_transition(next) {
            warn!(
                "Engine {}: refusing transition {:?} -> {:?}",
                self.id, self.state, next
            );
            return false;
        }
        debug!("Engine {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
        true
    }

    /// Claims a ready instance for one session.
    pub fn begin_session(&mut self) -> Result<()> {
        if self.state == EngineState::Ready && self.transition(EngineState::Busy) {
            return Ok(());
        }
        Err(AnalysisError::EngineCrashed {
            engine: self.id,
            reason: format!("engine is {:?}, not ready", self.state),
        })
    }

    pub fn end_session(&mut self) {
        self.transition(EngineState::Ready);
    }

    pub fn mark_crashed(&mut self) {
        self.transition(EngineState::Crashed);
    }

    pub fn send(&mut self, command: &UciCommand) -> Result<()> {
        let line = self.encoder.encode(command);
        self.write_line(&line)
    }

    pub fn write_line(&mut self, line: &str) -> Result<()> {
        debug!("Engine {} <- {:?}", self.id, line);

        if let Err(e) = self.io.write_line(line) {
            self.mark_crashed();
            return Err(AnalysisError::EngineCrashed {
                engine: self.id,
                reason: format!("write failed: {}", e),
            });
        }

        self.last_activity = Instant::now();
        Ok(())
    }

    /// Reads one decoded line. `Ok(None)` means nothing arrived within `timeout`;
    /// a closed stream marks the instance crashed.
    pub fn read_event(&mut self, timeout: Duration) -> Result<Option<EngineOutput>> {
        match self.io.read_line(timeout) {
            ReadOutcome::Line(line) => {
                debug!("Engine {} -> {:?}", self.id, line);
                self.last_activity = Instant::now();
                Ok(Some(self.decoder.decode(&line)))
            }
            ReadOutcome::TimedOut => Ok(None),
            ReadOutcome::EndOfStream => {
                self.mark_crashed();
                Err(AnalysisError::EngineCrashed {
                    engine: self.id,
                    reason: "output stream closed".to_string(),
                })
            }
        }
    }

    /// Reads until `done` accepts a line. Running out of time marks the instance crashed.
    pub fn wait_for<F>(&mut self, timeout: Duration, mut done: F) -> Result<()>
    where
        F: FnMut(&EngineOutput) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.mark_crashed();
                return Err(AnalysisError::EngineTimeout {
                    engine: self.id,
                    timeout,
                });
            }

            if let Some(output) = self.read_event(remaining)? {
                if done(&output) {
                    return Ok(());
                }
            }
        }
    }

    /// `isready` / `readyok` round trip.
    pub fn sync(&mut self, timeout: Duration) -> Result<()> {
        self.send(&UciCommand::IsReady)?;
        self.wait_for(timeout, |output| *output == EngineOutput::ReadyOk)
    }

    /// Asks the engine to quit, killing it if it is still running after the
    /// grace period. Calling it again does nothing.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        let graceful =
            self.io.write_line("quit").is_ok() && self.io.wait_exit(self.quit_grace);
        if !graceful {
            debug!("Engine {} did not quit in time, killing it", self.id);
            self.io.kill();
        }

        if self.state != EngineState::Crashed && self.state != EngineState::Starting {
            self.transition(EngineState::Stopped);
        }
        info!("Engine {} terminated", self.id);
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}
