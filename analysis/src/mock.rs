//! Scripted in-memory engine used by the tests.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::process::{EngineIo, Launcher, ReadOutcome};

/// What the mock does after `go`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GoAction {
    /// Emit the scripted info lines followed by bestmove.
    #[default]
    Respond,
    /// Emit the info lines, then bestmove only once `stop` arrives.
    UntilStop,
    /// Answer like `Respond`, then exit once bestmove has been read.
    RespondThenExit,
    /// Exit without answering.
    Crash,
    /// Stop answering entirely, `stop` included.
    Hang,
}

#[derive(Debug, Clone)]
pub struct MockBehavior {
    pub infos: Vec<String>,
    pub best_move: String,
    pub on_go: GoAction,
    /// Delay before bestmove is delivered.
    pub respond_delay: Duration,
    pub exit_on_uci: bool,
    pub silent: bool,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            infos: vec!["info depth 10 multipv 1 score cp 25 pv e2e4 e7e5".to_string()],
            best_move: "e2e4".to_string(),
            on_go: GoAction::Respond,
            respond_delay: Duration::ZERO,
            exit_on_uci: false,
            silent: false,
        }
    }
}

impl MockBehavior {
    pub fn with_infos(infos: &[&str], best_move: &str) -> Self {
        Self {
            infos: infos.iter().map(|s| s.to_string()).collect(),
            best_move: best_move.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct MockStats {
    pub launches: AtomicUsize,
    pub sessions: AtomicUsize,
    pub max_concurrent: AtomicUsize,
    pub overlaps: AtomicUsize,
    in_session: AtomicUsize,
    commands: Mutex<Vec<String>>,
}

impl MockStats {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

pub struct MockLauncher {
    default: MockBehavior,
    queued: Mutex<VecDeque<MockBehavior>>,
    failing_launches: AtomicUsize,
    stats: Arc<MockStats>,
}

impl MockLauncher {
    pub fn new(default: MockBehavior) -> Self {
        Self {
            default,
            queued: Mutex::new(VecDeque::new()),
            failing_launches: AtomicUsize::new(0),
            stats: Arc::new(MockStats::default()),
        }
    }

    /// The next launch uses `behavior` instead of the default.
    pub fn queue(&self, behavior: MockBehavior) {
        self.queued.lock().unwrap().push_back(behavior);
    }

    pub fn fail_next_launches(&self, count: usize) {
        self.failing_launches.store(count, Ordering::SeqCst);
    }

    /// Launch failures still queued.
    pub fn pending_failures(&self) -> usize {
        self.failing_launches.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> Arc<MockStats> {
        Arc::clone(&self.stats)
    }
}

impl Launcher for MockLauncher {
    fn launch(&self) -> io::Result<Box<dyn EngineIo>> {
        let failing = self.failing_launches.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_launches.store(failing - 1, Ordering::SeqCst);
            return Err(io::Error::new(io::ErrorKind::NotFound, "mock launch failure"));
        }

        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());

        Ok(Box::new(MockIo {
            behavior,
            stats: Arc::clone(&self.stats),
            pending: VecDeque::new(),
            exited: false,
            in_session: false,
            awaiting_stop: false,
        }))
    }
}

struct MockIo {
    behavior: MockBehavior,
    stats: Arc<MockStats>,
    pending: VecDeque<String>,
    exited: bool,
    in_session: bool,
    awaiting_stop: bool,
}

impl MockIo {
    fn enter_session(&mut self) {
        if self.in_session {
            self.stats.overlaps.fetch_add(1, Ordering::SeqCst);
            return;
        }
        self.in_session = true;
        let now = self.stats.in_session.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_concurrent.fetch_max(now, Ordering::SeqCst);
    }

    fn leave_session(&mut self, completed: bool) {
        if self.in_session {
            self.in_session = false;
            self.stats.in_session.fetch_sub(1, Ordering::SeqCst);
            if completed {
                self.stats.sessions.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn exit(&mut self) {
        self.exited = true;
        self.pending.clear();
        self.leave_session(false);
    }

    fn respond(&mut self, line: &str) {
        let behavior = self.behavior.clone();
        let command = line.split_whitespace().next().unwrap_or("");

        match command {
            "uci" if behavior.exit_on_uci => self.exit(),
            _ if behavior.silent => {}
            "uci" => {
                self.pending.push_back("id name MockFish".to_string());
                self.pending.push_back("id author nobody".to_string());
                self.pending.push_back("uciok".to_string());
            }
            "isready" => self.pending.push_back("readyok".to_string()),
            "position" => self.enter_session(),
            "go" => match behavior.on_go {
                GoAction::Respond | GoAction::RespondThenExit => {
                    self.pending.extend(behavior.infos);
                    self.pending.push_back(format!("bestmove {}", behavior.best_move));
                }
                GoAction::UntilStop => {
                    self.pending.extend(behavior.infos);
                    self.awaiting_stop = true;
                }
                GoAction::Crash => self.exit(),
                GoAction::Hang => {}
            },
            "stop" if self.awaiting_stop => {
                self.awaiting_stop = false;
                self.pending.push_back(format!("bestmove {}", behavior.best_move));
            }
            "quit" => self.exit(),
            _ => {}
        }
    }
}

impl EngineIo for MockIo {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        if self.exited {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock exited"));
        }
        self.stats.commands.lock().unwrap().push(line.to_string());
        self.respond(line);
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> ReadOutcome {
        if let Some(line) = self.pending.pop_front() {
            if line.starts_with("bestmove") {
                thread::sleep(self.behavior.respond_delay);
                self.leave_session(true);
                if self.behavior.on_go == GoAction::RespondThenExit {
                    self.exited = true;
                }
            }
            return ReadOutcome::Line(line);
        }
        if self.exited {
            return ReadOutcome::EndOfStream;
        }
        thread::sleep(timeout);
        ReadOutcome::TimedOut
    }

    fn has_exited(&mut self) -> bool {
        self.exited
    }

    fn kill(&mut self) {
        self.exit();
    }
}
