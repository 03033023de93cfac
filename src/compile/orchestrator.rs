use super::{CompileError, normalize_layout, write_generated_files};
use crate::config::{BuildRequest, RepoPaths};
use crate::git::BranchSwitcher;
use std::fs;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

/// Chunks held back before a batched message is emitted.
pub const FLUSH_THRESHOLD: usize = 5;

/// One entry on the per-session event channel.
///
/// Ordered; `Finished` is emitted exactly once and always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    /// Batched build output or a failure description.
    Message(String),
    /// Terminal result; the single source of truth for build success.
    Finished(BuildOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The session ran to its exit handler (or failed before launch).
    Completed { ok: bool },
    /// The build tool could not be started; no subprocess ever existed.
    Aborted { status: i32, message: String },
}

/// One firmware build: prepare the checkout, launch `pio run`, stream its
/// output and report a single terminal result.
///
/// A session owns nothing shared: concurrent builds against the same
/// repository are the caller's responsibility to prevent (one session per
/// checkout at a time).
pub struct BuildSession<'a> {
    paths: &'a RepoPaths,
    switcher: &'a dyn BranchSwitcher,
    events: Sender<BuildEvent>,
    command: Vec<String>,
}

impl<'a> BuildSession<'a> {
    pub fn new(
        paths: &'a RepoPaths,
        switcher: &'a dyn BranchSwitcher,
        events: Sender<BuildEvent>,
    ) -> Self {
        Self {
            paths,
            switcher,
            events,
            command: vec!["pio".to_string(), "run".to_string()],
        }
    }

    /// Replace the build-tool invocation (tests substitute a stub here).
    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Run the whole pipeline. Every path through here emits exactly one
    /// `Finished` event.
    pub fn run(&self, request: &BuildRequest) {
        if let Err(e) = self.prepare(request) {
            self.emit(BuildEvent::Message(e.to_string()));
            self.emit(BuildEvent::Finished(BuildOutcome::Completed { ok: false }));
            return;
        }

        if let Err(e) = self.check_repository() {
            let message = e.to_string();
            self.emit(BuildEvent::Message(message.clone()));
            self.emit(BuildEvent::Finished(BuildOutcome::Aborted { status: 1, message }));
            return;
        }

        self.supervise();
    }

    /// Branch switch and file generation; must fully complete before launch.
    fn prepare(&self, request: &BuildRequest) -> Result<(), CompileError> {
        normalize_layout(self.paths)?;

        let version = request.requested_version().ok_or_else(|| {
            CompileError::BranchSwitchFailed("request carries no tasmotaVersion".to_string())
        })?;
        self.switcher
            .switch_to(version)
            .map_err(|e| CompileError::BranchSwitchFailed(e.to_string()))?;

        // switching to a historical branch is what resurrects the legacy
        // source tree, so normalize again after the checkout
        normalize_layout(self.paths)?;

        write_generated_files(self.paths, request)
    }

    fn check_repository(&self) -> Result<(), CompileError> {
        let root = self.paths.root();
        match fs::metadata(root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(CompileError::DirectoryChangeFailed {
                path: root.to_path_buf(),
                cause: "not a directory".to_string(),
            }),
            Err(e) => Err(CompileError::DirectoryChangeFailed {
                path: root.to_path_buf(),
                cause: e.to_string(),
            }),
        }
    }

    /// Spawn the build tool and stream its combined output until exit.
    fn supervise(&self) {
        let mut child = match Command::new(&self.command[0])
            .args(&self.command[1..])
            .current_dir(self.paths.root())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                let message = format!("Cannot start `{}`: {}", self.command.join(" "), e);
                self.emit(BuildEvent::Message(message.clone()));
                self.emit(BuildEvent::Finished(BuildOutcome::Aborted { status: 1, message }));
                return;
            }
        };

        // one reader per pipe, both funneling into one ordered channel; the
        // drain loop below is the buffer's only writer
        let (tx, rx) = channel::<String>();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, tx.clone()));
        }
        drop(tx);

        let residue = drain_chunks(rx, &self.events);

        for reader in readers {
            let _ = reader.join();
        }
        let code = match child.wait() {
            Ok(status) => status.code().unwrap_or(-1),
            Err(_) => -1,
        };

        self.emit(BuildEvent::Message(residue));
        self.emit(BuildEvent::Message(format!("Finished. Exit code: {code}.\n")));
        self.emit(BuildEvent::Finished(BuildOutcome::Completed { ok: code == 0 }));
    }

    fn emit(&self, event: BuildEvent) {
        // a consumer that went away must not kill the session
        let _ = self.events.send(event);
    }
}

/// Buffer incoming chunks and emit a batched message whenever a new chunk
/// arrives on a full buffer. Returns whatever is left unflushed at pipe
/// close; the caller folds that into the exit message. No chunk is dropped,
/// only batched.
fn drain_chunks(chunks: Receiver<String>, events: &Sender<BuildEvent>) -> String {
    let mut buffer: Vec<String> = Vec::new();
    for chunk in chunks {
        if buffer.len() >= FLUSH_THRESHOLD {
            let _ = events.send(BuildEvent::Message(buffer.concat()));
            buffer.clear();
        }
        buffer.push(chunk);
    }
    buffer.concat()
}

fn spawn_reader<R: Read + Send + 'static>(
    mut pipe: R,
    chunks: Sender<String>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                    if chunks.send(chunk).is_err() {
                        break;
                    }
                }
            }
        }
    })
}
