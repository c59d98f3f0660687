//! Recompiles a policy directory whenever it changes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use tokio::sync::broadcast;

use crate::assemble::CompiledPolicies;
use crate::compiler::Compiler;
use crate::error::{NomosError, Result};

/// Result of one recompilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The tree compiled and the output differs from the last accepted one.
    Updated,
    /// The tree compiled to the same output as before.
    Unchanged,
    /// The tree was rejected; the last accepted output stays in effect.
    Rejected,
}

/// Broadcast after every recompilation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileEvent {
    pub outcome: Outcome,
    /// Whether the kinds downstream controllers must watch changed.
    /// Consumers restart their per-kind watches when this is set.
    pub kinds_changed: bool,
    pub error_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub at: DateTime<Utc>,
    /// The accepted output; `None` when rejected.
    #[serde(skip)]
    pub policies: Option<Arc<CompiledPolicies>>,
}

/// Watches a policy directory and recompiles it on change.
pub struct PolicyWatcher {
    policy_dir: PathBuf,
    compiler: Compiler,
    debounce: Duration,
    sender: broadcast::Sender<CompileEvent>,
    shutdown: Arc<AtomicBool>,
    last: Mutex<Option<Arc<CompiledPolicies>>>,
}

impl PolicyWatcher {
    pub fn new(policy_dir: impl Into<PathBuf>, compiler: Compiler, debounce: Duration) -> Self {
        let (sender, _) = broadcast::channel(100);
        Self {
            policy_dir: policy_dir.into(),
            compiler,
            debounce,
            sender,
            shutdown: Arc::new(AtomicBool::new(false)),
            last: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CompileEvent> {
        self.sender.subscribe()
    }

    pub fn policy_dir(&self) -> &Path {
        &self.policy_dir
    }

    /// The last output that compiled cleanly.
    pub fn last_accepted(&self) -> Option<Arc<CompiledPolicies>> {
        self.last.lock().ok().and_then(|guard| guard.clone())
    }

    /// Compiles the directory once, records the result and broadcasts it.
    pub fn recompile(&self) -> CompileEvent {
        let event = match self.compiler.compile_dir(&self.policy_dir) {
            Ok(policies) => self.accept(policies),
            Err(NomosError::Rejected(errors)) => {
                for error in errors.iter() {
                    tracing::warn!(code = %error.code(), "{}", error);
                }
                rejected(errors.len(), None)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load policy directory");
                rejected(0, Some(e.to_string()))
            }
        };

        tracing::info!(
            outcome = ?event.outcome,
            kinds_changed = event.kinds_changed,
            errors = event.error_count,
            "recompiled"
        );
        let _ = self.sender.send(event.clone());
        event
    }

    fn accept(&self, policies: CompiledPolicies) -> CompileEvent {
        let policies = Arc::new(policies);
        let (outcome, kinds_changed) = match self.last.lock() {
            Ok(mut last) => {
                let result = match last.as_deref() {
                    Some(previous) if *previous == *policies => (Outcome::Unchanged, false),
                    Some(previous) => (
                        Outcome::Updated,
                        previous.kinds_to_sync() != policies.kinds_to_sync(),
                    ),
                    None => (Outcome::Updated, true),
                };
                *last = Some(Arc::clone(&policies));
                result
            }
            Err(_) => (Outcome::Updated, true),
        };
        CompileEvent {
            outcome,
            kinds_changed,
            error_count: 0,
            message: None,
            at: Utc::now(),
            policies: Some(policies),
        }
    }

    /// Compiles once, then blocks recompiling on every change until
    /// [`PolicyWatcher::stop`] is called.
    pub fn watch(&self) -> Result<()> {
        let (tx, rx) = std::sync::mpsc::channel();

        let mut debouncer: Debouncer<RecommendedWatcher> = new_debouncer(self.debounce, tx)?;
        debouncer
            .watcher()
            .watch(&self.policy_dir, RecursiveMode::Recursive)?;

        log::info!("Started watching policy directory: {}", self.policy_dir.display());
        self.recompile();

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(Ok(events)) => {
                    if events.iter().any(|e| self.is_relevant(e)) {
                        self.recompile();
                    }
                }
                Ok(Err(e)) => {
                    log::error!("Watch error: {}", e);
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        log::info!("Stopped watching policy directory");
        Ok(())
    }

    /// Changes to hidden entries and to non-manifest files are ignored.
    fn is_relevant(&self, event: &DebouncedEvent) -> bool {
        let Ok(relative) = event.path.strip_prefix(&self.policy_dir) else {
            return false;
        };
        let hidden = relative
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'));
        if hidden {
            return false;
        }
        let manifest = matches!(
            event.path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml" | "json")
        );
        manifest || event.path.is_dir() || !event.path.exists()
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn rejected(error_count: usize, message: Option<String>) -> CompileEvent {
    CompileEvent {
        outcome: Outcome::Rejected,
        kinds_changed: false,
        error_count,
        message,
        at: Utc::now(),
        policies: None,
    }
}

/// Runs a [`PolicyWatcher`] on a background thread.
pub struct BackgroundWatcher {
    watcher: Arc<PolicyWatcher>,
    handle: Option<std::thread::JoinHandle<Result<()>>>,
}

impl BackgroundWatcher {
    pub fn new(watcher: PolicyWatcher) -> Self {
        Self {
            watcher: Arc::new(watcher),
            handle: None,
        }
    }

    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        let watcher = Arc::clone(&self.watcher);
        self.handle = Some(std::thread::spawn(move || watcher.watch()));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CompileEvent> {
        self.watcher.subscribe()
    }

    /// Stops the watcher and returns its result.
    pub fn stop(&mut self) -> Result<()> {
        self.watcher.stop();
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| NomosError::Watch("watcher thread panicked".to_string()))?,
            None => Ok(()),
        }
    }
}

impl Drop for BackgroundWatcher {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
