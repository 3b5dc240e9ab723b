//! Experiment lifecycle controller
//!
//! Creation parses the invocation, checks the working tree, allocates the
//! experiment directory, writes the initial artifacts, and installs the
//! stream capture. Finalization is idempotent and runs on every
//! termination path: explicit `finish`, scope exit (normal or panicking),
//! and [`crate::exit`] for forced process exits.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clap::Command;
use serde_json::Value;
use tracing::{debug, warn};

use labrec_args::{GlobalConfig, ParsedInvocation};
use labrec_vcs::{GitVcs, VcsAdapter};

use crate::allocate::{allocate, Allocation};
use crate::capture::{self, Channel};
use crate::metadata::{
    Metadata, Status, ARGS_FILE, DEFAULT_ARGS_FILE, STDERR_FILE, STDOUT_FILE, SUMMARY_FILE,
    TRACEBACK_HEADER,
};
use crate::registry;
use crate::{CoreError, Result};

/// State shared between the host's handle and the live registry.
pub(crate) struct Shared {
    state: Mutex<Inner>,
}

struct Inner {
    dir: PathBuf,
    id: String,
    metadata: Metadata,
    args: BTreeMap<String, Value>,
    finalized: bool,
    stdout_token: u64,
    stderr_token: u64,
}

impl Shared {
    /// Idempotent finalization: stamp the end time, rewrite metadata,
    /// write STATUS, close and restore the capture layers, deregister.
    /// I/O failures are demoted to warnings so that the host's own error,
    /// if any, stays primary.
    pub(crate) fn finalize(self: &Arc<Self>, status: Status) {
        let (id, stdout_token, stderr_token) = {
            let mut inner = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if inner.finalized {
                return;
            }
            inner.finalized = true;

            inner.metadata.end_time = Some(Metadata::now());
            if let Err(e) = inner.metadata.save(&inner.dir) {
                warn!("failed to rewrite metadata for experiment {}: {e}", inner.id);
            }
            if let Err(e) = status.write(&inner.dir) {
                warn!("failed to write STATUS for experiment {}: {e}", inner.id);
            }
            (inner.id.clone(), inner.stdout_token, inner.stderr_token)
        };

        if let Err(e) = capture::remove_layer(Channel::Stdout, stdout_token) {
            warn!("failed to close stdout capture for experiment {id}: {e}");
        }
        if let Err(e) = capture::remove_layer(Channel::Stderr, stderr_token) {
            warn!("failed to close stderr capture for experiment {id}: {e}");
        }
        registry::deregister(self);
        debug!(experiment = %id, status = %status, "experiment finalized");
    }
}

/// A live recorded experiment.
///
/// Dropping the handle finalizes the experiment: with SUCCESS when the
/// scope exits normally, with ERROR and a traceback when it exits through
/// a panic. [`Experiment::finish`] finalizes explicitly.
pub struct Experiment {
    shared: Arc<Shared>,
}

impl Experiment {
    /// Record an experiment for this invocation, discovering the
    /// enclosing git repository for provenance.
    ///
    /// `cmd` must have had [`labrec_args::add_argument_group`] applied.
    /// With `arg_list` absent, the process argument vector is parsed.
    pub fn from_parser(cmd: &mut Command, arg_list: Option<Vec<OsString>>) -> Result<Self> {
        let parsed = labrec_args::parse(cmd, arg_list)?;
        let vcs = GitVcs::from_cwd()?;
        Self::create(&vcs, parsed)
    }

    /// [`Experiment::from_parser`] with an explicit VCS adapter.
    pub fn with_vcs(
        vcs: &dyn VcsAdapter,
        cmd: &mut Command,
        arg_list: Option<Vec<OsString>>,
    ) -> Result<Self> {
        let parsed = labrec_args::parse(cmd, arg_list)?;
        Self::create(vcs, parsed)
    }

    /// [`Experiment::with_vcs`] with an explicit global config instead of
    /// the on-disk one.
    pub fn with_vcs_and_config(
        vcs: &dyn VcsAdapter,
        cmd: &mut Command,
        arg_list: Option<Vec<OsString>>,
        config: &GlobalConfig,
    ) -> Result<Self> {
        let parsed = labrec_args::parse_with_config(cmd, arg_list, config)?;
        Self::create(vcs, parsed)
    }

    /// Run `f` against a freshly created experiment, finalizing on every
    /// exit path: SUCCESS on `Ok`, ERROR with the error rendered into
    /// STATUS on `Err` (the error keeps propagating), ERROR with a
    /// traceback if `f` panics.
    pub fn scope<T, E, F>(
        vcs: &dyn VcsAdapter,
        cmd: &mut Command,
        arg_list: Option<Vec<OsString>>,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(&Experiment) -> std::result::Result<T, E>,
        E: std::fmt::Display + From<CoreError>,
    {
        let experiment = Self::with_vcs(vcs, cmd, arg_list)?;
        match f(&experiment) {
            Ok(value) => {
                experiment.finish()?;
                Ok(value)
            }
            Err(e) => {
                experiment
                    .finalize_with(Status::Error(Some(format!("{TRACEBACK_HEADER}\n{e}"))));
                Err(e)
            }
        }
    }

    fn create(vcs: &dyn VcsAdapter, parsed: ParsedInvocation) -> Result<Self> {
        let ParsedInvocation {
            host_args,
            engine,
            default_args,
            command_line,
        } = parsed;

        if !engine.allow_dirty && vcs.is_dirty()? {
            return Err(CoreError::DirtyRepo);
        }
        let githead_sha = vcs.head_sha()?;
        let githead_message = vcs.head_message()?;

        let alloc = allocate(
            &engine.experiments_directory,
            engine.experiment_id.as_deref(),
        )?;
        let dir = alloc.dir.canonicalize().unwrap_or_else(|_| alloc.dir.clone());

        let metadata = if alloc.resumed {
            resume_check(&alloc, &host_args, &githead_sha)?
        } else {
            let metadata = Metadata {
                githead_sha,
                githead_message,
                start_time: Metadata::now(),
                end_time: None,
                description: engine.description,
                command: command_line,
            };
            write_json(&dir.join(ARGS_FILE), &host_args)?;
            write_json(&dir.join(DEFAULT_ARGS_FILE), &default_args)?;
            metadata.save(&dir)?;
            metadata
        };
        Status::Running.write(&dir)?;

        registry::install_panic_hook();

        let stdout_token = capture::install_layer(Channel::Stdout, &dir.join(STDOUT_FILE))?;
        let stderr_token = match capture::install_layer(Channel::Stderr, &dir.join(STDERR_FILE)) {
            Ok(token) => token,
            Err(e) => {
                let _ = capture::remove_layer(Channel::Stdout, stdout_token);
                return Err(e.into());
            }
        };

        debug!(
            experiment = %alloc.id,
            dir = %dir.display(),
            resumed = alloc.resumed,
            "experiment live"
        );
        let shared = Arc::new(Shared {
            state: Mutex::new(Inner {
                dir,
                id: alloc.id,
                metadata,
                args: host_args,
                finalized: false,
                stdout_token,
                stderr_token,
            }),
        });
        registry::register(Arc::clone(&shared));
        Ok(Self { shared })
    }

    /// Finalize with SUCCESS. Experiments created after this one and
    /// still live are finalized first, most recent first.
    pub fn finish(self) -> Result<()> {
        self.finalize_with(Status::Success);
        Ok(())
    }

    fn finalize_with(&self, status: Status) {
        for later in registry::live_after(&self.shared) {
            later.finalize(status.clone());
        }
        self.shared.finalize(status);
    }

    /// Absolute path of this experiment's directory.
    pub fn curexpdir(&self) -> PathBuf {
        self.lock().dir.clone()
    }

    /// The experiment id: the directory name under the experiments root.
    pub fn id(&self) -> String {
        self.lock().id.clone()
    }

    /// The host's parsed arguments, engine options stripped.
    pub fn args(&self) -> BTreeMap<String, Value> {
        self.lock().args.clone()
    }

    pub fn command(&self) -> String {
        self.lock().metadata.command.clone()
    }

    pub fn description(&self) -> String {
        self.lock().metadata.description.clone()
    }

    /// Merge `update` into `summary.json`: top-level keys, last write wins.
    pub fn summary(&self, update: Value) -> Result<()> {
        let fields = match update {
            Value::Object(fields) => fields,
            _ => return Err(CoreError::SummaryNotObject),
        };
        let path = self.lock().dir.join(SUMMARY_FILE);
        let mut doc: serde_json::Map<String, Value> = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            serde_json::Map::new()
        };
        doc.extend(fields);
        fs::write(&path, serde_json::to_string_pretty(&Value::Object(doc))?)?;
        Ok(())
    }

    /// Create (or truncate) a file inside the experiment directory.
    pub fn open(&self, name: &str) -> Result<File> {
        Ok(File::create(self.lock().dir.join(name))?)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Experiment {
    fn drop(&mut self) {
        let status = if std::thread::panicking() {
            Status::Error(registry::last_panic_traceback())
        } else {
            Status::Success
        };
        self.finalize_with(status);
    }
}

/// Verify that a resumed directory matches this invocation: the stored
/// args and head commit must be bit-equal to the current ones. Returns
/// the stored metadata; `start-time` is preserved, only STATUS is reset
/// by the caller.
fn resume_check(
    alloc: &Allocation,
    host_args: &BTreeMap<String, Value>,
    githead_sha: &str,
) -> Result<Metadata> {
    let stored: Value = read_json(&alloc.dir.join(ARGS_FILE))?;
    let current = serde_json::to_value(host_args)?;
    if stored != current {
        return Err(CoreError::MismatchedArgs(alloc.dir.clone()));
    }
    let metadata = Metadata::load(&alloc.dir).map_err(|e| CoreError::CorruptedExperiment {
        path: alloc.dir.clone(),
        reason: e.to_string(),
    })?;
    if metadata.githead_sha != githead_sha {
        return Err(CoreError::MismatchedCommit(alloc.dir.clone()));
    }
    debug!(experiment = %alloc.id, "resuming recorded experiment");
    Ok(metadata)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}
