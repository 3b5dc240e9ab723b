//! Live-experiment registry and process-termination plumbing
//!
//! Experiments register on creation and deregister at finalization. The
//! registry drains in LIFO order when the process is told to exit and
//! when an outer experiment finishes while inner ones are still live.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::experiment::Shared;
use crate::metadata::{Status, TRACEBACK_HEADER};

static REGISTRY: Mutex<Vec<Arc<Shared>>> = Mutex::new(Vec::new());
static PANIC_HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);
static LAST_PANIC: Mutex<Option<String>> = Mutex::new(None);

fn lock() -> MutexGuard<'static, Vec<Arc<Shared>>> {
    REGISTRY.lock().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn register(shared: Arc<Shared>) {
    lock().push(shared);
}

pub(crate) fn deregister(shared: &Arc<Shared>) {
    lock().retain(|s| !Arc::ptr_eq(s, shared));
}

/// Experiments registered after `shared` and still live, most recent first.
pub(crate) fn live_after(shared: &Arc<Shared>) -> Vec<Arc<Shared>> {
    let guard = lock();
    match guard.iter().position(|s| Arc::ptr_eq(s, shared)) {
        Some(pos) => guard[pos + 1..].iter().rev().cloned().collect(),
        None => Vec::new(),
    }
}

fn drain_lifo() -> Vec<Arc<Shared>> {
    let mut all: Vec<_> = lock().drain(..).collect();
    all.reverse();
    all
}

/// Record panic messages so that finalization during unwinding can embed
/// them in STATUS. Installed once, on first experiment creation.
pub(crate) fn install_panic_hook() {
    if PANIC_HOOK_INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }
    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let rendered = render_traceback(info);
        *LAST_PANIC.lock().unwrap_or_else(|e| e.into_inner()) = Some(rendered);
        prev(info);
    }));
}

fn render_traceback(info: &std::panic::PanicHookInfo<'_>) -> String {
    let message = info
        .payload()
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| info.payload().downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Box<dyn Any>".to_string());
    match info.location() {
        Some(loc) => format!(
            "{TRACEBACK_HEADER}\n  panicked at {}:{}:{}\n{message}",
            loc.file(),
            loc.line(),
            loc.column()
        ),
        None => format!("{TRACEBACK_HEADER}\n{message}"),
    }
}

/// The most recent recorded panic, rendered as a traceback block.
pub(crate) fn last_panic_traceback() -> Option<String> {
    LAST_PANIC
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// Finalize every live experiment in LIFO order.
pub fn finalize_all(status: Status) {
    for shared in drain_lifo() {
        shared.finalize(status.clone());
    }
}

/// Finalize every live experiment (LIFO order) and terminate the process.
///
/// The replacement for `std::process::exit` in hosts that record
/// experiments: destructors do not run on a forced exit, so the live
/// registry is drained here first. The exit code passes through
/// unchanged; a nonzero code finalizes with ERROR.
pub fn exit(code: i32) -> ! {
    let status = if code == 0 {
        Status::Success
    } else {
        Status::Error(None)
    };
    finalize_all(status);
    std::process::exit(code);
}
