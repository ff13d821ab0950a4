//! macOS interception driver: builder, capture thread, run-loop plumbing.
//!
//! The capture thread owns everything with thread affinity: the event tap,
//! its run-loop source, the permission-change observer, and the manager.
//! Events, permission re-checks, and teardown all execute there, so the
//! state the tap callback touches is never shared across threads.

mod permission;
mod tap;

pub use permission::{open_accessibility_settings, AccessibilityGate};
pub use tap::SessionTap;

use crate::error::HotkeyError;
use crate::hotkey::Hotkey;
use crate::manager::{
    ErrorCallback, HotkeyManager, Lifecycle, MatchCallback, PermissionGate,
    PERMISSION_SETTLE_DELAY,
};
use anyhow::{anyhow, Result};
use core_foundation::runloop::{kCFRunLoopDefaultMode, CFRunLoop};
use permission::{PermissionSignal, PermissionWatcher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How long each run-loop slice lasts before the driver services pending
/// work (settle deadline, revocation flag, stop request).
const LOOP_SLICE: Duration = Duration::from_millis(200);

/// Builder for a hotkey interceptor.
#[derive(Default)]
pub struct HotkeyInterceptorBuilder {
    hotkey: Option<Hotkey>,
    prompt_when_denied: bool,
    on_match: Option<MatchCallback>,
    on_error: Option<ErrorCallback>,
}

impl HotkeyInterceptorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target combination. Defaults to Cmd+Shift+Space.
    pub fn hotkey(mut self, hotkey: Hotkey) -> Self {
        self.hotkey = Some(hotkey);
        self
    }

    /// Show the OS permission prompt if the construction-time check is
    /// denied. Off by default.
    pub fn prompt_when_denied(mut self, prompt: bool) -> Self {
        self.prompt_when_denied = prompt;
        self
    }

    /// Callback receiving the "combination fully held" boolean. Invoked on
    /// the capture thread for every relevant key transition, not just when
    /// the value changes.
    pub fn on_match<F>(mut self, f: F) -> Self
    where
        F: FnMut(bool) + Send + 'static,
    {
        self.on_match = Some(Box::new(f));
        self
    }

    /// Callback receiving lifecycle failures. Defaults to logging them.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(HotkeyError) + Send + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Build the interceptor.
    pub fn build(self) -> Result<HotkeyInterceptor> {
        let on_match = self
            .on_match
            .ok_or_else(|| anyhow!("an on_match callback is required"))?;
        let on_error = self
            .on_error
            .unwrap_or_else(|| Box::new(|err| log::error!("hotkey interceptor: {}", err)));
        Ok(HotkeyInterceptor {
            hotkey: self.hotkey.unwrap_or_default(),
            prompt_when_denied: self.prompt_when_denied,
            on_match,
            on_error,
        })
    }
}

/// A configured interceptor, ready to start.
pub struct HotkeyInterceptor {
    hotkey: Hotkey,
    prompt_when_denied: bool,
    on_match: MatchCallback,
    on_error: ErrorCallback,
}

impl HotkeyInterceptor {
    /// Start interception on a dedicated capture thread.
    ///
    /// Returns a [`HotkeyInterceptorHandle`]; the thread stops when the
    /// handle is stopped or dropped. A denied permission or failed tap
    /// creation is reported through the error callback, not here.
    pub fn start(self) -> Result<HotkeyInterceptorHandle> {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let HotkeyInterceptor {
            hotkey,
            prompt_when_denied,
            on_match,
            on_error,
        } = self;

        let thread = thread::Builder::new()
            .name("hotkey-interceptor".to_string())
            .spawn(move || {
                run_capture_loop(hotkey, prompt_when_denied, on_match, on_error, thread_running)
            })?;

        Ok(HotkeyInterceptorHandle {
            running,
            thread: Some(thread),
        })
    }
}

fn run_capture_loop(
    hotkey: Hotkey,
    prompt_when_denied: bool,
    on_match: MatchCallback,
    on_error: ErrorCallback,
    running: Arc<AtomicBool>,
) {
    log::info!("watching for {}", hotkey);

    // Subscribe before entering the loop so the loop always has at least
    // one source and a grant is never missed.
    let signal = PermissionSignal::new();
    let watcher = PermissionWatcher::subscribe(Arc::clone(&signal));

    let mut manager = HotkeyManager::new(
        AccessibilityGate,
        SessionTap::new(),
        hotkey,
        on_match,
        on_error,
    );
    if prompt_when_denied && manager.lifecycle() == Lifecycle::AwaitingPermission {
        manager.gate().request_prompt();
    }

    let mut recheck_at: Option<Instant> = None;
    while running.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(unsafe { kCFRunLoopDefaultMode }, LOOP_SLICE, false);

        if signal.take() {
            // The notification may precede the permission database update;
            // let it settle before re-checking.
            recheck_at = Some(Instant::now() + PERMISSION_SETTLE_DELAY);
        }
        if let Some(at) = recheck_at {
            if Instant::now() >= at {
                recheck_at = None;
                manager.recheck_permission();
            }
        }
        manager.service();
    }

    // Unsubscribe first: a notification firing after this point can no
    // longer schedule work against torn-down state.
    drop(watcher);
    manager.teardown();
    log::debug!("capture thread exiting");
}

/// Handle to a running interceptor.
///
/// The capture thread stops automatically when this handle is dropped.
pub struct HotkeyInterceptorHandle {
    running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl HotkeyInterceptorHandle {
    /// Whether the capture thread is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the capture thread and wait for it to exit.
    ///
    /// The capture loop observes the stop flag within one run-loop slice,
    /// so the join is bounded. Called automatically on drop.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for HotkeyInterceptorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
