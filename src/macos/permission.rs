//! Accessibility trust permission: query, prompt, and change notifications.

use crate::manager::PermissionGate;
use anyhow::{ensure, Context, Result};
use core_foundation::base::TCFType;
use core_foundation::boolean::CFBoolean;
use core_foundation::dictionary::CFDictionary;
use core_foundation::string::{CFString, CFStringRef};
use std::ffi::c_void;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrusted() -> bool;
    fn AXIsProcessTrustedWithOptions(options: *const c_void) -> bool;
    static kAXTrustedCheckOptionPrompt: CFStringRef;
}

type CFNotificationCenterRef = *mut c_void;

type CFNotificationCallback = unsafe extern "C" fn(
    center: CFNotificationCenterRef,
    observer: *mut c_void,
    name: CFStringRef,
    object: *const c_void,
    user_info: *const c_void,
);

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFNotificationCenterGetDistributedCenter() -> CFNotificationCenterRef;
    fn CFNotificationCenterAddObserver(
        center: CFNotificationCenterRef,
        observer: *const c_void,
        call_back: CFNotificationCallback,
        name: CFStringRef,
        object: *const c_void,
        suspension_behavior: isize,
    );
    fn CFNotificationCenterRemoveObserver(
        center: CFNotificationCenterRef,
        observer: *const c_void,
        name: CFStringRef,
        object: *const c_void,
    );
}

// CFNotificationSuspensionBehaviorDeliverImmediately
const DELIVER_IMMEDIATELY: isize = 4;

/// Distributed notification posted when the accessibility permission
/// database changes. It is generic (not scoped to this process) and may
/// fire before the database is durably updated, so it is a hint to re-check
/// after a settle delay, not ground truth.
const ACCESSIBILITY_CHANGED: &str = "com.apple.accessibility.api";

/// Accessibility trust gate backed by the ApplicationServices API.
///
/// The trust state is never cached: every [`PermissionGate::check`] queries
/// the OS afresh.
pub struct AccessibilityGate;

impl PermissionGate for AccessibilityGate {
    fn check(&self) -> bool {
        // SAFETY: takes no arguments and only reads the trust state.
        unsafe { AXIsProcessTrusted() }
    }

    fn request_prompt(&self) {
        let key = unsafe { CFString::wrap_under_get_rule(kAXTrustedCheckOptionPrompt) };
        let options = CFDictionary::from_CFType_pairs(&[(key, CFBoolean::true_value())]);
        // The result is discarded: this call exists to cause a grant, not
        // to report one.
        unsafe {
            AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef() as *const c_void);
        }
    }
}

/// Open System Settings at the Privacy & Security > Accessibility pane.
pub fn open_accessibility_settings() -> Result<()> {
    let url = "x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility";
    // `open` returns as soon as the pane is handed off; waiting on it also
    // reaps the child.
    let status = Command::new("open")
        .arg(url)
        .status()
        .context("failed to open System Settings")?;
    ensure!(status.success(), "open exited with {}", status);
    Ok(())
}

/// Flag flipped by the permission-change notification and polled by the
/// capture loop. The callback does nothing but set the flag; the settle
/// delay and the actual re-check run on the capture thread.
pub(crate) struct PermissionSignal {
    notified: AtomicBool,
}

impl PermissionSignal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            notified: AtomicBool::new(false),
        })
    }

    /// Consume the pending notification, if any.
    pub fn take(&self) -> bool {
        self.notified.swap(false, Ordering::SeqCst)
    }
}

unsafe extern "C" fn permission_change_callback(
    _center: CFNotificationCenterRef,
    observer: *mut c_void,
    _name: CFStringRef,
    _object: *const c_void,
    _user_info: *const c_void,
) {
    let signal = &*(observer as *const PermissionSignal);
    signal.notified.store(true, Ordering::SeqCst);
}

/// Registration for accessibility permission-change notifications.
///
/// The observer is keyed on the signal's address, which the watcher keeps
/// alive; dropping the watcher removes the observer before the signal can
/// go away, so a late notification can never reach freed memory.
pub(crate) struct PermissionWatcher {
    signal: Arc<PermissionSignal>,
    name: CFString,
}

impl PermissionWatcher {
    /// Subscribe on the current thread's run loop.
    pub fn subscribe(signal: Arc<PermissionSignal>) -> Self {
        let name = CFString::new(ACCESSIBILITY_CHANGED);
        unsafe {
            CFNotificationCenterAddObserver(
                CFNotificationCenterGetDistributedCenter(),
                Arc::as_ptr(&signal) as *const c_void,
                permission_change_callback,
                name.as_concrete_TypeRef(),
                std::ptr::null(),
                DELIVER_IMMEDIATELY,
            );
        }
        Self { signal, name }
    }
}

impl Drop for PermissionWatcher {
    fn drop(&mut self) {
        unsafe {
            CFNotificationCenterRemoveObserver(
                CFNotificationCenterGetDistributedCenter(),
                Arc::as_ptr(&self.signal) as *const c_void,
                self.name.as_concrete_TypeRef(),
                std::ptr::null(),
            );
        }
    }
}
