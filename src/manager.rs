//! Interception lifecycle orchestration.
//!
//! [`HotkeyManager`] ties the permission gate, the event tap, and the key
//! tracker together: it checks permission at construction, creates the tap
//! when allowed, feeds every captured event through the tracker, reports the
//! match level to the consumer, and decides whether each event is swallowed.
//!
//! The manager is generic over [`PermissionGate`] and [`EventTap`] so the
//! lifecycle can be exercised without the OS; the macOS bindings live in
//! [`crate::macos`].

use crate::error::HotkeyError;
use crate::event::{KeyEvent, TapDecision};
use crate::hotkey::Hotkey;
use crate::state::KeyTracker;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Wait after a permission-change notification before re-checking, so the
/// OS's permission database has settled. The notification is a hint, not
/// ground truth.
pub const PERMISSION_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Callback invoked with the match value after every processed event.
pub type MatchCallback = Box<dyn FnMut(bool) + Send>;

/// Callback receiving lifecycle failures.
pub type ErrorCallback = Box<dyn FnMut(HotkeyError) + Send>;

/// Handler installed into the tap; must complete in effectively-constant
/// time, since the OS disables a tap whose callback is too slow to return.
pub type EventHandler = Box<dyn FnMut(KeyEvent) -> TapDecision + Send>;

/// Query-and-prompt interface for the OS trust permission.
pub trait PermissionGate {
    /// Non-intrusive query of the current trust state. Never prompts, and
    /// the result is not cached anywhere: callers re-query on demand.
    fn check(&self) -> bool;

    /// Best-effort: trigger the OS permission prompt if not already granted.
    /// Exists to cause a grant, not to report one; failures are discarded.
    fn request_prompt(&self);
}

/// A privileged event-capture registration. At most one capture is live per
/// tap instance; `create` and `destroy` are both idempotent.
pub trait EventTap {
    /// Create the capture and register it with the host dispatch loop so
    /// that `handler` runs on that loop's thread. A second call while a
    /// capture is live is a no-op that keeps the existing handler.
    fn create(&mut self, handler: EventHandler) -> Result<(), HotkeyError>;

    /// Disable and release the capture. Safe to call when none exists.
    fn destroy(&mut self);

    /// Whether a capture is currently live.
    fn is_active(&self) -> bool;

    /// Whether the OS disabled the capture since the last call. Consumes
    /// the flag.
    fn take_disabled(&mut self) -> bool {
        false
    }
}

/// Manager lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    /// Permission denied; waiting for a permission-change notification.
    AwaitingPermission,
    /// The tap is live and processing events.
    Active,
    /// Tap creation failed or the tap was revoked at runtime. Only a fresh
    /// permission re-check reopens the lifecycle.
    Failed,
    /// [`HotkeyManager::teardown`] was called. Terminal: re-checks and
    /// servicing are no-ops from here on.
    TornDown,
}

/// Per-event processing shared with the tap handler: tracker update, match
/// report, swallow verdict.
struct MatchEngine {
    tracker: KeyTracker,
    on_match: MatchCallback,
}

impl MatchEngine {
    fn process(&mut self, event: KeyEvent) -> TapDecision {
        let matched = self.tracker.apply(event);
        // Level-triggered: reported on every event, changed or not.
        (self.on_match)(matched);
        if matched {
            TapDecision::Swallow
        } else {
            TapDecision::Forward
        }
    }
}

/// Orchestrates the permission gate, the event tap, and the key tracker.
///
/// All methods must be called from the thread that owns the tap's dispatch
/// loop; the handler installed into the tap touches the same state.
pub struct HotkeyManager<G: PermissionGate, T: EventTap> {
    gate: G,
    tap: T,
    engine: Arc<Mutex<MatchEngine>>,
    on_error: ErrorCallback,
    lifecycle: Lifecycle,
}

impl<G: PermissionGate, T: EventTap> HotkeyManager<G, T> {
    /// Build the manager and immediately run the construction-time
    /// permission check: granted creates the tap, denied emits
    /// [`HotkeyError::PermissionDenied`] and waits.
    pub fn new(
        gate: G,
        tap: T,
        target: Hotkey,
        on_match: MatchCallback,
        on_error: ErrorCallback,
    ) -> Self {
        let engine = Arc::new(Mutex::new(MatchEngine {
            tracker: KeyTracker::new(target),
            on_match,
        }));
        let mut manager = Self {
            gate,
            tap,
            engine,
            on_error,
            lifecycle: Lifecycle::Uninitialized,
        };
        manager.initialize();
        manager
    }

    fn initialize(&mut self) {
        if self.gate.check() {
            self.activate();
        } else {
            self.emit(HotkeyError::PermissionDenied);
            self.lifecycle = Lifecycle::AwaitingPermission;
        }
    }

    fn activate(&mut self) {
        let engine = Arc::clone(&self.engine);
        // The handler must never block: on lock contention the event is
        // forwarded untouched rather than stalling the dispatch loop.
        let handler: EventHandler = Box::new(move |event| match engine.try_lock() {
            Ok(mut engine) => engine.process(event),
            Err(_) => TapDecision::Forward,
        });
        match self.tap.create(handler) {
            Ok(()) => {
                log::debug!("event tap active");
                self.lifecycle = Lifecycle::Active;
            }
            Err(err) => {
                self.tap.destroy();
                self.emit(err);
                self.lifecycle = Lifecycle::Failed;
            }
        }
    }

    /// Re-run the permission check after a change notification has settled.
    ///
    /// Granted reopens the lifecycle from any state (tap creation is
    /// idempotent, so this is a no-op while already active). Denied emits
    /// [`HotkeyError::PermissionDenied`], destroying the tap first if one
    /// was live.
    pub fn recheck_permission(&mut self) {
        if self.lifecycle == Lifecycle::TornDown {
            return;
        }
        if self.gate.check() {
            self.activate();
        } else {
            if self.tap.is_active() {
                self.tap.destroy();
            }
            self.emit(HotkeyError::PermissionDenied);
            self.lifecycle = Lifecycle::AwaitingPermission;
        }
    }

    /// Fold in runtime tap revocation: if the OS disabled the tap since the
    /// last call, destroy it and report [`HotkeyError::TapCreationFailed`].
    /// Called periodically by the dispatch-loop driver.
    pub fn service(&mut self) {
        if self.lifecycle == Lifecycle::Active && self.tap.take_disabled() {
            log::warn!("event tap disabled by the OS");
            self.tap.destroy();
            self.emit(HotkeyError::TapCreationFailed);
            self.lifecycle = Lifecycle::Failed;
        }
    }

    /// Destroy the tap and leave the state machine for good: once torn
    /// down, a late permission re-check or servicing pass cannot resurrect
    /// the tap. Idempotent.
    pub fn teardown(&mut self) {
        self.tap.destroy();
        self.lifecycle = Lifecycle::TornDown;
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn gate(&self) -> &G {
        &self.gate
    }

    fn emit(&mut self, err: HotkeyError) {
        log::error!("{}", err);
        (self.on_error)(err);
    }
}

impl<G: PermissionGate, T: EventTap> Drop for HotkeyManager<G, T> {
    fn drop(&mut self) {
        self.tap.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::KeyEvent::{KeyDown, KeyUp, ModifierChange};
    use crate::key::KeyCode;
    use crate::modifiers::ModifierMask;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeGate {
        granted: Arc<AtomicBool>,
        prompts: Arc<AtomicUsize>,
    }

    impl PermissionGate for FakeGate {
        fn check(&self) -> bool {
            self.granted.load(Ordering::SeqCst)
        }

        fn request_prompt(&self) {
            self.prompts.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeTap {
        active: bool,
        fail_create: bool,
        disabled: bool,
        handler: Option<EventHandler>,
        create_calls: usize,
    }

    impl EventTap for FakeTap {
        fn create(&mut self, handler: EventHandler) -> Result<(), HotkeyError> {
            self.create_calls += 1;
            if self.active {
                return Ok(());
            }
            if self.fail_create {
                return Err(HotkeyError::TapCreationFailed);
            }
            self.handler = Some(handler);
            self.active = true;
            Ok(())
        }

        fn destroy(&mut self) {
            self.active = false;
            self.handler = None;
        }

        fn is_active(&self) -> bool {
            self.active
        }

        fn take_disabled(&mut self) -> bool {
            std::mem::take(&mut self.disabled)
        }
    }

    struct Harness {
        manager: HotkeyManager<FakeGate, FakeTap>,
        granted: Arc<AtomicBool>,
        matches: Arc<Mutex<Vec<bool>>>,
        errors: Arc<Mutex<Vec<HotkeyError>>>,
    }

    impl Harness {
        fn new(target: Hotkey, granted: bool, fail_create: bool) -> Self {
            let granted = Arc::new(AtomicBool::new(granted));
            let matches: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));
            let errors: Arc<Mutex<Vec<HotkeyError>>> = Arc::new(Mutex::new(Vec::new()));

            let gate = FakeGate {
                granted: Arc::clone(&granted),
                prompts: Arc::new(AtomicUsize::new(0)),
            };
            let tap = FakeTap {
                fail_create,
                ..FakeTap::default()
            };
            let matches_sink = Arc::clone(&matches);
            let errors_sink = Arc::clone(&errors);
            let manager = HotkeyManager::new(
                gate,
                tap,
                target,
                Box::new(move |m| matches_sink.lock().unwrap().push(m)),
                Box::new(move |e| errors_sink.lock().unwrap().push(e)),
            );

            Self {
                manager,
                granted,
                matches,
                errors,
            }
        }

        /// Deliver an event through the handler installed into the fake tap,
        /// as the dispatch loop would.
        fn feed(&mut self, event: KeyEvent) -> TapDecision {
            let handler = self
                .manager
                .tap
                .handler
                .as_mut()
                .expect("no tap handler installed");
            handler(event)
        }

        fn errors(&self) -> Vec<HotkeyError> {
            self.errors.lock().unwrap().clone()
        }

        fn matches(&self) -> Vec<bool> {
            self.matches.lock().unwrap().clone()
        }
    }

    fn cmd_1() -> Hotkey {
        Hotkey::with_modifiers(KeyCode(1), ModifierMask::COMMAND)
    }

    #[test]
    fn test_granted_construction_goes_active() {
        let h = Harness::new(cmd_1(), true, false);
        assert_eq!(h.manager.lifecycle(), Lifecycle::Active);
        assert!(h.manager.tap.is_active());
        assert!(h.errors().is_empty());
    }

    #[test]
    fn test_denied_construction_awaits_permission() {
        let h = Harness::new(cmd_1(), false, false);
        assert_eq!(h.manager.lifecycle(), Lifecycle::AwaitingPermission);
        assert!(!h.manager.tap.is_active());
        assert_eq!(h.manager.tap.create_calls, 0);
        assert_eq!(h.errors(), vec![HotkeyError::PermissionDenied]);
    }

    #[test]
    fn test_grant_after_denial_recovers() {
        // Scenario: denied at construction, permission granted later, the
        // settled re-check creates the tap and events flow normally.
        let mut h = Harness::new(cmd_1(), false, false);
        assert_eq!(h.errors(), vec![HotkeyError::PermissionDenied]);

        h.granted.store(true, Ordering::SeqCst);
        h.manager.recheck_permission();
        assert_eq!(h.manager.lifecycle(), Lifecycle::Active);
        assert!(h.manager.tap.is_active());

        assert_eq!(
            h.feed(ModifierChange(ModifierMask::COMMAND)),
            TapDecision::Forward
        );
        assert_eq!(h.feed(KeyDown(KeyCode(1))), TapDecision::Swallow);
        assert_eq!(h.matches(), vec![false, true]);
    }

    #[test]
    fn test_denied_recheck_emits_again() {
        let mut h = Harness::new(cmd_1(), false, false);
        h.manager.recheck_permission();
        assert_eq!(
            h.errors(),
            vec![HotkeyError::PermissionDenied, HotkeyError::PermissionDenied]
        );
        assert_eq!(h.manager.lifecycle(), Lifecycle::AwaitingPermission);
    }

    #[test]
    fn test_create_failure_goes_failed() {
        // Scenario: permission granted but the tap cannot be created.
        let h = Harness::new(cmd_1(), true, true);
        assert_eq!(h.manager.lifecycle(), Lifecycle::Failed);
        assert!(!h.manager.tap.is_active());
        assert_eq!(h.errors(), vec![HotkeyError::TapCreationFailed]);
    }

    #[test]
    fn test_runtime_revocation_goes_failed() {
        let mut h = Harness::new(cmd_1(), true, false);
        h.manager.tap.disabled = true;
        h.manager.service();
        assert_eq!(h.manager.lifecycle(), Lifecycle::Failed);
        assert!(!h.manager.tap.is_active());
        assert_eq!(h.errors(), vec![HotkeyError::TapCreationFailed]);

        // Further servicing does not emit again.
        h.manager.service();
        assert_eq!(h.errors().len(), 1);
    }

    #[test]
    fn test_recheck_while_active_keeps_single_tap() {
        let mut h = Harness::new(cmd_1(), true, false);
        h.manager.recheck_permission();
        assert_eq!(h.manager.lifecycle(), Lifecycle::Active);
        assert!(h.manager.tap.is_active());
        // The idempotent create left the original handler in place.
        assert_eq!(h.feed(KeyDown(KeyCode(9))), TapDecision::Forward);
    }

    #[test]
    fn test_denied_recheck_while_active_destroys_tap() {
        let mut h = Harness::new(cmd_1(), true, false);
        h.granted.store(false, Ordering::SeqCst);
        h.manager.recheck_permission();
        assert_eq!(h.manager.lifecycle(), Lifecycle::AwaitingPermission);
        assert!(!h.manager.tap.is_active());
        assert_eq!(h.errors(), vec![HotkeyError::PermissionDenied]);
    }

    #[test]
    fn test_match_reported_on_every_event() {
        // Level-triggered reporting: one callback per event, including
        // events that do not change the match value.
        let mut h = Harness::new(cmd_1(), true, false);
        h.feed(KeyDown(KeyCode(5)));
        h.feed(KeyDown(KeyCode(6)));
        h.feed(KeyUp(KeyCode(5)));
        h.feed(KeyUp(KeyCode(6)));
        assert_eq!(h.matches(), vec![false, false, false, false]);
    }

    #[test]
    fn test_hold_and_release_sequence() {
        // Target Cmd+1: modifiers down, key down (swallowed), key up,
        // modifiers up.
        let mut h = Harness::new(cmd_1(), true, false);
        assert_eq!(
            h.feed(ModifierChange(ModifierMask::COMMAND)),
            TapDecision::Forward
        );
        assert_eq!(h.feed(KeyDown(KeyCode(1))), TapDecision::Swallow);
        assert_eq!(h.feed(KeyUp(KeyCode(1))), TapDecision::Forward);
        assert_eq!(
            h.feed(ModifierChange(ModifierMask::NONE)),
            TapDecision::Forward
        );
        assert_eq!(h.matches(), vec![false, true, false, false]);
    }

    #[test]
    fn test_bare_key_forwarded_when_modifiers_required() {
        let target = Hotkey::with_modifiers(
            KeyCode(49),
            ModifierMask::COMMAND.with(ModifierMask::SHIFT),
        );
        let mut h = Harness::new(target, true, false);
        assert_eq!(h.feed(KeyDown(KeyCode(49))), TapDecision::Forward);
        assert_eq!(h.matches(), vec![false]);
    }

    #[test]
    fn test_unrelated_release_swallowed_while_combination_held() {
        // Sharp edge of the swallow policy: any event processed while the
        // combination evaluates as exactly held is consumed, even a release
        // of a key that is not part of the target.
        let mut h = Harness::new(cmd_1(), true, false);
        h.feed(ModifierChange(ModifierMask::COMMAND));
        assert_eq!(h.feed(KeyDown(KeyCode(1))), TapDecision::Swallow);
        // A second key breaks the match; its down is forwarded.
        assert_eq!(h.feed(KeyDown(KeyCode(9))), TapDecision::Forward);
        // Releasing it restores the exact match, so the release itself is
        // swallowed.
        assert_eq!(h.feed(KeyUp(KeyCode(9))), TapDecision::Swallow);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut h = Harness::new(cmd_1(), true, false);
        h.manager.teardown();
        assert!(!h.manager.tap.is_active());
        h.manager.teardown();
        assert!(!h.manager.tap.is_active());
        assert_eq!(h.manager.lifecycle(), Lifecycle::TornDown);
    }

    #[test]
    fn test_teardown_without_tap_is_noop() {
        let mut h = Harness::new(cmd_1(), false, false);
        h.manager.teardown();
        assert!(!h.manager.tap.is_active());
        assert_eq!(h.manager.lifecycle(), Lifecycle::TornDown);
    }

    #[test]
    fn test_recheck_after_teardown_does_not_resurrect() {
        // Teardown is terminal: even with permission granted, a late
        // re-check or servicing pass must not recreate the tap.
        let mut h = Harness::new(cmd_1(), true, false);
        h.manager.teardown();
        assert_eq!(h.manager.lifecycle(), Lifecycle::TornDown);

        h.manager.recheck_permission();
        assert_eq!(h.manager.lifecycle(), Lifecycle::TornDown);
        assert!(!h.manager.tap.is_active());
        assert!(h.errors().is_empty());

        h.manager.service();
        assert_eq!(h.manager.lifecycle(), Lifecycle::TornDown);
        assert!(!h.manager.tap.is_active());
    }

    #[test]
    fn test_denied_recheck_after_teardown_emits_nothing() {
        let mut h = Harness::new(cmd_1(), false, false);
        h.manager.teardown();
        h.manager.recheck_permission();
        assert_eq!(h.manager.lifecycle(), Lifecycle::TornDown);
        // Only the construction-time denial was reported.
        assert_eq!(h.errors(), vec![HotkeyError::PermissionDenied]);
    }
}
