//! Session-wide CGEventTap lifecycle.

use crate::error::HotkeyError;
use crate::event::{KeyEvent, TapDecision};
use crate::key::KeyCode;
use crate::manager::{EventHandler, EventTap};
use crate::modifiers::ModifierMask;
use core_foundation::base::TCFType;
use core_foundation::mach_port::{CFMachPort, CFMachPortRef};
use core_foundation::runloop::{kCFRunLoopDefaultMode, CFRunLoop, CFRunLoopSource};
use core_graphics::event::{
    CGEvent, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventTapProxy,
    CGEventType, EventField,
};
use foreign_types::ForeignType;
use std::ffi::c_void;
use std::mem::ManuallyDrop;

/// CGEventMask for raw FFI.
type CGEventMask = u64;

type RawTapCallback = unsafe extern "C" fn(
    proxy: CGEventTapProxy,
    event_type: CGEventType,
    event: *mut c_void,
    user_info: *mut c_void,
) -> *mut c_void;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapCreate(
        tap: CGEventTapLocation,
        place: CGEventTapPlacement,
        options: CGEventTapOptions,
        events_of_interest: CGEventMask,
        callback: RawTapCallback,
        user_info: *mut c_void,
    ) -> CFMachPortRef;

    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
}

// CGEventType raw values (the enum does not implement PartialEq).
const EVENT_KEY_DOWN: u32 = 10;
const EVENT_KEY_UP: u32 = 11;
const EVENT_FLAGS_CHANGED: u32 = 12;
// Delivered in-band when the OS disables the tap: a callback too slow to
// return, or a user request.
const EVENT_TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;
const EVENT_TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;

/// State handed to the C callback through the user-info pointer.
struct TapShared {
    handler: EventHandler,
    disabled: bool,
}

/// An active (swallow-capable) session event tap for key transitions.
///
/// Must be created, polled, and destroyed on the thread that owns the run
/// loop it registers into; the callback executes on that loop.
pub struct SessionTap {
    port: Option<CFMachPort>,
    source: Option<CFRunLoopSource>,
    shared: Option<*mut TapShared>,
}

impl SessionTap {
    pub fn new() -> Self {
        Self {
            port: None,
            source: None,
            shared: None,
        }
    }
}

impl Default for SessionTap {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTap for SessionTap {
    fn create(&mut self, handler: EventHandler) -> Result<(), HotkeyError> {
        if self.port.is_some() {
            return Ok(());
        }

        let mask: CGEventMask = (1 << EVENT_KEY_DOWN as u64)
            | (1 << EVENT_KEY_UP as u64)
            | (1 << EVENT_FLAGS_CHANGED as u64);

        let shared = Box::into_raw(Box::new(TapShared {
            handler,
            disabled: false,
        }));

        let port_ref = unsafe {
            CGEventTapCreate(
                CGEventTapLocation::Session,
                CGEventTapPlacement::HeadInsertEventTap,
                CGEventTapOptions::Default,
                mask,
                tap_callback,
                shared as *mut c_void,
            )
        };

        if port_ref.is_null() {
            unsafe { drop(Box::from_raw(shared)) };
            return Err(HotkeyError::TapCreationFailed);
        }

        let port = unsafe { CFMachPort::wrap_under_create_rule(port_ref) };
        let source = match port.create_runloop_source(0) {
            Ok(source) => source,
            Err(_) => {
                unsafe { drop(Box::from_raw(shared)) };
                return Err(HotkeyError::TapCreationFailed);
            }
        };

        // Register on the current thread's loop; the callback runs there,
        // serialized with everything else the loop dispatches.
        CFRunLoop::get_current().add_source(&source, unsafe { kCFRunLoopDefaultMode });
        unsafe { CGEventTapEnable(port.as_concrete_TypeRef(), true) };

        self.port = Some(port);
        self.source = Some(source);
        self.shared = Some(shared);
        log::info!("session event tap created");
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(port) = self.port.take() {
            unsafe { CGEventTapEnable(port.as_concrete_TypeRef(), false) };
            if let Some(source) = self.source.take() {
                CFRunLoop::get_current().remove_source(&source, unsafe { kCFRunLoopDefaultMode });
            }
            // The source is gone from the loop and the loop runs on this
            // thread, so no callback can still be executing.
            if let Some(shared) = self.shared.take() {
                unsafe { drop(Box::from_raw(shared)) };
            }
            log::info!("session event tap destroyed");
        }
    }

    fn is_active(&self) -> bool {
        self.port.is_some()
    }

    fn take_disabled(&mut self) -> bool {
        match self.shared {
            Some(shared) => unsafe { std::mem::take(&mut (*shared).disabled) },
            None => false,
        }
    }
}

impl Drop for SessionTap {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// The C trampoline. Recovers the boxed handler state from the user-info
/// pointer, converts the raw event, and maps the swallow verdict onto the
/// return value: the original event pointer forwards it, null consumes it.
unsafe extern "C" fn tap_callback(
    _proxy: CGEventTapProxy,
    event_type: CGEventType,
    event_ref: *mut c_void,
    user_info: *mut c_void,
) -> *mut c_void {
    let shared = &mut *(user_info as *mut TapShared);
    let raw_type = event_type as u32;

    if raw_type == EVENT_TAP_DISABLED_BY_TIMEOUT || raw_type == EVENT_TAP_DISABLED_BY_USER_INPUT {
        shared.disabled = true;
        return event_ref;
    }

    // Borrow the event without taking ownership; the OS owns it.
    let event = ManuallyDrop::new(CGEvent::from_ptr(event_ref as *mut _));

    let key_event = match raw_type {
        EVENT_KEY_DOWN | EVENT_KEY_UP => {
            let code =
                event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
            if raw_type == EVENT_KEY_DOWN {
                KeyEvent::KeyDown(KeyCode(code))
            } else {
                KeyEvent::KeyUp(KeyCode(code))
            }
        }
        EVENT_FLAGS_CHANGED => {
            KeyEvent::ModifierChange(ModifierMask::from_raw(event.get_flags().bits()))
        }
        _ => return event_ref,
    };

    match (shared.handler)(key_event) {
        TapDecision::Forward => event_ref,
        TapDecision::Swallow => std::ptr::null_mut(),
    }
}
