//! OS backends for capture, input and the clipboard.
//!
//! # Platform
//!
//! Real backends exist for Windows only. Everywhere else
//! [`native`] returns backends whose calls fail with an `Unsupported`
//! error; the agent still starts, backs off on capture, and logs the
//! failed injections.

use std::sync::Arc;

use crate::capability::{ClipboardWriter, InputInjector, ScreenCapturer};

#[cfg(target_os = "windows")]
mod win32;
#[cfg(target_os = "windows")]
pub use self::win32::{GdiCapturer, Win32Clipboard, Win32Injector};

#[cfg(not(target_os = "windows"))]
mod unsupported;
#[cfg(not(target_os = "windows"))]
pub use self::unsupported::{UnsupportedCapturer, UnsupportedClipboard, UnsupportedInjector};

/// The capability set for the host OS.
pub struct Backends {
    pub capturer: Arc<dyn ScreenCapturer>,
    pub injector: Box<dyn InputInjector>,
    pub clipboard: Box<dyn ClipboardWriter>,
}

/// Backends for the current target.
#[cfg(target_os = "windows")]
pub fn native() -> Backends {
    Backends {
        capturer: Arc::new(GdiCapturer::new()),
        injector: Box::new(Win32Injector::new()),
        clipboard: Box::new(Win32Clipboard::new()),
    }
}

/// Backends for the current target.
#[cfg(not(target_os = "windows"))]
pub fn native() -> Backends {
    Backends {
        capturer: Arc::new(UnsupportedCapturer),
        injector: Box::new(UnsupportedInjector),
        clipboard: Box::new(UnsupportedClipboard),
    }
}
