//! Serialised access to the input and clipboard capabilities.
//!
//! The dispatcher and the auto-accept loop both click and type. Neither
//! backend is assumed reentrant, so every call goes through one lock.
//! The lock is held for a single capability call, never across a settle
//! delay.

use parking_lot::Mutex;

use crate::capability::{ClipboardWriter, InputInjector, Keystroke};
use crate::error::InjectError;

struct Devices {
    injector: Box<dyn InputInjector>,
    clipboard: Box<dyn ClipboardWriter>,
}

pub struct Controls {
    devices: Mutex<Devices>,
}

impl Controls {
    pub fn new(injector: Box<dyn InputInjector>, clipboard: Box<dyn ClipboardWriter>) -> Self {
        Self {
            devices: Mutex::new(Devices {
                injector,
                clipboard,
            }),
        }
    }

    /// Left-click at a real-space point.
    pub fn click(&self, x: i32, y: i32) -> Result<(), InjectError> {
        self.devices.lock().injector.click(x, y)
    }

    pub fn move_to(&self, x: i32, y: i32) -> Result<(), InjectError> {
        self.devices.lock().injector.move_to(x, y)
    }

    pub fn press(&self, keystroke: &Keystroke) -> Result<(), InjectError> {
        self.devices.lock().injector.press(keystroke)
    }

    pub fn set_clipboard(&self, text: &str) -> Result<(), InjectError> {
        self.devices.lock().clipboard.set_text(text)
    }
}

impl std::fmt::Debug for Controls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controls").finish_non_exhaustive()
    }
}
