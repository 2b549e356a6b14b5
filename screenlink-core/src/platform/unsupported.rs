//! Stand-ins for targets without a native backend.

use crate::capability::{CaptureSession, ClipboardWriter, InputInjector, Key, ScreenCapturer};
use crate::error::{CaptureError, InjectError};

#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedCapturer;

impl ScreenCapturer for UnsupportedCapturer {
    fn open(&self) -> Result<Box<dyn CaptureSession>, CaptureError> {
        Err(CaptureError::Unsupported)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedInjector;

impl InputInjector for UnsupportedInjector {
    fn move_to(&mut self, _x: i32, _y: i32) -> Result<(), InjectError> {
        Err(InjectError::Unsupported)
    }

    fn click(&mut self, _x: i32, _y: i32) -> Result<(), InjectError> {
        Err(InjectError::Unsupported)
    }

    fn key_tap(&mut self, _key: Key) -> Result<(), InjectError> {
        Err(InjectError::Unsupported)
    }

    fn key_chord(&mut self, _keys: &[Key]) -> Result<(), InjectError> {
        Err(InjectError::Unsupported)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedClipboard;

impl ClipboardWriter for UnsupportedClipboard {
    fn set_text(&mut self, _text: &str) -> Result<(), InjectError> {
        Err(InjectError::Unsupported)
    }
}
