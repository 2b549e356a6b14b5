//! Win32 backends: GDI capture, `SendInput` injection and the
//! `CF_UNICODETEXT` clipboard.
//!
//! # Safety
//!
//! All unsafe FFI calls are confined to this module. GDI objects are
//! released on every path before an error is returned.

use std::time::{Duration, Instant};

use windows::Win32::Foundation::{BOOL, HANDLE, HWND, LPARAM, RECT};
use windows::Win32::Graphics::Gdi::{
    BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BitBlt, CAPTUREBLT, CreateCompatibleBitmap,
    CreateCompatibleDC, DIB_RGB_COLORS, DeleteDC, DeleteObject, EnumDisplayMonitors, GetDC,
    GetDIBits, HDC, HGDIOBJ, HMONITOR, ROP_CODE, ReleaseDC, SRCCOPY, SelectObject,
};
use windows::Win32::System::DataExchange::{
    CloseClipboard, EmptyClipboard, OpenClipboard, SetClipboardData,
};
use windows::Win32::System::Memory::{GMEM_MOVEABLE, GlobalAlloc, GlobalFree, GlobalLock, GlobalUnlock};
use windows::Win32::System::Ole::CF_UNICODETEXT;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBD_EVENT_FLAGS, KEYBDINPUT,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, MOUSE_EVENT_FLAGS,
    MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEINPUT, SendInput, VIRTUAL_KEY, VK_BACK,
    VK_CONTROL, VK_DELETE, VK_DOWN, VK_END, VK_ESCAPE, VK_F1, VK_HOME, VK_LEFT, VK_LWIN,
    VK_MENU, VK_NEXT, VK_PRIOR, VK_RETURN, VK_RIGHT, VK_SHIFT, VK_SPACE, VK_TAB, VK_UP,
    VkKeyScanW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
    SM_YVIRTUALSCREEN, SetCursorPos, SetProcessDPIAware,
};

use crate::capability::{
    CaptureSession, ClipboardWriter, InputInjector, Key, PixelFormat, RawFrame, ScreenCapturer,
};
use crate::error::{CaptureError, InjectError};
use crate::geometry::MonitorGeometry;

// ── GdiCapturer ──────────────────────────────────────────────────

/// `BitBlt` screen capture.
///
/// Each [`open`](ScreenCapturer::open) re-enumerates the displays, so a
/// reopened session picks up topology and DPI changes.
#[derive(Debug)]
pub struct GdiCapturer;

impl GdiCapturer {
    pub fn new() -> Self {
        // Physical pixels, so click coordinates match the captured bitmap.
        let _ = unsafe { SetProcessDPIAware() };
        Self
    }
}

impl Default for GdiCapturer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenCapturer for GdiCapturer {
    fn open(&self) -> Result<Box<dyn CaptureSession>, CaptureError> {
        let displays = enumerate_displays()?;
        if displays.is_empty() {
            return Err(CaptureError::NoMonitors);
        }
        let desktop = virtual_desktop()
            .or_else(|| MonitorGeometry::bounding(&displays))
            .ok_or(CaptureError::NoMonitors)?;

        let mut monitors = Vec::with_capacity(displays.len() + 1);
        monitors.push(desktop);
        monitors.extend(displays);
        Ok(Box::new(GdiSession { monitors }))
    }
}

struct GdiSession {
    monitors: Vec<MonitorGeometry>,
}

impl CaptureSession for GdiSession {
    fn monitors(&self) -> Result<Vec<MonitorGeometry>, CaptureError> {
        Ok(self.monitors.clone())
    }

    fn grab(&mut self, monitor: &MonitorGeometry) -> Result<RawFrame, CaptureError> {
        let width = i32::try_from(monitor.width)
            .map_err(|_| CaptureError::Grab("monitor too wide".into()))?;
        let height = i32::try_from(monitor.height)
            .map_err(|_| CaptureError::Grab("monitor too tall".into()))?;
        if width == 0 || height == 0 {
            return Err(CaptureError::Grab("empty monitor rectangle".into()));
        }
        unsafe { grab_region(monitor.left, monitor.top, width, height) }
    }
}

fn enumerate_displays() -> Result<Vec<MonitorGeometry>, CaptureError> {
    unsafe extern "system" fn collect(
        _monitor: HMONITOR,
        _dc: HDC,
        rect: *mut RECT,
        data: LPARAM,
    ) -> BOOL {
        let out = unsafe { &mut *(data.0 as *mut Vec<MonitorGeometry>) };
        if let Some(r) = unsafe { rect.as_ref() } {
            out.push(MonitorGeometry::new(
                r.left,
                r.top,
                (r.right - r.left).max(0) as u32,
                (r.bottom - r.top).max(0) as u32,
            ));
        }
        BOOL(1)
    }

    let mut displays: Vec<MonitorGeometry> = Vec::new();
    let ok = unsafe {
        EnumDisplayMonitors(
            HDC::default(),
            None,
            Some(collect),
            LPARAM(&mut displays as *mut Vec<MonitorGeometry> as isize),
        )
    };
    if !ok.as_bool() {
        return Err(CaptureError::SessionOpen("EnumDisplayMonitors failed".into()));
    }
    Ok(displays)
}

fn virtual_desktop() -> Option<MonitorGeometry> {
    let (left, top, width, height) = unsafe {
        (
            GetSystemMetrics(SM_XVIRTUALSCREEN),
            GetSystemMetrics(SM_YVIRTUALSCREEN),
            GetSystemMetrics(SM_CXVIRTUALSCREEN),
            GetSystemMetrics(SM_CYVIRTUALSCREEN),
        )
    };
    (width > 0 && height > 0).then(|| MonitorGeometry::new(left, top, width as u32, height as u32))
}

unsafe fn grab_region(left: i32, top: i32, width: i32, height: i32) -> Result<RawFrame, CaptureError> {
    let timestamp = Instant::now();
    let screen = unsafe { GetDC(HWND::default()) };
    if screen.is_invalid() {
        return Err(CaptureError::Grab("GetDC failed".into()));
    }
    let memory = unsafe { CreateCompatibleDC(screen) };
    let bitmap = unsafe { CreateCompatibleBitmap(screen, width, height) };
    let previous = unsafe { SelectObject(memory, HGDIOBJ(bitmap.0)) };

    let blit = unsafe {
        BitBlt(
            memory,
            0,
            0,
            width,
            height,
            screen,
            left,
            top,
            ROP_CODE(SRCCOPY.0 | CAPTUREBLT.0),
        )
    };

    let mut info = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: width,
            // Negative height: top-down rows.
            biHeight: -height,
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        ..Default::default()
    };
    let stride = width as usize * 4;
    let mut data = vec![0u8; stride * height as usize];
    let rows = if blit.is_ok() {
        unsafe {
            GetDIBits(
                memory,
                bitmap,
                0,
                height as u32,
                Some(data.as_mut_ptr().cast()),
                &mut info,
                DIB_RGB_COLORS,
            )
        }
    } else {
        0
    };

    unsafe {
        SelectObject(memory, previous);
        let _ = DeleteObject(HGDIOBJ(bitmap.0));
        let _ = DeleteDC(memory);
        ReleaseDC(HWND::default(), screen);
    }

    blit.map_err(|e| CaptureError::Grab(format!("BitBlt failed: {e}")))?;
    if rows != height {
        return Err(CaptureError::Grab(format!("GetDIBits copied {rows} of {height} rows")));
    }

    Ok(RawFrame {
        width: width as u32,
        height: height as u32,
        stride: stride as u32,
        format: PixelFormat::Bgra8,
        data,
        timestamp,
    })
}

// ── Win32Injector ────────────────────────────────────────────────

/// `SetCursorPos` + `SendInput`. Coordinates are virtual-desktop pixels.
#[derive(Debug, Default)]
pub struct Win32Injector;

impl Win32Injector {
    pub fn new() -> Self {
        Self
    }
}

fn send(inputs: &[INPUT]) -> Result<(), InjectError> {
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        return Err(InjectError::Input(format!(
            "SendInput accepted {sent} of {} events",
            inputs.len()
        )));
    }
    Ok(())
}

fn mouse_input(flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn keyboard_input(vk: VIRTUAL_KEY, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

/// Virtual key for `key`, with the extended-key flag where needed.
fn virtual_key(key: Key) -> Result<(VIRTUAL_KEY, KEYBD_EVENT_FLAGS), InjectError> {
    let plain = KEYBD_EVENT_FLAGS(0);
    let vk = match key {
        Key::Enter => (VK_RETURN, plain),
        Key::Space => (VK_SPACE, plain),
        Key::Escape => (VK_ESCAPE, plain),
        Key::Tab => (VK_TAB, plain),
        Key::Backspace => (VK_BACK, plain),
        Key::Delete => (VK_DELETE, KEYEVENTF_EXTENDEDKEY),
        Key::Up => (VK_UP, KEYEVENTF_EXTENDEDKEY),
        Key::Down => (VK_DOWN, KEYEVENTF_EXTENDEDKEY),
        Key::Left => (VK_LEFT, KEYEVENTF_EXTENDEDKEY),
        Key::Right => (VK_RIGHT, KEYEVENTF_EXTENDEDKEY),
        Key::Home => (VK_HOME, KEYEVENTF_EXTENDEDKEY),
        Key::End => (VK_END, KEYEVENTF_EXTENDEDKEY),
        Key::PageUp => (VK_PRIOR, KEYEVENTF_EXTENDEDKEY),
        Key::PageDown => (VK_NEXT, KEYEVENTF_EXTENDEDKEY),
        Key::F(n) if (1..=12).contains(&n) => (VIRTUAL_KEY(VK_F1.0 + u16::from(n - 1)), plain),
        Key::F(n) => return Err(InjectError::UnknownKey(format!("F{n}"))),
        Key::Control => (VK_CONTROL, plain),
        Key::Alt => (VK_MENU, plain),
        Key::Shift => (VK_SHIFT, plain),
        Key::Meta => (VK_LWIN, plain),
        Key::Char(c) => {
            let mut unit = [0u16; 2];
            let scan = match c.encode_utf16(&mut unit) {
                [single] => unsafe { VkKeyScanW(*single) },
                _ => -1,
            };
            if scan == -1 {
                return Err(InjectError::UnknownKey(c.to_string()));
            }
            // Low byte is the key; the high byte holds shift state.
            (VIRTUAL_KEY((scan as u16) & 0xFF), plain)
        }
    };
    Ok(vk)
}

impl InputInjector for Win32Injector {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), InjectError> {
        unsafe { SetCursorPos(x, y) }
            .map_err(|e| InjectError::Input(format!("SetCursorPos failed: {e}")))
    }

    fn click(&mut self, x: i32, y: i32) -> Result<(), InjectError> {
        self.move_to(x, y)?;
        send(&[
            mouse_input(MOUSEEVENTF_LEFTDOWN),
            mouse_input(MOUSEEVENTF_LEFTUP),
        ])
    }

    fn key_tap(&mut self, key: Key) -> Result<(), InjectError> {
        if let Key::Char(c) = key {
            // Unicode injection types the character regardless of layout.
            let mut units = [0u16; 2];
            let mut inputs = Vec::with_capacity(4);
            for unit in c.encode_utf16(&mut units).iter() {
                inputs.push(keyboard_input(VIRTUAL_KEY(0), *unit, KEYEVENTF_UNICODE));
                inputs.push(keyboard_input(
                    VIRTUAL_KEY(0),
                    *unit,
                    KEYEVENTF_UNICODE | KEYEVENTF_KEYUP,
                ));
            }
            return send(&inputs);
        }
        let (vk, flags) = virtual_key(key)?;
        send(&[
            keyboard_input(vk, 0, flags),
            keyboard_input(vk, 0, flags | KEYEVENTF_KEYUP),
        ])
    }

    fn key_chord(&mut self, keys: &[Key]) -> Result<(), InjectError> {
        let resolved = keys
            .iter()
            .map(|k| virtual_key(*k))
            .collect::<Result<Vec<_>, _>>()?;
        let mut inputs = Vec::with_capacity(resolved.len() * 2);
        for (vk, flags) in &resolved {
            inputs.push(keyboard_input(*vk, 0, *flags));
        }
        for (vk, flags) in resolved.iter().rev() {
            inputs.push(keyboard_input(*vk, 0, *flags | KEYEVENTF_KEYUP));
        }
        send(&inputs)
    }
}

// ── Win32Clipboard ───────────────────────────────────────────────

const OPEN_ATTEMPTS: usize = 5;
const OPEN_RETRY: Duration = Duration::from_millis(10);

/// Writes `CF_UNICODETEXT` to the system clipboard.
#[derive(Debug, Default)]
pub struct Win32Clipboard;

impl Win32Clipboard {
    pub fn new() -> Self {
        Self
    }
}

fn clipboard_error(e: windows::core::Error) -> InjectError {
    InjectError::Clipboard(e.to_string())
}

impl ClipboardWriter for Win32Clipboard {
    fn set_text(&mut self, text: &str) -> Result<(), InjectError> {
        let wide: Vec<u16> = text.encode_utf16().chain(std::iter::once(0)).collect();

        // Another process may hold the clipboard briefly.
        let mut opened = unsafe { OpenClipboard(HWND::default()) };
        for _ in 1..OPEN_ATTEMPTS {
            if opened.is_ok() {
                break;
            }
            std::thread::sleep(OPEN_RETRY);
            opened = unsafe { OpenClipboard(HWND::default()) };
        }
        opened.map_err(clipboard_error)?;

        let result = unsafe { write_unicode(&wide) };
        let _ = unsafe { CloseClipboard() };
        result
    }
}

unsafe fn write_unicode(wide: &[u16]) -> Result<(), InjectError> {
    unsafe { EmptyClipboard() }.map_err(clipboard_error)?;

    let handle = unsafe { GlobalAlloc(GMEM_MOVEABLE, std::mem::size_of_val(wide)) }
        .map_err(clipboard_error)?;
    let dst = unsafe { GlobalLock(handle) } as *mut u16;
    if dst.is_null() {
        let _ = unsafe { GlobalFree(handle) };
        return Err(InjectError::Clipboard("GlobalLock failed".into()));
    }
    unsafe {
        std::ptr::copy_nonoverlapping(wide.as_ptr(), dst, wide.len());
        let _ = GlobalUnlock(handle);
    }

    // On success the system owns the allocation.
    if let Err(e) = unsafe { SetClipboardData(u32::from(CF_UNICODETEXT.0), HANDLE(handle.0)) } {
        let _ = unsafe { GlobalFree(handle) };
        return Err(clipboard_error(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keys_map_to_virtual_keys() {
        assert_eq!(virtual_key(Key::Enter).unwrap().0, VK_RETURN);
        assert_eq!(virtual_key(Key::F(5)).unwrap().0, VIRTUAL_KEY(VK_F1.0 + 4));
        assert_eq!(virtual_key(Key::Up).unwrap().1, KEYEVENTF_EXTENDEDKEY);
        assert!(virtual_key(Key::F(13)).is_err());
    }
}
