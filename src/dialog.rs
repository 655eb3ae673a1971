//! Blocking error dialogs.
//!
//! On Windows this is a native `MessageBoxW`; elsewhere `rfd` opens the
//! platform message dialog. Either way the calling thread waits until the
//! user dismisses it.

use log::error;

/// Shows one dialog and returns once it is dismissed.
pub type Present = fn(title: &str, text: &str);

pub struct Dialogs {
    present: Present,
}

impl Default for Dialogs {
    fn default() -> Self {
        Self {
            present: show_message_box,
        }
    }
}

impl Dialogs {
    #[cfg(test)]
    pub fn with_presenter(present: Present) -> Self {
        Self { present }
    }

    pub fn error(&self, title: &str, message: impl Into<String>) {
        let message = message.into();
        error!("{}: {}", title, message);
        (self.present)(title, &message);
    }
}

#[cfg(windows)]
fn show_message_box(title: &str, text: &str) {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging as wm;
    fn wide(s: &str) -> Vec<u16> {
        OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
    }
    let (text, title) = (wide(text), wide(title));
    unsafe {
        let _ = wm::MessageBoxW(
            HWND(std::ptr::null_mut()),
            windows::core::PCWSTR(text.as_ptr()),
            windows::core::PCWSTR(title.as_ptr()),
            wm::MB_OK | wm::MB_ICONERROR | wm::MB_TOPMOST | wm::MB_SETFOREGROUND,
        );
    }
}

#[cfg(not(windows))]
fn show_message_box(title: &str, text: &str) {
    let _ = rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Error)
        .set_title(title)
        .set_description(text)
        .set_buttons(rfd::MessageButtons::Ok)
        .show();
}
