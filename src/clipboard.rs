//! System clipboard text access.
//!
//! Windows goes through `clipboard-win`; other platforms use `arboard`.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read clipboard: {0}")]
    Read(String),
    #[error("failed to write clipboard: {0}")]
    Write(String),
}

pub trait ClipboardAccess: Send + Sync {
    fn read_text(&self) -> Result<String, ClipboardError>;
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

#[cfg(windows)]
pub use win::WinClipboard as SystemClipboard;

#[cfg(not(windows))]
pub use other::ArboardClipboard as SystemClipboard;

#[cfg(windows)]
mod win {
    use super::{ClipboardAccess, ClipboardError};

    pub struct WinClipboard;

    impl WinClipboard {
        pub fn new() -> Result<Self, ClipboardError> {
            Ok(Self)
        }
    }

    impl ClipboardAccess for WinClipboard {
        fn read_text(&self) -> Result<String, ClipboardError> {
            clipboard_win::get_clipboard_string().map_err(|e| ClipboardError::Read(e.to_string()))
        }

        fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
            clipboard_win::set_clipboard_string(text).map_err(|e| ClipboardError::Write(e.to_string()))
        }
    }
}

#[cfg(not(windows))]
mod other {
    use super::{ClipboardAccess, ClipboardError};
    use std::sync::Mutex;

    /// Holds one `arboard::Clipboard` for the whole session so text we write
    /// stays owned by this process on X11.
    pub struct ArboardClipboard {
        inner: Mutex<arboard::Clipboard>,
    }

    impl ArboardClipboard {
        pub fn new() -> Result<Self, ClipboardError> {
            let inner = arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
            Ok(Self { inner: Mutex::new(inner) })
        }
    }

    impl ClipboardAccess for ArboardClipboard {
        fn read_text(&self) -> Result<String, ClipboardError> {
            let mut cb = self
                .inner
                .lock()
                .map_err(|_| ClipboardError::Unavailable("clipboard lock poisoned".into()))?;
            match cb.get_text() {
                Ok(text) => Ok(text),
                // Non-text content reads as empty, which the monitor ignores.
                Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
                Err(e) => Err(ClipboardError::Read(e.to_string())),
            }
        }

        fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
            let mut cb = self
                .inner
                .lock()
                .map_err(|_| ClipboardError::Unavailable("clipboard lock poisoned".into()))?;
            cb.set_text(text.to_owned()).map_err(|e| ClipboardError::Write(e.to_string()))
        }
    }
}
