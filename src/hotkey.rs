//! Global copy-shortcut detection.
//!
//! On Windows a low-level keyboard hook watches for the combination. Elsewhere
//! an `rdev` listener observes the global key stream. Both only look at keys
//! and always let them through, so the focused application still copies.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

pub type Trigger = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HotkeyError {
    #[error("invalid key combination '{0}'")]
    InvalidCombo(String),
    #[error("failed to register hotkey: {0}")]
    Register(String),
    #[error("failed to unregister hotkeys: {0}")]
    Unregister(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCombo {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    /// Uppercase ASCII letter or digit.
    pub key: char,
}

impl KeyCombo {
    pub const COPY: KeyCombo = KeyCombo { ctrl: true, shift: false, alt: false, key: 'C' };
}

impl FromStr for KeyCombo {
    type Err = HotkeyError;

    /// Parses strings such as `ctrl+c` or `Ctrl+Shift+T`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || HotkeyError::InvalidCombo(s.to_string());
        let mut combo = KeyCombo { ctrl: false, shift: false, alt: false, key: '\0' };
        for part in s.split('+').map(str::trim) {
            match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => combo.ctrl = true,
                "shift" => combo.shift = true,
                "alt" => combo.alt = true,
                k if k.len() == 1 && combo.key == '\0' => {
                    let c = k.chars().next().ok_or_else(invalid)?;
                    if !c.is_ascii_alphanumeric() {
                        return Err(invalid());
                    }
                    combo.key = c.to_ascii_uppercase();
                }
                _ => return Err(invalid()),
            }
        }
        if combo.key == '\0' {
            return Err(invalid());
        }
        Ok(combo)
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            write!(f, "Ctrl+")?;
        }
        if self.alt {
            write!(f, "Alt+")?;
        }
        if self.shift {
            write!(f, "Shift+")?;
        }
        write!(f, "{}", self.key)
    }
}

pub trait HotkeyListener: Send {
    /// Starts delivering `trigger` calls whenever `combo` fires.
    fn register(&mut self, combo: KeyCombo, trigger: Trigger) -> Result<(), HotkeyError>;

    /// Releases every combination registered through this listener.
    fn unregister_all(&mut self) -> Result<(), HotkeyError>;
}

/// Picks the listener for the current platform.
pub fn system_listener() -> Box<dyn HotkeyListener> {
    #[cfg(windows)]
    {
        Box::new(win_hook::KeyboardHook::new())
    }
    #[cfg(not(windows))]
    {
        Box::new(key_listener::KeyListener)
    }
}

#[cfg(windows)]
mod win_hook {
    use super::{HotkeyError, HotkeyListener, KeyCombo, Trigger};
    use log::{debug, info};
    use once_cell::sync::Lazy;
    use std::sync::{mpsc, Mutex};
    use std::thread::{self, JoinHandle};
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::Input::KeyboardAndMouse as km;
    use windows::Win32::UI::WindowsAndMessaging as wm;

    const LLKHF_INJECTED: u32 = 0x10;

    static REGISTERED: Lazy<Mutex<Vec<(KeyCombo, Trigger)>>> = Lazy::new(|| Mutex::new(Vec::new()));

    fn pressed(vk: km::VIRTUAL_KEY) -> bool {
        unsafe { km::GetAsyncKeyState(vk.0 as i32) < 0 }
    }

    unsafe extern "system" fn hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
        let msg = wparam.0 as u32;
        if code >= 0 && (msg == wm::WM_KEYDOWN || msg == wm::WM_SYSKEYDOWN) {
            let kbd = &*(lparam.0 as *const wm::KBDLLHOOKSTRUCT);
            if kbd.flags.0 & LLKHF_INJECTED == 0 {
                let fire: Vec<Trigger> = match REGISTERED.lock() {
                    Ok(regs) => regs
                        .iter()
                        .filter(|(c, _)| {
                            c.key as u32 == kbd.vkCode
                                && c.ctrl == pressed(km::VK_CONTROL)
                                && c.shift == pressed(km::VK_SHIFT)
                                && c.alt == pressed(km::VK_MENU)
                        })
                        .map(|(_, t)| t.clone())
                        .collect(),
                    Err(_) => Vec::new(),
                };
                for trigger in fire {
                    trigger();
                }
            }
        }
        // Never swallow the key: the focused app must still see the copy.
        wm::CallNextHookEx(wm::HHOOK::default(), code, wparam, lparam)
    }

    pub struct KeyboardHook {
        worker: Option<(u32, JoinHandle<()>)>,
    }

    impl KeyboardHook {
        pub fn new() -> Self {
            Self { worker: None }
        }

        fn spawn_worker(&mut self) -> Result<(), HotkeyError> {
            let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, String>>();
            let handle = thread::spawn(move || unsafe {
                let hinst = match GetModuleHandleW(PCWSTR::null()) {
                    Ok(m) => HINSTANCE(m.0),
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let hook = match wm::SetWindowsHookExW(wm::WH_KEYBOARD_LL, Some(hook_proc), hinst, 0) {
                    Ok(h) => h,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(GetCurrentThreadId()));
                debug!("Keyboard hook installed");
                loop {
                    let mut msg = wm::MSG::default();
                    let got = wm::GetMessageW(&mut msg, HWND(std::ptr::null_mut()), 0, 0);
                    if got.0 <= 0 {
                        break;
                    }
                    let _ = wm::TranslateMessage(&msg);
                    wm::DispatchMessageW(&msg);
                }
                let _ = wm::UnhookWindowsHookEx(hook);
                debug!("Keyboard hook removed");
            });
            match ready_rx.recv() {
                Ok(Ok(thread_id)) => {
                    self.worker = Some((thread_id, handle));
                    Ok(())
                }
                Ok(Err(e)) => {
                    let _ = handle.join();
                    Err(HotkeyError::Register(e))
                }
                Err(_) => Err(HotkeyError::Register("hook thread exited early".into())),
            }
        }
    }

    impl HotkeyListener for KeyboardHook {
        fn register(&mut self, combo: KeyCombo, trigger: Trigger) -> Result<(), HotkeyError> {
            if self.worker.is_none() {
                self.spawn_worker()?;
            }
            REGISTERED
                .lock()
                .map_err(|_| HotkeyError::Register("hotkey table poisoned".into()))?
                .push((combo, trigger));
            info!("Registered {}", combo);
            Ok(())
        }

        fn unregister_all(&mut self) -> Result<(), HotkeyError> {
            REGISTERED
                .lock()
                .map_err(|_| HotkeyError::Unregister("hotkey table poisoned".into()))?
                .clear();
            if let Some((thread_id, handle)) = self.worker.take() {
                unsafe {
                    wm::PostThreadMessageW(thread_id, wm::WM_QUIT, WPARAM(0), LPARAM(0))
                        .map_err(|e| HotkeyError::Unregister(e.to_string()))?;
                }
                handle
                    .join()
                    .map_err(|_| HotkeyError::Unregister("hook thread panicked".into()))?;
                info!("Unregistered all hotkeys");
            }
            Ok(())
        }
    }

    impl Drop for KeyboardHook {
        fn drop(&mut self) {
            let _ = self.unregister_all();
        }
    }
}

#[cfg(not(windows))]
mod key_listener {
    use super::{HotkeyError, HotkeyListener, KeyCombo, Trigger};
    use log::{debug, error, info};
    use once_cell::sync::Lazy;
    use rdev::{EventType, Key};
    use std::sync::mpsc::{self, RecvTimeoutError};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    /// How long a fresh listener thread gets to report a startup failure.
    const STARTUP_GRACE: Duration = Duration::from_millis(300);

    static REGISTERED: Lazy<Mutex<Vec<(KeyCombo, Trigger)>>> = Lazy::new(|| Mutex::new(Vec::new()));

    // `rdev::listen` has no way to stop, so the thread outlives every
    // `unregister_all` and simply finds an empty table.
    static STARTED: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(false));

    /// Modifier keys currently held, as seen in the global key stream.
    #[derive(Debug, Default)]
    pub(super) struct ComboTracker {
        ctrl_left: bool,
        ctrl_right: bool,
        shift_left: bool,
        shift_right: bool,
        alt: bool,
        alt_gr: bool,
    }

    impl ComboTracker {
        /// Updates the held modifiers and returns the letter or digit that was
        /// just pressed, if any.
        pub(super) fn feed(&mut self, event: &EventType) -> Option<char> {
            let (key, down) = match event {
                EventType::KeyPress(k) => (*k, true),
                EventType::KeyRelease(k) => (*k, false),
                _ => return None,
            };
            match key {
                Key::ControlLeft => self.ctrl_left = down,
                Key::ControlRight => self.ctrl_right = down,
                Key::ShiftLeft => self.shift_left = down,
                Key::ShiftRight => self.shift_right = down,
                Key::Alt => self.alt = down,
                Key::AltGr => self.alt_gr = down,
                _ if down => return key_char(key),
                _ => {}
            }
            None
        }

        pub(super) fn matches(&self, combo: &KeyCombo, key: char) -> bool {
            combo.key == key
                && combo.ctrl == (self.ctrl_left || self.ctrl_right)
                && combo.shift == (self.shift_left || self.shift_right)
                && combo.alt == (self.alt || self.alt_gr)
        }
    }

    fn key_char(key: Key) -> Option<char> {
        let c = match key {
            Key::KeyA => 'A',
            Key::KeyB => 'B',
            Key::KeyC => 'C',
            Key::KeyD => 'D',
            Key::KeyE => 'E',
            Key::KeyF => 'F',
            Key::KeyG => 'G',
            Key::KeyH => 'H',
            Key::KeyI => 'I',
            Key::KeyJ => 'J',
            Key::KeyK => 'K',
            Key::KeyL => 'L',
            Key::KeyM => 'M',
            Key::KeyN => 'N',
            Key::KeyO => 'O',
            Key::KeyP => 'P',
            Key::KeyQ => 'Q',
            Key::KeyR => 'R',
            Key::KeyS => 'S',
            Key::KeyT => 'T',
            Key::KeyU => 'U',
            Key::KeyV => 'V',
            Key::KeyW => 'W',
            Key::KeyX => 'X',
            Key::KeyY => 'Y',
            Key::KeyZ => 'Z',
            Key::Num0 => '0',
            Key::Num1 => '1',
            Key::Num2 => '2',
            Key::Num3 => '3',
            Key::Num4 => '4',
            Key::Num5 => '5',
            Key::Num6 => '6',
            Key::Num7 => '7',
            Key::Num8 => '8',
            Key::Num9 => '9',
            _ => return None,
        };
        Some(c)
    }

    /// Runs every trigger in `table` whose combination `event` completes.
    pub(super) fn fire_matching(
        table: &Mutex<Vec<(KeyCombo, Trigger)>>,
        tracker: &mut ComboTracker,
        event: &EventType,
    ) {
        let Some(key) = tracker.feed(event) else {
            return;
        };
        let fire: Vec<Trigger> = match table.lock() {
            Ok(regs) => regs
                .iter()
                .filter(|(c, _)| tracker.matches(c, key))
                .map(|(_, t)| t.clone())
                .collect(),
            Err(_) => Vec::new(),
        };
        for trigger in fire {
            trigger();
        }
    }

    fn ensure_started() -> Result<(), HotkeyError> {
        let mut started = STARTED
            .lock()
            .map_err(|_| HotkeyError::Register("listener state poisoned".into()))?;
        if *started {
            return Ok(());
        }

        let (err_tx, err_rx) = mpsc::channel::<String>();
        thread::Builder::new()
            .name("key-listener".into())
            .spawn(move || {
                let mut tracker = ComboTracker::default();
                debug!("Key listener started");
                let result = rdev::listen(move |event| {
                    fire_matching(&REGISTERED, &mut tracker, &event.event_type)
                });
                if let Err(e) = result {
                    error!("Key listener stopped: {:?}", e);
                    let _ = err_tx.send(format!("{:?}", e));
                }
            })
            .map_err(|e| HotkeyError::Register(e.to_string()))?;

        match err_rx.recv_timeout(STARTUP_GRACE) {
            Ok(e) => Err(HotkeyError::Register(e)),
            Err(RecvTimeoutError::Disconnected) => {
                Err(HotkeyError::Register("key listener exited early".into()))
            }
            Err(RecvTimeoutError::Timeout) => {
                *started = true;
                Ok(())
            }
        }
    }

    pub struct KeyListener;

    impl HotkeyListener for KeyListener {
        fn register(&mut self, combo: KeyCombo, trigger: Trigger) -> Result<(), HotkeyError> {
            ensure_started()?;
            REGISTERED
                .lock()
                .map_err(|_| HotkeyError::Register("hotkey table poisoned".into()))?
                .push((combo, trigger));
            info!("Registered {}", combo);
            Ok(())
        }

        fn unregister_all(&mut self) -> Result<(), HotkeyError> {
            REGISTERED
                .lock()
                .map_err(|_| HotkeyError::Unregister("hotkey table poisoned".into()))?
                .clear();
            info!("Unregistered all hotkeys");
            Ok(())
        }
    }

    impl Drop for KeyListener {
        fn drop(&mut self) {
            let _ = self.unregister_all();
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_copy_shortcut() {
        assert_eq!("ctrl+c".parse::<KeyCombo>().unwrap(), KeyCombo::COPY);
        assert_eq!(" Control + C ".parse::<KeyCombo>().unwrap(), KeyCombo::COPY);
    }

    #[test]
    fn parses_modifiers_in_any_order() {
        let combo: KeyCombo = "shift+alt+T".parse().unwrap();
        assert!(combo.shift && combo.alt && !combo.ctrl);
        assert_eq!(combo.key, 'T');
        assert_eq!(combo.to_string(), "Alt+Shift+T");
    }

    #[test]
    fn rejects_bad_combinations() {
        for bad in ["", "ctrl", "ctrl+c+v", "ctrl+f5", "ctrl+?"] {
            assert!(bad.parse::<KeyCombo>().is_err(), "{bad} should not parse");
        }
    }
}
