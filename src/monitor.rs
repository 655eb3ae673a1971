//! Copy-event coordination.
//!
//! The controller lives on the UI thread. Hotkey callbacks and background
//! tasks never touch its state; they post [`UiTask`]s on a channel that only
//! [`MonitorController::pump`] drains. That keeps the dedup key single-writer.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};
use tokio::runtime::Handle;

use crate::clipboard::{ClipboardAccess, ClipboardError};
use crate::hotkey::{HotkeyError, HotkeyListener, KeyCombo};
use crate::languages::LanguagePair;
use crate::translator::Translate;

pub const FAILURE_MESSAGE: &str =
    "Text length need to be between 0 and 5000 characters, and only text is supported.";

pub const TEST_TEXT: &str = "Hello, world! This is a test translation.";

/// Result of one copy event, consumed once by the popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationOutcome {
    pub original: String,
    pub text: String,
    pub is_error: bool,
}

impl TranslationOutcome {
    pub fn success(original: String, text: String) -> Self {
        Self { original, text, is_error: false }
    }

    pub fn failure(original: String) -> Self {
        Self {
            original,
            text: FAILURE_MESSAGE.to_string(),
            is_error: true,
        }
    }
}

#[derive(Debug)]
pub enum UiTask {
    CopyTriggered,
    ClipboardRead(Result<String, ClipboardError>),
    Translated(TranslationOutcome),
}

/// What the window has to react to after a [`MonitorController::pump`].
#[derive(Debug, PartialEq, Eq)]
pub enum MonitorEvent {
    ShowPopup(TranslationOutcome),
    ClipboardFailed(ClipboardError),
}

/// Sending half of the UI task queue. The waker nudges the event loop so a
/// posted task is handled without waiting for input.
#[derive(Clone)]
pub struct UiQueue {
    tx: Sender<UiTask>,
    waker: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl UiQueue {
    pub fn post(&self, task: UiTask) {
        if self.tx.send(task).is_err() {
            debug!("UI queue closed, dropping task");
            return;
        }
        if let Some(wake) = &self.waker {
            wake();
        }
    }
}

#[derive(Debug, Default)]
pub struct Session {
    pub running: bool,
    pub last_text: String,
    pub languages: LanguagePair,
}

pub struct MonitorController {
    session: Session,
    combo: KeyCombo,
    copy_delay: Duration,
    clipboard: Arc<dyn ClipboardAccess>,
    listener: Box<dyn HotkeyListener>,
    translator: Option<Arc<dyn Translate>>,
    runtime: Handle,
    queue: UiQueue,
    rx: Receiver<UiTask>,
}

impl MonitorController {
    pub fn new(
        clipboard: Arc<dyn ClipboardAccess>,
        listener: Box<dyn HotkeyListener>,
        runtime: Handle,
        combo: KeyCombo,
        copy_delay: Duration,
    ) -> Self {
        let (tx, rx) = unbounded();
        Self {
            session: Session::default(),
            combo,
            copy_delay,
            clipboard,
            listener,
            translator: None,
            runtime,
            queue: UiQueue { tx, waker: None },
            rx,
        }
    }

    pub fn set_waker(&mut self, waker: Arc<dyn Fn() + Send + Sync>) {
        self.queue.waker = Some(waker);
    }

    pub fn is_running(&self) -> bool {
        self.session.running
    }

    /// Swaps in a translator for a new language pair. The dedup key is
    /// cleared so text seen under the old pair translates again.
    pub fn set_translator(&mut self, translator: Arc<dyn Translate>) {
        info!("Translator set to {}", translator.pair());
        self.session.languages = translator.pair().clone();
        self.session.last_text.clear();
        self.translator = Some(translator);
    }

    pub fn start(&mut self) -> Result<(), HotkeyError> {
        let queue = self.queue.clone();
        self.listener
            .register(self.combo, Arc::new(move || queue.post(UiTask::CopyTriggered)))?;
        self.session.running = true;
        info!("Monitoring started ({})", self.combo);
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), HotkeyError> {
        self.listener.unregister_all()?;
        self.session.running = false;
        info!("Monitoring stopped");
        Ok(())
    }

    /// Starts or stops monitoring and returns the new running state.
    pub fn toggle(&mut self) -> Result<bool, HotkeyError> {
        if self.session.running {
            self.stop()?;
        } else {
            self.start()?;
        }
        Ok(self.session.running)
    }

    /// Waits for the OS to finish populating the clipboard, then reads it on a
    /// background task. The text comes back through the queue.
    pub fn on_copy(&self) {
        let clipboard = Arc::clone(&self.clipboard);
        let queue = self.queue.clone();
        let delay = self.copy_delay;
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let read = tokio::task::spawn_blocking(move || clipboard.read_text())
                .await
                .unwrap_or_else(|e| Err(ClipboardError::Read(e.to_string())));
            queue.post(UiTask::ClipboardRead(read));
        });
    }

    /// Puts `text` on the clipboard and runs the copy path without a key event.
    pub fn inject_test_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.clipboard.write_text(text)?;
        self.on_copy();
        Ok(())
    }

    /// Drains the task queue. Must be called from the UI thread.
    pub fn pump(&mut self) -> Vec<MonitorEvent> {
        let mut events = Vec::new();
        while let Ok(task) = self.rx.try_recv() {
            match task {
                UiTask::CopyTriggered => {
                    if self.session.running {
                        self.on_copy();
                    } else {
                        debug!("Copy ignored, monitoring is stopped");
                    }
                }
                UiTask::ClipboardRead(Ok(text)) => self.dispatch(text),
                UiTask::ClipboardRead(Err(e)) => {
                    warn!("{}", e);
                    events.push(MonitorEvent::ClipboardFailed(e));
                }
                UiTask::Translated(outcome) => {
                    if outcome.is_error && self.session.last_text == outcome.original {
                        // Let the same text be retried on the next copy.
                        self.session.last_text.clear();
                    }
                    events.push(MonitorEvent::ShowPopup(outcome));
                }
            }
        }
        events
    }

    fn dispatch(&mut self, text: String) {
        if text.trim().is_empty() || text == self.session.last_text {
            debug!("Clipboard text empty or unchanged, skipping");
            return;
        }
        let Some(translator) = self.translator.clone() else {
            warn!("No translator configured, skipping copy");
            return;
        };
        self.session.last_text = text.clone();
        debug!("Dispatching {} chars ({})", text.chars().count(), self.session.languages);

        let queue = self.queue.clone();
        self.runtime.spawn(async move {
            let outcome = match translator.translate(&text).await {
                Ok(translated) => TranslationOutcome::success(text, translated),
                Err(e) => {
                    warn!("Translation failed: {}", e);
                    TranslationOutcome::failure(text)
                }
            };
            queue.post(UiTask::Translated(outcome));
        });
    }
}

impl Drop for MonitorController {
    fn drop(&mut self) {
        if self.session.running {
            if let Err(e) = self.stop() {
                warn!("{}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::testing::MemoryClipboard;
    use crate::hotkey::Trigger;
    use crate::translator::TranslationError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Instant;
    use tokio::runtime::Runtime;

    /// Records every call and prefixes the target code.
    struct FakeTranslator {
        pair: LanguagePair,
        calls: Arc<Mutex<Vec<(String, LanguagePair)>>>,
        fail: bool,
    }

    #[async_trait]
    impl Translate for FakeTranslator {
        fn pair(&self) -> &LanguagePair {
            &self.pair
        }

        async fn translate(&self, text: &str) -> Result<String, TranslationError> {
            self.calls.lock().unwrap().push((text.to_string(), self.pair.clone()));
            if self.fail {
                Err(TranslationError::Status(503))
            } else {
                Ok(format!("[{}] {}", self.pair.target, text))
            }
        }
    }

    /// Lets a test fire the hotkey by hand.
    #[derive(Clone, Default)]
    struct ManualListener {
        triggers: Arc<Mutex<Vec<Trigger>>>,
    }

    impl ManualListener {
        fn fire(&self) {
            for t in self.triggers.lock().unwrap().iter() {
                t();
            }
        }
    }

    impl HotkeyListener for ManualListener {
        fn register(&mut self, _combo: KeyCombo, trigger: Trigger) -> Result<(), HotkeyError> {
            self.triggers.lock().unwrap().push(trigger);
            Ok(())
        }

        fn unregister_all(&mut self) -> Result<(), HotkeyError> {
            self.triggers.lock().unwrap().clear();
            Ok(())
        }
    }

    struct Harness {
        _rt: Runtime,
        controller: MonitorController,
        clipboard: Arc<MemoryClipboard>,
        listener: ManualListener,
        calls: Arc<Mutex<Vec<(String, LanguagePair)>>>,
    }

    impl Harness {
        fn new(clip: &str) -> Self {
            let rt = Runtime::new().unwrap();
            let clipboard = Arc::new(MemoryClipboard::with_text(clip));
            let listener = ManualListener::default();
            let mut controller = MonitorController::new(
                clipboard.clone(),
                Box::new(listener.clone()),
                rt.handle().clone(),
                KeyCombo::COPY,
                Duration::ZERO,
            );
            let calls = Arc::new(Mutex::new(Vec::new()));
            controller.set_translator(Arc::new(FakeTranslator {
                pair: LanguagePair::new("auto", "ru"),
                calls: calls.clone(),
                fail: false,
            }));
            Self { _rt: rt, controller, clipboard, listener, calls }
        }

        fn use_translator(&mut self, pair: LanguagePair, fail: bool) {
            self.controller.set_translator(Arc::new(FakeTranslator {
                pair,
                calls: self.calls.clone(),
                fail,
            }));
        }

        /// Pumps until a popup event arrives or the deadline passes.
        fn next_popup(&mut self, wait: Duration) -> Option<TranslationOutcome> {
            let deadline = Instant::now() + wait;
            while Instant::now() < deadline {
                for ev in self.controller.pump() {
                    if let MonitorEvent::ShowPopup(o) = ev {
                        return Some(o);
                    }
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            None
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[test]
    fn new_text_translates_once_with_current_pair() {
        let mut h = Harness::new("Good morning");
        h.controller.start().unwrap();
        h.listener.fire();

        let outcome = h.next_popup(Duration::from_secs(2)).expect("popup");
        assert_eq!(outcome, TranslationOutcome::success("Good morning".into(), "[ru] Good morning".into()));
        assert_eq!(
            h.calls.lock().unwrap().as_slice(),
            &[("Good morning".to_string(), LanguagePair::new("auto", "ru"))]
        );
        assert_eq!(h.controller.session.last_text, "Good morning");
    }

    #[test]
    fn repeated_text_is_ignored() {
        let mut h = Harness::new("same");
        h.controller.start().unwrap();
        h.listener.fire();
        assert!(h.next_popup(Duration::from_secs(2)).is_some());

        h.listener.fire();
        assert!(h.next_popup(Duration::from_millis(200)).is_none());
        assert_eq!(h.call_count(), 1);
    }

    #[test]
    fn blank_clipboard_is_ignored() {
        let mut h = Harness::new(" \n\t ");
        h.controller.start().unwrap();
        h.listener.fire();
        assert!(h.next_popup(Duration::from_millis(200)).is_none());
        assert_eq!(h.call_count(), 0);
        assert!(h.controller.session.last_text.is_empty());
    }

    #[test]
    fn changing_languages_retranslates_same_text() {
        let mut h = Harness::new("cat");
        h.controller.start().unwrap();
        h.listener.fire();
        assert!(h.next_popup(Duration::from_secs(2)).is_some());

        h.use_translator(LanguagePair::new("auto", "de"), false);
        h.listener.fire();
        let outcome = h.next_popup(Duration::from_secs(2)).expect("popup");
        assert_eq!(outcome.text, "[de] cat");
        assert_eq!(h.call_count(), 2);
    }

    #[test]
    fn failure_shows_fixed_message_and_allows_retry() {
        let mut h = Harness::new("broken");
        h.use_translator(LanguagePair::new("en", "fr"), true);
        h.controller.start().unwrap();
        h.listener.fire();

        let outcome = h.next_popup(Duration::from_secs(2)).expect("popup");
        assert!(outcome.is_error);
        assert_eq!(outcome.text, FAILURE_MESSAGE);
        assert_eq!(outcome.original, "broken");
        assert!(h.controller.session.last_text.is_empty());

        h.listener.fire();
        assert!(h.next_popup(Duration::from_secs(2)).is_some());
        assert_eq!(h.call_count(), 2);
    }

    #[test]
    fn stopped_monitor_does_not_translate() {
        let mut h = Harness::new("ignored");
        h.controller.start().unwrap();
        assert!(!h.controller.toggle().unwrap());
        assert!(!h.controller.is_running());

        h.listener.fire();
        assert!(h.next_popup(Duration::from_millis(200)).is_none());
        assert_eq!(h.call_count(), 0);
    }

    #[test]
    fn late_trigger_after_stop_is_dropped() {
        let mut h = Harness::new("late");
        h.controller.start().unwrap();
        h.controller.queue.post(UiTask::CopyTriggered);
        h.controller.stop().unwrap();
        assert!(h.next_popup(Duration::from_millis(200)).is_none());
        assert_eq!(h.call_count(), 0);
    }

    #[test]
    fn test_action_shows_popup_without_key_event() {
        let mut h = Harness::new("");
        h.controller.inject_test_text(TEST_TEXT).unwrap();

        let outcome = h.next_popup(Duration::from_secs(2)).expect("popup");
        assert_eq!(outcome.original, TEST_TEXT);
        assert!(!outcome.is_error);
        assert_eq!(h.clipboard.read_text().unwrap(), TEST_TEXT);
    }

    #[test]
    fn failing_test_action_translates_exactly_once() {
        let mut h = Harness::new("");
        h.use_translator(LanguagePair::new("auto", "ru"), true);
        h.controller.start().unwrap();
        h.controller.inject_test_text(TEST_TEXT).unwrap();

        let outcome = h.next_popup(Duration::from_secs(2)).expect("popup");
        assert!(outcome.is_error);
        // The clipboard write itself is not a key event, so nothing else follows.
        assert!(h.next_popup(Duration::from_millis(300)).is_none());
        assert_eq!(h.call_count(), 1);
    }

    #[test]
    fn clipboard_failures_are_reported() {
        let mut h = Harness::new("x");
        h.clipboard.fail_reads.store(true, std::sync::atomic::Ordering::SeqCst);
        h.controller.on_copy();

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut events = Vec::new();
        while events.is_empty() && Instant::now() < deadline {
            events = h.controller.pump();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(events, vec![MonitorEvent::ClipboardFailed(ClipboardError::Read("busy".into()))]);
    }

    #[test]
    fn waker_runs_for_posted_tasks() {
        let mut h = Harness::new("wake");
        let woken = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let w = woken.clone();
        h.controller.set_waker(Arc::new(move || {
            w.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }));
        h.controller.start().unwrap();
        h.listener.fire();
        assert!(h.next_popup(Duration::from_secs(2)).is_some());
        // Trigger, clipboard read, translation.
        assert!(woken.load(std::sync::atomic::Ordering::SeqCst) >= 3);
    }
}
