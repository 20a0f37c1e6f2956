use std::cell::RefCell;
use std::rc::Rc;

/// Writable text surface the readout renders into.
pub trait TextSink {
    fn set_text(&mut self, text: &str);

    fn set_visible(&mut self, _visible: bool) {}
}

impl<T: TextSink + ?Sized> TextSink for &mut T {
    fn set_text(&mut self, text: &str) {
        (**self).set_text(text);
    }

    fn set_visible(&mut self, visible: bool) {
        (**self).set_visible(visible);
    }
}

impl<T: TextSink + ?Sized> TextSink for Box<T> {
    fn set_text(&mut self, text: &str) {
        (**self).set_text(text);
    }

    fn set_visible(&mut self, visible: bool) {
        (**self).set_visible(visible);
    }
}

impl<T: TextSink + ?Sized> TextSink for Rc<RefCell<T>> {
    fn set_text(&mut self, text: &str) {
        self.borrow_mut().set_text(text);
    }

    fn set_visible(&mut self, visible: bool) {
        self.borrow_mut().set_visible(visible);
    }
}

/// In-memory sink that keeps the current text and a write counter.
#[derive(Debug, Clone)]
pub struct MemorySink {
    text: String,
    visible: bool,
    writes: u64,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::with_text("")
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visible: true,
            writes: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Number of `set_text` calls received, including ones that rewrote the same string.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl TextSink for MemorySink {
    fn set_text(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(text);
        self.writes += 1;
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}
