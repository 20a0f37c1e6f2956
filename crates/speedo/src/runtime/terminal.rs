use speedo_core::TextSink;
use std::io::{self, IsTerminal, Stdout, Write};
use tracing::warn;

const CLEAR_LINE: &str = "\r\x1b[2K";

/// Renders the readout on a terminal line, or one line per write when the
/// output is not a terminal.
pub struct TerminalSink<W: Write = Stdout> {
    out: W,
    inline: bool,
    visible: bool,
    text: String,
    write_failed: bool,
}

impl TerminalSink<Stdout> {
    pub fn stdout() -> Self {
        let out = io::stdout();
        let inline = out.is_terminal();
        Self::new(out, inline)
    }
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W, inline: bool) -> Self {
        Self {
            out,
            inline,
            visible: true,
            text: String::new(),
            write_failed: false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&mut self) {
        let result = if !self.visible {
            if self.inline {
                write!(self.out, "{CLEAR_LINE}")
            } else {
                Ok(())
            }
        } else if self.inline {
            write!(self.out, "{CLEAR_LINE}{}", self.text)
        } else {
            writeln!(self.out, "{}", self.text)
        };

        if let Err(e) = result.and_then(|_| self.out.flush()) {
            if !self.write_failed {
                warn!(error = %e, "Failed to write speed readout");
                self.write_failed = true;
            }
        }
    }

    /// Finish the inline line so later output starts on a fresh row.
    pub fn finish(&mut self) {
        if self.inline && self.visible {
            let _ = writeln!(self.out);
        }
    }
}

impl<W: Write> TextSink for TerminalSink<W> {
    fn set_text(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(text);
        if self.visible {
            self.render();
        }
    }

    fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        self.render();
    }
}
