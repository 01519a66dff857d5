use std::fmt::Write;

use crossterm::style::{Color, ResetColor, SetForegroundColor};

const INDENT: &str = "  ";

/// Accumulates report lines with nested group indentation.
///
/// Every line of a multi-line message is indented, and each line starts with
/// the color it was written in when color is enabled.
pub struct Console {
    buf: String,
    depth: usize,
    color: bool,
}

impl Console {
    pub fn new(color: bool) -> Self {
        Self {
            buf: String::new(),
            depth: 0,
            color,
        }
    }

    pub fn line(&mut self, color: Color, text: &str) {
        let mut lines = text.split('\n');
        // `split` always yields at least one item, so an empty `text` still prints a line.
        if let Some(first) = lines.next() {
            self.push_line(Some(color), first);
        }
        for rest in lines {
            self.push_line(None, rest);
        }
    }

    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    pub fn group(&mut self) {
        self.depth += 1;
    }

    pub fn group_end(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Color prefix for inline use, empty when color is disabled.
    pub fn paint(&self, color: Color) -> String {
        if self.color {
            SetForegroundColor(color).to_string()
        } else {
            String::new()
        }
    }

    pub fn finish(mut self) -> String {
        if self.color {
            let _ = write!(self.buf, "{}", ResetColor);
        }
        self.buf
    }

    fn push_line(&mut self, color: Option<Color>, text: &str) {
        for _ in 0..self.depth {
            self.buf.push_str(INDENT);
        }
        if let Some(color) = color {
            let prefix = self.paint(color);
            self.buf.push_str(&prefix);
        }
        self.buf.push_str(text);
        self.buf.push('\n');
    }
}
