use crossterm::style::Color;

// Plain ANSI colors so CI log viewers render them.
pub const GREEN: Color = Color::DarkGreen;
pub const RED: Color = Color::DarkRed;
pub const YELLOW: Color = Color::DarkYellow;
pub const RESET: Color = Color::Reset;
