use colored::Color;

pub const PRIMARY: Color = Color::BrightWhite;
pub const ACCENT: Color = Color::BrightGreen;
pub const SEPARATOR: Color = Color::BrightBlack;
pub const TEXT_DEFAULT: Color = Color::White;

pub const IPV4_ADDR: Color = Color::BrightBlue;
pub const MAC_ADDR: Color = Color::BrightMagenta;
pub const VENDOR: Color = Color::Yellow;
pub const SERVICE: Color = Color::BrightCyan;
pub const TIMESTAMP: Color = Color::BrightBlack;

pub const EVENT_NEW: Color = Color::BrightGreen;
pub const EVENT_CHANGE: Color = Color::BrightYellow;
pub const EVENT_CONFLICT: Color = Color::BrightRed;
