use colored::Color;

pub const PRIMARY: Color = Color::TrueColor { r: 129, g: 199, b: 245 };
pub const ACCENT: Color = Color::TrueColor { r: 255, g: 203, b: 107 };
pub const SEPARATOR: Color = Color::TrueColor { r: 108, g: 117, b: 125 };
pub const TEXT_DEFAULT: Color = Color::TrueColor { r: 222, g: 226, b: 230 };

pub const STATUS_OPEN: Color = Color::TrueColor { r: 140, g: 214, b: 120 };
pub const STATUS_CLOSED: Color = Color::TrueColor { r: 239, g: 108, b: 108 };
pub const STATUS_UNKNOWN: Color = Color::TrueColor { r: 255, g: 203, b: 107 };
pub const STATUS_ERROR: Color = Color::TrueColor { r: 220, g: 80, b: 160 };

pub const IPV4_ADDR: Color = Color::TrueColor { r: 129, g: 199, b: 245 };
pub const IPV6_ADDR: Color = Color::TrueColor { r: 190, g: 160, b: 245 };
pub const PROTOCOL: Color = Color::TrueColor { r: 102, g: 217, b: 200 };
