//! Shared UI icons.
//!
//! Each icon falls back to a plain-text tag on terminals without emoji
//! support.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN] ");

// Build indicators
pub static HAMMER: Emoji<'_, '_> = Emoji("🔨 ", "");
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
pub static SHELL: Emoji<'_, '_> = Emoji("🐚 ", "");
