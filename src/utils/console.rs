// src/utils/console.rs

//! Console formatting for run progress.
//!
//! Everything goes through the `log` facade, so the binary's logger decides
//! timestamps and filtering.

/// Width of header rules.
const RULE_WIDTH: usize = 60;

/// Log a step in a process.
pub fn step(step_num: usize, total: usize, message: &str) {
    log::info!("[STEP {}/{}] {}", step_num, total, message);
}

/// Log a header.
pub fn header(title: &str) {
    let border = "═".repeat(RULE_WIDTH);
    log::info!("{}", border);
    log::info!("  {}", title);
    log::info!("{}", border);
}

/// Log a sub-item (indented).
pub fn sub_item(message: &str) {
    log::info!("    {}", message);
}

/// Log a summary section.
pub fn summary(title: &str, items: &[(&str, String)]) {
    log::info!("[SUMMARY] {}", title);
    for (key, value) in items {
        log::info!("    {}: {}", key, value);
    }
}
