//! Helpers for keeping user data and provider noise out of logs and prompts.

use std::path::Path;

/// Longest provider error body kept in a row failure reason.
pub const MAX_REASON_LEN: usize = 300;

/// Returns only the file-name component of a path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Neutralizes chat-template control sequences in user-supplied text.
///
/// Titles, headings and keywords come straight from an uploaded sheet, so a
/// cell containing `<|im_start|>system` must not be able to open a new turn.
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("<|", "< |")
        .replace("|>", "| >")
        .replace("<s>", "< s >")
        .replace("</s>", "< / s >")
        .replace("[INST]", "[ INST ]")
        .replace("[/INST]", "[ / INST ]")
        .replace("<<SYS>>", "< < SYS > >")
        .replace("<</SYS>>", "< < / SYS > >")
        .replace('\r', "")
}

/// Collapses whitespace and cuts `text` to at most `max` characters.
pub fn truncate_for_log(text: &str, max: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(max).collect();
    cut.push_str("...");
    cut
}
