use wavault_api::types::SenderId;

/// Distribution-list senders are excluded from capture.
pub fn is_broadcast(sender: &SenderId) -> bool {
    sender.value == "status@broadcast" || sender.value.ends_with("@broadcast")
}

/// Reduce a sender id to a filename-safe form. Everything outside
/// `[A-Za-z0-9@._-]` becomes `_`, so path separators and control bytes
/// can never reach the filesystem.
pub fn sanitize_sender(sender: &SenderId) -> String {
    let cleaned: String = sender
        .value
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '@' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}
