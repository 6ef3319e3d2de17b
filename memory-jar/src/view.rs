//! Plain-text rendering of client state. Coloring is left to the caller.

use jar_client::JarMode;
use jar_core::{JarError, Memory, MemoryFilter};

pub const EMPTY_JAR: &str = "The jar is empty. Add a memory to start.";
pub const NO_MATCHES: &str = "No memories found matching your search.";

/// Message shown instead of the list, if the list has nothing to show.
pub fn empty_state(total: usize, visible: usize) -> Option<&'static str> {
    match (total, visible) {
        (0, _) => Some(EMPTY_JAR),
        (_, 0) => Some(NO_MATCHES),
        _ => None,
    }
}

pub fn mode_banner(mode: &JarMode) -> String {
    match mode {
        JarMode::NoJar => "No jar open".to_string(),
        JarMode::Active(jar_id) => format!("Jar {}  (share this code to journal together)", jar_id),
        JarMode::Offline => "Offline journal (this device only)".to_string(),
    }
}

/// One-line label for menus.
pub fn memory_label(memory: &Memory) -> String {
    let mut label = format!("{}  {}", memory.date, memory.title);
    if !memory.tags.is_empty() {
        label.push_str(&format!("  [{}]", memory.tags.join(", ")));
    }
    let attachments: Vec<&str> = [
        memory.image.as_ref().map(|_| "image"),
        memory.audio.as_ref().map(|_| "audio"),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !attachments.is_empty() {
        label.push_str(&format!("  +{}", attachments.join("+")));
    }
    label
}

pub fn memory_details(memory: &Memory) -> String {
    let mut lines = vec![
        memory.title.clone(),
        memory.date.clone(),
        String::new(),
        memory.text.clone(),
    ];
    if !memory.tags.is_empty() {
        lines.push(String::new());
        lines.push(format!("Tags: {}", memory.tags.join(", ")));
    }
    if let Some(image) = &memory.image {
        lines.push(format!("Image: {}", shorten(image)));
    }
    if let Some(audio) = &memory.audio {
        lines.push(format!("Audio: {}", shorten(audio)));
    }
    lines.join("\n")
}

/// Describes the active filter, `None` when nothing is filtered.
pub fn filter_summary(filter: &MemoryFilter) -> Option<String> {
    match (filter.query.as_str(), &filter.tag) {
        ("", None) => None,
        (query, None) => Some(format!("Searching for \"{}\"", query)),
        ("", Some(tag)) => Some(format!("Tagged {}", tag)),
        (query, Some(tag)) => Some(format!("Searching for \"{}\" tagged {}", query, tag)),
    }
}

/// Alert text for a failed action.
pub fn error_message(error: &JarError) -> String {
    if error.is_user_facing() {
        error.to_string()
    } else {
        format!("Something went wrong: {}", error)
    }
}

// Embedded data URLs can be megabytes long
fn shorten(reference: &str) -> String {
    const MAX: usize = 60;
    if reference.starts_with("data:") {
        let kind = reference
            .split_once(';')
            .map(|(head, _)| head.trim_start_matches("data:"))
            .unwrap_or("data");
        return format!("embedded {}", kind);
    }
    if reference.chars().count() > MAX {
        let head: String = reference.chars().take(MAX).collect();
        return format!("{}...", head);
    }
    reference.to_string()
}
