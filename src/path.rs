//! File name sanitizing and note path composition.

/// Characters that cannot appear in a note file name.
const UNSAFE_CHARS: &[char] = &[
    '/', '|', '\\', ':', '\'', '"', '(', ')', '（', '）', '{', '}', '<', '>', '.', '*',
];

pub const DEFAULT_EXTENSION: &str = "md";

/// Replace every filesystem-unsafe character with `-` and trim surrounding whitespace.
pub fn sanitize_file_name(raw: &str) -> String {
    raw.chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '-' } else { c })
        .collect::<String>()
        .trim()
        .to_owned()
}

/// Normalize a vault-relative path: forward slashes only, no empty or `.`
/// segments, no leading or trailing slash.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// `root[/sub_folder]`, normalized.
pub fn resolve_folder_path(root: &str, sub_folder: Option<&str>) -> String {
    match sub_folder.filter(|sub| !sub.is_empty()) {
        Some(sub) => normalize_path(&format!("{root}/{sub}")),
        None => normalize_path(root),
    }
}

/// `root[/sub_folder]/file_name.extension` with the file name sanitized.
pub fn resolve_note_path(
    root: &str,
    sub_folder: Option<&str>,
    file_name: &str,
    extension: Option<&str>,
) -> String {
    let folder = resolve_folder_path(root, sub_folder);
    let extension = extension
        .filter(|ext| !ext.is_empty())
        .unwrap_or(DEFAULT_EXTENSION);
    let file_name = sanitize_file_name(file_name);
    if folder.is_empty() {
        format!("{file_name}.{extension}")
    } else {
        format!("{folder}/{file_name}.{extension}")
    }
}

/// Paths under a dot-directory (e.g. the editor's config dir) bypass the
/// regular modify path.
pub fn is_hidden_path(path: &str) -> bool {
    path.starts_with('.')
}
