//! Editor host capability surface

/// What the sync engine needs from the surrounding editor page.
///
/// `apply_content` is one-way: the engine hands the new text to the
/// editor and the editor is responsible for saving it.
pub trait EditorHost: Send + Sync {
    /// Path portion of the current page URL, e.g. `/project/<id>`.
    fn url_path(&self) -> String;

    /// Raw HTML of the current page, used for embedded metadata.
    fn page_html(&self) -> String;

    /// Project-relative path of the file open in the editor pane,
    /// `None` when nothing is open.
    fn current_open_path(&self) -> Option<String>;

    /// Replace the open file's content with `content`.
    fn apply_content(&self, content: &str);
}

/// Turn editor breadcrumb segments into a project-relative path.
///
/// The first segment is the project root folder and is dropped when
/// deeper segments exist. Empty segments are ignored. `None` when no
/// usable segments remain.
pub fn normalize_breadcrumb(parts: &[&str]) -> Option<String> {
    let parts: Vec<&str> = parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    match parts.len() {
        0 => None,
        1 => Some(parts[0].to_string()),
        _ => Some(parts[1..].join("/")),
    }
}
