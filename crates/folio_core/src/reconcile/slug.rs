//! Title → repository slug.

/// Derive a repository slug from a human-readable title.
///
/// Lower-cases, keeps ASCII letters, digits, whitespace and hyphens, turns
/// whitespace runs into a single hyphen, collapses hyphen runs and trims
/// hyphens from both ends. Returns `None` when the title looks like a path or
/// an address (`/`, `@`) or when fewer than two characters survive.
pub fn slugify(title: &str) -> Option<String> {
    if title.contains('/') || title.contains('@') {
        return None;
    }

    let lowered = title.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_hyphen = false;
    for ch in lowered.chars() {
        if ch.is_whitespace() || ch == '-' {
            pending_hyphen = true;
        } else if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        }
        // anything else is dropped without breaking the current word
    }

    if slug.len() < 2 || slug.contains('/') || slug.contains('@') {
        return None;
    }
    Some(slug)
}
