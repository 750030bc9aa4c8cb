//! Input checks for categories, uploaded file names and stored file names.

/// Extensions accepted on upload, lowercase and without the dot.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "jfif", "avif"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid category")]
    InvalidCategory,
    #[error("file has no extension")]
    MissingExtension,
    #[error("extension not allowed")]
    ExtensionNotAllowed(String),
    #[error("invalid filename")]
    InvalidFilename,
}

/// Normalize a category and reject anything that could leave its folder.
pub fn validate_category(category: &str) -> Result<String, ValidationError> {
    let normalized = normalize(category);
    if normalized == "."
        || normalized.starts_with("..")
        || normalized.contains('/')
        || normalized.contains('\\')
    {
        return Err(ValidationError::InvalidCategory);
    }
    Ok(normalized)
}

/// Lowercase extension of an uploaded file name, if it is allowed.
///
/// Leading dots belong to the stem, so `.png` has no extension.
pub fn validate_extension(filename: &str) -> Result<String, ValidationError> {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let stem_start = base.len() - base.trim_start_matches('.').len();
    let ext = base[stem_start..]
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if ext.is_empty() {
        return Err(ValidationError::MissingExtension);
    }
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ValidationError::ExtensionNotAllowed(ext));
    }
    Ok(ext)
}

/// Stored file names are flat; no traversal or separators.
pub fn validate_filename(filename: &str) -> Result<&str, ValidationError> {
    if filename.is_empty()
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
    {
        return Err(ValidationError::InvalidFilename);
    }
    Ok(filename)
}

/// Lexical path normalization: collapses `.`, empty segments and `x/..` pairs.
fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_owned(),
        (false, false) => joined,
    }
}
