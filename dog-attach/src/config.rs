use std::time::Duration;

/// Content types allowed when an attachment is declared as an image
pub const IMAGE_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/gif", "image/png"];

/// Broad file categories with built-in content type rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Image,
}

impl FileType {
    pub fn content_types(&self) -> &'static [&'static str] {
        match self {
            FileType::Image => IMAGE_CONTENT_TYPES,
        }
    }
}

/// Per-attribute configuration for an attacher
#[derive(Debug, Clone)]
pub struct AttacherConfig {
    /// Fail `cache`/`download` on invalid input instead of recording the error
    pub raise_errors: bool,

    /// Largest accepted upload in bytes. Falls back to the cache backend's limit.
    pub max_size: Option<u64>,

    /// Allowed filename extensions, lowercase without the leading dot
    pub extensions: Vec<String>,

    /// Allowed MIME types, lowercase. Takes precedence over `file_type`.
    pub content_types: Vec<String>,

    pub file_type: Option<FileType>,
}

impl Default for AttacherConfig {
    fn default() -> Self {
        Self {
            raise_errors: true,
            max_size: None,
            extensions: Vec::new(),
            content_types: Vec::new(),
            file_type: None,
        }
    }
}

impl AttacherConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Config for image attachments (JPEG, GIF, PNG)
    pub fn image() -> Self {
        Self::default().with_type(FileType::Image)
    }

    pub fn with_raise_errors(mut self, raise: bool) -> Self {
        self.raise_errors = raise;
        self
    }

    /// Record validation and download failures instead of returning them
    pub fn collect_errors(self) -> Self {
        self.with_raise_errors(false)
    }

    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = Some(bytes);
        self
    }

    pub fn with_extension<S: AsRef<str>>(mut self, extension: S) -> Self {
        self.extensions.push(normalize_extension(extension.as_ref()));
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions
            .extend(extensions.into_iter().map(|e| normalize_extension(e.as_ref())));
        self
    }

    pub fn with_content_type<S: AsRef<str>>(mut self, content_type: S) -> Self {
        self.content_types
            .push(normalize_content_type(content_type.as_ref()));
        self
    }

    pub fn with_content_types<I, S>(mut self, content_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.content_types.extend(
            content_types
                .into_iter()
                .map(|c| normalize_content_type(c.as_ref())),
        );
        self
    }

    pub fn with_type(mut self, file_type: FileType) -> Self {
        self.file_type = Some(file_type);
        self
    }

    /// Content types uploads are checked against, if any rule applies
    pub fn allowed_content_types(&self) -> Option<Vec<&str>> {
        if !self.content_types.is_empty() {
            Some(self.content_types.iter().map(String::as_str).collect())
        } else {
            self.file_type.map(|t| t.content_types().to_vec())
        }
    }
}

/// Lowercase, without a leading dot
pub(crate) fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}

/// MIME essence: parameters dropped, lowercase
pub(crate) fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

/// Settings for fetching remote URLs
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Redirects followed before giving up
    pub max_redirects: usize,

    /// Bound on the whole request, including the body
    pub timeout: Option<Duration>,

    pub connect_timeout: Option<Duration>,

    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_redirects: 10,
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
            user_agent: concat!("dog-attach/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Disable the overall request timeout
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AttacherConfig::default();
        assert!(config.raise_errors);
        assert!(config.allowed_content_types().is_none());

        let fetch = FetchConfig::default();
        assert_eq!(fetch.max_redirects, 10);
        assert!(fetch.user_agent.starts_with("dog-attach/"));
    }

    #[test]
    fn test_normalization() {
        let config = AttacherConfig::new()
            .with_extensions([".JPG", "png"])
            .with_content_type("Text/Plain; charset=utf-8");

        assert_eq!(config.extensions, vec!["jpg", "png"]);
        assert_eq!(config.content_types, vec!["text/plain"]);
    }

    #[test]
    fn test_explicit_content_types_beat_image_defaults() {
        let config = AttacherConfig::image();
        assert_eq!(
            config.allowed_content_types(),
            Some(vec!["image/jpeg", "image/gif", "image/png"])
        );

        let config = config.with_content_type("image/webp");
        assert_eq!(config.allowed_content_types(), Some(vec!["image/webp"]));
    }
}
