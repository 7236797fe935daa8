//! Content handler registry keyed by file extension.
//!
//! A tileset references content of several kinds (glTF scenes, compressed
//! textures, nested manifests). Callers register a handler per extension
//! pattern; lookups match the URL path case-insensitively and ignore query
//! strings, so `tile.GLB?v=3` is handled by the `glb` handler.

use reqwest::Url;

/// A set of file extensions, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionPattern {
    extensions: Vec<String>,
}

impl ExtensionPattern {
    /// Create a pattern matching any of the given extensions (without the dot).
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Check a URL path (no query or fragment) against the pattern.
    pub fn matches_path(&self, path: &str) -> bool {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let Some((_, extension)) = file_name.rsplit_once('.') else {
            return false;
        };
        self.extensions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(extension))
    }

    /// Check a URL against the pattern.
    pub fn matches(&self, url: &Url) -> bool {
        self.matches_path(url.path())
    }
}

/// Ordered registry of content handlers. The first matching pattern wins.
#[derive(Debug, Clone)]
pub struct ContentHandlers<H> {
    handlers: Vec<(ExtensionPattern, H)>,
}

impl<H> Default for ContentHandlers<H> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

impl<H> ContentHandlers<H> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a pattern.
    pub fn add_handler(&mut self, pattern: ExtensionPattern, handler: H) -> &mut Self {
        self.handlers.push((pattern, handler));
        self
    }

    /// Find the handler for a content URL.
    pub fn handler_for(&self, url: &Url) -> Option<&H> {
        self.handlers
            .iter()
            .find(|(pattern, _)| pattern.matches(url))
            .map(|(_, handler)| handler)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
