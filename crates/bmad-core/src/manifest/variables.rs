use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Token that marks a path as relative to the host project root.
pub const PROJECT_ROOT_TOKEN: &str = "{project-root}";

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\{[A-Za-z0-9_.-]+\}").expect("valid regex")
});

/// Values substituted into `{name}` placeholders found in manifest paths.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: BTreeMap<String, String>,
}

impl Variables {
    /// Variables every installation knows about.
    pub fn new(bmad_folder: &str) -> Self {
        let mut vars = Self::default();
        vars.set("bmad_folder", bmad_folder);
        vars.set("bmad-folder", bmad_folder);
        vars
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Substitute every known placeholder in `text`.
    pub fn substitute(&self, text: &str) -> String {
        PLACEHOLDER_RE
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let token = &caps[0];
                let key = &token[1..token.len() - 1];
                self.values
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| token.to_string())
            })
            .into_owned()
    }

    /// Resolve a manifest path to a project-relative path.
    ///
    /// Returns `None` when a placeholder remains unresolved.
    pub fn resolve_path(&self, path: &str) -> Option<String> {
        let path = path.trim();
        let relative = match path.strip_prefix(PROJECT_ROOT_TOKEN) {
            Some(rest) => rest.trim_start_matches(['/', '\\']),
            None => path,
        };
        let resolved = self.substitute(relative);
        if has_placeholder(&resolved) {
            return None;
        }
        Some(resolved.replace('\\', "/"))
    }
}

/// True if `text` still contains a `{token}` placeholder.
pub fn has_placeholder(text: &str) -> bool {
    PLACEHOLDER_RE.is_match(text)
}
