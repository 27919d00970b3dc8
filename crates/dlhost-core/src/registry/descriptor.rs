//! Plugin descriptors: the static surface a plugin declares at registration.

use regex::Regex;

use crate::events::ConfigError;

/// Plugin type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    /// Direct file retrieval from one hosting service.
    Hoster,
    /// Resolves a container link into direct download URLs.
    Crypter,
    /// Event-driven extension outside the download path.
    Addon,
    /// Credential/session provider for a service.
    Account,
}

impl PluginKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PluginKind::Hoster => "hoster",
            PluginKind::Crypter => "crypter",
            PluginKind::Addon => "addon",
            PluginKind::Account => "account",
        }
    }
}

/// Type of a declared plugin config option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Bool,
    Int,
    Str,
}

/// One declared configuration option (key, type, label, default).
#[derive(Debug, Clone)]
pub struct ConfigOption {
    pub key: String,
    pub kind: OptionKind,
    pub label: String,
    pub default: String,
}

/// Immutable plugin descriptor, registered once at startup and replaced only
/// through the registry's copy-on-write path.
#[derive(Debug)]
pub struct PluginDescriptor {
    pub name: String,
    pub kind: PluginKind,
    pub pattern: String,
    pub version: String,
    /// Compiled form of `pattern`, built at registration.
    pub(super) regex: Regex,
    /// Length of the literal prefix of `pattern`; longer means more specific.
    pub(super) specificity: usize,
    /// Plugin supports an authenticated elevated download path.
    pub premium: bool,
    /// Service endpoint for the premium processing request, when `premium`.
    pub premium_endpoint: Option<String>,
    /// Service host accounts for this plugin are stored under, when it
    /// differs from the plugin name.
    pub service: Option<String>,
    /// Honor Content-Disposition filename hints from the server.
    pub disposition: bool,
    /// Declared configuration options.
    pub options: Vec<ConfigOption>,
}

impl PluginDescriptor {
    /// Builds a descriptor, compiling the URL pattern. A pattern that fails
    /// to compile is a `ConfigError::BadDescriptor`.
    pub fn new(
        name: &str,
        kind: PluginKind,
        pattern: &str,
        version: &str,
    ) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|e| {
            ConfigError::BadDescriptor(format!("{name}: invalid pattern {pattern:?}: {e}"))
        })?;
        Ok(Self {
            name: name.to_string(),
            kind,
            pattern: pattern.to_string(),
            version: version.to_string(),
            specificity: literal_prefix_len(pattern),
            regex,
            premium: false,
            premium_endpoint: None,
            service: None,
            disposition: true,
            options: Vec::new(),
        })
    }

    /// Disable Content-Disposition filename hints for this plugin.
    pub fn without_disposition(mut self) -> Self {
        self.disposition = false;
        self
    }

    /// Marks the plugin premium-capable with its processing endpoint.
    pub fn with_premium(mut self, endpoint: &str) -> Self {
        self.premium = true;
        self.premium_endpoint = Some(endpoint.to_string());
        self
    }

    /// Declares the service host accounts for this plugin live under.
    pub fn with_service(mut self, service: &str) -> Self {
        self.service = Some(service.to_string());
        self
    }

    /// Account-store key for this plugin: the declared service host, falling
    /// back to the plugin name.
    pub fn account_service(&self) -> &str {
        self.service.as_deref().unwrap_or(&self.name)
    }

    pub fn with_option(mut self, key: &str, kind: OptionKind, label: &str, default: &str) -> Self {
        self.options.push(ConfigOption {
            key: key.to_string(),
            kind,
            label: label.to_string(),
            default: default.to_string(),
        });
        self
    }

    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }
}

/// Number of leading characters of `pattern` that match only themselves.
///
/// An escaped punctuation character (`\.`) counts as one literal character;
/// the first unescaped metacharacter ends the prefix. A literal immediately
/// before a quantifier is excluded, since the quantifier makes it optional or
/// repeatable (`https?` has the literal prefix `http`).
pub(super) fn literal_prefix_len(pattern: &str) -> usize {
    const META: &[char] = &['.', '^', '$', '*', '+', '?', '(', ')', '[', ']', '{', '}', '|'];

    let chars: Vec<char> = pattern.chars().collect();
    let mut len = 0;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            match chars.get(i + 1) {
                Some(next) if next.is_ascii_punctuation() => {
                    len += 1;
                    i += 2;
                    continue;
                }
                // \d, \w etc. are classes, not literals.
                _ => break,
            }
        }
        if META.contains(&c) {
            // A quantifier applies to the previous literal; drop it.
            if matches!(c, '?' | '*' | '+' | '{') && len > 0 {
                len -= 1;
            }
            break;
        }
        len += 1;
        i += 1;
    }
    len
}
