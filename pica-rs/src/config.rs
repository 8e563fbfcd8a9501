//! `.picarc` configuration file parser.
//!
//! One `key = value` setting per line:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `delay` | milliseconds to wait between API items |
//! | `timeout` | per-request timeout in milliseconds (`0` = none) |
//! | `color` | `auto`, `always` or `never` |
//! | `author`, `email` | used by `pica init` |
//! | `header.<Name>` | extra default request header |
//! | Lines starting with `#` | comment, ignored |
//!
//! Values may be wrapped in double quotes to keep surrounding spaces.

use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorMode {
    /// Color when stdout is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Some(ColorMode::Auto),
            "always" | "on" | "yes" => Some(ColorMode::Always),
            "never" | "off" | "no" => Some(ColorMode::Never),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub delay: Duration,
    pub timeout: Option<Duration>,
    pub color: ColorMode,
    pub author: Option<String>,
    pub email: Option<String>,
    /// Extra default request headers, in file order.
    pub headers: Vec<(String, String)>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config string.
    ///
    /// Bad lines are reported and skipped; the rest of the file still loads.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                errors.push(ConfigError {
                    line: lineno,
                    message: format!("expected `key = value`, got `{line}`"),
                });
                continue;
            };
            if let Err(message) = config.apply(key.trim(), &unquote(value.trim())) {
                errors.push(ConfigError {
                    line: lineno,
                    message,
                });
            }
        }

        (config, errors)
    }

    /// Read and parse a config file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "delay" => self.delay = Duration::from_millis(parse_ms(key, value)?),
            "timeout" => {
                let ms = parse_ms(key, value)?;
                self.timeout = (ms > 0).then(|| Duration::from_millis(ms));
            }
            "color" => {
                self.color = ColorMode::parse(value)
                    .ok_or_else(|| format!("color: expected auto, always or never, got `{value}`"))?;
            }
            "author" => self.author = Some(value.to_owned()),
            "email" => self.email = Some(value.to_owned()),
            _ => match key.strip_prefix("header.") {
                Some(name) if !name.is_empty() => {
                    self.headers.push((name.to_owned(), value.to_owned()));
                }
                _ => return Err(format!("unknown key `{key}`")),
            },
        }
        Ok(())
    }
}

fn parse_ms(key: &str, value: &str) -> Result<u64, String> {
    value
        .parse()
        .map_err(|_| format!("{key}: expected milliseconds, got `{value}`"))
}

/// Strip one pair of surrounding double quotes, honouring `\"` and `\\`.
fn unquote(s: &str) -> String {
    let Some(inner) = s.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return s.to_owned();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            c => out.push(c),
        }
    }
    out
}

// ── Search path ───────────────────────────────────────────────────────────────

/// Candidate config locations, most specific first: `./.picarc`, the
/// platform config dir, then `$HOME/.picarc`.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(".picarc")];
    if let Some(dirs) = directories::ProjectDirs::from("", "", "pica") {
        paths.push(dirs.config_dir().join("picarc"));
    }
    if let Some(base) = directories::BaseDirs::new() {
        paths.push(base.home_dir().join(".picarc"));
    }
    paths
}

/// The first config file that exists, or `None`.
pub fn find_user_config() -> Option<PathBuf> {
    search_paths().into_iter().find(|p| p.is_file())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn load(s: &str) -> Config {
        let (config, errors) = Config::load_str(s);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        config
    }

    #[test]
    fn defaults() {
        let c = Config::new();
        assert_eq!(c.delay, Duration::ZERO);
        assert_eq!(c.timeout, None);
        assert_eq!(c.color, ColorMode::Auto);
    }

    #[test]
    fn numeric_keys() {
        let c = load("delay = 250\ntimeout = 3000");
        assert_eq!(c.delay, Duration::from_millis(250));
        assert_eq!(c.timeout, Some(Duration::from_millis(3000)));
    }

    #[test]
    fn zero_timeout_disables() {
        assert_eq!(load("timeout = 0").timeout, None);
    }

    #[test]
    fn color_modes() {
        assert_eq!(load("color = never").color, ColorMode::Never);
        assert_eq!(load("color = Always").color, ColorMode::Always);
    }

    #[test]
    fn headers_keep_order() {
        let c = load("header.X-Team = qa\nheader.Authorization = \"Bearer abc\"");
        assert_eq!(
            c.headers,
            vec![
                ("X-Team".to_owned(), "qa".to_owned()),
                ("Authorization".to_owned(), "Bearer abc".to_owned()),
            ]
        );
    }

    #[test]
    fn quoted_values_keep_spaces() {
        let c = load("author = \"  Ann \\\"A\\\" Smith \"");
        assert_eq!(c.author.as_deref(), Some("  Ann \"A\" Smith "));
    }

    #[test]
    fn comments_and_blanks_ignored() {
        let c = load("# settings\n\n   # indented\nemail = a@b.c\n");
        assert_eq!(c.email.as_deref(), Some("a@b.c"));
    }

    #[test]
    fn errors_are_collected_per_line() {
        let (c, errors) = Config::load_str("delay = soon\nbogus = 1\njust text\nauthor = me");
        assert_eq!(c.author.as_deref(), Some("me"));
        let lines: Vec<usize> = errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![1, 2, 3]);
        assert!(errors[1].message.contains("unknown key"));
        assert_eq!(errors[0].to_string(), "line 1: delay: expected milliseconds, got `soon`");
    }

    #[test]
    fn empty_header_name_is_error() {
        let (_, errors) = Config::load_str("header. = x");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn load_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".picarc");
        std::fs::write(&path, "delay = 5\n").unwrap();
        let (c, errors) = Config::load_file(&path).unwrap();
        assert!(errors.is_empty());
        assert_eq!(c.delay, Duration::from_millis(5));
    }

    #[test]
    fn search_starts_in_working_dir() {
        assert_eq!(search_paths()[0], PathBuf::from(".picarc"));
    }
}
