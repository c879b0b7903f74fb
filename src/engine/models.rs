use std::collections::HashMap;

use crate::error::UpdateError;

/// Remote components file: a flat key/value document, read once per run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: HashMap<String, String>,
}

impl Manifest {
    /// Parse a Java properties document.
    ///
    /// Keys end at the first unescaped `=`, `:` or whitespace. `#`/`!` start
    /// comment lines, a trailing odd backslash continues the line, and the usual
    /// backslash escapes (`\t`, `\n`, `\uXXXX`, `\:` ...) are decoded.
    pub fn parse(text: &str) -> Self {
        let mut entries = HashMap::new();
        for line in logical_lines(text.trim_start_matches('\u{feff}')) {
            let line = line.trim_start();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let (key, value) = split_entry(line);
            let key = unescape(key);
            if !key.is_empty() {
                entries.insert(key, unescape(value.trim_end()));
            }
        }
        Self { entries }
    }

    pub fn string(&self, key: &str) -> Result<&str, UpdateError> {
        self.entries
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| UpdateError::ManifestKey {
                key: key.to_owned(),
                reason: "missing".into(),
            })
    }

    pub fn boolean(&self, key: &str) -> Result<bool, UpdateError> {
        let raw = self.string(key)?;
        match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(UpdateError::ManifestKey {
                key: key.to_owned(),
                reason: format!("expected a boolean, got {raw:?}"),
            }),
        }
    }

    pub fn integer(&self, key: &str) -> Result<i64, UpdateError> {
        let raw = self.string(key)?;
        raw.parse::<i64>().map_err(|e| UpdateError::ManifestKey {
            key: key.to_owned(),
            reason: format!("expected an integer, got {raw:?} ({e})"),
        })
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Join continued physical lines; leading whitespace of a continuation is dropped.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;
    for raw in text.lines() {
        let piece = match pending {
            Some(_) => raw.trim_start(),
            None => raw,
        };
        let is_comment = pending.is_none()
            && matches!(piece.trim_start().chars().next(), Some('#' | '!'));
        let mut current = pending.take().unwrap_or_default();
        if !is_comment && ends_with_odd_backslashes(piece) {
            current.push_str(&piece[..piece.len() - 1]);
            pending = Some(current);
        } else {
            current.push_str(piece);
            lines.push(current);
        }
    }
    if let Some(rest) = pending {
        lines.push(rest);
    }
    lines
}

fn ends_with_odd_backslashes(line: &str) -> bool {
    line.bytes().rev().take_while(|b| *b == b'\\').count() % 2 == 1
}

/// Split at the first unescaped separator; whitespace, then at most one `=`/`:`.
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\u{c}' => {
                key_end = idx;
                break;
            }
            _ => {}
        }
    }
    let key = &line[..key_end];
    let rest = line[key_end..].trim_start_matches([' ', '\t', '\u{c}']);
    let rest = rest
        .strip_prefix(['=', ':'])
        .unwrap_or(rest)
        .trim_start_matches([' ', '\t', '\u{c}']);
    (key, rest)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == 4 => out.push(decoded),
                    _ => {
                        out.push('u');
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# remote components (linux 64)
ForceStable=false
LatestRolloutPercent = 25
PlayerVersionStable=2.1
PlayerURLStable: http://cdn.example.com/player/RisePlayer.zip
! legacy comment

";

    #[test]
    fn parses_properties_document() {
        let manifest = Manifest::parse(SAMPLE);
        assert_eq!(manifest.len(), 4);
        assert_eq!(manifest.string("PlayerVersionStable").unwrap(), "2.1");
        assert_eq!(
            manifest.string("PlayerURLStable").unwrap(),
            "http://cdn.example.com/player/RisePlayer.zip"
        );
        assert!(!manifest.boolean("ForceStable").unwrap());
        assert_eq!(manifest.integer("LatestRolloutPercent").unwrap(), 25);
    }

    #[test]
    fn value_keeps_everything_after_first_separator() {
        let manifest = Manifest::parse("BrowserURLLatest=http://host:8080/a=b.zip");
        assert_eq!(
            manifest.string("BrowserURLLatest").unwrap(),
            "http://host:8080/a=b.zip"
        );
    }

    #[test]
    fn decodes_backslash_escapes() {
        let manifest = Manifest::parse(
            "PlayerURLStable=http\\://cdn.test/RisePlayer.zip\nName=Rise\\u0020Player\\tII\nodd\\=key=1",
        );
        assert_eq!(
            manifest.string("PlayerURLStable").unwrap(),
            "http://cdn.test/RisePlayer.zip"
        );
        assert_eq!(manifest.string("Name").unwrap(), "Rise Player\tII");
        assert_eq!(manifest.string("odd=key").unwrap(), "1");
    }

    #[test]
    fn joins_continued_lines() {
        let manifest = Manifest::parse(
            "PlayerURLStable=http://cdn.test/\\\n    RisePlayer.zip\nPlayerVersionStable=2.1\n",
        );
        assert_eq!(
            manifest.string("PlayerURLStable").unwrap(),
            "http://cdn.test/RisePlayer.zip"
        );
        assert_eq!(manifest.string("PlayerVersionStable").unwrap(), "2.1");
    }

    #[test]
    fn escaped_trailing_backslash_does_not_continue() {
        let manifest = Manifest::parse("Path=C:\\\\\nNext=1");
        assert_eq!(manifest.string("Path").unwrap(), "C:\\");
        assert_eq!(manifest.string("Next").unwrap(), "1");
    }

    #[test]
    fn whitespace_separates_key_and_value() {
        let manifest = Manifest::parse("PlayerVersionStable 2.1\nForceStable\t= true\nEmpty");
        assert_eq!(manifest.string("PlayerVersionStable").unwrap(), "2.1");
        assert!(manifest.boolean("ForceStable").unwrap());
        assert_eq!(manifest.string("Empty").unwrap(), "");
    }

    #[test]
    fn missing_key_is_an_error() {
        let manifest = Manifest::parse(SAMPLE);
        let err = manifest.string("JavaVersionStable").unwrap_err();
        assert!(matches!(err, UpdateError::ManifestKey { ref key, .. } if key == "JavaVersionStable"));
    }

    #[test]
    fn malformed_typed_values_are_rejected() {
        let manifest = Manifest::parse("ForceStable=maybe\nLatestRolloutPercent=lots");
        assert!(manifest.boolean("ForceStable").is_err());
        assert!(manifest.integer("LatestRolloutPercent").is_err());
    }
}
