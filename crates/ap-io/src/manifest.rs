//! Sectioned key-value manifests.
//!
//! ```text
//! [sim_info]
//! case = wing_u10
//! path_to_data = /data/wing/u10
//! [parameters]
//! u_inf = 10.0
//! alpha = 2.0
//! ```
//!
//! Keys that appear before the first header belong to the root section,
//! named `""`. Entry order is preserved.

use std::path::{Path, PathBuf};

use crate::{IoError, IoResult, read_to_string};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Section {
    pub name: String,
    pub entries: Vec<(String, String)>,
}

impl Section {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    path: PathBuf,
    sections: Vec<Section>,
}

impl Manifest {
    pub fn read(path: &Path) -> IoResult<Self> {
        let content = read_to_string(path)?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> IoResult<Self> {
        let mut sections = vec![Section::default()];

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') {
                let line = strip_inline_comment(line);
                let name = line.trim_start_matches('[').trim_end_matches(']').trim();
                if name.is_empty() || !line.ends_with(']') {
                    return Err(IoError::Parse {
                        path: path.to_path_buf(),
                        line: lineno + 1,
                        message: format!("bad section header '{line}'"),
                    });
                }
                sections.push(Section {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(IoError::Parse {
                    path: path.to_path_buf(),
                    line: lineno + 1,
                    message: format!("expected 'key = value', found '{line}'"),
                });
            };
            let key = unquote(key.trim());
            let value = unquote(strip_inline_comment(value.trim()));
            if let Some(current) = sections.last_mut() {
                current.entries.push((key.to_string(), value.to_string()));
            }
        }

        if sections.first().is_some_and(Section::is_empty) {
            sections.remove(0);
        }

        Ok(Self {
            path: path.to_path_buf(),
            sections,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn require_section(&self, name: &str) -> IoResult<&Section> {
        self.section(name).ok_or_else(|| IoError::MissingKey {
            path: self.path.clone(),
            key: format!("[{name}]"),
        })
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.get(key))
    }

    pub fn require(&self, section: &str, key: &str) -> IoResult<&str> {
        self.get(section, key).ok_or_else(|| IoError::MissingKey {
            path: self.path.clone(),
            key: format!("{section}.{key}"),
        })
    }
}

fn strip_inline_comment(value: &str) -> &str {
    if value.starts_with('"') || value.starts_with('\'') {
        return value;
    }
    match value.find(" #") {
        Some(pos) => value[..pos].trim_end(),
        None => value,
    }
}

fn unquote(value: &str) -> &str {
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# generated
[sim_info]
case = wing_u10
path_to_data = \"/data/wing/u10\"

[parameters]
u_inf = 10.0  # m/s
alpha = 2.0
";

    #[test]
    fn parses_sections_in_order() {
        let m = Manifest::parse(SAMPLE, Path::new("case.pmor.sharpy")).unwrap();
        assert_eq!(m.sections().len(), 2);
        assert_eq!(m.get("sim_info", "path_to_data"), Some("/data/wing/u10"));

        let params = m.section("parameters").unwrap();
        let keys: Vec<&str> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["u_inf", "alpha"]);
        assert_eq!(params.get("u_inf"), Some("10.0"));
    }

    #[test]
    fn root_keys_kept_in_unnamed_section() {
        let m = Manifest::parse("version = 2\n[a]\nx = 1\n", Path::new("m")).unwrap();
        assert_eq!(m.get("", "version"), Some("2"));
        assert_eq!(m.get("a", "x"), Some("1"));
    }

    #[test]
    fn nested_headers_are_flattened() {
        let m = Manifest::parse("[[inner]]\nk = v\n", Path::new("m")).unwrap();
        assert_eq!(m.get("inner", "k"), Some("v"));
    }

    #[test]
    fn header_comment_is_ignored() {
        let m = Manifest::parse("[parameters]  # sweep\nalpha = 2.0\n", Path::new("m")).unwrap();
        assert_eq!(m.get("parameters", "alpha"), Some("2.0"));

        let err = Manifest::parse("[parameters # sweep\n", Path::new("m")).unwrap_err();
        assert!(matches!(err, IoError::Parse { line: 1, .. }));
    }

    #[test]
    fn missing_equals_is_parse_error() {
        let err = Manifest::parse("[a]\njust text\n", Path::new("m")).unwrap_err();
        assert!(matches!(err, IoError::Parse { line: 2, .. }));
    }

    #[test]
    fn require_reports_missing_key() {
        let m = Manifest::parse(SAMPLE, Path::new("m")).unwrap();
        let err = m.require("sim_info", "nope").unwrap_err();
        assert!(err.to_string().contains("sim_info.nope"));
    }
}
