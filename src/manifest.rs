//! The `.gems` manifest: one pinned gem per line.
//!
//! Recognized lines are `<name> --version <version>` pairs (short `-v`
//! spellings included) and `#` comments. Anything else is ignored.

use std::fs;
use std::path::Path;

use anyhow::Context;

pub const DEFAULT_MANIFEST: &str = ".gems";

const COMMENT_MARKER: char = '#';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub version: String,
}

impl Dependency {
    /// Canonical manifest form.
    pub fn to_line(&self) -> String {
        format!("{} --version {}", self.name, self.version)
    }

    /// Directory the gem would occupy when unpacked under `vendor/gems`.
    pub fn vendored_dir_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Dependency(Dependency),
    Comment,
    Unrecognized,
}

pub fn parse_line(raw: &str) -> Line {
    let line = raw.trim();
    if line.starts_with(COMMENT_MARKER) {
        return Line::Comment;
    }

    let mut tokens = line.split_whitespace();
    let Some(name) = tokens.next() else {
        return Line::Unrecognized;
    };
    let Some(flag) = tokens.next() else {
        return Line::Unrecognized;
    };

    let version = match flag {
        "-v" | "--version" => tokens.next().map(str::to_string),
        _ => flag
            .strip_prefix("--version=")
            .or_else(|| flag.strip_prefix("-v"))
            .filter(|rest| !rest.is_empty())
            .map(str::to_string),
    };

    match version {
        Some(version) if tokens.next().is_none() => Line::Dependency(Dependency {
            name: name.to_string(),
            version,
        }),
        _ => Line::Unrecognized,
    }
}

/// Pinned dependencies in file order.
pub fn parse_manifest(content: &str) -> Vec<Dependency> {
    content
        .lines()
        .filter_map(|line| match parse_line(line) {
            Line::Dependency(dep) => Some(dep),
            Line::Comment | Line::Unrecognized => None,
        })
        .collect()
}

pub fn load_manifest(path: &Path) -> anyhow::Result<Vec<Dependency>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading manifest at {}", path.display()))?;
    Ok(parse_manifest(&data))
}

/// Rewrite exported content into canonical form.
///
/// Comments and blank lines are dropped, dependency pairs are rewritten with
/// the long `--version` flag, and any other line is kept verbatim. The result
/// always ends with exactly one newline.
pub fn canonicalize(content: &str) -> String {
    let lines: Vec<String> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match parse_line(line) {
            Line::Dependency(dep) => Some(dep.to_line()),
            Line::Comment => None,
            Line::Unrecognized => Some(line.trim_end().to_string()),
        })
        .collect();

    let mut output = lines.join("\n");
    output.push('\n');
    output
}

/// Canonicalize the manifest at `path` in place.
pub fn rewrite_locked(path: &Path) -> anyhow::Result<()> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading exported manifest at {}", path.display()))?;
    fs::write(path, canonicalize(&data))
        .with_context(|| format!("writing manifest at {}", path.display()))?;
    Ok(())
}
