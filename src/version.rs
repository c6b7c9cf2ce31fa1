//! # Build version stamping.
//!
//! Parses the version string a build pipeline embeds from
//! `git describe --tags --long` with the branch name appended:
//!
//! ```text
//! <release tag>-<commits since tag>-g<commit hash>-<branch>
//! e.g. 0.6.6-rc1-15-g12345678-want-more-branch
//! ```
//!
//! The raw string is handed to
//! [`GroupBuilder::version`](crate::GroupBuilder::version); the reserved
//! `--version` flag prints the parsed rendering. Builds without stamping
//! render as `v0.0.0-unofficial`.

use std::fmt;

/// Version details extracted from a git describe string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildInfo {
    pub closest_tag: String,
    pub commits_ahead: u32,
    pub sha: String,
    pub branch: String,
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == BuildInfo::default() {
            // built without the version stamping tooling
            return write!(f, "v0.0.0-unofficial");
        }
        if self.commits_ahead != 0 {
            // built from a non-release commit point
            return write!(
                f,
                "{}-{} ({}, +{})",
                self.closest_tag, self.branch, self.sha, self.commits_ahead
            );
        }
        if self.branch != "master" && self.branch != "HEAD" {
            // branch-specific release build
            return write!(f, "{}-{}", self.closest_tag, self.branch);
        }
        write!(f, "{}", self.closest_tag)
    }
}

/// Parses a raw describe string; anything unparseable yields the
/// `v0.0.0-unofficial` fallback.
pub fn parse(raw: &str) -> BuildInfo {
    parse_describe(raw).unwrap_or_default()
}

/// Prints `<name> <version>` for the reserved `--version` flag.
pub fn show(name: &str, raw: &str) {
    println!("{name} {}", parse(raw));
}

fn parse_describe(raw: &str) -> Option<BuildInfo> {
    let (sep_start, sep_end, commits_ahead) = find_separator(raw)?;

    // the remainder is "<sha>-<branch>"
    let rest = &raw[sep_end..];
    let dash = rest.find('-')?;
    let sha = &rest[..dash];
    let branch = &rest[dash + 1..];
    if sha.is_empty() || branch.is_empty() {
        return None;
    }

    // git module tags carry the leading "v"; normalize tags that omit it
    let closest_tag = if raw.chars().next().map(|c| c.to_ascii_lowercase()) == Some('v') {
        raw[..sep_start].to_string()
    } else {
        format!("v{}", &raw[..sep_start])
    };

    Some(BuildInfo {
        closest_tag,
        commits_ahead,
        sha: sha.to_string(),
        branch: branch.to_string(),
    })
}

/// Locates the `-<digits>-g` separator between tag and commit hash, returning
/// the separator bounds and the commits-ahead count.
fn find_separator(raw: &str) -> Option<(usize, usize, u32)> {
    let bytes = raw.as_bytes();
    let mut search = 0;
    while let Some(found) = raw[search..].find("-g") {
        let g_start = search + found;
        let mut digits_start = g_start;
        while digits_start > 0 && bytes[digits_start - 1].is_ascii_digit() {
            digits_start -= 1;
        }
        if digits_start < g_start && digits_start > 0 && bytes[digits_start - 1] == b'-' {
            if let Ok(commits) = raw[digits_start..g_start].parse::<u32>() {
                // consume any run of "g"s so the hash starts clean
                let mut sep_end = g_start + 2;
                while sep_end < bytes.len() && bytes[sep_end] == b'g' {
                    sep_end += 1;
                }
                return Some((digits_start - 1, sep_end, commits));
            }
        }
        search = g_start + 2;
    }
    None
}
