//! # The process-wide merged flag set.
//!
//! Built anew on every config pass. Sections keep the order in which flag
//! sets were merged, and flags inside a section keep registration order, so
//! help output is stable and grouped by originating set.
//!
//! ## Duplicate policy
//! An option whose long name is already taken is silently dropped with a
//! warning; first registration wins. The group merges its reserved set first,
//! which is how reserved names beat any unit-contributed option. A taken
//! short alias downgrades the newcomer to long-form only.

use std::collections::HashSet;

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::warn;

use crate::error::RunError;

use super::set::{Flag, FlagKind, FlagSet};

pub(crate) struct MergedFlags {
    sections: Vec<Section>,
    longs: HashSet<String>,
    shorts: HashSet<char>,
}

struct Section {
    name: String,
    flags: Vec<Flag>,
}

impl MergedFlags {
    pub(crate) fn new() -> Self {
        Self {
            sections: Vec::new(),
            longs: HashSet::new(),
            shorts: HashSet::new(),
        }
    }

    /// Merges a flag set under the duplicate policy above.
    pub(crate) fn merge(&mut self, set: FlagSet) {
        let (name, flags) = set.into_parts();
        let mut kept = Vec::with_capacity(flags.len());
        for mut flag in flags {
            if self.longs.contains(&flag.long) {
                warn!(flag = %flag.long, set = %name, "ignoring duplicate flag");
                continue;
            }
            if let Some(short) = flag.short {
                if self.shorts.contains(&short) {
                    warn!(
                        flag = %flag.long,
                        short = %short,
                        set = %name,
                        "short alias already taken, keeping long form only"
                    );
                    flag.short = None;
                } else {
                    self.shorts.insert(short);
                }
            }
            self.longs.insert(flag.long.clone());
            kept.push(flag);
        }
        self.sections.push(Section { name, flags: kept });
    }

    /// Parses the argv tail (program name already stripped) and writes every
    /// value provided on the command line into its destination.
    pub(crate) fn parse(&self, name: &str, tail: &[String]) -> Result<(), RunError> {
        let matches = self
            .command(name)
            .try_get_matches_from(tail)
            .map_err(|e| RunError::Parse {
                reason: e.to_string(),
            })?;
        self.apply(&matches)
    }

    fn command(&self, name: &str) -> Command {
        let mut cmd = Command::new(name.to_string())
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true);
        for flag in self.iter_flags() {
            let mut arg = Arg::new(flag.long.clone()).long(flag.long.clone());
            if let Some(short) = flag.short {
                arg = arg.short(short);
            }
            arg = match flag.kind {
                FlagKind::Switch => arg.action(ArgAction::SetTrue),
                FlagKind::Value => arg.action(ArgAction::Set),
            };
            if flag.hidden {
                arg = arg.hide(true);
            }
            cmd = cmd.arg(arg);
        }
        cmd
    }

    fn apply(&self, matches: &ArgMatches) -> Result<(), RunError> {
        for flag in self.iter_flags() {
            match flag.kind {
                FlagKind::Switch => {
                    if matches.get_flag(flag.long.as_str()) {
                        (flag.apply)("true")?;
                    }
                }
                FlagKind::Value => {
                    if matches.value_source(flag.long.as_str()) == Some(ValueSource::CommandLine) {
                        if let Some(value) = matches.get_one::<String>(flag.long.as_str()) {
                            (flag.apply)(value)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn iter_flags(&self) -> impl Iterator<Item = &Flag> {
        self.sections.iter().flat_map(|s| s.flags.iter())
    }

    /// Renders help output grouped by flag-set name, hidden flags skipped.
    pub(crate) fn help(&self, name: &str, help_text: &str) -> String {
        let mut out = format!("Usage of {name}:\n");
        if !help_text.is_empty() {
            out.push_str(help_text);
            out.push('\n');
        }
        for section in &self.sections {
            let visible: Vec<&Flag> = section.flags.iter().filter(|f| !f.hidden).collect();
            if visible.is_empty() {
                continue;
            }
            out.push('\n');
            out.push_str(&section.name);
            out.push_str(":\n");
            for flag in visible {
                let names = match flag.short {
                    Some(short) => format!("-{short}, --{}", flag.long),
                    None => format!("    --{}", flag.long),
                };
                if flag.value_hint.is_empty() {
                    out.push_str(&format!("  {names}\n"));
                } else {
                    out.push_str(&format!("  {names} {}\n", flag.value_hint));
                }
                match &flag.default_text {
                    Some(default) => {
                        out.push_str(&format!("    \t{} (default {default})\n", flag.usage))
                    }
                    None => out.push_str(&format!("    \t{}\n", flag.usage)),
                }
            }
        }
        out
    }
}

/// Deterministic pre-scan of the argv tail for the reserved `--name/-n`
/// option, used to resolve the group name before the full parse. Unknown
/// flags and malformed input are ignored here; the full parse reports them.
pub(crate) fn scan_name(tail: &[String]) -> Option<String> {
    let mut iter = tail.iter();
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }
        if let Some(value) = arg.strip_prefix("--name=") {
            return Some(value.to_string());
        }
        if let Some(value) = arg.strip_prefix("-n=") {
            return Some(value.to_string());
        }
        if arg == "--name" || arg == "-n" {
            return iter.next().cloned();
        }
    }
    None
}
