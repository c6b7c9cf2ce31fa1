//! # Flag sets: named groups of configuration options.
//!
//! A [`FlagSet`] carries a user-visible name, used as the section heading in
//! help output, and the options a unit contributes. Options write their
//! parsed values into shared [`Var`] destinations held by the owning unit, so
//! a unit keeps normal field access to its configuration after the parse.
//!
//! Registering an option stores its default into the destination immediately;
//! a flag dropped later by the duplicate policy therefore leaves its unit
//! with the default it declared.

use std::sync::{Arc, Mutex};

use crate::error::RunError;

/// Shared parse destination for a single flag value.
///
/// Units hold a `Var<T>` per option and hand clones to their
/// [`FlagSet`]; the group's parser writes through the clone.
#[derive(Debug)]
pub struct Var<T>(Arc<Mutex<T>>);

impl<T> Clone for Var<T> {
    fn clone(&self) -> Self {
        Var(Arc::clone(&self.0))
    }
}

impl<T: Default> Default for Var<T> {
    fn default() -> Self {
        Var::new(T::default())
    }
}

impl<T> Var<T> {
    pub fn new(value: T) -> Self {
        Var(Arc::new(Mutex::new(value)))
    }

    pub fn set(&self, value: T) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = value;
    }
}

impl<T: Clone> Var<T> {
    pub fn get(&self) -> T {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

pub(crate) type ApplyFn = Box<dyn Fn(&str) -> Result<(), RunError> + Send + Sync>;

/// Whether a flag takes a value or is a bare switch.
pub(crate) enum FlagKind {
    Switch,
    Value,
}

pub(crate) struct Flag {
    pub(crate) long: String,
    pub(crate) short: Option<char>,
    pub(crate) usage: String,
    pub(crate) kind: FlagKind,
    /// Value type shown in help output; empty for switches.
    pub(crate) value_hint: &'static str,
    /// Default rendered in help output; `None` for zero values.
    pub(crate) default_text: Option<String>,
    pub(crate) hidden: bool,
    pub(crate) apply: ApplyFn,
}

/// Named collection of options contributed by a unit.
pub struct FlagSet {
    name: String,
    flags: Vec<Flag>,
}

impl FlagSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: Vec::new(),
        }
    }

    /// Section name shown in help output.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a string option. The default is stored into `var` now.
    pub fn string_var(
        &mut self,
        var: &Var<String>,
        long: impl Into<String>,
        short: Option<char>,
        default: impl Into<String>,
        usage: impl Into<String>,
    ) {
        let default = default.into();
        var.set(default.clone());
        let dst = var.clone();
        self.flags.push(Flag {
            long: long.into(),
            short,
            usage: usage.into(),
            kind: FlagKind::Value,
            value_hint: "string",
            default_text: (!default.is_empty()).then(|| format!("{default:?}")),
            hidden: false,
            apply: Box::new(move |raw| {
                dst.set(raw.to_string());
                Ok(())
            }),
        });
    }

    /// Registers an integer option. The default is stored into `var` now.
    pub fn int_var(
        &mut self,
        var: &Var<i64>,
        long: impl Into<String>,
        short: Option<char>,
        default: i64,
        usage: impl Into<String>,
    ) {
        let long = long.into();
        var.set(default);
        let dst = var.clone();
        let flag_name = long.clone();
        self.flags.push(Flag {
            long,
            short,
            usage: usage.into(),
            kind: FlagKind::Value,
            value_hint: "int",
            default_text: (default != 0).then(|| default.to_string()),
            hidden: false,
            apply: Box::new(move |raw| {
                let value = raw.trim().parse::<i64>().map_err(|e| RunError::Parse {
                    reason: format!("invalid value {raw:?} for flag --{flag_name}: {e}"),
                })?;
                dst.set(value);
                Ok(())
            }),
        });
    }

    /// Registers a boolean switch. The default is stored into `var` now.
    pub fn bool_var(
        &mut self,
        var: &Var<bool>,
        long: impl Into<String>,
        short: Option<char>,
        default: bool,
        usage: impl Into<String>,
    ) {
        var.set(default);
        let dst = var.clone();
        self.flags.push(Flag {
            long: long.into(),
            short,
            usage: usage.into(),
            kind: FlagKind::Switch,
            value_hint: "",
            default_text: default.then(|| "true".to_string()),
            hidden: false,
            apply: Box::new(move |_| {
                dst.set(true);
                Ok(())
            }),
        });
    }

    /// Hides a previously registered flag from help output. It still parses.
    pub fn mark_hidden(&mut self, long: &str) {
        if let Some(flag) = self.flags.iter_mut().find(|f| f.long == long) {
            flag.hidden = true;
        }
    }

    pub(crate) fn into_parts(self) -> (String, Vec<Flag>) {
        (self.name, self.flags)
    }
}
