//! # Group: the phased lifecycle orchestrator.
//!
//! A [`Group`] composes independently written units into one process and
//! drives them through a deterministic pipeline:
//!
//! ```text
//! register(unit)*          // slot into every phase list the unit satisfies
//!     │
//! run_config(args)         // sequential, one pass
//!     ├──► implicit health service (unless disabled)
//!     ├──► resolve display name (builder → binary name → --name/-n)
//!     ├──► initialize every Initializer, clearing its slot
//!     ├──► notify every Namer of the resolved name
//!     ├──► merge unit flag sets into the reserved set, first wins
//!     ├──► full argv parse, then --help/--version/--show-rungroup-units bail
//!     └──► validate every Config unit, accumulating errors
//! run(args)                // implies run_config when not yet configured
//!     ├──► initialize Initializers registered after config
//!     ├──► pre_run every PreRunner in order, first failure aborts
//!     ├──► offer every unit to the health aggregator
//!     └──► hand services to the supervisor and wait
//! ```
//!
//! ## Rules
//! - Phase lists preserve registration order for the life of the group;
//!   deregistration nulls slots and never renumbers.
//! - After the config phase has run, new registrations skip the Namer and
//!   Config lists but still join Initialize, PreRun and Serve.
//! - The group is cheap to clone (shared state), so units can hold a handle
//!   and deregister peers from inside a phase. Deregistering a service once
//!   serving has started has no effect.
//! - A group is consumed by one run; it is not reusable afterwards.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info};

use crate::error::{MultiError, RunError};
use crate::flags::{scan_name, FlagSet, MergedFlags, Var};
use crate::health::HealthService;
use crate::units::UnitRef;
use crate::version;

use super::builder::GroupBuilder;
use super::supervisor::{Actor, ExecuteFuture, InterruptFn, Supervisor};

/// The lifecycle orchestrator. See the module docs for the pipeline.
#[derive(Clone)]
pub struct Group {
    inner: Arc<Inner>,
}

pub(crate) struct Options {
    pub(crate) name: Option<String>,
    pub(crate) help_text: String,
    pub(crate) version: String,
    pub(crate) health: bool,
    pub(crate) health_service: Option<Arc<HealthService>>,
}

struct Inner {
    opts: Options,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    name: String,
    configured: bool,
    health: Option<Arc<HealthService>>,
    initializers: Vec<Option<UnitRef>>,
    namers: Vec<Option<UnitRef>>,
    configs: Vec<Option<UnitRef>>,
    pre_runners: Vec<Option<UnitRef>>,
    services: Vec<Option<UnitRef>>,
    actors: Vec<Actor>,
}

/// Destinations for the reserved "Common Service options" flags, rebuilt on
/// every config pass together with the merged flag set.
struct ReservedFlags {
    name: Var<String>,
    show_version: Var<bool>,
    show_help: Var<bool>,
    show_units: Var<bool>,
}

impl Default for Group {
    fn default() -> Self {
        Group::builder().build()
    }
}

impl Group {
    pub fn builder() -> GroupBuilder {
        GroupBuilder::new()
    }

    pub(crate) fn with_options(opts: Options) -> Self {
        let name = opts.name.clone().unwrap_or_default();
        Group {
            inner: Arc::new(Inner {
                opts,
                state: Mutex::new(State {
                    name,
                    ..State::default()
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Resolved display name.
    pub fn name(&self) -> String {
        self.lock().name.clone()
    }

    /// Registers a unit, slotting it into every phase list whose capability
    /// it satisfies. Returns `true` when the unit was placed in at least one
    /// list; a bare unit with no capability returns `false`.
    pub fn register(&self, unit: UnitRef) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        let mut placed = false;
        if unit.as_initializer().is_some() {
            state.initializers.push(Some(Arc::clone(&unit)));
            placed = true;
        }
        if !state.configured {
            if unit.as_namer().is_some() {
                state.namers.push(Some(Arc::clone(&unit)));
                placed = true;
            }
            if unit.as_config().is_some() {
                state.configs.push(Some(Arc::clone(&unit)));
                placed = true;
            }
        }
        if unit.as_pre_runner().is_some() {
            state.pre_runners.push(Some(Arc::clone(&unit)));
            placed = true;
        }
        if unit.as_service().is_some() {
            state.services.push(Some(unit));
            placed = true;
        }
        placed
    }

    /// Clears every slot holding this exact unit (object identity, not
    /// name). Returns `true` when at least one slot was cleared. Slots are
    /// nulled, never compacted, so later units keep their positions.
    pub fn deregister(&self, unit: &UnitRef) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        let mut cleared = false;
        for list in [
            &mut state.initializers,
            &mut state.namers,
            &mut state.configs,
            &mut state.pre_runners,
            &mut state.services,
        ] {
            for slot in list.iter_mut() {
                if slot.as_ref().is_some_and(|u| Arc::ptr_eq(u, unit)) {
                    *slot = None;
                    cleared = true;
                }
            }
        }
        cleared
    }

    /// Registers a raw actor pair with the internal supervisor, for startup
    /// and shutdown logic that does not fit the [`Service`](crate::Service)
    /// contract. Custom actors run alongside services but do not count as
    /// services for the clean-exit check.
    pub fn add<E, I>(&self, execute: E, interrupt: I)
    where
        E: Future<Output = Result<(), RunError>> + Send + 'static,
        I: FnOnce(Option<&RunError>) + Send + 'static,
    {
        let interrupt: InterruptFn = Box::new(
            move |cause: Option<&RunError>| -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
                interrupt(cause);
                Box::pin(async {})
            },
        );
        self.lock().actors.push(Actor {
            execute: Box::pin(execute),
            interrupt,
        });
    }

    /// Runs the config phase: flag registration, argv parsing, early bail
    /// handling and validation.
    ///
    /// Returns [`RunError::BailEarly`] after `--help`, `--version` or
    /// `--show-rungroup-units` handled the request; [`Group::run`] translates
    /// that to success. An empty `args` falls back to `std::env::args()`.
    pub async fn run_config<I, S>(&self, args: I) -> Result<(), RunError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self.config_phase(collect_args(args)).await {
            Err(err) if err.is_bail_early() => Err(err),
            Err(err) => {
                error!("unexpected exit: {err}");
                Err(err)
            }
            Ok(()) => Ok(()),
        }
    }

    /// Runs the full lifecycle and blocks until the first service returns
    /// and every peer has been torn down.
    ///
    /// Invokes the config phase first when [`Group::run_config`] has not run
    /// yet. An empty `args` falls back to `std::env::args()`.
    pub async fn run<I, S>(&self, args: I) -> Result<(), RunError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self.run_phase(collect_args(args)).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_bail_early() => Ok(()),
            Err(err) if err.is_requested_shutdown() => {
                info!("received shutdown request");
                Ok(())
            }
            Err(err) => {
                error!("unexpected exit: {err}");
                Err(err)
            }
        }
    }

    async fn config_phase(&self, args: Vec<String>) -> Result<(), RunError> {
        // implicit health service, exactly once per group
        let implicit = {
            let mut state = self.lock();
            if self.inner.opts.health && state.health.is_none() {
                let service = self
                    .inner
                    .opts
                    .health_service
                    .clone()
                    .unwrap_or_else(|| Arc::new(HealthService::new()));
                state.health = Some(Arc::clone(&service));
                Some(service)
            } else {
                None
            }
        };
        if let Some(service) = implicit {
            self.register(service);
        }

        let argv0 = args.first().cloned().unwrap_or_default();
        let tail: Vec<String> = args.iter().skip(1).cloned().collect();

        let reserved = {
            let mut state = self.lock();
            state.configured = true;
            if state.name.is_empty() {
                state.name = binary_name(&argv0);
            }
            // the --name flag overrides whatever was set so far, and must be
            // final before the full parse runs against all user flags
            if let Some(name) = scan_name(&tail) {
                state.name = name;
            }
            ReservedFlags {
                name: Var::new(state.name.clone()),
                show_version: Var::new(false),
                show_help: Var::new(false),
                show_units: Var::new(false),
            }
        };
        let resolved = self.name();
        let help_text = self.inner.opts.help_text.replace("{{.Name}}", &argv0);

        // initializers run once; their slots are cleared so a later run
        // phase only touches initializers registered after this point
        let initializers: Vec<UnitRef> = {
            let mut guard = self.lock();
            guard
                .initializers
                .iter_mut()
                .filter_map(|slot| slot.take())
                .collect()
        };
        for unit in &initializers {
            if let Some(init) = unit.as_initializer() {
                debug!(unit = %unit.name(), "initializing");
                init.initialize();
            }
        }

        let namers = snapshot(&self.lock().namers);
        for unit in &namers {
            if let Some(namer) = unit.as_namer() {
                namer.group_name(&resolved);
            }
        }

        let mut merged = MergedFlags::new();
        merged.merge(reserved_flag_set(&reserved, &resolved));

        let configs = snapshot(&self.lock().configs);
        for (idx, unit) in configs.iter().enumerate() {
            let Some(config) = unit.as_config() else {
                continue;
            };
            match config.flag_set() {
                Some(set) => merged.merge(set),
                None => {
                    debug!(unit = %unit.name(), index = idx, "configuration object did not return a flag set")
                }
            }
        }

        merged.parse(&resolved, &tail)?;

        if reserved.show_help.get() {
            println!("{}", merged.help(&resolved, &help_text));
            return Err(RunError::BailEarly);
        }
        if reserved.show_version.get() {
            version::show(&resolved, &self.inner.opts.version);
            return Err(RunError::BailEarly);
        }
        if reserved.show_units.get() {
            println!("{}", self.inventory());
            return Err(RunError::BailEarly);
        }

        // validation does not short-circuit: every config unit reports
        let mut validation = MultiError::new();
        for unit in &configs {
            if let Some(config) = unit.as_config() {
                if let Err(err) = config.validate() {
                    validation.push(err);
                }
            }
        }
        validation.into_result()?;

        info!(
            "{} {} started",
            resolved,
            version::parse(&self.inner.opts.version)
        );
        Ok(())
    }

    async fn run_phase(&self, args: Vec<String>) -> Result<(), RunError> {
        if !self.lock().configured {
            self.config_phase(args).await?;
        }

        // initializers registered after the config phase
        let late: Vec<UnitRef> = {
            let mut guard = self.lock();
            guard
                .initializers
                .iter_mut()
                .filter_map(|slot| slot.take())
                .collect()
        };
        for unit in &late {
            if let Some(init) = unit.as_initializer() {
                init.initialize();
            }
        }

        let pre_runners = snapshot(&self.lock().pre_runners);
        for unit in &pre_runners {
            let Some(pre) = unit.as_pre_runner() else {
                continue;
            };
            debug!(unit = %unit.name(), "pre-run");
            if let Err(err) = pre.pre_run().await {
                return Err(RunError::PreRun {
                    unit: unit.name().to_string(),
                    source: Box::new(err),
                });
            }
        }

        let (custom, services, health) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            (
                std::mem::take(&mut state.actors),
                state
                    .services
                    .iter()
                    .flatten()
                    .cloned()
                    .collect::<Vec<UnitRef>>(),
                state.health.clone(),
            )
        };

        // offer every still-registered unit to the health aggregator right
        // before the services are handed to the supervisor
        if let Some(aggregator) = &health {
            for unit in self.all_units() {
                aggregator.register_unit(&unit);
            }
        }

        let has_services = !services.is_empty();
        let mut supervisor = Supervisor::new();
        for actor in custom {
            supervisor.add(actor);
        }
        for unit in services {
            supervisor.add(service_actor(unit));
        }

        match supervisor.run().await {
            // a blocking service returning cleanly is a bug unless shutdown
            // was requested; surface it
            Ok(()) if has_services => Err(RunError::UnexpectedCleanExit),
            Ok(()) => {
                info!("done");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn all_units(&self) -> Vec<UnitRef> {
        let guard = self.lock();
        let mut units = Vec::new();
        for list in [
            &guard.initializers,
            &guard.namers,
            &guard.configs,
            &guard.pre_runners,
            &guard.services,
        ] {
            units.extend(list.iter().flatten().cloned());
        }
        units
    }

    /// Renders the unit inventory: each phase header followed by the names of
    /// the units still registered in that phase, plus a `[svc]`/`[cli]` tag.
    fn inventory(&self) -> String {
        let guard = self.lock();
        let tag = if guard.services.iter().flatten().next().is_some() {
            "[svc]"
        } else {
            "[cli]"
        };
        let mut out = format!("{} {}\n", guard.name, tag);
        for (header, list) in [
            ("initialize", &guard.initializers),
            ("config", &guard.configs),
            ("pre-run", &guard.pre_runners),
            ("serve", &guard.services),
        ] {
            out.push_str(header);
            out.push_str(":\n");
            for unit in list.iter().flatten() {
                out.push_str("- ");
                out.push_str(unit.name());
                out.push('\n');
            }
        }
        out
    }
}

fn collect_args<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();
    if args.is_empty() {
        std::env::args().collect()
    } else {
        args
    }
}

fn snapshot(list: &[Option<UnitRef>]) -> Vec<UnitRef> {
    list.iter().flatten().cloned().collect()
}

fn binary_name(argv0: &str) -> String {
    Path::new(argv0)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| argv0.to_string())
}

fn reserved_flag_set(reserved: &ReservedFlags, name: &str) -> FlagSet {
    let mut set = FlagSet::new("Common Service options");
    set.string_var(
        &reserved.name,
        "name",
        Some('n'),
        name,
        "name of this service",
    );
    set.bool_var(
        &reserved.show_version,
        "version",
        Some('v'),
        false,
        "show version information and exit",
    );
    set.bool_var(
        &reserved.show_help,
        "help",
        Some('h'),
        false,
        "show this help information and exit",
    );
    set.bool_var(
        &reserved.show_units,
        "show-rungroup-units",
        None,
        false,
        "show the units registered with this group and exit",
    );
    set.mark_hidden("show-rungroup-units");
    set
}

fn service_actor(unit: UnitRef) -> Actor {
    let serve_unit = Arc::clone(&unit);
    let execute: ExecuteFuture = Box::pin(async move {
        match serve_unit.as_service() {
            Some(service) => service.serve().await,
            None => Ok(()),
        }
    });
    let interrupt: InterruptFn = Box::new(
        move |_cause: Option<&RunError>| -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
            Box::pin(async move {
                if let Some(service) = unit.as_service() {
                    service.graceful_stop().await;
                }
            })
        },
    );
    Actor { execute, interrupt }
}
