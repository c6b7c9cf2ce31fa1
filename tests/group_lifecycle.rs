//! End-to-end lifecycle tests driving a full group through config, pre-run
//! and serve with probe units that record every call they receive.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use rungroup::testkit::IrqService;
use rungroup::{
    Config, FlagSet, Group, Initializer, PreRunner, RunError, Service, ServiceFn, Unit, UnitRef,
    Var,
};

/// Full-lifecycle probe: Config + PreRunner + Service, counting every call.
struct ProbeService {
    config_item: Var<i64>,
    flag_set_calls: AtomicUsize,
    validate_calls: AtomicUsize,
    pre_run_calls: AtomicUsize,
    serve_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    stop: CancellationToken,
}

impl ProbeService {
    fn arc() -> Arc<Self> {
        Arc::new(Self {
            config_item: Var::new(0),
            flag_set_calls: AtomicUsize::new(0),
            validate_calls: AtomicUsize::new(0),
            pre_run_calls: AtomicUsize::new(0),
            serve_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            stop: CancellationToken::new(),
        })
    }
}

impl Unit for ProbeService {
    fn name(&self) -> &str {
        "probe"
    }

    fn as_config(&self) -> Option<&dyn Config> {
        Some(self)
    }

    fn as_pre_runner(&self) -> Option<&dyn PreRunner> {
        Some(self)
    }

    fn as_service(&self) -> Option<&dyn Service> {
        Some(self)
    }
}

impl Config for ProbeService {
    fn flag_set(&self) -> Option<FlagSet> {
        self.flag_set_calls.fetch_add(1, Ordering::SeqCst);
        let mut set = FlagSet::new("probe options");
        set.int_var(&self.config_item, "flagtest", Some('f'), 5, "lifecycle probe flag");
        Some(set)
    }

    fn validate(&self) -> Result<(), RunError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        if self.config_item.get() != 1 {
            return Err(RunError::other("flagset error"));
        }
        Ok(())
    }
}

#[async_trait]
impl PreRunner for ProbeService {
    async fn pre_run(&self) -> Result<(), RunError> {
        self.pre_run_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Service for ProbeService {
    async fn serve(&self) -> Result<(), RunError> {
        self.serve_calls.fetch_add(1, Ordering::SeqCst);
        self.stop.cancelled().await;
        Ok(())
    }

    async fn graceful_stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.stop.cancel();
    }
}

/// Service that blocks until stopped, recording serve/stop calls.
struct BlockingService {
    name: String,
    serve_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    stop: CancellationToken,
}

impl BlockingService {
    fn arc(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            serve_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            stop: CancellationToken::new(),
        })
    }
}

impl Unit for BlockingService {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_service(&self) -> Option<&dyn Service> {
        Some(self)
    }
}

#[async_trait]
impl Service for BlockingService {
    async fn serve(&self) -> Result<(), RunError> {
        self.serve_calls.fetch_add(1, Ordering::SeqCst);
        self.stop.cancelled().await;
        Ok(())
    }

    async fn graceful_stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.stop.cancel();
    }
}

/// Config-only unit contributing one integer flag.
struct FlagConfig {
    value: Var<i64>,
}

impl FlagConfig {
    fn arc() -> Arc<Self> {
        Arc::new(Self { value: Var::new(0) })
    }
}

impl Unit for FlagConfig {
    fn name(&self) -> &str {
        "flagcfg"
    }

    fn as_config(&self) -> Option<&dyn Config> {
        Some(self)
    }
}

impl Config for FlagConfig {
    fn flag_set(&self) -> Option<FlagSet> {
        let mut set = FlagSet::new("flag test config");
        set.int_var(&self.value, "flagtest", Some('f'), 10, "flagtester");
        Some(set)
    }

    fn validate(&self) -> Result<(), RunError> {
        Ok(())
    }
}

/// Config unit with no flags whose validation always fails.
struct FailingConfig {
    name: &'static str,
    message: &'static str,
}

impl Unit for FailingConfig {
    fn name(&self) -> &str {
        self.name
    }

    fn as_config(&self) -> Option<&dyn Config> {
        Some(self)
    }
}

impl Config for FailingConfig {
    fn flag_set(&self) -> Option<FlagSet> {
        None
    }

    fn validate(&self) -> Result<(), RunError> {
        Err(RunError::other(self.message))
    }
}

/// Pre-runner that deregisters a target unit before serving starts.
struct DeregPreRunner {
    group: Group,
    target: Mutex<Option<UnitRef>>,
}

impl Unit for DeregPreRunner {
    fn name(&self) -> &str {
        "dereg"
    }

    fn as_pre_runner(&self) -> Option<&dyn PreRunner> {
        Some(self)
    }
}

#[async_trait]
impl PreRunner for DeregPreRunner {
    async fn pre_run(&self) -> Result<(), RunError> {
        if let Some(target) = self.target.lock().unwrap().take() {
            assert!(self.group.deregister(&target));
        }
        Ok(())
    }
}

struct FailingPreRunner;

impl Unit for FailingPreRunner {
    fn name(&self) -> &str {
        "boom-unit"
    }

    fn as_pre_runner(&self) -> Option<&dyn PreRunner> {
        Some(self)
    }
}

#[async_trait]
impl PreRunner for FailingPreRunner {
    async fn pre_run(&self) -> Result<(), RunError> {
        Err(RunError::other("boom"))
    }
}

struct OkPreRunner;

impl Unit for OkPreRunner {
    fn name(&self) -> &str {
        "prep"
    }

    fn as_pre_runner(&self) -> Option<&dyn PreRunner> {
        Some(self)
    }
}

#[async_trait]
impl PreRunner for OkPreRunner {
    async fn pre_run(&self) -> Result<(), RunError> {
        Ok(())
    }
}

struct InitCounter {
    name: &'static str,
    count: AtomicUsize,
}

impl InitCounter {
    fn arc(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            count: AtomicUsize::new(0),
        })
    }
}

impl Unit for InitCounter {
    fn name(&self) -> &str {
        self.name
    }

    fn as_initializer(&self) -> Option<&dyn Initializer> {
        Some(self)
    }
}

impl Initializer for InitCounter {
    fn initialize(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Service that immediately fails, ending the group.
fn interruptor() -> UnitRef {
    ServiceFn::arc("interruptor", |_stop: CancellationToken| {
        std::future::ready(Err::<(), RunError>(RunError::other("interrupt")))
    })
}

#[tokio::test]
async fn full_service_lifecycle() {
    let group = Group::builder().disable_health().build();
    let probe = ProbeService::arc();
    assert!(group.register(probe.clone()));
    group.register(interruptor());

    let err = group.run(["./svc", "-f", "1"]).await.unwrap_err();
    assert_eq!(err.to_string(), "interrupt");

    assert_eq!(probe.flag_set_calls.load(Ordering::SeqCst), 1);
    assert_eq!(probe.validate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(probe.pre_run_calls.load(Ordering::SeqCst), 1);
    assert_eq!(probe.serve_calls.load(Ordering::SeqCst), 1);
    assert_eq!(probe.stop_calls.load(Ordering::SeqCst), 1);
    assert_eq!(probe.config_item.get(), 1);
}

#[tokio::test]
async fn duplicate_flag_first_registration_wins() {
    let group = Group::builder().disable_health().build();
    let first = FlagConfig::arc();
    let second = FlagConfig::arc();
    group.register(first.clone());
    group.register(second.clone());
    group.register(interruptor());

    let err = group.run(["./svc", "-f", "3"]).await.unwrap_err();
    assert_eq!(err.to_string(), "interrupt");
    assert_eq!(first.value.get(), 3);
    assert_eq!(second.value.get(), 10);
}

#[tokio::test]
async fn validation_errors_accumulate_in_registration_order() {
    let group = Group::builder().name("MyService").disable_health().build();
    for (name, message) in [
        ("cfg1", "cfg1 failed"),
        ("cfg2", "cfg2 failed"),
        ("cfg3", "cfg3 failed"),
    ] {
        group.register(Arc::new(FailingConfig { name, message }));
    }

    let err = group.run(["./svc"]).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "3 errors occurred:\n\t* cfg1 failed\n\t* cfg2 failed\n\t* cfg3 failed"
    );
}

#[tokio::test]
async fn early_bail_flags_return_success() {
    for flag in ["-v", "-h", "--version", "--help"] {
        let group = Group::builder()
            .help_text("placeholder for {{.Name}}")
            .disable_health()
            .build();
        // a failing config must not matter: early bail short-circuits validation
        group.register(Arc::new(FailingConfig {
            name: "cfg",
            message: "should never surface",
        }));
        assert!(
            group.run(["./svc", flag]).await.is_ok(),
            "expected clean bail for {flag}"
        );
    }

    let group = Group::builder().disable_health().build();
    let err = group.run(["./svc", "--non-existent"]).await.unwrap_err();
    assert!(matches!(err, RunError::Parse { .. }));
}

#[tokio::test]
async fn cooperative_shutdown_is_a_clean_exit() {
    let group = Group::builder().disable_health().build();
    let peer = BlockingService::arc("peer");
    group.register(peer.clone());
    group.register(ServiceFn::arc("quitter", |_stop: CancellationToken| {
        std::future::ready(Err::<(), RunError>(RunError::RequestedShutdown))
    }));

    assert!(group.run(["./svc"]).await.is_ok());
    assert_eq!(peer.stop_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn deregistered_service_is_never_served_or_stopped() {
    let group = Group::builder().disable_health().build();
    let s1 = BlockingService::arc("s1");
    let s1_ref: UnitRef = s1.clone();

    group.register(Arc::new(DeregPreRunner {
        group: group.clone(),
        target: Mutex::new(Some(s1_ref)),
    }));
    group.register(s1.clone());
    let other = BlockingService::arc("other");
    group.register(other.clone());
    group.register(interruptor());

    let err = group.run(["./svc"]).await.unwrap_err();
    assert_eq!(err.to_string(), "interrupt");

    assert_eq!(s1.serve_calls.load(Ordering::SeqCst), 0);
    assert_eq!(s1.stop_calls.load(Ordering::SeqCst), 0);
    assert_eq!(other.serve_calls.load(Ordering::SeqCst), 1);
    assert_eq!(other.stop_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn clean_service_exit_is_synthesized_into_an_error() {
    let group = Group::builder().disable_health().build();
    let peer = BlockingService::arc("peer");
    group.register(peer.clone());
    group.register(ServiceFn::arc("buggy", |_stop: CancellationToken| {
        std::future::ready(Ok::<(), RunError>(()))
    }));

    let err = group.run(["./svc"]).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "run terminated without explicit error condition"
    );
    assert_eq!(peer.stop_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pre_run_failure_aborts_before_serving() {
    let group = Group::builder().disable_health().build();
    group.register(Arc::new(FailingPreRunner));
    let svc = BlockingService::arc("svc");
    group.register(svc.clone());

    let err = group.run(["./svc"]).await.unwrap_err();
    assert_eq!(err.to_string(), "pre-run boom-unit: boom");
    assert_eq!(svc.serve_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn pre_runners_only_run_returns_success() {
    let group = Group::builder().disable_health().build();
    group.register(Arc::new(OkPreRunner));
    assert!(group.run(["./svc"]).await.is_ok());
}

#[tokio::test]
async fn initializers_run_exactly_once_per_registration() {
    let group = Group::builder().disable_health().build();
    let early = InitCounter::arc("early");
    group.register(early.clone());

    group.run_config(["./svc"]).await.unwrap();
    assert_eq!(early.count.load(Ordering::SeqCst), 1);

    let late = InitCounter::arc("late");
    group.register(late.clone());
    group.register(interruptor());

    let _ = group.run(["./svc"]).await;
    assert_eq!(early.count.load(Ordering::SeqCst), 1);
    assert_eq!(late.count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn custom_actor_pairs_run_with_the_group() {
    let group = Group::builder().disable_health().build();
    let interrupted = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&interrupted);
    group.add(
        std::future::ready(Err::<(), RunError>(RunError::other("interrupt"))),
        move |_cause| {
            seen.fetch_add(1, Ordering::SeqCst);
        },
    );

    let err = group.run(["./svc"]).await.unwrap_err();
    assert_eq!(err.to_string(), "interrupt");
    assert_eq!(interrupted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn irq_service_shuts_the_group_down() {
    let group = Group::builder().disable_health().build();
    let irq = Arc::new(IrqService::new());
    let worker = BlockingService::arc("worker");
    group.register(irq.clone());
    group.register(worker.clone());

    let runner = {
        let group = group.clone();
        tokio::spawn(async move { group.run(["./svc"]).await })
    };
    irq.close();

    assert!(runner.await.unwrap().is_ok());
    assert_eq!(worker.stop_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn name_flag_overrides_the_display_name() {
    let group = Group::builder().name("builder-name").disable_health().build();
    group.run_config(["./svc", "--name", "flag-name"]).await.unwrap();
    assert_eq!(group.name(), "flag-name");

    let group = Group::builder().disable_health().build();
    group.run_config(["./bin/my-svc"]).await.unwrap();
    assert_eq!(group.name(), "my-svc");
}
