//! End-to-end tests driving the app with in-memory transports.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use parley_core::{LifecyclePhase, ParleyError, ParleyResult, stage};
use parley_framework::{
    AppConfig, ComponentDeclaration, HandleRequest, InputType, InstallContext, Platform, Plugin,
    PluginContext, Usable,
};
use parley_runtime::{App, ParleyConfig};
use parley_transport::{MemoryTransport, ResponseProbe};
use serde_json::{Value, json};

// =============================================================================
// Fixtures
// =============================================================================

/// Recognizes `{"platform": <name>}`, reads `intent` and renders
/// `{"messages": [...]}`.
struct MockPlatform {
    name: &'static str,
}

impl Plugin for MockPlatform {
    fn name(&self) -> &str {
        self.name
    }

    fn install(&self, ctx: &mut InstallContext<'_>) -> ParleyResult<()> {
        ctx.hook(stage::REQUEST_START, |c| {
            Box::pin(async move {
                let intent = c.request().get("intent").and_then(Value::as_str);
                match intent.map(String::from) {
                    Some(intent) if intent == "LAUNCH" => c.input.input_type = InputType::Launch,
                    Some(intent) => {
                        c.input.input_type = InputType::Intent;
                        c.input.intent = Some(intent);
                    }
                    None => {}
                }
                Ok(())
            })
        })?;
        ctx.hook(stage::RESPONSE_OUTPUT, |c| {
            Box::pin(async move {
                if !c.output.is_empty() {
                    let messages: Vec<_> = c.output.iter().map(|o| o.message.clone()).collect();
                    c.set_response(json!({ "messages": messages }));
                }
                Ok(())
            })
        })
    }

    fn as_platform(&self) -> Option<&dyn Platform> {
        Some(self)
    }
}

impl Platform for MockPlatform {
    fn platform_name(&self) -> &str {
        self.name
    }

    fn is_request_relevant(&self, request: &Value) -> bool {
        request.get("platform").and_then(Value::as_str) == Some(self.name)
    }
}

/// Counts lifecycle calls; fails the phase named in `fail`.
#[derive(Default)]
struct Counting {
    initialized: Arc<AtomicUsize>,
    mounted: Arc<AtomicUsize>,
    dismounted: Arc<AtomicUsize>,
    fail: Option<LifecyclePhase>,
}

impl Counting {
    fn check(&self, phase: LifecyclePhase) -> ParleyResult<()> {
        match self.fail {
            Some(fail) if fail == phase => Err(ParleyError::other(format!("{phase} refused"))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Plugin for Counting {
    async fn initialize(&self, _ctx: &PluginContext<'_>) -> ParleyResult<()> {
        tokio::task::yield_now().await;
        self.initialized.fetch_add(1, Ordering::SeqCst);
        self.check(LifecyclePhase::Initialize)
    }

    async fn mount(&self, _request: &mut HandleRequest) -> ParleyResult<()> {
        self.mounted.fetch_add(1, Ordering::SeqCst);
        self.check(LifecyclePhase::Mount)
    }

    async fn dismount(&self, _request: &mut HandleRequest) -> ParleyResult<()> {
        self.dismounted.fetch_add(1, Ordering::SeqCst);
        self.check(LifecyclePhase::Dismount)
    }
}

fn hello_component() -> ComponentDeclaration {
    ComponentDeclaration::new("Hello")
        .global_handler("LAUNCH", |c| {
            Box::pin(async move {
                c.tell("Hello!");
                Ok(())
            })
        })
        .handler("HelpIntent", |c| {
            Box::pin(async move {
                c.tell("Say hello.");
                Ok(())
            })
        })
}

fn app() -> App {
    let app = App::new(AppConfig::default()).unwrap();
    app.register([
        Usable::plugin(MockPlatform { name: "mock" }),
        Usable::component(hello_component()),
    ])
    .unwrap();
    app
}

fn request(payload: Value) -> (Box<MemoryTransport>, ResponseProbe) {
    let transport = MemoryTransport::new(payload);
    let probe = transport.probe();
    (Box::new(transport), probe)
}

type Errors = Arc<Mutex<Vec<(String, bool)>>>;

/// Installs a sink recording `(error, had_conversation)`.
fn record_errors(app: &App) -> Errors {
    let errors: Errors = Arc::default();
    let sink = Arc::clone(&errors);
    app.on_error(move |e, conversation| {
        sink.lock()
            .unwrap()
            .push((e.to_string(), conversation.is_some()));
    });
    errors
}

fn counter(app: &App, stage_name: &str) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    app.hook(stage_name, move |_| {
        let c = Arc::clone(&c);
        Box::pin(async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    })
    .unwrap();
    count
}

// =============================================================================
// Pipeline
// =============================================================================

#[tokio::test]
async fn test_launch_round_trip() {
    let app = app();
    let (transport, probe) = request(json!({ "platform": "mock", "intent": "LAUNCH" }));

    app.handle(transport).await.unwrap();

    assert_eq!(probe.write_count(), 1);
    assert_eq!(probe.response(), Some(json!({ "messages": ["Hello!"] })));
}

#[tokio::test]
async fn test_stages_run_in_catalog_order() {
    let app = app();
    let log = Arc::new(Mutex::new(Vec::new()));

    for name in [stage::RESPONSE_END, stage::REQUEST, stage::DIALOGUE_START] {
        let log = Arc::clone(&log);
        app.hook(name, move |c| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                // Sees everything earlier stages wrote.
                let seen = c.session.data.len();
                c.session.data.insert(name.to_string(), json!(seen));
                log.lock().unwrap().push(format!("{name}:{seen}"));
                Ok(())
            })
        })
        .unwrap();
    }

    let (transport, _) = request(json!({ "platform": "mock", "intent": "LAUNCH" }));
    app.handle(transport).await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["request:0", "dialogue.start:1", "response.end:2"]
    );
}

#[tokio::test]
async fn test_no_matching_platform() {
    let app = app();
    let (transport, probe) = request(json!({ "platform": "other" }));

    // Without a sink the error reaches the caller.
    let err = app.handle(transport).await.unwrap_err();
    assert!(matches!(err, ParleyError::NoMatchingPlatform));
    assert_eq!(probe.write_count(), 0);

    let errors = record_errors(&app);
    let (transport, probe) = request(json!({ "platform": "other" }));
    app.handle(transport).await.unwrap();

    assert_eq!(probe.write_count(), 0);
    assert_eq!(
        *errors.lock().unwrap(),
        vec![(ParleyError::NoMatchingPlatform.to_string(), false)]
    );
}

#[tokio::test]
async fn test_no_response_skips_write() {
    let app = app();
    let errors = record_errors(&app);

    // Routed, but the handler produces no output.
    app.register([ComponentDeclaration::new("Silent").global_handler("QuietIntent", |_| {
        Box::pin(async { Ok(()) })
    })])
    .unwrap();

    let (transport, probe) = request(json!({ "platform": "mock", "intent": "QuietIntent" }));
    app.handle(transport).await.unwrap();

    assert_eq!(probe.write_count(), 0);
    assert!(errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_stop_in_router_prevents_later_stages() {
    let app = app();
    let logic = counter(&app, stage::DIALOGUE_LOGIC);
    let end = counter(&app, stage::DIALOGUE_END);
    let response = counter(&app, stage::RESPONSE_START);

    app.hook(stage::DIALOGUE_ROUTER, |c| {
        Box::pin(async move {
            c.handle_request().stop_middleware_execution();
            Ok(())
        })
    })
    .unwrap();

    let (transport, probe) = request(json!({ "platform": "mock", "intent": "LAUNCH" }));
    app.handle(transport).await.unwrap();

    assert_eq!(logic.load(Ordering::SeqCst), 0);
    assert_eq!(end.load(Ordering::SeqCst), 0);
    assert_eq!(response.load(Ordering::SeqCst), 0);
    assert_eq!(probe.write_count(), 0);

    // The app's own collection is untouched by the stop.
    let snapshot = app.snapshot();
    assert_eq!(
        snapshot.plugins.middleware().handler_count(stage::DIALOGUE_LOGIC),
        Some(2)
    );
}

#[tokio::test]
async fn test_unrouted_intent_stops_pipeline() {
    let app = app();
    let response = counter(&app, stage::RESPONSE_START);

    let (transport, probe) = request(json!({ "platform": "mock", "intent": "UnknownIntent" }));
    app.handle(transport).await.unwrap();

    assert_eq!(response.load(Ordering::SeqCst), 0);
    assert_eq!(probe.write_count(), 0);
}

#[tokio::test]
async fn test_intent_map_and_state_stack() {
    let app = app();
    app.configure(json!({ "routing": { "intent_map": { "AMAZON.HelpIntent": "HelpIntent" } } }))
        .unwrap();

    // HelpIntent is not global; it is reachable only from the Hello state.
    let (transport, probe) = request(json!({ "platform": "mock", "intent": "AMAZON.HelpIntent" }));
    app.handle(transport).await.unwrap();
    assert_eq!(probe.write_count(), 0);

    app.hook(stage::REQUEST_END, |c| {
        Box::pin(async move {
            c.session.state = vec![parley_framework::StateStackItem::new("Hello")];
            Ok(())
        })
    })
    .unwrap();
    let (transport, probe) = request(json!({ "platform": "mock", "intent": "AMAZON.HelpIntent" }));
    app.handle(transport).await.unwrap();
    assert_eq!(probe.response(), Some(json!({ "messages": ["Say hello."] })));
}

// =============================================================================
// Isolation
// =============================================================================

#[tokio::test]
async fn test_request_registrations_do_not_leak() {
    let app = app();
    let extra = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&extra);
    app.hook(stage::REQUEST_START, move |c| {
        let counter = Arc::clone(&counter);
        Box::pin(async move {
            if c.request().get("extend").is_some() {
                c.handle_request()
                    .hook(stage::RESPONSE_END, move |_| {
                        let counter = Arc::clone(&counter);
                        Box::pin(async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        })
                    })?;
                c.handle_request_mut()
                    .register([ComponentDeclaration::new("Temp")])?;
            }
            Ok(())
        })
    })
    .unwrap();

    let (transport, _) = request(json!({ "platform": "mock", "intent": "LAUNCH", "extend": true }));
    app.handle(transport).await.unwrap();
    assert_eq!(extra.load(Ordering::SeqCst), 1);

    let (transport, _) = request(json!({ "platform": "mock", "intent": "LAUNCH" }));
    app.handle(transport).await.unwrap();
    assert_eq!(extra.load(Ordering::SeqCst), 1);
    assert_eq!(app.component_paths(), vec!["Hello"]);
}

#[tokio::test]
async fn test_snapshot_ignores_later_app_changes() {
    let app = app();
    let snapshot = app.snapshot();

    app.register([ComponentDeclaration::new("Later")]).unwrap();
    app.configure(json!({ "custom": true })).unwrap();

    assert_eq!(snapshot.components.len(), 1);
    assert!(snapshot.config.extra.get("custom").is_none());
    assert_eq!(app.component_paths(), vec!["Hello", "Later"]);
}

#[tokio::test]
async fn test_concurrent_requests() {
    let app = Arc::new(app());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let app = Arc::clone(&app);
        handles.push(tokio::spawn(async move {
            let (transport, probe) = request(json!({ "platform": "mock", "intent": "LAUNCH" }));
            app.handle(transport).await.unwrap();
            probe.response()
        }));
    }
    for handle in handles {
        assert_eq!(
            handle.await.unwrap(),
            Some(json!({ "messages": ["Hello!"] }))
        );
    }
}

// =============================================================================
// Configuration and registration
// =============================================================================

#[test]
fn test_configure_deep_merges() {
    let app = app();
    app.configure(json!({ "a": { "x": 1 }, "list": [1, 2] })).unwrap();
    app.configure(json!({ "a": { "y": 2 }, "list": [3] })).unwrap();

    let config = app.config();
    assert_eq!(config.extra["a"], json!({ "x": 1, "y": 2 }));
    assert_eq!(config.extra["list"], json!([3]));
}

#[test]
fn test_configure_null_clears_key() {
    let app = app();
    app.configure(json!({ "greeting": { "text": "hi" }, "keep": 1 })).unwrap();
    app.configure(json!({ "greeting": null })).unwrap();

    let config = app.config();
    assert_eq!(config.extra["greeting"], Value::Null);
    assert_eq!(config.extra["keep"], json!(1));

    assert!(app.configure(json!({ "routing": null })).is_err());
    assert_eq!(app.config().extra["keep"], json!(1));
}

#[test]
fn test_component_registration_errors() {
    let app = app();

    let err = app
        .register([ComponentDeclaration::new("Hello")])
        .unwrap_err();
    assert!(matches!(err, ParleyError::DuplicateComponent { path } if path == "Hello"));

    let err = app
        .register([
            ComponentDeclaration::new("Ok"),
            ComponentDeclaration::new("Child").parent("Missing"),
        ])
        .unwrap_err();
    assert!(matches!(err, ParleyError::MissingParent { parent, .. } if parent == "Missing"));

    // The failed batch left nothing behind.
    assert_eq!(app.component_paths(), vec!["Hello"]);

    app.register([
        ComponentDeclaration::new("Child").parent("Parent"),
        ComponentDeclaration::new("Parent"),
    ])
    .unwrap();
    assert_eq!(app.component_paths(), vec!["Hello", "Parent", "Parent.Child"]);
}

#[test]
fn test_hook_unknown_stage() {
    let app = app();
    let err = app
        .hook("dialogue.magic", |_| Box::pin(async { Ok(()) }))
        .err().unwrap();
    assert!(matches!(err, ParleyError::InvalidStage(name) if name == "dialogue.magic"));
}

#[test]
fn test_test_mode_skips_flagged_plugins() {
    let app = App::new(AppConfig {
        test_mode: true,
        ..Default::default()
    })
    .unwrap();
    app.register([
        Usable::Plugin(
            parley_framework::PluginHandle::new(MockPlatform { name: "skipped" })
                .with_config(json!({ "skip_tests": true })),
        ),
        Usable::plugin(MockPlatform { name: "kept" }),
    ])
    .unwrap();

    assert_eq!(app.plugin_names(), vec!["RouterPlugin", "kept"]);
}

#[test]
fn test_logging_option_registers_plugin() {
    let app = App::new(AppConfig::default()).unwrap();
    assert_eq!(app.plugin_names(), vec!["RouterPlugin"]);

    app.configure(json!({ "logging": { "mask": ["/user/id"] } }))
        .unwrap();
    assert_eq!(app.plugin_names(), vec!["RouterPlugin", "BasicLoggingPlugin"]);
}

#[test]
fn test_builder_applies_overrides() {
    let app = App::builder()
        .config(ParleyConfig::default())
        .configure(json!({ "routing": { "intents_to_skip_unhandled": ["StopIntent"] } }))
        .with_logging(false)
        .register([Usable::plugin(MockPlatform { name: "mock" })])
        .build()
        .unwrap();

    assert_eq!(
        app.config().routing.intents_to_skip_unhandled,
        vec!["StopIntent"]
    );
    assert_eq!(app.plugin_names(), vec!["RouterPlugin", "mock"]);
}

// =============================================================================
// Lifecycle and errors
// =============================================================================

#[tokio::test]
async fn test_initialize_runs_once() {
    let app = app();
    let plugin = Counting::default();
    let initialized = Arc::clone(&plugin.initialized);
    app.register([Usable::plugin(plugin)]).unwrap();

    let (a, b) = tokio::join!(app.initialize(), app.initialize());
    a.unwrap();
    b.unwrap();
    app.initialize().await.unwrap();

    assert_eq!(initialized.load(Ordering::SeqCst), 1);
    assert!(app.is_initialized().await);
}

#[tokio::test]
async fn test_initialize_failure_goes_to_sink() {
    let app = app();
    app.register([Usable::plugin(Counting {
        fail: Some(LifecyclePhase::Initialize),
        ..Default::default()
    })])
    .unwrap();

    let err = app.initialize().await.unwrap_err();
    assert!(matches!(
        err,
        ParleyError::PluginLifecycle { phase: LifecyclePhase::Initialize, .. }
    ));
    assert!(!app.is_initialized().await);

    let errors = record_errors(&app);
    app.initialize().await.unwrap();
    assert_eq!(errors.lock().unwrap().len(), 1);
    assert!(!errors.lock().unwrap()[0].1);
}

#[tokio::test]
async fn test_mount_and_dismount_per_request() {
    let app = app();
    let plugin = Counting::default();
    let (mounted, dismounted) = (Arc::clone(&plugin.mounted), Arc::clone(&plugin.dismounted));
    app.register([Usable::plugin(plugin)]).unwrap();

    for _ in 0..2 {
        let (transport, _) = request(json!({ "platform": "mock", "intent": "LAUNCH" }));
        app.handle(transport).await.unwrap();
    }
    assert_eq!(mounted.load(Ordering::SeqCst), 2);
    assert_eq!(dismounted.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_mount_failure_aborts_request() {
    let app = app();
    let plugin = Counting {
        fail: Some(LifecyclePhase::Mount),
        ..Default::default()
    };
    let dismounted = Arc::clone(&plugin.dismounted);
    app.register([Usable::plugin(plugin)]).unwrap();
    let started = counter(&app, stage::REQUEST_START);

    let (transport, probe) = request(json!({ "platform": "mock", "intent": "LAUNCH" }));
    let err = app.handle(transport).await.unwrap_err();

    assert!(matches!(
        err,
        ParleyError::PluginLifecycle { phase: LifecyclePhase::Mount, ref plugin, .. }
            if plugin == "Counting"
    ));
    assert_eq!(started.load(Ordering::SeqCst), 0);
    assert_eq!(dismounted.load(Ordering::SeqCst), 0);
    assert_eq!(probe.write_count(), 0);
}

#[tokio::test]
async fn test_handler_failure_reaches_sink_with_conversation() {
    let app = app();
    let errors = record_errors(&app);
    let after = counter(&app, stage::RESPONSE_START);

    app.register([ComponentDeclaration::new("Broken").global_handler("BreakIntent", |_| {
        Box::pin(async { Err(ParleyError::other("kaput")) })
    })])
    .unwrap();

    let (transport, probe) = request(json!({ "platform": "mock", "intent": "BreakIntent" }));
    app.handle(transport).await.unwrap();

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].0.contains(stage::DIALOGUE_LOGIC));
    assert!(errors[0].0.contains("kaput"));
    assert!(errors[0].1);
    assert_eq!(after.load(Ordering::SeqCst), 0);
    assert_eq!(probe.write_count(), 0);
}

#[tokio::test]
async fn test_i18n_is_initialized_from_config() {
    let app = App::new(AppConfig::default()).unwrap();
    app.configure(json!({
        "i18n": { "resources": { "en": { "translation": { "hi": "Hi {{name}}" } } } }
    }))
    .unwrap();
    app.register([
        Usable::plugin(MockPlatform { name: "mock" }),
        Usable::component(ComponentDeclaration::new("Greeter").global_handler(
            "LAUNCH",
            |c| {
                Box::pin(async move {
                    let mut args = serde_json::Map::new();
                    args.insert("name".into(), json!("Ada"));
                    let text = c.t("hi", &args);
                    c.tell(text);
                    Ok(())
                })
            },
        )),
    ])
    .unwrap();
    app.initialize().await.unwrap();

    let (transport, probe) = request(json!({ "platform": "mock", "intent": "LAUNCH" }));
    app.handle(transport).await.unwrap();
    assert_eq!(probe.response(), Some(json!({ "messages": ["Hi Ada"] })));
}
