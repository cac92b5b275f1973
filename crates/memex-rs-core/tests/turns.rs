use memex_rs_config::{MemexConfig, StorageBackend};
use memex_rs_core::{Engine, EngineError, TurnPhase, WriteOutcome};
use memex_rs_memory::injector::CONTEXT_HEADER;
use memex_rs_memory::{
    AuditAction, AuditSink, InMemoryAuditLog, InMemoryStore, MemoryFilter, MemoryStatus,
    MemoryStore, MemoryType,
};
use memex_rs_protocol::TurnContext;
use memex_rs_test_utils::{
    FailingEmbedder, FailingStore, FixedEmbedder, RecordBuilder, RecordingAdapter, StoreOp,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

const PREFERENCE: &str = "我喜欢用 Python 写后端代码";

fn memory_config() -> MemexConfig {
    let mut config = MemexConfig::default();
    config.storage.backend = StorageBackend::Memory;
    config
}

fn engine_over(
    config: MemexConfig,
    store: Arc<dyn MemoryStore>,
) -> (Engine, Arc<InMemoryAuditLog>) {
    let audit = Arc::new(InMemoryAuditLog::new());
    let engine = Engine::new(config, store, audit.clone()).expect("engine");
    (engine, audit)
}

fn actions(audit: &InMemoryAuditLog) -> Vec<AuditAction> {
    audit
        .entries()
        .expect("entries")
        .into_iter()
        .map(|entry| entry.action)
        .collect()
}

#[tokio::test]
async fn preference_is_filtered_at_default_gamma() {
    let store = Arc::new(InMemoryStore::new());
    let (engine, audit) = engine_over(memory_config(), store.clone());

    let outcomes = engine
        .extract_and_save(&json!({ "text": PREFERENCE }), &TurnContext::default())
        .await
        .expect("save");

    assert_eq!(outcomes.len(), 1);
    let WriteOutcome::Filtered {
        memory_type,
        decision,
        ..
    } = &outcomes[0]
    else {
        panic!("expected the persona candidate to be filtered");
    };
    assert_eq!(*memory_type, MemoryType::Persona);
    assert!((decision.write_score - 0.88).abs() < 1e-9);
    assert_eq!(decision.probability, 0.6561);
    assert_eq!(decision.threshold, 0.8);
    assert!(store.is_empty());
    assert_eq!(actions(&audit), vec![AuditAction::Filtered]);
}

#[tokio::test]
async fn preference_is_written_with_steeper_gamma() {
    let mut config = memory_config();
    config.engine.gamma = 2.0;
    let store = Arc::new(InMemoryStore::new());
    let (engine, audit) = engine_over(config, store.clone());

    let ctx = TurnContext::new("conv-1", "turn-1");
    let outcomes = engine
        .extract_and_save(&json!({ "text": PREFERENCE }), &ctx)
        .await
        .expect("save");

    assert_eq!(outcomes.len(), 1);
    let WriteOutcome::Written { record, superseded } = &outcomes[0] else {
        panic!("expected the persona candidate to be written");
    };
    assert_eq!(superseded, &None);
    assert_eq!(record.memory_type(), MemoryType::Persona);
    assert_eq!(record.body.text, PREFERENCE);
    assert!(record.meta.dimensions.confidence >= 0.8);
    assert_eq!(record.meta.relations.conversation_id.as_deref(), Some("conv-1"));
    assert_eq!(record.meta.relations.turn_id.as_deref(), Some("turn-1"));
    assert!(record.meta.lifecycle.expires_at.is_some());
    assert_eq!(store.len(), 1);
    assert_eq!(actions(&audit), vec![AuditAction::Write]);
}

#[tokio::test]
async fn query_ranks_matching_persona_first() {
    let store = Arc::new(InMemoryStore::new());
    let persona = store
        .add(RecordBuilder::new(MemoryType::Persona, PREFERENCE).build())
        .await
        .expect("persona");
    let core = store
        .add(RecordBuilder::new(MemoryType::Core, "My goal is to ship the parser by Friday.").build())
        .await
        .expect("core");
    store
        .add(
            RecordBuilder::new(
                MemoryType::Episodic,
                "Yesterday we debugged the flaky login test.",
            )
            .build(),
        )
        .await
        .expect("episodic");
    let (engine, _audit) = engine_over(memory_config(), store);

    let outcome = engine
        .retrieve_and_inject(json!({ "prompt": "Python 后端" }))
        .await;

    assert!(outcome.error.is_none());
    assert!(outcome.injected());
    let ids = outcome
        .recalled
        .iter()
        .map(|item| item.record.meta.id.clone())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![persona.meta.id.clone(), core.meta.id.clone()]);
    assert_eq!(outcome.recalled[0].score, 0.5759);
    assert_eq!(outcome.recalled[1].score, 0.5106);
    assert!(outcome.recalled[0].score > outcome.recalled[1].score);

    let prompt = outcome.request["prompt"].as_str().expect("prompt");
    assert!(prompt.starts_with(CONTEXT_HEADER));
    assert!(prompt.contains(PREFERENCE));
    assert!(!prompt.contains("flaky login"));
    assert!(prompt.ends_with("Python 后端"));
}

#[tokio::test]
async fn recall_touches_injected_records() {
    let store = Arc::new(InMemoryStore::new());
    let seeded = store
        .add(
            RecordBuilder::new(MemoryType::Persona, PREFERENCE)
                .used_days_ago(3)
                .build(),
        )
        .await
        .expect("seed");
    let (engine, _audit) = engine_over(memory_config(), store.clone());

    let outcome = engine
        .retrieve_and_inject(json!({ "prompt": "Python 后端" }))
        .await;
    assert!(outcome.injected());

    let refreshed = store.get(&seeded.meta.id).await.expect("get").expect("record");
    assert!(refreshed.meta.lifecycle.last_used_at > seeded.meta.lifecycle.last_used_at);
}

#[tokio::test]
async fn budgets_cap_each_type() {
    let store = Arc::new(InMemoryStore::new());
    for idx in 0..5 {
        store
            .add(RecordBuilder::new(MemoryType::Persona, format!("persona fact {idx}")).build())
            .await
            .expect("persona");
        store
            .add(RecordBuilder::new(MemoryType::Core, format!("core fact {idx}")).build())
            .await
            .expect("core");
    }
    let (engine, _audit) = engine_over(memory_config(), store);

    let recalled = engine
        .recall(&json!({ "prompt": "unrelated question" }))
        .await
        .expect("recall");

    let types = recalled
        .iter()
        .map(|item| item.record.memory_type())
        .collect::<Vec<_>>();
    assert_eq!(
        types,
        vec![
            MemoryType::Persona,
            MemoryType::Persona,
            MemoryType::Persona,
            MemoryType::Core,
            MemoryType::Core,
            MemoryType::Core,
            MemoryType::Core,
        ]
    );
    assert!(recalled.iter().all(|item| item.score >= 0.5));
}

#[tokio::test]
async fn recall_fails_open_on_store_errors() {
    let store = Arc::new(FailingStore::reads_fail());
    let (engine, audit) = engine_over(memory_config(), store);
    let request = json!({ "prompt": "Python 后端" });

    let outcome = engine.retrieve_and_inject(request.clone()).await;

    assert_eq!(outcome.request, request);
    assert!(!outcome.injected());
    let error = outcome.error.expect("error");
    assert_eq!(error.phase, TurnPhase::Recall);
    assert!(error.message.contains("injected query failure"));
    assert_eq!(actions(&audit), vec![AuditAction::Error]);
}

#[tokio::test]
async fn injection_failure_returns_original_request() {
    let store = Arc::new(InMemoryStore::new());
    store
        .add(RecordBuilder::new(MemoryType::Persona, PREFERENCE).build())
        .await
        .expect("seed");
    let adapter = Arc::new(RecordingAdapter::failing_inject());
    let (engine, _audit) = engine_over(memory_config(), store);
    let engine = engine.with_adapter(adapter.clone());
    let request = json!({ "prompt": "Python 后端" });

    let outcome = engine.retrieve_and_inject(request.clone()).await;

    assert_eq!(outcome.request, request);
    assert_eq!(outcome.recalled.len(), 1);
    assert_eq!(outcome.error.expect("error").phase, TurnPhase::Inject);
    assert_eq!(adapter.blocks().len(), 1);
    assert!(adapter.blocks()[0].contains(PREFERENCE));
}

#[tokio::test]
async fn unknown_platform_is_not_configured() {
    let mut config = memory_config();
    config.engine.platform = "myspace".to_string();
    let (engine, _audit) = engine_over(config, Arc::new(InMemoryStore::new()));

    let outcome = engine.retrieve_and_inject(json!("hello")).await;
    assert_eq!(outcome.request, json!("hello"));
    assert!(outcome.error.expect("error").message.contains("not configured"));

    let err = engine
        .extract_and_save(&json!("I prefer tabs."), &TurnContext::default())
        .await
        .expect_err("no adapter");
    assert!(matches!(err, EngineError::NotConfigured(_)));
}

#[tokio::test]
async fn process_turn_recalls_then_supersedes() {
    let mut config = memory_config();
    config.engine.gamma = 2.0;
    let store = Arc::new(InMemoryStore::new());
    let seeded = store
        .add(RecordBuilder::new(MemoryType::Persona, PREFERENCE).build())
        .await
        .expect("seed");
    let (engine, audit) = engine_over(config, store.clone());

    let result = engine
        .process_turn(
            json!({ "prompt": "Python 后端" }),
            &json!({ "text": PREFERENCE }),
            &TurnContext::new("conv-1", "turn-2"),
        )
        .await;

    assert!(result.is_clean(), "{:?}", result.errors);
    assert!(result.injected);
    assert_eq!(result.recalled.len(), 1);
    assert_eq!(result.extracted, 1);
    assert_eq!(result.filtered, 0);
    assert_eq!(result.written.len(), 1);
    let written = &result.written[0];
    assert_eq!(
        written.meta.relations.supersedes.as_deref(),
        Some(seeded.meta.id.as_str())
    );

    let previous = store.get(&seeded.meta.id).await.expect("get").expect("record");
    assert_eq!(previous.status(), MemoryStatus::Superseded);
    let active = store
        .query(&MemoryFilter::active_in(engine.scope()))
        .await
        .expect("query");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].meta.id, written.meta.id);
    assert_eq!(
        actions(&audit),
        vec![
            AuditAction::Recall,
            AuditAction::Inject,
            AuditAction::Write,
            AuditAction::Supersede,
        ]
    );
}

#[tokio::test]
async fn process_turn_collects_every_phase_error() {
    let mut config = memory_config();
    config.engine.gamma = 2.0;
    let (engine, _audit) = engine_over(config, Arc::new(FailingStore::reads_fail()));
    let request = json!({ "prompt": "Python 后端" });

    let result = engine
        .process_turn(
            request.clone(),
            &json!({ "text": PREFERENCE }),
            &TurnContext::default(),
        )
        .await;

    assert_eq!(result.request, request);
    assert!(!result.injected);
    assert_eq!(result.extracted, 1);
    assert!(result.written.is_empty());
    let phases = result
        .errors
        .iter()
        .map(|error| error.phase)
        .collect::<Vec<_>>();
    assert_eq!(phases, vec![TurnPhase::Recall, TurnPhase::Write]);
}

#[tokio::test]
async fn write_failure_keeps_recall_and_injection() {
    let mut config = memory_config();
    config.engine.gamma = 2.0;
    let store = Arc::new(FailingStore::new());
    store
        .add(RecordBuilder::new(MemoryType::Persona, PREFERENCE).build())
        .await
        .expect("seed");
    for op in StoreOp::WRITES {
        store.set_failing(op, true);
    }
    let (engine, audit) = engine_over(config, store.clone());
    let request = json!({ "prompt": "Python 后端" });

    let result = engine
        .process_turn(
            request.clone(),
            &json!({ "text": PREFERENCE }),
            &TurnContext::default(),
        )
        .await;

    assert!(result.injected);
    assert_ne!(result.request, request);
    assert_eq!(result.recalled.len(), 1);
    assert_eq!(result.extracted, 1);
    assert!(result.written.is_empty());
    let phases = result
        .errors
        .iter()
        .map(|error| error.phase)
        .collect::<Vec<_>>();
    assert_eq!(phases, vec![TurnPhase::Write]);
    assert!(result.errors[0].message.contains("injected add failure"));
    assert!(store.failures() >= 1);
    assert_eq!(store.snapshot().await.len(), 1);
    let audited = actions(&audit);
    assert_eq!(&audited[..2], &[AuditAction::Recall, AuditAction::Inject]);
    assert!(!audited.contains(&AuditAction::Write));
}

#[tokio::test]
async fn failed_supersede_rolls_back_the_new_version() {
    let mut config = memory_config();
    config.engine.gamma = 2.0;
    let store = Arc::new(FailingStore::new());
    let seeded = store
        .add(RecordBuilder::new(MemoryType::Persona, PREFERENCE).build())
        .await
        .expect("seed");
    store.set_failing(StoreOp::Update, true);
    let (engine, audit) = engine_over(config, store.clone());

    let err = engine
        .extract_and_save(&json!({ "text": PREFERENCE }), &TurnContext::default())
        .await
        .expect_err("supersede update fails");

    assert!(matches!(err, EngineError::Memory(_)));
    assert!(err.to_string().contains("injected update failure"));
    assert_eq!(store.failures(), 1);
    let active = store
        .query(&MemoryFilter::active_in(engine.scope()))
        .await
        .expect("query");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].meta.id, seeded.meta.id);
    assert_eq!(store.snapshot().await.len(), 1);
    assert!(!actions(&audit).contains(&AuditAction::Write));
}

#[tokio::test]
async fn malformed_response_is_an_extract_error() {
    let (engine, _audit) = engine_over(memory_config(), Arc::new(InMemoryStore::new()));

    let result = engine
        .process_turn(json!("hi"), &json!(42), &TurnContext::default())
        .await;

    assert_eq!(result.extracted, 0);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].phase, TurnPhase::Extract);
}

#[tokio::test]
async fn semantic_recall_uses_embedder() {
    let mut config = memory_config();
    config.recall.semantic = true;
    let store = Arc::new(InMemoryStore::new());
    let rust = store
        .add(RecordBuilder::new(MemoryType::Persona, "I prefer Rust for systems work").build())
        .await
        .expect("rust");
    store
        .add(RecordBuilder::new(MemoryType::Persona, "I like green tea").build())
        .await
        .expect("tea");
    let embedder = Arc::new(
        FixedEmbedder::new(vec![0.0, 1.0])
            .with("systems", vec![1.0, 0.0])
            .with("低层", vec![1.0, 0.0]),
    );
    let (engine, _audit) = engine_over(config, store);
    let engine = engine.with_embedder(embedder.clone());

    let recalled = engine
        .recall(&json!({ "prompt": "低层编程" }))
        .await
        .expect("recall");

    assert_eq!(embedder.calls(), 3);
    assert_eq!(recalled[0].record.meta.id, rust.meta.id);
    assert_eq!(recalled[0].similarity, 1.0);
}

#[tokio::test]
async fn failing_embedder_falls_back_to_keywords() {
    let mut config = memory_config();
    config.recall.semantic = true;
    let store = Arc::new(InMemoryStore::new());
    store
        .add(RecordBuilder::new(MemoryType::Persona, PREFERENCE).build())
        .await
        .expect("seed");
    let (engine, _audit) = engine_over(config, store);
    let engine = engine.with_embedder(Arc::new(FailingEmbedder));

    let recalled = engine
        .recall(&json!({ "prompt": "Python 后端" }))
        .await
        .expect("recall");

    assert_eq!(recalled.len(), 1);
    assert!((recalled[0].similarity - 0.3).abs() < 1e-9);
}
