use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use anyhow::{anyhow, Result};
use medrag_rag::{
    Anomaly, ChatRole, DependencyStage, Embedder, EmbeddingClient, Generator, HospitalInsert,
    HospitalRow, LoopConfig, LoopObserver, LoopOutcome, NoopObserver, ParseFailureKind,
    PhysicianInsert, PhysicianRow, RagStore, RetrievalLoop, RetrievalRequest, RetrievedRow,
    RetrieverGateway, SimilarityStore, Table, Transcript,
};
use tempfile::tempdir;

/// Replays canned replies and records the transcript length it was shown.
struct ScriptedGenerator {
    replies: RefCell<VecDeque<String>>,
    seen_lengths: RefCell<Vec<usize>>,
}

impl ScriptedGenerator {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: RefCell::new(replies.iter().map(|r| r.to_string()).collect()),
            seen_lengths: RefCell::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.seen_lengths.borrow().len()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, transcript: &Transcript) -> Result<String> {
        self.seen_lengths.borrow_mut().push(transcript.len());
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("script exhausted"))
    }
}

struct AlwaysRetrieve {
    calls: Cell<usize>,
}

impl Generator for AlwaysRetrieve {
    fn generate(&self, _transcript: &Transcript) -> Result<String> {
        self.calls.set(self.calls.get() + 1);
        Ok("NEED_RETRIEVAL: physicians | cardiologist".to_string())
    }
}

struct FailingGenerator;

impl Generator for FailingGenerator {
    fn generate(&self, _transcript: &Transcript) -> Result<String> {
        Err(anyhow!("connection reset"))
    }
}

struct ConstantEmbedder;

impl Embedder for ConstantEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0, 0.0])
    }
}

#[derive(Default)]
struct FakeStore {
    queries: RefCell<Vec<(Table, usize)>>,
    fail: bool,
}

impl SimilarityStore for FakeStore {
    fn nearest(&self, table: Table, _vector: &[f32], limit: usize) -> Result<Vec<RetrievedRow>> {
        self.queries.borrow_mut().push((table, limit));
        if self.fail {
            return Err(anyhow!("relation \"{}\" does not exist", table));
        }
        Ok(match table {
            Table::Hospitals => vec![RetrievedRow::Hospital(HospitalRow {
                id: 7,
                name: "General".to_string(),
                city: "Atlanta".to_string(),
                state: "GA".to_string(),
                description: "cardiac center".to_string(),
                similarity: 0.91,
            })],
            Table::Physicians => Vec::new(),
        })
    }
}

#[derive(Default)]
struct RecordingObserver {
    events: Vec<String>,
}

impl LoopObserver for RecordingObserver {
    fn on_reply(&mut self, iteration: usize, reply: &str) {
        self.events.push(format!("reply {iteration}: {reply}"));
    }

    fn on_retrieval(
        &mut self,
        iteration: usize,
        request: &RetrievalRequest,
        rows: &[RetrievedRow],
    ) {
        self.events.push(format!(
            "retrieval {iteration}: {} x{}",
            request.table,
            rows.len()
        ));
    }

    fn on_outcome(&mut self, outcome: &LoopOutcome) {
        self.events.push(format!("outcome: {:?}", outcome.reason()));
    }
}

fn build<'a, G: Generator>(
    generator: G,
    store: &'a FakeStore,
    max_iterations: Option<usize>,
) -> RetrievalLoop<G, ConstantEmbedder, &'a FakeStore> {
    RetrievalLoop::new(
        generator,
        RetrieverGateway::new(ConstantEmbedder, store),
        LoopConfig {
            max_iterations,
            top_k: 3,
        },
    )
    .expect("valid config")
}

#[test]
fn arrhythmia_question_resolves_to_cited_answer() {
    let store = FakeStore::default();
    let generator = ScriptedGenerator::new(&[
        "NEED_RETRIEVAL: hospitals | arrhythmia Georgia",
        "FINAL_ANSWER: General Hospital [HOSPITALS_ID:7]",
    ]);
    let rag = build(&generator, &store, Some(8));
    let mut observer = RecordingObserver::default();

    let (outcome, transcript) = rag.run_with_transcript(
        "Which hospital in Georgia is best for arrhythmia?",
        &mut observer,
    );

    assert_eq!(
        outcome,
        LoopOutcome::FinalAnswer("General Hospital [HOSPITALS_ID:7]".to_string())
    );
    assert_eq!(*store.queries.borrow(), vec![(Table::Hospitals, 3)]);
    assert_eq!(*generator.seen_lengths.borrow(), vec![2, 4]);

    let entries = transcript.entries();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].role, ChatRole::System);
    assert_eq!(entries[2].role, ChatRole::Assistant);
    assert_eq!(entries[2].content, "NEED_RETRIEVAL: hospitals | arrhythmia Georgia");
    assert_eq!(entries[3].role, ChatRole::User);
    assert!(entries[3]
        .content
        .starts_with("Retrieved results for hospitals:\n\n"));
    assert!(entries[3].content.contains("[HOSPITALS_ID:7] General"));

    assert_eq!(
        observer.events,
        vec![
            "reply 1: NEED_RETRIEVAL: hospitals | arrhythmia Georgia".to_string(),
            "retrieval 1: hospitals x1".to_string(),
            "reply 2: FINAL_ANSWER: General Hospital [HOSPITALS_ID:7]".to_string(),
            "outcome: None".to_string(),
        ]
    );
}

#[test]
fn empty_retrieval_feeds_back_no_results() {
    let store = FakeStore::default();
    let generator = ScriptedGenerator::new(&[
        "NEED_RETRIEVAL: physicians | pediatric surgeon Alaska",
        "FINAL_ANSWER:",
    ]);
    let rag = build(&generator, &store, None);
    let (outcome, transcript) = rag.run_with_transcript("Surgeon in Alaska?", &mut NoopObserver);
    assert_eq!(outcome, LoopOutcome::FinalAnswer(String::new()));
    assert_eq!(
        transcript.last().map(|m| m.content.as_str()),
        Some("Retrieved results for physicians:\n\nNo results.")
    );
}

#[test]
fn unrecognized_reply_stops_without_appending() {
    let store = FakeStore::default();
    let generator = ScriptedGenerator::new(&["I don't know.", "FINAL_ANSWER: unreachable"]);
    let rag = build(&generator, &store, Some(8));
    let (outcome, transcript) = rag.run_with_transcript("Anything?", &mut NoopObserver);

    assert_eq!(
        outcome,
        LoopOutcome::ParseFailure {
            raw: "I don't know.".to_string(),
            kind: ParseFailureKind::UnrecognizedPrefix,
        }
    );
    assert_eq!(outcome.reason().as_deref(), Some("unexpected reply"));
    assert_eq!(transcript.len(), 2);
    assert_eq!(generator.calls(), 1);
    assert!(store.queries.borrow().is_empty());
}

#[test]
fn malformed_retrieval_is_a_parse_failure_not_a_default_table() {
    let store = FakeStore::default();
    let generator = ScriptedGenerator::new(&["NEED_RETRIEVAL: clinics | knee"]);
    let rag = build(&generator, &store, Some(8));
    match rag.run("Knee clinic?") {
        LoopOutcome::ParseFailure { raw, kind } => {
            assert_eq!(raw, "NEED_RETRIEVAL: clinics | knee");
            assert_eq!(kind, ParseFailureKind::UnknownTable("clinics".to_string()));
        }
        other => panic!("expected parse failure, got {other:?}"),
    }
    assert!(store.queries.borrow().is_empty());
}

#[test]
fn iteration_limit_of_one_allows_exactly_one_round() {
    let store = FakeStore::default();
    let generator = AlwaysRetrieve {
        calls: Cell::new(0),
    };
    let rag = build(&generator, &store, Some(1));
    let outcome = rag.run("Cardiologist?");

    assert_eq!(
        outcome,
        LoopOutcome::Anomaly(Anomaly::IterationLimitExceeded { limit: 1 })
    );
    assert_eq!(outcome.reason().as_deref(), Some("iteration limit exceeded"));
    assert_eq!(generator.calls.get(), 1);
    assert_eq!(store.queries.borrow().len(), 1);
}

#[test]
fn zero_iteration_limit_never_calls_generator() {
    let store = FakeStore::default();
    let generator = AlwaysRetrieve {
        calls: Cell::new(0),
    };
    let rag = build(&generator, &store, Some(0));
    assert_eq!(
        rag.run("Cardiologist?"),
        LoopOutcome::Anomaly(Anomaly::IterationLimitExceeded { limit: 0 })
    );
    assert_eq!(generator.calls.get(), 0);
}

#[test]
fn generation_failure_is_a_dependency_anomaly() {
    let store = FakeStore::default();
    let rag = build(FailingGenerator, &store, Some(3));
    match rag.run("Anything?") {
        LoopOutcome::Anomaly(Anomaly::Dependency { stage, message }) => {
            assert_eq!(stage, DependencyStage::Generation);
            assert!(message.contains("connection reset"));
        }
        other => panic!("expected dependency anomaly, got {other:?}"),
    }
}

#[test]
fn store_failure_is_a_dependency_anomaly() {
    let store = FakeStore {
        fail: true,
        ..FakeStore::default()
    };
    let generator = ScriptedGenerator::new(&["NEED_RETRIEVAL: hospitals | cardiac"]);
    let rag = build(&generator, &store, Some(3));
    let (outcome, transcript) = rag.run_with_transcript("Cardiac?", &mut NoopObserver);
    match &outcome {
        LoopOutcome::Anomaly(Anomaly::Dependency { stage, .. }) => {
            assert_eq!(*stage, DependencyStage::Store)
        }
        other => panic!("expected store anomaly, got {other:?}"),
    }
    assert_eq!(transcript.len(), 2);
}

/// Answers every search with a physician row, whatever table was asked for.
struct PhysiciansOnlyStore;

impl SimilarityStore for PhysiciansOnlyStore {
    fn nearest(&self, _table: Table, _vector: &[f32], _limit: usize) -> Result<Vec<RetrievedRow>> {
        Ok(vec![RetrievedRow::Physician(PhysicianRow {
            id: 1,
            name: "Dr. Okafor".to_string(),
            specialty: "Cardiology".to_string(),
            city: "Atlanta".to_string(),
            state: "GA".to_string(),
            profile: "arrhythmia".to_string(),
            similarity: 0.8,
        })])
    }
}

#[test]
fn rows_from_the_wrong_table_stop_the_run() {
    let generator = ScriptedGenerator::new(&[
        "NEED_RETRIEVAL: hospitals | arrhythmia",
        "FINAL_ANSWER: done",
    ]);
    let rag = RetrievalLoop::new(
        &generator,
        RetrieverGateway::new(ConstantEmbedder, PhysiciansOnlyStore),
        LoopConfig::default(),
    )
    .unwrap();
    let (outcome, transcript) = rag.run_with_transcript("Arrhythmia?", &mut NoopObserver);
    match &outcome {
        LoopOutcome::Anomaly(Anomaly::ContractViolation(message)) => {
            assert!(message.contains("physicians row for a hospitals search"))
        }
        other => panic!("expected contract violation, got {other:?}"),
    }
    assert_eq!(generator.calls(), 1);
    assert_eq!(transcript.len(), 2);
}

#[test]
fn zero_top_k_is_rejected_at_construction() {
    let store = FakeStore::default();
    let result = RetrievalLoop::new(
        FailingGenerator,
        RetrieverGateway::new(ConstantEmbedder, &store),
        LoopConfig {
            max_iterations: Some(1),
            top_k: 0,
        },
    );
    assert!(result.is_err());
}

#[test]
fn sqlite_store_with_hash_embeddings_grounds_the_answer() {
    let dir = tempdir().unwrap();
    let store = RagStore::open(dir.path().join("medrag.sqlite")).unwrap();
    let embeddings = EmbeddingClient::hash();
    let hospitals = [
        (7, "General", "Atlanta", "GA", "arrhythmia cardiac center"),
        (8, "Lakeside", "Orlando", "FL", "orthopedic knee surgery"),
    ];
    for (id, name, city, state, description) in hospitals {
        store
            .insert_hospital(&HospitalInsert {
                id: Some(id),
                name: name.to_string(),
                city: city.to_string(),
                state: state.to_string(),
                description: description.to_string(),
                embedding: embeddings.embed(description).unwrap(),
            })
            .unwrap();
    }
    store
        .insert_physician(&PhysicianInsert {
            id: Some(3),
            name: "Dr. Ana Lee".to_string(),
            specialty: "Electrophysiology".to_string(),
            city: "Atlanta".to_string(),
            state: "GA".to_string(),
            profile: "arrhythmia ablation".to_string(),
            embedding: embeddings.embed("arrhythmia ablation").unwrap(),
        })
        .unwrap();

    let generator = ScriptedGenerator::new(&[
        "NEED_RETRIEVAL: hospitals | arrhythmia cardiac",
        "NEED_RETRIEVAL: physicians | arrhythmia",
        "FINAL_ANSWER: General [HOSPITALS_ID:7] with Dr. Ana Lee [PHYSICIANS_ID:3]",
    ]);
    let rag = RetrievalLoop::new(
        &generator,
        RetrieverGateway::new(embeddings, &store),
        LoopConfig {
            max_iterations: Some(4),
            top_k: 1,
        },
    )
    .unwrap();
    let (outcome, transcript) =
        rag.run_with_transcript("Arrhythmia care in Georgia?", &mut NoopObserver);

    assert!(outcome.is_final_answer());
    assert_eq!(transcript.len(), 6);
    let hospital_context = &transcript.entries()[3].content;
    assert!(hospital_context.contains("[HOSPITALS_ID:7] General (Atlanta, GA)"));
    assert!(!hospital_context.contains("Lakeside"));
    let physician_context = &transcript.entries()[5].content;
    assert!(physician_context
        .contains("[PHYSICIANS_ID:3] Dr. Ana Lee (Electrophysiology, Atlanta, GA)"));
}
