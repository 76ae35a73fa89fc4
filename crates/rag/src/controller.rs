use std::fmt;

use tracing::{debug, error, info, warn};

use crate::capability::{Embedder, Generator, SimilarityStore};
use crate::directive::{parse_directive, Directive, ParseFailureKind, RetrievalRequest};
use crate::error::RagError;
use crate::format::retrieval_followup;
use crate::gateway::{RetrieverGateway, DEFAULT_TOP_K};
use crate::table::RetrievedRow;
use crate::transcript::Transcript;

pub const DEFAULT_MAX_ITERATIONS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Maximum number of retrieval rounds. `None` leaves the loop unbounded.
    pub max_iterations: Option<usize>,
    pub top_k: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: Some(DEFAULT_MAX_ITERATIONS),
            top_k: DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyStage {
    Generation,
    Embedding,
    Store,
}

impl fmt::Display for DependencyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DependencyStage::Generation => "generation",
            DependencyStage::Embedding => "embedding",
            DependencyStage::Store => "store",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    IterationLimitExceeded { limit: usize },
    Dependency { stage: DependencyStage, message: String },
    ContractViolation(String),
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::IterationLimitExceeded { .. } => f.write_str("iteration limit exceeded"),
            Anomaly::Dependency { stage, message } => write!(f, "{stage} failed: {message}"),
            Anomaly::ContractViolation(message) => write!(f, "contract violation: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    FinalAnswer(String),
    Anomaly(Anomaly),
    ParseFailure { raw: String, kind: ParseFailureKind },
}

impl LoopOutcome {
    pub fn is_final_answer(&self) -> bool {
        matches!(self, LoopOutcome::FinalAnswer(_))
    }

    pub fn answer(&self) -> Option<&str> {
        match self {
            LoopOutcome::FinalAnswer(text) => Some(text),
            _ => None,
        }
    }

    /// Why the run stopped without an answer.
    pub fn reason(&self) -> Option<String> {
        match self {
            LoopOutcome::FinalAnswer(_) => None,
            LoopOutcome::Anomaly(anomaly) => Some(anomaly.to_string()),
            LoopOutcome::ParseFailure { .. } => Some("unexpected reply".to_string()),
        }
    }
}

/// Receives each step of a run before the next request is issued.
pub trait LoopObserver {
    fn on_reply(&mut self, _iteration: usize, _reply: &str) {}

    fn on_retrieval(
        &mut self,
        _iteration: usize,
        _request: &RetrievalRequest,
        _rows: &[RetrievedRow],
    ) {
    }

    fn on_outcome(&mut self, _outcome: &LoopOutcome) {}
}

pub struct NoopObserver;

impl LoopObserver for NoopObserver {}

pub struct RetrievalLoop<G, E, S> {
    generator: G,
    gateway: RetrieverGateway<E, S>,
    config: LoopConfig,
}

impl<G, E, S> RetrievalLoop<G, E, S>
where
    G: Generator,
    E: Embedder,
    S: SimilarityStore,
{
    pub fn new(
        generator: G,
        gateway: RetrieverGateway<E, S>,
        config: LoopConfig,
    ) -> Result<Self, RagError> {
        if config.top_k == 0 {
            return Err(RagError::InvalidTopK);
        }
        Ok(Self {
            generator,
            gateway,
            config,
        })
    }

    pub fn config(&self) -> LoopConfig {
        self.config
    }

    pub fn run(&self, initial_query: &str) -> LoopOutcome {
        self.run_with_observer(initial_query, &mut NoopObserver)
    }

    pub fn run_with_observer(
        &self,
        initial_query: &str,
        observer: &mut dyn LoopObserver,
    ) -> LoopOutcome {
        self.run_with_transcript(initial_query, observer).0
    }

    /// Runs to completion and hands back the transcript for inspection.
    pub fn run_with_transcript(
        &self,
        initial_query: &str,
        observer: &mut dyn LoopObserver,
    ) -> (LoopOutcome, Transcript) {
        let mut transcript = Transcript::new(initial_query);
        info!(max_iterations = ?self.config.max_iterations, "starting retrieval loop");
        let outcome = self.drive(&mut transcript, observer);
        match &outcome {
            LoopOutcome::FinalAnswer(_) => info!(entries = transcript.len(), "final answer"),
            LoopOutcome::Anomaly(anomaly) => warn!(%anomaly, "retrieval loop stopped"),
            LoopOutcome::ParseFailure { raw, kind } => {
                warn!(%kind, raw = %raw, "unexpected reply, stopping")
            }
        }
        observer.on_outcome(&outcome);
        (outcome, transcript)
    }

    fn drive(&self, transcript: &mut Transcript, observer: &mut dyn LoopObserver) -> LoopOutcome {
        let mut rounds = 0usize;
        loop {
            if let Some(limit) = self.config.max_iterations {
                if rounds >= limit {
                    return LoopOutcome::Anomaly(Anomaly::IterationLimitExceeded { limit });
                }
            }
            let iteration = rounds + 1;
            let reply = match self.generator.generate(transcript) {
                Ok(reply) => reply,
                Err(err) => {
                    return LoopOutcome::Anomaly(Anomaly::Dependency {
                        stage: DependencyStage::Generation,
                        message: format!("{err:#}"),
                    })
                }
            };
            debug!(iteration, reply = %reply, "generation reply");
            observer.on_reply(iteration, &reply);

            let request = match parse_directive(&reply) {
                Directive::Retrieval(request) => request,
                Directive::FinalAnswer(text) => return LoopOutcome::FinalAnswer(text),
                Directive::ParseFailure(failure) => {
                    return LoopOutcome::ParseFailure {
                        raw: failure.raw,
                        kind: failure.kind,
                    }
                }
            };

            let rows = match self
                .gateway
                .retrieve(request.table, &request.query, self.config.top_k)
            {
                Ok(rows) => rows,
                Err(err) => return LoopOutcome::Anomaly(retrieval_anomaly(err)),
            };
            info!(
                iteration,
                table = request.table.as_str(),
                query = %request.query,
                rows = rows.len(),
                "retrieval round"
            );
            observer.on_retrieval(iteration, &request, &rows);

            transcript.push_assistant(reply);
            transcript.push_user(retrieval_followup(request.table, &rows));
            rounds += 1;
        }
    }
}

fn retrieval_anomaly(err: RagError) -> Anomaly {
    match err {
        RagError::Embedding(err) => Anomaly::Dependency {
            stage: DependencyStage::Embedding,
            message: format!("{err:#}"),
        },
        RagError::Store(err) => Anomaly::Dependency {
            stage: DependencyStage::Store,
            message: format!("{err:#}"),
        },
        RagError::Sqlite(err) => Anomaly::Dependency {
            stage: DependencyStage::Store,
            message: err.to_string(),
        },
        other @ (RagError::UnsupportedTable(_)
        | RagError::InvalidTopK
        | RagError::TableMismatch { .. }) => {
            error!(error = %other, "retriever gateway contract violated");
            Anomaly::ContractViolation(other.to_string())
        }
    }
}
