use std::process::ExitCode;

use medrag_rag::{LoopObserver, LoopOutcome, RetrievalRequest, RetrievedRow, Transcript};

/// Echoes each step of a run to stdout as it happens.
pub struct ConsoleObserver;

impl LoopObserver for ConsoleObserver {
    fn on_reply(&mut self, iteration: usize, reply: &str) {
        println!("[medrag] reply {iteration}: {reply}");
    }

    fn on_retrieval(
        &mut self,
        _iteration: usize,
        request: &RetrievalRequest,
        rows: &[RetrievedRow],
    ) {
        println!(
            "[medrag] Running semantic search on '{}' for: {}",
            request.table, request.query
        );
        println!("[medrag] {} row(s) retrieved", rows.len());
    }

    fn on_outcome(&mut self, outcome: &LoopOutcome) {
        match outcome {
            LoopOutcome::FinalAnswer(answer) => println!("\n{answer}"),
            LoopOutcome::ParseFailure { raw, kind } => {
                println!("[medrag] stopped: unexpected reply ({kind})");
                println!("{raw}");
            }
            LoopOutcome::Anomaly(anomaly) => println!("[medrag] stopped: {anomaly}"),
        }
    }
}

pub fn exit_code(outcome: &LoopOutcome) -> ExitCode {
    ExitCode::from(exit_status(outcome))
}

fn exit_status(outcome: &LoopOutcome) -> u8 {
    match outcome {
        LoopOutcome::FinalAnswer(_) => 0,
        LoopOutcome::ParseFailure { .. } => 2,
        LoopOutcome::Anomaly(_) => 3,
    }
}

pub fn print_transcript(transcript: &Transcript) {
    println!("\n--- transcript ({} entries) ---", transcript.len());
    for entry in transcript.entries() {
        println!("[{}]\n{}\n", entry.role.as_str(), entry.content);
    }
}
