//! Parsing of generation replies into directives.
//!
//! The generation step signals its intent through two literal prefixes:
//!
//! ```text
//! NEED_RETRIEVAL: <table> | <search query>
//! FINAL_ANSWER: <grounded answer with citations>
//! ```
//!
//! Matching is case-sensitive and anchored at the first byte. Everything that
//! does not fit one of the two shapes is a [`ParseFailure`] carrying the raw
//! reply; nothing is defaulted or repaired.

use std::fmt;

use crate::table::Table;

pub const RETRIEVAL_PREFIX: &str = "NEED_RETRIEVAL:";
pub const FINAL_ANSWER_PREFIX: &str = "FINAL_ANSWER:";
const SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    pub table: Table,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailureKind {
    UnrecognizedPrefix,
    MissingSeparator,
    ExtraSeparator,
    UnknownTable(String),
    EmptyQuery,
}

impl fmt::Display for ParseFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseFailureKind::UnrecognizedPrefix => f.write_str("no recognized directive prefix"),
            ParseFailureKind::MissingSeparator => f.write_str("retrieval request has no '|'"),
            ParseFailureKind::ExtraSeparator => {
                f.write_str("retrieval request has more than one '|'")
            }
            ParseFailureKind::UnknownTable(name) => write!(f, "unknown table '{name}'"),
            ParseFailureKind::EmptyQuery => f.write_str("retrieval request has an empty query"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub raw: String,
    pub kind: ParseFailureKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Retrieval(RetrievalRequest),
    FinalAnswer(String),
    ParseFailure(ParseFailure),
}

pub fn parse_directive(reply: &str) -> Directive {
    if let Some(payload) = reply.strip_prefix(RETRIEVAL_PREFIX) {
        return match parse_retrieval(payload) {
            Ok(request) => Directive::Retrieval(request),
            Err(kind) => failure(reply, kind),
        };
    }
    if let Some(answer) = reply.strip_prefix(FINAL_ANSWER_PREFIX) {
        return Directive::FinalAnswer(answer.trim().to_string());
    }
    failure(reply, ParseFailureKind::UnrecognizedPrefix)
}

fn parse_retrieval(payload: &str) -> Result<RetrievalRequest, ParseFailureKind> {
    let (table, query) = payload
        .split_once(SEPARATOR)
        .ok_or(ParseFailureKind::MissingSeparator)?;
    if query.contains(SEPARATOR) {
        return Err(ParseFailureKind::ExtraSeparator);
    }
    let table = table.trim();
    let table = table
        .parse::<Table>()
        .map_err(|_| ParseFailureKind::UnknownTable(table.to_string()))?;
    let query = query.trim();
    if query.is_empty() {
        return Err(ParseFailureKind::EmptyQuery);
    }
    Ok(RetrievalRequest {
        table,
        query: query.to_string(),
    })
}

fn failure(reply: &str, kind: ParseFailureKind) -> Directive {
    Directive::ParseFailure(ParseFailure {
        raw: reply.to_string(),
        kind,
    })
}
