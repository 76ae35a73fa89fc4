use medrag_llm::{ChatMessage, ChatRole};

pub const SYSTEM_DIRECTIVE: &str = "\
You are a healthcare lookup assistant with access to:
- Physicians database
- Hospitals database

Rules:
- If you need database context, respond ONLY with:
  NEED_RETRIEVAL: <table> | <search query>
- Valid tables are: physicians, hospitals
- You may request multiple retrievals in sequence.
- When satisfied, respond with:
  FINAL_ANSWER: <grounded answer with citations>
";

/// Append-only conversation for one run. The first entry is always the
/// system directive; entries are never removed or reordered.
#[derive(Debug, Clone)]
pub struct Transcript {
    entries: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new(initial_query: &str) -> Self {
        Self {
            entries: vec![
                ChatMessage::system(SYSTEM_DIRECTIVE),
                ChatMessage::user(initial_query),
            ],
        }
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.entries.push(ChatMessage::assistant(content));
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.entries.push(ChatMessage::user(content));
    }

    pub fn entries(&self) -> &[ChatMessage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.entries.last()
    }

    pub fn roles(&self) -> impl Iterator<Item = ChatRole> + '_ {
        self.entries.iter().map(|entry| entry.role)
    }
}
