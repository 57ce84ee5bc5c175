use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One (speaker, speech) record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: String,
    pub speech: Value,
}

impl ConversationTurn {
    pub fn new(speaker: impl Into<String>, speech: Value) -> Self {
        Self {
            speaker: speaker.into(),
            speech,
        }
    }

    pub fn to_value(&self) -> Value {
        json!({ "speaker": self.speaker, "speech": self.speech })
    }
}

/// Append-only record of one `answer` call: the plan turn followed by one
/// turn per executed step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    /// Independent JSON copy of the turns recorded so far.
    pub fn to_value(&self) -> Value {
        Value::Array(self.turns.iter().map(ConversationTurn::to_value).collect())
    }

    pub fn into_turns(self) -> Vec<ConversationTurn> {
        self.turns
    }
}

impl IntoIterator for Conversation {
    type Item = ConversationTurn;
    type IntoIter = std::vec::IntoIter<ConversationTurn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.into_iter()
    }
}
