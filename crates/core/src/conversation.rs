use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::domain::message::ChatMessage;

pub const DEFAULT_HISTORY_DEPTH: usize = 20;

#[derive(Debug, Default)]
struct Conversation {
    messages: VecDeque<ChatMessage>,
    agent: Option<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    conversations: HashMap<String, Conversation>,
}

/// In-memory conversation history plus the sticky specialist binding.
///
/// Every call takes the single store lock for its whole duration, so each
/// call is atomic with respect to other turns. Nothing here awaits or does I/O.
#[derive(Debug)]
pub struct ConversationStore {
    state: Mutex<StoreState>,
    depth: usize,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl ConversationStore {
    /// `depth` of zero keeps the whole history.
    pub fn new(depth: usize) -> Self {
        Self { state: Mutex::new(StoreState::default()), depth }
    }

    pub fn add(&self, conversation_id: &str, message: ChatMessage) {
        let mut state = self.lock();
        let conversation = state.conversations.entry(conversation_id.to_string()).or_default();
        conversation.messages.push_back(message);

        if self.depth > 0 {
            while conversation.messages.len() > self.depth {
                conversation.messages.pop_front();
            }
        }
    }

    /// Returns an owned copy of the history; callers may mutate it freely.
    pub fn get(&self, conversation_id: &str) -> Vec<ChatMessage> {
        self.lock()
            .conversations
            .get(conversation_id)
            .map(|conversation| conversation.messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, conversation_id: &str) -> usize {
        self.lock()
            .conversations
            .get(conversation_id)
            .map(|conversation| conversation.messages.len())
            .unwrap_or(0)
    }

    pub fn get_agent(&self, conversation_id: &str) -> Option<String> {
        self.lock()
            .conversations
            .get(conversation_id)
            .and_then(|conversation| conversation.agent.clone())
    }

    pub fn set_agent(&self, conversation_id: &str, agent: impl Into<String>) {
        let mut state = self.lock();
        state.conversations.entry(conversation_id.to_string()).or_default().agent =
            Some(agent.into());
    }

    pub fn conversation_count(&self) -> usize {
        self.lock().conversations.len()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
