use std::collections::VecDeque;

use max_core::Exchange;

/// Number of exchanges replayed to the model by default.
pub const DEFAULT_MEMORY_WINDOW: usize = 20;

/// The exchanges of a chat that went well, replayed to the agent as context.
///
/// Only the most recent `window` exchanges are kept.
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    exchanges: VecDeque<Exchange>,
    window: usize,
}

impl ConversationMemory {
    /// Creates an empty memory keeping at most `window` exchanges.
    pub fn new(window: usize) -> Self {
        Self {
            exchanges: VecDeque::new(),
            window,
        }
    }

    /// Remembers an exchange, forgetting the oldest one if the memory is
    /// full.
    pub fn save_context<I: Into<String>, O: Into<String>>(
        &mut self,
        input: I,
        output: O,
    ) {
        if self.window == 0 {
            return;
        }
        if self.exchanges.len() == self.window {
            self.exchanges.pop_front();
        }
        self.exchanges.push_back(Exchange::new(input, output));
    }

    /// Returns the remembered exchanges, oldest first.
    pub fn exchanges(&self) -> Vec<Exchange> {
        self.exchanges.iter().cloned().collect()
    }

    /// Returns the number of remembered exchanges.
    #[inline]
    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    /// Returns `true` if nothing is remembered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Forgets everything.
    #[inline]
    pub fn clear(&mut self) {
        self.exchanges.clear();
    }
}

impl Default for ConversationMemory {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_WINDOW)
    }
}
