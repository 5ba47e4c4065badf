//! Call placement confirmation

use async_trait::async_trait;
use parking_lot::Mutex;

/// Yes/no prompt shown before dialing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPrompt {
    /// Prompt title
    pub title: String,
    /// Prompt body
    pub message: String,
    /// Label of the dialing choice
    pub accept_label: String,
    /// Label of the cancelling choice
    pub decline_label: String,
}

impl ConfirmationPrompt {
    /// Prompt for calling `to`
    pub fn for_number(to: &str) -> Self {
        Self {
            title: "Are you sure?".to_string(),
            message: format!("Are we really calling {to}?"),
            accept_label: "Hell yeah!".to_string(),
            decline_label: "Hmm, better not to".to_string(),
        }
    }
}

/// Asks the user to confirm a call
#[async_trait]
pub trait CallConfirmer: Send + Sync {
    /// `true` to dial, `false` to go back to number entry
    async fn confirm(&self, prompt: &ConfirmationPrompt) -> bool;
}

/// Result of a call placement intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The SDK was asked to connect
    Placed {
        /// Number dialed
        to: String,
    },
    /// The user declined; number entry should get focus back
    Declined,
}

/// Confirmer with a fixed answer that remembers the prompts it saw
#[derive(Debug)]
pub struct StaticConfirmer {
    answer: bool,
    prompts: Mutex<Vec<ConfirmationPrompt>>,
}

impl StaticConfirmer {
    /// Always confirm
    pub fn accepting() -> Self {
        Self::new(true)
    }

    /// Always decline
    pub fn declining() -> Self {
        Self::new(false)
    }

    fn new(answer: bool) -> Self {
        Self {
            answer,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts shown so far
    pub fn prompts(&self) -> Vec<ConfirmationPrompt> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl CallConfirmer for StaticConfirmer {
    async fn confirm(&self, prompt: &ConfirmationPrompt) -> bool {
        self.prompts.lock().push(prompt.clone());
        self.answer
    }
}
