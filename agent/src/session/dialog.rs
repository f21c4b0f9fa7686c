//! Conversation history kept across turns

/// Message in a conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Default number of non-system messages kept
pub const DEFAULT_MAX_HISTORY: usize = 30;

/// Bounded conversation: an optional system message plus the most recent
/// `max_history` user/assistant messages.
#[derive(Debug, Clone)]
pub struct Dialog {
    system: Option<Message>,
    history: Vec<Message>,
    max_history: usize,
}

impl Default for Dialog {
    fn default() -> Self {
        Self::new(None, DEFAULT_MAX_HISTORY)
    }
}

impl Dialog {
    pub fn new(system_prompt: Option<String>, max_history: usize) -> Self {
        Self {
            system: system_prompt.map(|p| Message::new(Role::System, p)),
            history: Vec::new(),
            max_history: max_history.max(1),
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::new(Role::User, content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::new(Role::Assistant, content));
    }

    fn push(&mut self, message: Message) {
        self.history.push(message);
        if self.history.len() > self.max_history {
            let excess = self.history.len() - self.max_history;
            self.history.drain(..excess);
        }
    }

    /// Full message list to hand to an executor
    pub fn messages(&self) -> Vec<Message> {
        self.system
            .iter()
            .cloned()
            .chain(self.history.iter().cloned())
            .collect()
    }

    /// Number of user/assistant messages held
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Drop history, keep the system prompt
    pub fn clear(&mut self) {
        self.history.clear();
    }
}

/// Content of the last user message in a message list
pub fn last_user_message(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_leads() {
        let mut dialog = Dialog::new(Some("be careful".into()), 10);
        dialog.push_user("list containers");

        let messages = dialog.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "list containers");
    }

    #[test]
    fn test_history_is_bounded() {
        let mut dialog = Dialog::new(Some("sys".into()), 30);
        for i in 0..20 {
            dialog.push_user(format!("q{}", i));
            dialog.push_assistant(format!("a{}", i));
        }

        assert_eq!(dialog.len(), 30);
        let messages = dialog.messages();
        assert_eq!(messages.len(), 31);
        assert_eq!(messages[0].content, "sys");
        assert_eq!(messages[1].content, "q5");
        assert_eq!(messages[30].content, "a19");
    }

    #[test]
    fn test_clear_keeps_system_prompt() {
        let mut dialog = Dialog::new(Some("sys".into()), 30);
        dialog.push_user("hello");
        dialog.clear();

        assert!(dialog.is_empty());
        assert_eq!(dialog.messages().len(), 1);
    }

    #[test]
    fn test_last_user_message() {
        let mut dialog = Dialog::default();
        assert_eq!(last_user_message(&dialog.messages()), None);

        dialog.push_user("first");
        dialog.push_assistant("reply");
        dialog.push_user("second");
        dialog.push_assistant("reply");

        assert_eq!(last_user_message(&dialog.messages()), Some("second"));
    }
}
