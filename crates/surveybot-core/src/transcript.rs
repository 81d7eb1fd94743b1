use serde::{Deserialize, Serialize};

use crate::FALLBACK_REPLY;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    /// The person taking the survey
    #[serde(rename = "user", alias = "human", alias = "respondent")]
    Respondent,
    /// The survey bot
    #[serde(rename = "assistant", alias = "ai")]
    Assistant,
}

/// A single turn of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Speaker,
    pub content: String,
    /// Set on assistant turns that ask for clarification instead of moving on
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hold: bool,
    /// Set on the assistant turn that ended the survey after a failed turn
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub closed: bool,
}

impl Turn {
    pub fn respondent(content: impl Into<String>) -> Self {
        Self {
            role: Speaker::Respondent,
            content: content.into(),
            hold: false,
            closed: false,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Speaker::Assistant,
            content: content.into(),
            hold: false,
            closed: false,
        }
    }

    /// An assistant turn that re-poses the current question
    pub fn clarification(content: impl Into<String>) -> Self {
        Self {
            hold: true,
            ..Self::assistant(content)
        }
    }

    /// The fallback turn sent when a turn failed and the survey was closed
    pub fn failure(content: impl Into<String>) -> Self {
        Self {
            closed: true,
            ..Self::assistant(content)
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Speaker::Assistant
    }

    /// Whether this turn closed the survey after a failure. Clients that drop
    /// the `closed` flag are still recognised by the fallback text.
    pub fn closes_survey(&self) -> bool {
        self.is_assistant() && (self.closed || self.content.trim() == FALLBACK_REPLY)
    }
}

/// Ordered, append-only conversation history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn push_respondent(&mut self, content: impl Into<String>) {
        self.push(Turn::respondent(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>, hold: bool) {
        let mut turn = Turn::assistant(content);
        turn.hold = hold;
        self.push(turn);
    }

    /// Render as `Respondent:`/`Assistant:` lines for prompt injection
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|t| match t.role {
                Speaker::Respondent => format!("Respondent: {}", t.content),
                Speaker::Assistant => format!("Assistant: {}", t.content),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<Vec<Turn>> for Transcript {
    fn from(turns: Vec<Turn>) -> Self {
        Self { turns }
    }
}

impl FromIterator<Turn> for Transcript {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_roles() {
        let json = r#"[
            {"role":"assistant","content":"Hi! What's your name?"},
            {"role":"user","content":"Alice"},
            {"role":"assistant","content":"Could you clarify?","hold":true},
            {"role":"human","content":"legacy role"}
        ]"#;
        let transcript: Transcript = serde_json::from_str(json).unwrap();

        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript.turns()[1].role, Speaker::Respondent);
        assert!(transcript.turns()[2].hold);
        assert!(!transcript.turns()[0].hold);
        assert_eq!(transcript.turns()[3].role, Speaker::Respondent);
    }

    #[test]
    fn test_hold_flag_omitted_when_false() {
        let json = serde_json::to_string(&Turn::assistant("hello")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hello"}"#);
        let json = serde_json::to_string(&Turn::clarification("again?")).unwrap();
        assert!(json.contains(r#""hold":true"#));
    }

    #[test]
    fn test_render() {
        let mut t = Transcript::new();
        t.push_assistant("Hello", false);
        t.push_respondent("Bob");
        assert_eq!(t.render(), "Assistant: Hello\nRespondent: Bob");
    }
}
