use crate::envelope::NoAnswer;

/// Where the final answer text came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// Concatenation of streamed fragments in arrival order.
    Fragments,
    /// The last `message` event (or a batched body's `message`).
    Message,
}

/// Resolved answer for a completed request.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FinalAnswer {
    pub text: String,
    pub source: AnswerSource,
    /// `true` when a `messageStop` event ended processing early.
    pub stopped: bool,
}

/// Terminal outcome of a request that did not fail at the transport level.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ChatOutcome {
    /// The agent produced an answer.
    Answered(FinalAnswer),
    /// The response completed with no text and no final message.
    Empty,
    /// A final message was present but held no usable assistant answer.
    NoValidAnswer(NoAnswer),
}

impl ChatOutcome {
    /// Returns the answer text when there is one.
    pub fn text(&self) -> Option<&str> {
        match self {
            ChatOutcome::Answered(answer) => Some(&answer.text),
            ChatOutcome::Empty | ChatOutcome::NoValidAnswer(_) => None,
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, ChatOutcome::Answered(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_only_available_for_answers() {
        let answered = ChatOutcome::Answered(FinalAnswer {
            text: "hello world".into(),
            source: AnswerSource::Fragments,
            stopped: false,
        });
        assert_eq!(answered.text(), Some("hello world"));
        assert!(answered.is_answered());
        assert_eq!(ChatOutcome::Empty.text(), None);
        assert_eq!(
            ChatOutcome::NoValidAnswer(NoAnswer::EmptyText).text(),
            None
        );
    }
}
