//! The bounded tool-calling state machine.
//!
//! [`ToolLoop`] only tracks state and the round counter; the agent performs
//! the model calls and tool executions that drive it.

use radar_types::{ApiError, ChatResponse, Conversation, RadarError, ToolCall, Turn};

/// Where a conversation stands between steps.
#[derive(Debug)]
pub enum LoopState {
    /// Waiting on the model's next decision.
    Thinking,
    /// The model asked for these tools, in order.
    Executing(Vec<ToolCall>),
    /// The model produced a final answer.
    Done(String),
    Failed(RadarError),
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Done(_) | LoopState::Failed(_))
    }
}

/// Round-counting driver for one conversation.
#[derive(Debug)]
pub struct ToolLoop {
    state: LoopState,
    rounds: usize,
    max_rounds: usize,
}

impl ToolLoop {
    pub fn new(max_rounds: usize) -> Self {
        Self {
            state: LoopState::Thinking,
            rounds: 0,
            max_rounds: max_rounds.max(1),
        }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Model replies received so far.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Apply a model reply received while `Thinking`.
    ///
    /// A reply without tool calls finishes the loop. Tool calls are appended
    /// to `conversation` and move the loop to `Executing`, unless this reply
    /// used up the last round.
    pub fn on_reply(&mut self, reply: ChatResponse, conversation: &mut Conversation) {
        if !matches!(self.state, LoopState::Thinking) {
            tracing::warn!("Ignoring model reply outside of the thinking state");
            return;
        }
        self.rounds += 1;

        let ChatResponse {
            content,
            tool_calls,
            ..
        } = reply;
        let content = content.unwrap_or_default();

        if tool_calls.is_empty() {
            conversation.push(Turn::assistant(content.clone()));
            self.state = LoopState::Done(content);
        } else if self.rounds >= self.max_rounds {
            tracing::warn!(
                "Model still requesting {} tool calls after {} rounds; giving up",
                tool_calls.len(),
                self.rounds
            );
            self.state = LoopState::Failed(RadarError::TurnLimit {
                max_rounds: self.max_rounds,
            });
        } else {
            conversation.push(Turn::assistant_with_tool_calls(content, tool_calls.clone()));
            self.state = LoopState::Executing(tool_calls);
        }
    }

    /// A model call failed; the conversation cannot continue.
    pub fn on_model_error(&mut self, error: ApiError) {
        self.state = LoopState::Failed(RadarError::Api(error));
    }

    /// Every requested tool has a result in the conversation; ask the model again.
    pub fn on_tools_finished(&mut self) {
        if matches!(self.state, LoopState::Executing(_)) {
            self.state = LoopState::Thinking;
        }
    }

    /// The final answer, or the reason there is none.
    pub fn finish(self) -> Result<String, RadarError> {
        match self.state {
            LoopState::Done(text) => Ok(text),
            LoopState::Failed(err) => Err(err),
            LoopState::Thinking | LoopState::Executing(_) => Err(RadarError::Other(
                "conversation ended before reaching a final answer".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: "navigate_page".into(),
            arguments: "{}".into(),
        }
    }

    fn answer(text: &str) -> ChatResponse {
        ChatResponse {
            content: Some(text.into()),
            ..ChatResponse::default()
        }
    }

    fn tools(ids: &[&str]) -> ChatResponse {
        ChatResponse {
            tool_calls: ids.iter().map(|id| call(id)).collect(),
            ..ChatResponse::default()
        }
    }

    #[test]
    fn final_answer_on_first_round() {
        let mut convo = Conversation::from(vec![Turn::user("hi")]);
        let mut tl = ToolLoop::new(10);
        tl.on_reply(answer("hello"), &mut convo);

        assert_eq!(tl.rounds(), 1);
        assert!(tl.state().is_terminal());
        assert_eq!(convo.final_answer(), Some("hello"));
        assert_eq!(tl.finish().unwrap(), "hello");
    }

    #[test]
    fn tool_calls_move_to_executing_then_back() {
        let mut convo = Conversation::new();
        let mut tl = ToolLoop::new(10);
        tl.on_reply(tools(&["a", "b"]), &mut convo);

        match tl.state() {
            LoopState::Executing(calls) => {
                let ids: Vec<&str> = calls.iter().map(|c| c.id.as_str()).collect();
                assert_eq!(ids, vec!["a", "b"]);
            }
            other => panic!("Expected Executing, got {other:?}"),
        }
        assert_eq!(convo.len(), 1);

        tl.on_tools_finished();
        assert!(matches!(tl.state(), LoopState::Thinking));
    }

    #[test]
    fn tool_calls_on_last_round_fail_with_turn_limit() {
        let mut convo = Conversation::new();
        let mut tl = ToolLoop::new(2);

        tl.on_reply(tools(&["a"]), &mut convo);
        tl.on_tools_finished();
        tl.on_reply(tools(&["b"]), &mut convo);

        assert_eq!(tl.rounds(), 2);
        // The unanswerable request is not recorded.
        assert_eq!(convo.len(), 1);
        match tl.finish() {
            Err(RadarError::TurnLimit { max_rounds }) => assert_eq!(max_rounds, 2),
            other => panic!("Expected TurnLimit, got {other:?}"),
        }
    }

    #[test]
    fn single_round_limit_still_accepts_a_final_answer() {
        let mut convo = Conversation::new();
        let mut tl = ToolLoop::new(1);
        tl.on_reply(answer("direct"), &mut convo);
        assert_eq!(tl.finish().unwrap(), "direct");
    }

    #[test]
    fn model_error_fails_the_loop() {
        let mut tl = ToolLoop::new(3);
        tl.on_model_error(ApiError::Timeout);
        assert!(tl.state().is_terminal());
        assert!(matches!(tl.finish(), Err(RadarError::Api(ApiError::Timeout))));
    }

    #[test]
    fn replies_after_termination_are_ignored() {
        let mut convo = Conversation::new();
        let mut tl = ToolLoop::new(3);
        tl.on_reply(answer("done"), &mut convo);
        tl.on_reply(tools(&["late"]), &mut convo);
        assert_eq!(tl.rounds(), 1);
        assert_eq!(convo.len(), 1);
    }

    #[test]
    fn zero_max_rounds_is_treated_as_one() {
        assert_eq!(ToolLoop::new(0).max_rounds(), 1);
    }
}
