use crate::llm::message::{ContentBlock, ToolUse};

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    /// The request was printed instead of sent.
    DryRun,
    Other(String),
}

impl StopReason {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "end_turn" | "stop" | "stop_sequence" => Self::EndTurn,
            "tool_use" | "tool_calls" => Self::ToolUse,
            "max_tokens" | "length" => Self::MaxTokens,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Token counts reported by the provider, when it reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    /// Prompt tokens.
    pub input_tokens: Option<u32>,
    /// Generated tokens.
    pub output_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// Assistant reply decoded from any provider.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Concatenates all text blocks in order, without separator.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect()
    }

    /// First tool invocation, restricted to `name` when given.
    pub fn tool_use(&self, name: Option<&str>) -> Option<&ToolUse> {
        self.content
            .iter()
            .filter_map(ContentBlock::as_tool_use)
            .find(|tool_use| name.is_none_or(|name| tool_use.name == name))
    }

    pub fn is_dry_run(&self) -> bool {
        self.stop_reason == StopReason::DryRun
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(content: Vec<ContentBlock>) -> ChatResponse {
        ChatResponse {
            content,
            stop_reason: StopReason::EndTurn,
            usage: None,
        }
    }

    #[test]
    fn text_concatenates_blocks_without_separator() {
        let reply = response(vec![
            ContentBlock::text("[{\"title\":"),
            ContentBlock::text("\"Matrix\"}"),
            ContentBlock::text("]"),
        ]);
        assert_eq!(reply.text(), "[{\"title\":\"Matrix\"}]");
    }

    #[test]
    fn text_of_tool_only_reply_is_empty() {
        let reply = response(vec![ContentBlock::ToolUse(ToolUse {
            id: "1".to_string(),
            name: "return_movie_info".to_string(),
            input: json!({"movies": []}),
        })]);
        assert_eq!(reply.text(), "");
    }

    #[test]
    fn tool_use_filters_by_name() {
        let reply = response(vec![
            ContentBlock::text("thinking"),
            ContentBlock::ToolUse(ToolUse {
                id: "1".to_string(),
                name: "other".to_string(),
                input: json!({}),
            }),
            ContentBlock::ToolUse(ToolUse {
                id: "2".to_string(),
                name: "wanted".to_string(),
                input: json!({"ok": true}),
            }),
        ]);

        assert_eq!(reply.tool_use(None).map(|t| t.id.as_str()), Some("1"));
        assert_eq!(
            reply.tool_use(Some("wanted")).map(|t| t.id.as_str()),
            Some("2")
        );
        assert!(reply.tool_use(Some("missing")).is_none());
    }

    #[test]
    fn stop_reasons_cover_both_wire_dialects() {
        assert_eq!(StopReason::from_wire("tool_use"), StopReason::ToolUse);
        assert_eq!(StopReason::from_wire("tool_calls"), StopReason::ToolUse);
        assert_eq!(StopReason::from_wire("length"), StopReason::MaxTokens);
        assert_eq!(
            StopReason::from_wire("guardrail_intervened"),
            StopReason::Other("guardrail_intervened".to_string())
        );
    }
}
