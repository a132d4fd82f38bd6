//! Response generation with tool-calling.
//!
//! Drives the Messages API through at most two sequential rounds of tool
//! calls, then one final call without tools. First-round tool failures
//! propagate to the caller; second-round failures degrade to an apology so a
//! partially-answered query still returns something usable.

use std::sync::Arc;

use serde_json::Value;

use super::provider::LlmProvider;
use super::types::{ContentBlock, MessageParam, MessagesRequest};
use crate::core::errors::ApiError;
use crate::tools::ToolManager;

pub const SYSTEM_PROMPT: &str = r#" You are an AI assistant specialized in course materials and educational content with access to a comprehensive search tool for course information.

Search Tool Usage:
- Use the search tool **only** for questions about specific course content or detailed educational materials
- **Maximum 2 sequential searches per query** - You can search, analyze results, then search again if needed
- Synthesize search results into accurate, fact-based responses
- If search yields no results, state this clearly without offering alternatives

Multi-step Reasoning:
- For complex queries, you may need multiple searches to gather complete information
- Example: "Search for course X outline" → analyze lesson 4 topic → "Search for courses covering that topic"
- Each search builds upon previous results to provide comprehensive answers

Response Protocol:
- **General knowledge questions**: Answer using existing knowledge without searching
- **Course-specific questions**: Search first, then answer
- **Complex queries**: Use multiple searches as needed (max 2)
- **No meta-commentary**:
 - Provide direct answers only — no reasoning process, search explanations, or question-type analysis
 - Do not mention "based on the search results"


All responses must be:
1. **Brief, Concise and focused** - Get to the point quickly
2. **Educational** - Maintain instructional value
3. **Clear** - Use accessible language
4. **Example-supported** - Include relevant examples when they aid understanding
Provide only the direct answer to what was asked.
"#;

const MAX_TOOL_ROUNDS: usize = 2;
const TOOL_FAILURE_MESSAGE: &str = "I encountered an issue while searching for additional \
     information. Please try rephrasing your question.";

pub struct ResponseGenerator {
    provider: Arc<dyn LlmProvider>,
    temperature: f64,
    max_tokens: i64,
}

impl ResponseGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            temperature: 0.0,
            max_tokens: 800,
        }
    }

    pub async fn generate_response(
        &self,
        query: &str,
        conversation_history: Option<&str>,
        tool_manager: Option<&ToolManager>,
    ) -> Result<String, ApiError> {
        let system = match conversation_history {
            Some(history) => format!("{}\n\nPrevious conversation:\n{}", SYSTEM_PROMPT, history),
            None => SYSTEM_PROMPT.to_string(),
        };

        let tools: Option<Vec<Value>> = tool_manager
            .map(|manager| manager.get_tool_definitions())
            .filter(|definitions| !definitions.is_empty());

        let mut messages = vec![MessageParam::user_text(query)];

        let response = self
            .provider
            .messages(&self.request(&system, &messages, tools.clone()))
            .await?;

        let (mut response, manager) = match (response.wants_tools(), tool_manager) {
            (true, Some(manager)) => (response, manager),
            _ => return Ok(response.first_text()),
        };

        for round in 0..MAX_TOOL_ROUNDS {
            messages.push(MessageParam::assistant(response.content.clone()));

            let mut tool_results = Vec::new();
            for block in &response.content {
                if let ContentBlock::ToolUse { id, name, input } = block {
                    match manager.execute_tool(name, input).await {
                        Ok(output) => tool_results.push(ContentBlock::ToolResult {
                            tool_use_id: id.clone(),
                            content: output,
                        }),
                        // First round: surface the failure. Second round: the
                        // user already cost two model calls, degrade politely.
                        Err(err) if round == 0 => return Err(err),
                        Err(_) => return Ok(TOOL_FAILURE_MESSAGE.to_string()),
                    }
                }
            }
            if !tool_results.is_empty() {
                messages.push(MessageParam::user(tool_results));
            }

            if round + 1 < MAX_TOOL_ROUNDS {
                let next = self
                    .provider
                    .messages(&self.request(&system, &messages, tools.clone()))
                    .await?;
                if next.wants_tools() {
                    response = next;
                    continue;
                }
                return Ok(next.first_text());
            }
        }

        // Both rounds used: one final call with tools withheld.
        let final_response = self
            .provider
            .messages(&self.request(&system, &messages, None))
            .await?;
        Ok(final_response.first_text())
    }

    fn request(
        &self,
        system: &str,
        messages: &[MessageParam],
        tools: Option<Vec<Value>>,
    ) -> MessagesRequest {
        MessagesRequest {
            system: system.to_string(),
            messages: messages.to_vec(),
            tools,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ModelResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Provider returning a scripted sequence of responses while recording
    /// every request it saw.
    struct ScriptedProvider {
        responses: Mutex<Vec<ModelResponse>>,
        requests: Mutex<Vec<MessagesRequest>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<ModelResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<MessagesRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn messages(&self, request: &MessagesRequest) -> Result<ModelResponse, ApiError> {
            self.requests.lock().unwrap().push(request.clone());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(ApiError::Internal("script exhausted".to_string()));
            }
            Ok(responses.remove(0))
        }
    }

    struct StubTool {
        output: Result<&'static str, &'static str>,
    }

    #[async_trait]
    impl crate::tools::Tool for StubTool {
        fn definition(&self) -> Value {
            json!({
                "name": "search_course_content",
                "description": "stub",
                "input_schema": { "type": "object", "properties": {}, "required": [] }
            })
        }

        async fn execute(&self, _args: &Value) -> Result<String, ApiError> {
            match self.output {
                Ok(text) => Ok(text.to_string()),
                Err(msg) => Err(ApiError::Internal(msg.to_string())),
            }
        }
    }

    fn text_response(text: &str) -> ModelResponse {
        ModelResponse {
            stop_reason: Some("end_turn".to_string()),
            content: vec![ContentBlock::Text {
                text: text.to_string(),
            }],
        }
    }

    fn tool_use_response(id: &str) -> ModelResponse {
        ModelResponse {
            stop_reason: Some("tool_use".to_string()),
            content: vec![ContentBlock::ToolUse {
                id: id.to_string(),
                name: "search_course_content".to_string(),
                input: json!({ "query": "test" }),
            }],
        }
    }

    fn manager_with(tool: StubTool) -> ToolManager {
        let mut manager = ToolManager::new();
        manager.register_tool(Arc::new(tool)).unwrap();
        manager
    }

    #[tokio::test]
    async fn direct_answer_without_tools() {
        let provider = ScriptedProvider::new(vec![text_response("Direct answer")]);
        let generator = ResponseGenerator::new(provider.clone());

        let answer = generator
            .generate_response("What is Python?", None, None)
            .await
            .unwrap();

        assert_eq!(answer, "Direct answer");
        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].tools.is_none());
        assert_eq!(requests[0].temperature, 0.0);
        assert_eq!(requests[0].max_tokens, 800);
        assert_eq!(requests[0].system, SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn history_is_appended_to_system_prompt() {
        let provider = ScriptedProvider::new(vec![text_response("ok")]);
        let generator = ResponseGenerator::new(provider.clone());

        generator
            .generate_response("Follow up", Some("User: hi\nAssistant: hello"), None)
            .await
            .unwrap();

        let system = &provider.requests()[0].system;
        assert!(system.starts_with(SYSTEM_PROMPT));
        assert!(system.contains("Previous conversation:\nUser: hi\nAssistant: hello"));
    }

    #[tokio::test]
    async fn single_tool_round_then_answer() {
        let provider = ScriptedProvider::new(vec![
            tool_use_response("toolu_1"),
            text_response("Answer from tool results"),
        ]);
        let generator = ResponseGenerator::new(provider.clone());
        let manager = manager_with(StubTool {
            output: Ok("search output"),
        });

        let answer = generator
            .generate_response("course question", None, Some(&manager))
            .await
            .unwrap();

        assert_eq!(answer, "Answer from tool results");

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        // Both calls carry tool definitions; the second also carries the
        // assistant tool_use turn plus the tool_result turn.
        assert!(requests[0].tools.is_some());
        assert!(requests[1].tools.is_some());
        assert_eq!(requests[1].messages.len(), 3);
        match &requests[1].messages[2].content[0] {
            ContentBlock::ToolResult { tool_use_id, content } => {
                assert_eq!(tool_use_id, "toolu_1");
                assert_eq!(content, "search output");
            }
            other => panic!("unexpected block: {:?}", other),
        }
    }

    #[tokio::test]
    async fn two_tool_rounds_then_final_call_without_tools() {
        let provider = ScriptedProvider::new(vec![
            tool_use_response("toolu_1"),
            tool_use_response("toolu_2"),
            text_response("Final synthesis"),
        ]);
        let generator = ResponseGenerator::new(provider.clone());
        let manager = manager_with(StubTool {
            output: Ok("search output"),
        });

        let answer = generator
            .generate_response("complex question", None, Some(&manager))
            .await
            .unwrap();

        assert_eq!(answer, "Final synthesis");

        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].tools.is_some());
        assert!(requests[1].tools.is_some());
        assert!(requests[2].tools.is_none(), "final call must withhold tools");
        // query, assistant, results, assistant, results
        assert_eq!(requests[2].messages.len(), 5);
    }

    #[tokio::test]
    async fn first_round_tool_failure_propagates() {
        let provider = ScriptedProvider::new(vec![tool_use_response("toolu_1")]);
        let generator = ResponseGenerator::new(provider);
        let manager = manager_with(StubTool {
            output: Err("store exploded"),
        });

        let err = generator
            .generate_response("question", None, Some(&manager))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("store exploded"));
    }

    #[tokio::test]
    async fn second_round_tool_failure_degrades_to_apology() {
        struct FlakyTool {
            calls: Mutex<usize>,
        }

        #[async_trait]
        impl crate::tools::Tool for FlakyTool {
            fn definition(&self) -> Value {
                json!({
                    "name": "search_course_content",
                    "description": "works once",
                    "input_schema": { "type": "object", "properties": {}, "required": [] }
                })
            }

            async fn execute(&self, _args: &Value) -> Result<String, ApiError> {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                if *calls == 1 {
                    Ok("first output".to_string())
                } else {
                    Err(ApiError::Internal("second call failed".to_string()))
                }
            }
        }

        let provider = ScriptedProvider::new(vec![
            tool_use_response("toolu_1"),
            tool_use_response("toolu_2"),
        ]);
        let generator = ResponseGenerator::new(provider);
        let mut manager = ToolManager::new();
        manager
            .register_tool(Arc::new(FlakyTool {
                calls: Mutex::new(0),
            }))
            .unwrap();

        let answer = generator
            .generate_response("question", None, Some(&manager))
            .await
            .unwrap();
        assert_eq!(answer, TOOL_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn tool_use_without_manager_returns_text() {
        let provider = ScriptedProvider::new(vec![ModelResponse {
            stop_reason: Some("tool_use".to_string()),
            content: vec![
                ContentBlock::Text {
                    text: "partial".to_string(),
                },
                ContentBlock::ToolUse {
                    id: "toolu_1".to_string(),
                    name: "search_course_content".to_string(),
                    input: json!({}),
                },
            ],
        }]);
        let generator = ResponseGenerator::new(provider);

        let answer = generator
            .generate_response("question", None, None)
            .await
            .unwrap();
        assert_eq!(answer, "partial");
    }
}
