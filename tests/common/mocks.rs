//! Mock implementations for testing.
//!
//! Scripted model clients, tools and user channels shared by the integration
//! tests, so no test talks to a real provider or search engine.

#![allow(dead_code)]

use async_trait::async_trait;
use deepsearch::llm::{LLMClient, LLMResponse, StructuredCompletionClient, StructuredRequest};
use deepsearch::research::brief::ResearchBrief;
use deepsearch::research::clarify::UserInteraction;
use deepsearch::research::prompts::REFLECTION_INSTRUCTIONS;
use deepsearch::research::TopicResearcher;
use deepsearch::tools::think::ThinkTool;
use deepsearch::tools::{Tool, ToolRegistry};
use deepsearch::types::{
    CompletionError, ConversationMessage, MessageRole, ResearchError, ToolCall, ToolDefinition,
    ToolError,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Structured client
// =============================================================================

/// Structured client answering from per-schema queues.
///
/// Replies are keyed by schema name (`SupervisorDecision`, `ResearchQuestion`,
/// ...). A request for a schema with no reply left fails with a transport error.
#[derive(Default)]
pub struct RoutedStructuredClient {
    replies: Mutex<HashMap<String, VecDeque<Value>>>,
    requests: Mutex<Vec<StructuredRequest>>,
}

impl RoutedStructuredClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the given schema.
    pub fn on(self, schema: &str, reply: Value) -> Self {
        self.replies
            .lock()
            .entry(schema.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn clarify_proceed(self) -> Self {
        self.on(
            "ClarificationDecision",
            json!({"needsClarification": false, "question": "", "acknowledgement": "Starting research."}),
        )
    }

    pub fn clarify_ask(self, question: &str) -> Self {
        self.on(
            "ClarificationDecision",
            json!({"needsClarification": true, "question": question, "acknowledgement": ""}),
        )
    }

    pub fn brief(self, text: &str) -> Self {
        self.on("ResearchQuestion", json!({"researchBrief": text}))
    }

    pub fn plan(self, titles: &[&str]) -> Self {
        let components: Vec<Value> = titles
            .iter()
            .map(|t| json!({"title": t, "objective": format!("Investigate {}", t), "rationale": "Distinct area."}))
            .collect();
        self.on("PlanResponse", json!({"researchComponents": components}))
    }

    pub fn delegate(self, topics: &[&str]) -> Self {
        self.on(
            "SupervisorDecision",
            json!({"action": "delegate_research", "topics": topics}),
        )
    }

    pub fn complete(self, summary: &str) -> Self {
        self.on(
            "SupervisorDecision",
            json!({"action": "research_complete", "summary": summary}),
        )
    }

    /// Schema names in request order.
    pub fn requested(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|r| r.schema_name.clone())
            .collect()
    }

    /// All requests for one schema.
    pub fn requests_for(&self, schema: &str) -> Vec<StructuredRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.schema_name == schema)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl StructuredCompletionClient for RoutedStructuredClient {
    async fn complete_value(&self, request: &StructuredRequest) -> Result<Value, CompletionError> {
        self.requests.lock().push(request.clone());
        self.replies
            .lock()
            .get_mut(&request.schema_name)
            .and_then(|queue| queue.pop_front())
            .ok_or_else(|| {
                CompletionError::Transport(format!("no scripted reply for {}", request.schema_name))
            })
    }
}

// =============================================================================
// Raw client for researchers and reflection
// =============================================================================

/// Raw client playing researcher, compressor and supervisor reflector.
///
/// - Tool loop: first round asks `web_search` (and `think` when enabled) for the
///   topic, the next round answers with notes. Topics set with
///   [`ResearchLlm::retrying_on`] search again after every failed search.
/// - Compression: returns a findings report citing one source for the topic.
/// - Reflection: returns a fixed sentence.
///
/// The topic is the second seed message of a researcher conversation.
#[derive(Default)]
pub struct ResearchLlm {
    failing_topics: HashSet<String>,
    retrying_topics: HashSet<String>,
    with_think: bool,
    reflection_fails: bool,
    pub reflections: AtomicUsize,
    pub compressions: Mutex<Vec<Vec<ConversationMessage>>>,
}

impl ResearchLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tool rounds for this topic fail with a transport error.
    pub fn failing_on(mut self, topic: &str) -> Self {
        self.failing_topics.insert(topic.to_string());
        self
    }

    /// Keep searching for this topic for as long as the last search failed.
    pub fn retrying_on(mut self, topic: &str) -> Self {
        self.retrying_topics.insert(topic.to_string());
        self
    }

    /// Request a `think` call alongside the first search.
    pub fn with_think(mut self) -> Self {
        self.with_think = true;
        self
    }

    pub fn failing_reflection(mut self) -> Self {
        self.reflection_fails = true;
        self
    }

    pub fn reflection_count(&self) -> usize {
        self.reflections.load(Ordering::SeqCst)
    }

    fn topic(messages: &[ConversationMessage]) -> String {
        messages
            .get(1)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

pub fn slug(topic: &str) -> String {
    topic
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect()
}

#[async_trait]
impl LLMClient for ResearchLlm {
    async fn generate_with_history(
        &self,
        messages: &[ConversationMessage],
    ) -> Result<LLMResponse, CompletionError> {
        let is_reflection = messages
            .first()
            .map_or(false, |m| m.content == REFLECTION_INSTRUCTIONS);
        if is_reflection {
            self.reflections.fetch_add(1, Ordering::SeqCst);
            if self.reflection_fails {
                return Err(CompletionError::Transport("reflection offline".to_string()));
            }
            return Ok(LLMResponse::text("Coverage looks adequate."));
        }

        self.compressions.lock().push(messages.to_vec());
        let topic = Self::topic(messages);
        Ok(LLMResponse::text(format!(
            "Findings on {topic} [3].\n\n### Sources\n[3] {topic} overview: https://example.com/{}",
            slug(&topic)
        )))
    }

    async fn generate_with_tools_and_history(
        &self,
        messages: &[ConversationMessage],
        _tools: &[ToolDefinition],
    ) -> Result<LLMResponse, CompletionError> {
        let topic = Self::topic(messages);
        if self.failing_topics.contains(&topic) {
            return Err(CompletionError::Transport(format!("{} unreachable", topic)));
        }

        let results: Vec<&ConversationMessage> = messages
            .iter()
            .filter(|m| m.role == MessageRole::Tool)
            .collect();
        if let Some(last) = results.last() {
            let retry = self.retrying_topics.contains(&topic) && last.content.contains("error");
            if !retry {
                return Ok(LLMResponse::text(format!("Notes about {}", topic)));
            }
        }

        let id = match results.len() {
            0 => "call-search".to_string(),
            n => format!("call-search-{}", n),
        };
        let mut tool_calls = vec![ToolCall {
            id,
            name: "web_search".to_string(),
            arguments: json!({"query": topic}),
        }];
        if self.with_think {
            tool_calls.push(ToolCall {
                id: "call-think".to_string(),
                name: "think".to_string(),
                arguments: json!({"reflection": "One search should be enough."}),
            });
        }
        Ok(LLMResponse {
            content: String::new(),
            tool_calls,
            finish_reason: "tool_calls".to_string(),
            usage: None,
        })
    }

    fn model_name(&self) -> &str {
        "research-mock"
    }
}

// =============================================================================
// Tools
// =============================================================================

/// Offline stand-in for `web_search`. Queries listed in `failing` error out.
#[derive(Default)]
pub struct FakeSearch {
    pub calls: AtomicUsize,
    failing: HashSet<String>,
}

#[async_trait]
impl Tool for FakeSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web (offline fixture)"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let query = args["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("query is required".to_string()))?;
        if self.failing.contains(query) {
            return Err(ToolError::Execution(format!("search backend rejected '{}'", query)));
        }
        Ok(json!({
            "query": query,
            "results": [{
                "title": format!("{} overview", query),
                "url": format!("https://example.com/{}", slug(query)),
                "description": "fixture"
            }],
            "count": 1
        }))
    }
}

/// Registry with the offline search and the real reflection tool.
pub fn offline_registry() -> (Arc<ToolRegistry>, Arc<FakeSearch>) {
    offline_registry_failing(&[])
}

/// Like [`offline_registry`], but searches for `failing` queries return errors.
pub fn offline_registry_failing(failing: &[&str]) -> (Arc<ToolRegistry>, Arc<FakeSearch>) {
    let search = Arc::new(FakeSearch {
        calls: AtomicUsize::new(0),
        failing: failing.iter().map(|q| q.to_string()).collect(),
    });
    let mut registry = ToolRegistry::new();
    registry.register(search.clone());
    registry.register(Arc::new(ThinkTool));
    (Arc::new(registry), search)
}

// =============================================================================
// User channel
// =============================================================================

/// Answers clarifying questions from a queue and records what was asked.
#[derive(Default)]
pub struct ScriptedUser {
    answers: Mutex<VecDeque<String>>,
    pub questions: Mutex<Vec<String>>,
}

impl ScriptedUser {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.questions.lock().clone()
    }
}

impl UserInteraction for ScriptedUser {
    fn ask(&self, question: &str) -> String {
        self.questions.lock().push(question.to_string());
        self.answers.lock().pop_front().unwrap_or_default()
    }
}

// =============================================================================
// Topic researcher probe
// =============================================================================

/// What a probe researcher does for one topic.
#[derive(Clone)]
pub enum Behaviour {
    Succeed { delay: Duration },
    Fail { delay: Duration },
    Panic,
}

/// Researcher that tracks concurrency and follows per-topic behaviour.
pub struct ProbeResearcher {
    behaviour: HashMap<String, Behaviour>,
    default_delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub started: Mutex<Vec<String>>,
    pub finished: Mutex<Vec<String>>,
}

impl ProbeResearcher {
    pub fn new(default_delay: Duration) -> Self {
        Self {
            behaviour: HashMap::new(),
            default_delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, topic: &str, behaviour: Behaviour) -> Self {
        self.behaviour.insert(topic.to_string(), behaviour);
        self
    }

    pub fn peak(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TopicResearcher for ProbeResearcher {
    async fn research(&self, _brief: &ResearchBrief, topic: &str) -> Result<String, ResearchError> {
        self.started.lock().push(topic.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let behaviour = self.behaviour.get(topic).cloned().unwrap_or(Behaviour::Succeed {
            delay: self.default_delay,
        });
        match behaviour {
            Behaviour::Succeed { delay } => {
                tokio::time::sleep(delay).await;
                self.finished.lock().push(topic.to_string());
                Ok(format!("Report on {}", topic))
            }
            Behaviour::Fail { delay } => {
                tokio::time::sleep(delay).await;
                Err(ResearchError::Completion(CompletionError::Transport(format!(
                    "{} unreachable",
                    topic
                ))))
            }
            Behaviour::Panic => panic!("researcher for {} crashed", topic),
        }
    }
}
