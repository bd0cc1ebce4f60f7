//! Mock implementations for testing.
//!
//! [`ScriptedAssistant`] answers every request the research pipeline makes,
//! routing on the persona and the shape of the request. It counts calls per
//! subtopic, records gathering requests, tracks how many calls of each kind
//! run at once, and can be told to slow down, fail or block specific calls.

use async_trait::async_trait;
use dossier::llm::Assistant;
use dossier::prompts::{
    ANALYST_PERSONA, EDITOR_PERSONA, ORGANIZER_PERSONA, PLANNER_PERSONA, RESEARCHER_PERSONA,
    TITLE_PERSONA, WRITER_PERSONA,
};
use dossier::types::{AppError, Result};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TITLE: &str = "The Forth Programming Language";

/// Per-subtopic call counts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubtopicCalls {
    pub gather: usize,
    pub structure: usize,
    pub analyze: usize,
    pub synthesize: usize,
    pub edit: usize,
}

/// Calls whose concurrency is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Gather,
    Synthesize,
    Edit,
}

#[derive(Debug, Default, Clone, Copy)]
struct InFlight {
    current: usize,
    peak: usize,
}

/// Decrements the in-flight count for its kind when dropped
struct InFlightGuard<'a> {
    assistant: &'a ScriptedAssistant,
    kind: CallKind,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(entry) = self.assistant.in_flight.lock().get_mut(&self.kind) {
            entry.current -= 1;
        }
    }
}

/// Scripted, call-counting assistant.
///
/// # Examples
///
/// ```ignore
/// // Five subtopics, analysis always asks for more
/// let assistant = ScriptedAssistant::new(&["History", "Syntax"]).with_follow_ups(true);
///
/// // The first gathering call for "Syntax" fails
/// let assistant = ScriptedAssistant::new(&["History", "Syntax"]).failing_first_gather("Syntax");
///
/// // Synthesis calls take 100ms, so overlapping calls can be observed
/// let assistant = ScriptedAssistant::forth().with_delay(CallKind::Synthesize, Duration::from_millis(100));
/// ```
pub struct ScriptedAssistant {
    subtopics: Vec<String>,
    follow_ups: bool,
    fail_planning: bool,
    fail_gather: Option<(String, usize)>,
    fail_analysis: Option<(String, usize)>,
    fail_synthesis: bool,
    block_gathering: bool,
    consistency_sections: Option<Value>,
    delays: HashMap<CallKind, Duration>,
    calls: Mutex<HashMap<String, SubtopicCalls>>,
    gather_requests: Mutex<HashMap<String, Vec<String>>>,
    in_flight: Mutex<HashMap<CallKind, InFlight>>,
    total: AtomicUsize,
    planning_calls: AtomicUsize,
    title_calls: AtomicUsize,
}

impl ScriptedAssistant {
    pub fn new(subtopics: &[&str]) -> Self {
        Self {
            subtopics: subtopics.iter().map(|s| s.to_string()).collect(),
            follow_ups: false,
            fail_planning: false,
            fail_gather: None,
            fail_analysis: None,
            fail_synthesis: false,
            block_gathering: false,
            consistency_sections: None,
            delays: HashMap::new(),
            calls: Mutex::new(HashMap::new()),
            gather_requests: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            total: AtomicUsize::new(0),
            planning_calls: AtomicUsize::new(0),
            title_calls: AtomicUsize::new(0),
        }
    }

    /// The five subtopics used for the Forth scenario
    pub fn forth() -> Self {
        Self::new(&[
            "History of Forth",
            "Stack-based execution",
            "Words and dictionaries",
            "Implementations",
            "Modern use",
        ])
    }

    /// When set, gap analysis always returns a follow-up question
    pub fn with_follow_ups(mut self, follow_ups: bool) -> Self {
        self.follow_ups = follow_ups;
        self
    }

    /// Every structured planning call fails
    pub fn failing_planning(mut self) -> Self {
        self.fail_planning = true;
        self
    }

    /// The first gathering call for `subtopic` fails
    pub fn failing_first_gather(self, subtopic: &str) -> Self {
        self.failing_gather_at(subtopic, 1)
    }

    /// The `nth` (1-based) gathering call for `subtopic` fails
    pub fn failing_gather_at(mut self, subtopic: &str, nth: usize) -> Self {
        self.fail_gather = Some((subtopic.to_string(), nth));
        self
    }

    /// The `nth` (1-based) analysis call for `subtopic` fails
    pub fn failing_analysis_at(mut self, subtopic: &str, nth: usize) -> Self {
        self.fail_analysis = Some((subtopic.to_string(), nth));
        self
    }

    /// Calls of `kind` sleep for `delay` before answering
    pub fn with_delay(mut self, kind: CallKind, delay: Duration) -> Self {
        self.delays.insert(kind, delay);
        self
    }

    /// Every synthesis call fails
    pub fn failing_synthesis(mut self) -> Self {
        self.fail_synthesis = true;
        self
    }

    /// Gathering calls never return
    pub fn blocking_gathering(mut self) -> Self {
        self.block_gathering = true;
        self
    }

    /// Sections returned by the consistency pass
    pub fn with_consistency_sections(mut self, sections: Value) -> Self {
        self.consistency_sections = Some(sections);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls_for(&self, subtopic: &str) -> SubtopicCalls {
        self.calls.lock().get(subtopic).copied().unwrap_or_default()
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn planning_calls(&self) -> usize {
        self.planning_calls.load(Ordering::SeqCst)
    }

    pub fn title_calls(&self) -> usize {
        self.title_calls.load(Ordering::SeqCst)
    }

    /// Gathering calls across every subtopic
    pub fn total_gathers(&self) -> usize {
        self.calls.lock().values().map(|c| c.gather).sum()
    }

    /// Rendered gathering requests for `subtopic`, in call order
    pub fn gather_requests(&self, subtopic: &str) -> Vec<String> {
        self.gather_requests.lock().get(subtopic).cloned().unwrap_or_default()
    }

    /// Most calls of `kind` that were ever running at once
    pub fn peak_in_flight(&self, kind: CallKind) -> usize {
        self.in_flight.lock().get(&kind).map(|f| f.peak).unwrap_or_default()
    }

    /// Count a call of `kind` as running, then apply its delay
    async fn enter(&self, kind: CallKind) -> InFlightGuard<'_> {
        {
            let mut in_flight = self.in_flight.lock();
            let entry = in_flight.entry(kind).or_default();
            entry.current += 1;
            entry.peak = entry.peak.max(entry.current);
        }
        let guard = InFlightGuard { assistant: self, kind };

        if let Some(delay) = self.delays.get(&kind) {
            tokio::time::sleep(*delay).await;
        }
        guard
    }

    fn fails_at(target: &Option<(String, usize)>, subtopic: &str, call: usize) -> bool {
        matches!(target, Some((name, nth)) if name == subtopic && *nth == call)
    }

    fn record(&self, subtopic: &str, update: impl FnOnce(&mut SubtopicCalls)) -> SubtopicCalls {
        let mut calls = self.calls.lock();
        let entry = calls.entry(subtopic.to_string()).or_default();
        update(entry);
        *entry
    }

    fn plan(&self) -> Value {
        let items: Vec<Value> = self
            .subtopics
            .iter()
            .map(|s| json!({"subtopic": s, "questions": [format!("What is {}?", s)]}))
            .collect();
        json!({"goal": "Explain the Forth programming language", "items": items})
    }
}

/// Text on the line following `heading`
fn line_after<'a>(request: &'a str, heading: &str) -> Option<&'a str> {
    let mut lines = request.lines();
    lines.find(|line| line.trim() == heading)?;
    lines.next().map(str::trim)
}

/// Lines between `start` and `end` headings, blank lines preserved
fn block_between(request: &str, start: &str, end: &str) -> String {
    let Some(from) = request.find(start) else {
        return String::new();
    };
    let body = &request[from + start.len()..];
    let body = body.find(end).map(|to| &body[..to]).unwrap_or(body);
    body.trim().to_string()
}

#[async_trait]
impl Assistant for ScriptedAssistant {
    async fn ask(&self, persona: &str, request: &str) -> Result<String> {
        self.total.fetch_add(1, Ordering::SeqCst);

        match persona {
            RESEARCHER_PERSONA => match line_after(request, "## Subtopic") {
                Some(subtopic) => {
                    let calls = self.record(subtopic, |c| c.gather += 1);
                    self.gather_requests
                        .lock()
                        .entry(subtopic.to_string())
                        .or_default()
                        .push(request.to_string());
                    let _running = self.enter(CallKind::Gather).await;

                    if self.block_gathering {
                        futures::future::pending::<()>().await;
                    }
                    if Self::fails_at(&self.fail_gather, subtopic, calls.gather) {
                        return Err(AppError::Assistant(format!("gathering failed for {}", subtopic)));
                    }

                    Ok(format!("Findings #{} about {}.", calls.gather, subtopic))
                }
                None => {
                    self.planning_calls.fetch_add(1, Ordering::SeqCst);
                    Ok("Forth is a stack-based language created by Charles Moore.".to_string())
                }
            },
            WRITER_PERSONA => {
                let subtopic = line_after(request, "## Section").unwrap_or_default();
                self.record(subtopic, |c| c.synthesize += 1);
                let _running = self.enter(CallKind::Synthesize).await;
                if self.fail_synthesis {
                    return Err(AppError::Assistant("synthesis failed".to_string()));
                }
                Ok(format!("## {}\n\nFirst paragraph on {}.\n\nSecond paragraph.", subtopic, subtopic))
            }
            EDITOR_PERSONA => {
                let title = line_after(request, "## Section").unwrap_or_default();
                self.record(title, |c| c.edit += 1);
                let _running = self.enter(CallKind::Edit).await;
                Ok(block_between(request, "## Text", "## Task"))
            }
            other => Err(AppError::Assistant(format!("unexpected ask persona: {}", other))),
        }
    }

    async fn structured_ask(&self, persona: &str, request: &str, schema: &Value) -> Result<Value> {
        self.total.fetch_add(1, Ordering::SeqCst);
        assert!(schema.is_object(), "structured calls always carry a schema");

        match persona {
            PLANNER_PERSONA => {
                self.planning_calls.fetch_add(1, Ordering::SeqCst);
                if self.fail_planning {
                    return Err(AppError::Assistant("planner unavailable".to_string()));
                }
                Ok(self.plan())
            }
            ORGANIZER_PERSONA => {
                let subtopic = line_after(request, "## Subtopic").unwrap_or_default();
                let calls = self.record(subtopic, |c| c.structure += 1);
                Ok(json!([{
                    "topic": format!("{} part {}", subtopic, calls.structure),
                    "information": format!("Structured findings #{} about {}.", calls.structure, subtopic),
                }]))
            }
            ANALYST_PERSONA => {
                let subtopic = line_after(request, "## Subtopic").unwrap_or_default();
                let calls = self.record(subtopic, |c| c.analyze += 1);
                if Self::fails_at(&self.fail_analysis, subtopic, calls.analyze) {
                    return Err(AppError::Assistant(format!("analysis failed for {}", subtopic)));
                }
                if self.follow_ups {
                    Ok(json!([format!("What else about {} (round {})?", subtopic, calls.analyze)]))
                } else {
                    Ok(json!([]))
                }
            }
            WRITER_PERSONA => {
                let subtopic = line_after(request, "## Section").unwrap_or_default();
                self.record(subtopic, |c| c.synthesize += 1);
                let _running = self.enter(CallKind::Synthesize).await;
                if self.fail_synthesis {
                    return Err(AppError::Assistant("synthesis failed".to_string()));
                }
                Ok(json!([
                    {"name": "intro", "body": format!("**{}** matters.", subtopic)},
                    {"name": "detail", "body": format!("More about {}.", subtopic)},
                ]))
            }
            TITLE_PERSONA => {
                self.title_calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!(format!("\"{}\"", DEFAULT_TITLE)))
            }
            EDITOR_PERSONA => {
                self.title_calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({
                    "title": DEFAULT_TITLE,
                    "sections": self.consistency_sections.clone().unwrap_or_else(|| json!([])),
                }))
            }
            other => Err(AppError::Assistant(format!("unexpected structured persona: {}", other))),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Assistant that answers every call with the same error
pub struct FailingAssistant;

#[async_trait]
impl Assistant for FailingAssistant {
    async fn ask(&self, _persona: &str, _request: &str) -> Result<String> {
        Err(AppError::Assistant("Mock assistant failure".to_string()))
    }

    async fn structured_ask(&self, _persona: &str, _request: &str, _schema: &Value) -> Result<Value> {
        Err(AppError::Assistant("Mock assistant failure".to_string()))
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}
