//! Agent dispatch seam.
//!
//! The routing/session-store subsystem that turns a transcript into a
//! reply lives outside this crate. The orchestrator sees two calls: a
//! per-turn recording side-channel and a dispatch that streams reply
//! chunks back.

use crate::error::{Result, RflinkError};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// One streamed piece of the agent's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyChunk {
    pub text: String,
}

/// Context handed to the agent with every turn.
#[derive(Debug, Clone)]
pub struct TurnContext {
    /// Orchestrator session id for correlation in agent-side logs.
    pub session_id: u64,
    /// Whether the transcript addressed the station directly.
    pub direct: bool,
}

/// Stream of reply chunks; each item may fail independently.
pub type ReplyStream = BoxStream<'static, Result<ReplyChunk>>;

#[async_trait]
pub trait AgentDispatch: Send + Sync {
    /// Side-channel invoked once per finalized turn, before dispatch.
    async fn record_turn(&self, transcript: &str, ctx: &TurnContext) -> Result<()>;

    /// Routes the transcript and streams back reply chunks.
    async fn dispatch(&self, transcript: &str, ctx: &TurnContext) -> Result<ReplyStream>;
}

/// Mock agent for tests: scripted reply chunks, optional dispatch
/// failure, zero-chunk mode, and a journal of dispatched transcripts.
pub struct MockAgent {
    chunks: Vec<String>,
    fail_dispatch: bool,
    dispatched: Arc<Mutex<Vec<String>>>,
    recorded: AtomicU32,
}

impl MockAgent {
    pub fn new() -> Self {
        Self {
            chunks: vec!["mock reply".to_string()],
            fail_dispatch: false,
            dispatched: Arc::new(Mutex::new(Vec::new())),
            recorded: AtomicU32::new(0),
        }
    }

    pub fn with_chunks(mut self, chunks: &[&str]) -> Self {
        self.chunks = chunks.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Dispatch succeeds but yields no chunks (tests the fallback ack).
    pub fn with_no_chunks(mut self) -> Self {
        self.chunks.clear();
        self
    }

    pub fn with_dispatch_failure(mut self) -> Self {
        self.fail_dispatch = true;
        self
    }

    /// Transcripts passed to dispatch so far.
    pub fn dispatched(&self) -> Vec<String> {
        self.dispatched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of record_turn calls.
    pub fn recorded_turns(&self) -> u32 {
        self.recorded.load(Ordering::SeqCst)
    }
}

impl Default for MockAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentDispatch for MockAgent {
    async fn record_turn(&self, _transcript: &str, _ctx: &TurnContext) -> Result<()> {
        self.recorded.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dispatch(&self, transcript: &str, _ctx: &TurnContext) -> Result<ReplyStream> {
        if self.fail_dispatch {
            return Err(RflinkError::AgentDispatch {
                message: "mock dispatch failure".to_string(),
            });
        }
        self.dispatched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(transcript.to_string());

        let chunks: Vec<Result<ReplyChunk>> = self
            .chunks
            .iter()
            .map(|text| Ok(ReplyChunk { text: text.clone() }))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

/// Trivial agent for pipe mode: echoes the transcript back as one chunk.
pub struct EchoAgent;

#[async_trait]
impl AgentDispatch for EchoAgent {
    async fn record_turn(&self, _transcript: &str, _ctx: &TurnContext) -> Result<()> {
        Ok(())
    }

    async fn dispatch(&self, transcript: &str, _ctx: &TurnContext) -> Result<ReplyStream> {
        let chunk = ReplyChunk {
            text: format!("Copy: {}", transcript),
        };
        Ok(stream::iter(vec![Ok(chunk)]).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TurnContext {
        TurnContext {
            session_id: 1,
            direct: true,
        }
    }

    #[tokio::test]
    async fn test_mock_agent_streams_chunks() {
        let agent = MockAgent::new().with_chunks(&["one", "two"]);
        let mut stream = agent.dispatch("hello", &ctx()).await.unwrap();

        let mut texts = Vec::new();
        while let Some(chunk) = stream.next().await {
            texts.push(chunk.unwrap().text);
        }
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(agent.dispatched(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_mock_agent_no_chunks() {
        let agent = MockAgent::new().with_no_chunks();
        let mut stream = agent.dispatch("hello", &ctx()).await.unwrap();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_mock_agent_dispatch_failure() {
        let agent = MockAgent::new().with_dispatch_failure();
        assert!(agent.dispatch("hello", &ctx()).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_agent_records_turns() {
        let agent = MockAgent::new();
        agent.record_turn("hello", &ctx()).await.unwrap();
        agent.record_turn("again", &ctx()).await.unwrap();
        assert_eq!(agent.recorded_turns(), 2);
    }

    #[tokio::test]
    async fn test_echo_agent_replies_with_transcript() {
        let agent = EchoAgent;
        let mut stream = agent.dispatch("radio check", &ctx()).await.unwrap();
        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(chunk.text, "Copy: radio check");
        assert!(stream.next().await.is_none());
    }
}
