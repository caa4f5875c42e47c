// Pluggable backend traits: EventEmitter (stream sink) and MessageStore
// (conversation persistence). `tool::ToolRegistry` and `llm::LlmDriver`
// serve the tool-executor and LLM-provider roles directly (a concrete
// registry and a dyn-compatible trait), so no separate generic trait
// duplicates them here.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::events::LoopEvent;
use crate::message::Message;

/// Sink for tool-loop events. The default, channel-backed sink used by
/// `stream()` is internal to `loop_engine`; this trait exists so a caller can
/// tee events to an additional destination (e.g. a message store or an
/// audit log) without re-deriving the loop's event ordering.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event: LoopEvent) -> Result<()>;

    async fn emit_batch(&self, events: Vec<LoopEvent>) -> Result<()> {
        for event in events {
            self.emit(event).await?;
        }
        Ok(())
    }
}

/// Conversation persistence, keyed by session id. Not the only way a caller
/// may persist conversations (out of scope per §1's "persistence layers"),
/// but a convenient optional seam for hosts that want one.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn store(&self, session_id: Uuid, message: Message) -> Result<()>;

    async fn store_batch(&self, session_id: Uuid, messages: Vec<Message>) -> Result<()> {
        for message in messages {
            self.store(session_id, message).await?;
        }
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> Result<Vec<Message>>;

    async fn load_page(&self, session_id: Uuid, offset: usize, limit: usize) -> Result<Vec<Message>> {
        let all = self.load(session_id).await?;
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, session_id: Uuid) -> Result<usize> {
        Ok(self.load(session_id).await?.len())
    }
}
