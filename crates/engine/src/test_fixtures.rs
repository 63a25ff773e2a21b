//! In-memory fakes shared across unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use reverie_domain::{
    CompanionId, CompanionProfile, Conversation, ConversationId, ConversationMessage,
    ExecutionId, ExecutionRecord, ExecutionStatus, MessageId, SceneState, TurnResult,
};

use crate::infrastructure::ports::{
    AssetError, AssetStorePort, ConversationRepo, ExecutionRepo, FinishReason, ImageGenError,
    ImageGenPort, ImageRequest, ImageResult, LlmError, LlmPort, LlmRequest, LlmResponse,
    RepoError, TokenStream,
};

// =============================================================================
// Scripted LLM
// =============================================================================

type StreamScript = Result<Vec<Result<String, LlmError>>, LlmError>;

/// LLM fake with scripted responses, popped in order.
///
/// `generate` and `generate_stream` consume separate queues so a test can
/// script both analysis passes and the reply stream of one turn.
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    streams: Mutex<VecDeque<StreamScript>>,
    generate_calls: AtomicUsize,
    stream_calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<Result<String, LlmError>>) -> Self {
        let fake = Self::new();
        *fake.responses.lock().unwrap() = responses.into();
        fake
    }

    pub fn with_stream(chunks: Vec<&str>) -> Self {
        let fake = Self::new();
        fake.push_stream(chunks);
        fake
    }

    pub fn with_failing_stream(chunks: Vec<&str>, error: LlmError) -> Self {
        let fake = Self::new();
        fake.push_stream_then_failure(chunks, error);
        fake
    }

    pub fn push_response(&self, response: Result<String, LlmError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Queue a stream that yields these chunks then ends.
    pub fn push_stream(&self, chunks: Vec<&str>) {
        let items = chunks.into_iter().map(|c| Ok(c.to_string())).collect();
        self.streams.lock().unwrap().push_back(Ok(items));
    }

    /// Queue a stream attempt that fails before yielding anything.
    pub fn push_stream_failure(&self, error: LlmError) {
        self.streams.lock().unwrap().push_back(Err(error));
    }

    /// Queue a stream that yields these chunks, then dies mid-reply.
    pub fn push_stream_then_failure(&self, chunks: Vec<&str>, error: LlmError) {
        let mut items: Vec<Result<String, LlmError>> =
            chunks.into_iter().map(|c| Ok(c.to_string())).collect();
        items.push(Err(error));
        self.streams.lock().unwrap().push_back(Ok(items));
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmPort for ScriptedLlm {
    async fn generate(&self, _request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::RequestFailed("no scripted response".to_string())));

        scripted.map(|content| LlmResponse {
            content,
            finish_reason: FinishReason::Stop,
            usage: None,
        })
    }

    async fn generate_stream(&self, _request: LlmRequest) -> Result<TokenStream, LlmError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::RequestFailed("no scripted stream".to_string())));

        scripted.map(|items| -> TokenStream { Box::pin(stream::iter(items)) })
    }
}

// =============================================================================
// In-memory repos
// =============================================================================

#[derive(Default)]
pub struct InMemoryExecutionRepo {
    records: Mutex<HashMap<ExecutionId, ExecutionRecord>>,
    appends: AtomicUsize,
}

impl InMemoryExecutionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_record(&self, record: ExecutionRecord) {
        self.records.lock().unwrap().insert(record.id, record);
    }

    pub async fn get_record(&self, id: ExecutionId) -> Option<ExecutionRecord> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    /// Number of durable streamed-text writes.
    pub fn append_count(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionRepo for InMemoryExecutionRepo {
    async fn insert(&self, record: &ExecutionRecord) -> Result<(), RepoError> {
        self.records
            .lock()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>, RepoError> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn set_stage(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        progress: u8,
        current_step: &str,
    ) -> Result<(), RepoError> {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).ok_or(RepoError::NotFound)?;
        record.status = status;
        record.progress = progress;
        record.current_step = current_step.to_string();
        Ok(())
    }

    async fn append_streamed_text(&self, id: ExecutionId, chunk: &str) -> Result<(), RepoError> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).ok_or(RepoError::NotFound)?;
        record.streamed_text.push_str(chunk);
        Ok(())
    }

    async fn reset_streamed_text(&self, id: ExecutionId) -> Result<(), RepoError> {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).ok_or(RepoError::NotFound)?;
        record.streamed_text.clear();
        Ok(())
    }

    async fn complete(&self, id: ExecutionId, result: &TurnResult) -> Result<(), RepoError> {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).ok_or(RepoError::NotFound)?;
        record.status = ExecutionStatus::Completed;
        record.progress = 100;
        record.current_step = "done".to_string();
        record.result_text = Some(result.text.clone());
        record.result_image_ref = result.image_ref.clone();
        record.result_scene = Some(result.final_scene.clone());
        Ok(())
    }

    async fn fail(&self, id: ExecutionId, error: &str) -> Result<(), RepoError> {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).ok_or(RepoError::NotFound)?;
        record.status = ExecutionStatus::Failed;
        record.error = Some(error.to_string());
        Ok(())
    }

    async fn set_finalized(&self, id: ExecutionId, message_id: MessageId) -> Result<(), RepoError> {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).ok_or(RepoError::NotFound)?;
        record.finalized_message_id = Some(message_id);
        Ok(())
    }

    async fn active_for_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<ExecutionId>, RepoError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| r.conversation_id == conversation_id && !r.is_terminal())
            .map(|r| r.id))
    }

    async fn fail_orphaned(&self, error: &str) -> Result<u64, RepoError> {
        let mut count = 0;
        let mut records = self.records.lock().unwrap();
        for record in records.values_mut() {
            if !record.is_terminal() {
                record.status = ExecutionStatus::Failed;
                record.error = Some(error.to_string());
                count += 1;
            }
        }
        Ok(count)
    }
}

#[derive(Default)]
pub struct InMemoryConversationRepo {
    conversations: Mutex<HashMap<ConversationId, Conversation>>,
    companions: Mutex<HashMap<CompanionId, CompanionProfile>>,
    messages: Mutex<Vec<ConversationMessage>>,
    scene_writes: AtomicUsize,
}

impl InMemoryConversationRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_companion(&self, profile: CompanionProfile) {
        self.companions.lock().unwrap().insert(profile.id, profile);
    }

    pub fn add_conversation(&self, conversation: Conversation) {
        self.conversations
            .lock()
            .unwrap()
            .insert(conversation.id, conversation);
    }

    /// Number of scene-state writes, for no-op persistence assertions.
    pub fn scene_write_count(&self) -> usize {
        self.scene_writes.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<ConversationMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationRepo for InMemoryConversationRepo {
    async fn get(&self, id: ConversationId) -> Result<Option<Conversation>, RepoError> {
        Ok(self.conversations.lock().unwrap().get(&id).cloned())
    }

    async fn get_companion(
        &self,
        id: CompanionId,
    ) -> Result<Option<CompanionProfile>, RepoError> {
        Ok(self.companions.lock().unwrap().get(&id).cloned())
    }

    async fn update_scene_state(
        &self,
        id: ConversationId,
        scene: &SceneState,
    ) -> Result<(), RepoError> {
        self.scene_writes.fetch_add(1, Ordering::SeqCst);
        let mut conversations = self.conversations.lock().unwrap();
        let conversation = conversations.get_mut(&id).ok_or(RepoError::NotFound)?;
        conversation.scene = scene.clone();
        Ok(())
    }

    async fn recent_messages(
        &self,
        id: ConversationId,
        limit: usize,
    ) -> Result<Vec<ConversationMessage>, RepoError> {
        let messages = self.messages.lock().unwrap();
        let mut for_conversation: Vec<ConversationMessage> = messages
            .iter()
            .filter(|m| m.conversation_id == id)
            .cloned()
            .collect();
        let skip = for_conversation.len().saturating_sub(limit);
        Ok(for_conversation.split_off(skip))
    }

    async fn insert_message(&self, message: &ConversationMessage) -> Result<(), RepoError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

// =============================================================================
// Image generation and asset storage
// =============================================================================

pub struct StubImageGen {
    fail: bool,
    last_request: Mutex<Option<ImageRequest>>,
}

impl StubImageGen {
    pub fn succeeding() -> Self {
        Self {
            fail: false,
            last_request: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            last_request: Mutex::new(None),
        }
    }

    pub fn last_request(&self) -> Option<ImageRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenPort for StubImageGen {
    async fn generate(&self, request: ImageRequest) -> Result<ImageResult, ImageGenError> {
        *self.last_request.lock().unwrap() = Some(request);
        if self.fail {
            return Err(ImageGenError::GenerationFailed("stub failure".to_string()));
        }
        Ok(ImageResult {
            image_data: vec![0x89, 0x50, 0x4e, 0x47],
            format: "png".to_string(),
        })
    }

    async fn check_health(&self) -> Result<bool, ImageGenError> {
        Ok(!self.fail)
    }
}

#[derive(Default)]
pub struct MemoryAssetStore {
    stored: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored_count(&self) -> usize {
        self.stored.lock().unwrap().len()
    }
}

#[async_trait]
impl AssetStorePort for MemoryAssetStore {
    async fn store(&self, data: &[u8], format: &str) -> Result<String, AssetError> {
        let reference = format!("assets/{}.{format}", uuid::Uuid::new_v4());
        self.stored
            .lock()
            .unwrap()
            .push((reference.clone(), data.to_vec()));
        Ok(reference)
    }
}
