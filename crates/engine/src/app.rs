//! Application wiring: ports in, use cases out.

use std::sync::Arc;

use crate::infrastructure::ports::{
    AssetStorePort, ClockPort, ConversationRepo, ExecutionRepo, ImageGenPort, LlmPort,
};
use crate::infrastructure::RetryConfig;
use crate::use_cases::continuity::AnalyzeScene;
use crate::use_cases::imaging::RenderScene;
use crate::use_cases::reply::GenerateReply;
use crate::use_cases::turn::{ExecutionRegistry, FinalizeTurn, GetProgress, RunTurn, SubmitTurn};

pub struct TurnUseCases {
    pub submit: SubmitTurn,
    pub finalize: FinalizeTurn,
    pub progress: GetProgress,
}

/// Shared application state for the HTTP and WebSocket layers.
pub struct App {
    pub executions: Arc<dyn ExecutionRepo>,
    pub conversations: Arc<dyn ConversationRepo>,
    pub registry: Arc<ExecutionRegistry>,
    pub turns: TurnUseCases,
}

impl App {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        executions: Arc<dyn ExecutionRepo>,
        conversations: Arc<dyn ConversationRepo>,
        llm: Arc<dyn LlmPort>,
        image_gen: Arc<dyn ImageGenPort>,
        assets: Arc<dyn AssetStorePort>,
        clock: Arc<dyn ClockPort>,
        retry: RetryConfig,
    ) -> Self {
        let registry = Arc::new(ExecutionRegistry::new());

        let runner = Arc::new(RunTurn::new(
            AnalyzeScene::new(llm.clone()),
            GenerateReply::new(llm, executions.clone()),
            RenderScene::new(image_gen, assets),
            executions.clone(),
            conversations.clone(),
            registry.clone(),
            retry,
        ));

        let turns = TurnUseCases {
            submit: SubmitTurn::new(
                executions.clone(),
                conversations.clone(),
                registry.clone(),
                clock.clone(),
                runner,
            ),
            finalize: FinalizeTurn::new(executions.clone(), conversations.clone(), clock),
            progress: GetProgress::new(executions.clone(), registry.clone()),
        };

        Self {
            executions,
            conversations,
            registry,
            turns,
        }
    }
}
