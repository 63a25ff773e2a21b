//! Scene rendering: Turn Context to stored image reference.

mod keywords;
mod prompt;

pub use prompt::{apply_layering_filter, build_prompt, forces_solo, is_explicit, RenderPrompt};

use std::sync::Arc;

use reverie_domain::{CompanionProfile, TurnContext};

use crate::infrastructure::ports::{
    AssetError, AssetStorePort, ImageGenError, ImageGenPort, ImageRequest,
};

const RENDER_WIDTH: u32 = 832;
const RENDER_HEIGHT: u32 = 1216;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Image(#[from] ImageGenError),
    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// Use case: render the final scene and store the result.
pub struct RenderScene {
    image_gen: Arc<dyn ImageGenPort>,
    assets: Arc<dyn AssetStorePort>,
}

impl RenderScene {
    pub fn new(image_gen: Arc<dyn ImageGenPort>, assets: Arc<dyn AssetStorePort>) -> Self {
        Self { image_gen, assets }
    }

    /// Returns the stored asset reference. Failure propagates; there is no
    /// fallback image.
    pub async fn execute(
        &self,
        companion: &CompanionProfile,
        context: &TurnContext,
    ) -> Result<String, RenderError> {
        let prompt = build_prompt(companion, context);

        tracing::debug!(
            positive_len = prompt.positive.len(),
            negative_len = prompt.negative.len(),
            "rendering scene"
        );

        let result = self
            .image_gen
            .generate(ImageRequest {
                positive_prompt: prompt.positive,
                negative_prompt: prompt.negative,
                width: RENDER_WIDTH,
                height: RENDER_HEIGHT,
            })
            .await?;

        let asset_ref = self.assets.store(&result.image_data, &result.format).await?;
        Ok(asset_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{MemoryAssetStore, StubImageGen};
    use reverie_domain::{CompanionId, SceneState};

    fn companion() -> CompanionProfile {
        CompanionProfile {
            id: CompanionId::new(),
            name: "Mira".to_string(),
            persona: "Warm.".to_string(),
            base_visual: "1girl, red hair".to_string(),
            user_appearance: None,
        }
    }

    #[tokio::test]
    async fn renders_and_stores_asset() {
        let image_gen = Arc::new(StubImageGen::succeeding());
        let assets = Arc::new(MemoryAssetStore::new());
        let render = RenderScene::new(image_gen.clone(), assets.clone());

        let ctx = TurnContext::carry_forward(&SceneState::new("sundress", "kitchen", "cooking"));
        let asset_ref = render.execute(&companion(), &ctx).await.unwrap();

        assert!(asset_ref.starts_with("assets/"));
        let request = image_gen.last_request().unwrap();
        assert!(request.positive_prompt.contains("wearing sundress"));
    }

    #[tokio::test]
    async fn generation_failure_propagates() {
        let image_gen = Arc::new(StubImageGen::failing());
        let assets = Arc::new(MemoryAssetStore::new());
        let render = RenderScene::new(image_gen, assets);

        let ctx = TurnContext::carry_forward(&SceneState::new("sundress", "kitchen", "cooking"));
        assert!(render.execute(&companion(), &ctx).await.is_err());
    }
}
