use crate::domain::model::{AdvisorSuggestion, StatsFrame, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Location of `path` as reported to the user.
    fn full_path(&self, path: &str) -> String;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<StatsFrame>;
    async fn transform(&self, frame: StatsFrame) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}

/// Something that can propose a statistics table for a free-text query,
/// typically a language model.
#[async_trait]
pub trait TableAdvisor: Send + Sync {
    fn is_available(&self) -> bool;

    async fn suggest(
        &self,
        query: &str,
        region: Option<&str>,
        time_period: Option<&str>,
    ) -> AdvisorSuggestion;
}
