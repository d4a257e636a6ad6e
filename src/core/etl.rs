use crate::domain::ports::Pipeline;
use crate::utils::error::Result;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("📥 Extracting statistics data...");
        let frame = self.pipeline.extract().await?;
        tracing::info!(
            "Extracted {} values ({} reported by the API)",
            frame.observations.len(),
            frame.total_number
        );

        tracing::info!("🔄 Transforming...");
        let result = self.pipeline.transform(frame).await?;
        match &result.series {
            Some(series) => tracing::info!(
                "📈 Series '{}' with {} points",
                series.name,
                series.points.len()
            ),
            None => tracing::info!("No time series in this table"),
        }

        tracing::info!("💾 Loading...");
        let output_path = self.pipeline.load(result).await?;
        tracing::info!("✅ Output saved to: {}", output_path);

        Ok(output_path)
    }
}
