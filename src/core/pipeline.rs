use crate::adapters::estat::EstatClient;
use crate::domain::model::{StatsFrame, TimeSeries, TransformResult};
use crate::domain::ports::{Pipeline, Storage};
use crate::utils::error::{EstatError, Result};
use std::collections::BTreeMap;
use std::io::Write;
use zip::write::{SimpleFileOptions, ZipWriter};

/// Which table to fetch and how to narrow it.
#[derive(Debug, Clone)]
pub struct StatsDataRequest {
    pub stats_data_id: String,
    /// cdArea, cdTime, cdCatNN ...
    pub parameters: BTreeMap<String, String>,
    pub max_records: usize,
}

/// Fetches one e-Stat table and packages it as `<stats_data_id>.zip`.
pub struct StatsDataPipeline<S: Storage> {
    client: EstatClient,
    request: StatsDataRequest,
    storage: S,
}

impl<S: Storage> StatsDataPipeline<S> {
    pub fn new(client: EstatClient, request: StatsDataRequest, storage: S) -> Self {
        Self {
            client,
            request,
            storage,
        }
    }

    fn archive_name(&self) -> String {
        format!("{}.zip", self.request.stats_data_id)
    }
}

fn render_delimited(frame: &StatsFrame, delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    writer.write_record(frame.columns())?;
    for row in frame.rows() {
        writer.write_record(&row)?;
    }
    finish_text(writer)
}

fn render_series_csv(series: &TimeSeries) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for point in &series.points {
        writer.serialize(point)?;
    }
    finish_text(writer)
}

fn finish_text(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| EstatError::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| EstatError::ProcessingError {
        message: format!("rendered table is not UTF-8: {}", e),
    })
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for StatsDataPipeline<S> {
    async fn extract(&self) -> Result<StatsFrame> {
        tracing::debug!(
            "Fetching {} with {:?}",
            self.request.stats_data_id,
            self.request.parameters
        );
        self.client
            .get_all_stats_data(
                &self.request.stats_data_id,
                &self.request.parameters,
                self.request.max_records,
            )
            .await
    }

    async fn transform(&self, frame: StatsFrame) -> Result<TransformResult> {
        let csv_output = render_delimited(&frame, b',')?;
        let tsv_output = render_delimited(&frame, b'\t')?;
        let series = frame.series();

        if let Some(series) = &series {
            tracing::debug!("Series '{}' has {} points", series.name, series.points.len());
        }

        Ok(TransformResult {
            frame,
            csv_output,
            tsv_output,
            series,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let file_count = if result.series.is_some() { 4 } else { 2 };
        tracing::debug!("Creating ZIP file with {} files", file_count);

        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
            let options = SimpleFileOptions::default();

            zip.start_file("data.csv", options)?;
            zip.write_all(result.csv_output.as_bytes())?;

            zip.start_file("data.tsv", options)?;
            zip.write_all(result.tsv_output.as_bytes())?;

            if let Some(series) = &result.series {
                zip.start_file("series.csv", options)?;
                zip.write_all(render_series_csv(series)?.as_bytes())?;

                zip.start_file("series.json", options)?;
                zip.write_all(serde_json::to_string_pretty(series)?.as_bytes())?;
            }

            zip.finish()?.into_inner()
        };

        let name = self.archive_name();
        tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
        self.storage.write_file(&name, &zip_data).await?;

        Ok(self.storage.full_path(&name))
    }
}
