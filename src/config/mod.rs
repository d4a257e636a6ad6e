pub mod settings;

pub use settings::Settings;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "estat-explorer")]
#[command(about = "Browse e-Stat statistics, build a catalog index and translate Japanese queries into API parameters")]
pub struct CliConfig {
    /// Path to a TOML settings file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// e-Stat application ID
    #[arg(long, env = "ESTAT_APPID", global = true, hide_env_values = true)]
    pub app_id: Option<String>,

    /// Directory for the SQLite caches
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Directory for exported data
    #[arg(long, global = true)]
    pub output: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List the tables of a survey and export the first table's data
    Explore {
        #[arg(long, default_value = "00200521")]
        stats_code: String,
        #[arg(long)]
        max_records: Option<usize>,
    },
    /// Download, classify and index the statistics catalog
    #[command(subcommand)]
    Catalog(CatalogCommand),
    /// Maintain the table metadata cache
    #[command(subcommand)]
    Metadata(MetadataCommand),
    /// Translate a Japanese query into an e-Stat table and parameters
    Translate {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
        /// Use the rule-based translator only
        #[arg(long)]
        no_llm: bool,
        /// Fetch the data of the best match
        #[arg(long)]
        fetch: bool,
    },
    /// Suggest completions for a partial query
    Suggest { partial: String },
    /// Fetch a statistics table and export it as a ZIP archive
    Fetch {
        stats_data_id: String,
        /// Extra API parameters, e.g. --param cdArea=13000
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
        #[arg(long)]
        max_records: Option<usize>,
    },
    /// Run the demonstration queries, then read queries from stdin
    Demo {
        #[arg(long)]
        no_llm: bool,
    },
    /// Inspect the LLM advisor
    #[command(subcommand)]
    Llm(LlmCommand),
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum CatalogCommand {
    /// Download the catalog and save it by statistical field
    Download {
        #[arg(long, default_value = "2000")]
        limit: usize,
        /// Restrict the download to one field code (e.g. 01)
        #[arg(long)]
        field: Option<String>,
    },
    /// Load the newest combined catalog CSV into the translator index
    Sync,
    /// Download, save and sync in one go
    Update {
        #[arg(long, default_value = "1000")]
        limit: usize,
    },
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum MetadataCommand {
    /// Refresh the table list and the axes of priority tables
    Refresh {
        #[arg(long, default_value = "100")]
        max_tables: usize,
    },
    /// Show the cached axes of a table
    Axes { table_id: String },
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum LlmCommand {
    /// Show whether the Ollama server is reachable
    Status,
    /// Explain the axis codes of a table
    Explain { table_id: String },
}

#[cfg(feature = "cli")]
fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=value: no `=` found in `{}`", s))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=value: empty key in `{}`", s));
    }
    if crate::adapters::estat::RESERVED_PARAMS.contains(&key) {
        return Err(format!("`{}` is set by the client and cannot be overridden", key));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Applies command-line overrides on top of loaded settings.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(app_id) = &self.app_id {
            settings.estat.app_id = Some(app_id.clone());
        }
        if let Some(data_dir) = &self.data_dir {
            settings.storage.data_dir = data_dir.clone();
        }
        if let Some(output) = &self.output {
            settings.storage.output_dir = output.clone();
        }
        match &self.command {
            Command::Explore {
                max_records: Some(max),
                ..
            }
            | Command::Fetch {
                max_records: Some(max),
                ..
            } => settings.estat.max_records = *max,
            Command::Translate { limit: Some(limit), .. } => {
                settings.translator.result_limit = *limit
            }
            _ => {}
        }
        if matches!(
            self.command,
            Command::Translate { no_llm: true, .. } | Command::Demo { no_llm: true }
        ) {
            settings.ollama.enabled = false;
        }
    }
}
