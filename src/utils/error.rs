use thiserror::Error;

#[derive(Error, Debug)]
pub enum EstatError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("e-Stat API returned status {status}: {message}")]
    ApiStatusError { status: i64, message: String },

    #[error("Unexpected response from {endpoint}: {message}")]
    UnexpectedResponseError { endpoint: String, message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

pub type Result<T> = std::result::Result<T, EstatError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Api,
    Configuration,
    Data,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit status for a failed run. Low-severity errors exit cleanly.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl EstatError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EstatError::HttpError(_) => ErrorCategory::Network,
            EstatError::ApiStatusError { .. } | EstatError::UnexpectedResponseError { .. } => {
                ErrorCategory::Api
            }
            EstatError::ConfigError { .. }
            | EstatError::MissingConfigError { .. }
            | EstatError::InvalidConfigValueError { .. }
            | EstatError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            EstatError::CsvError(_)
            | EstatError::SerializationError(_)
            | EstatError::ProcessingError { .. }
            | EstatError::ValidationError { .. } => ErrorCategory::Data,
            EstatError::ZipError(_) | EstatError::IoError(_) | EstatError::DatabaseError(_) => {
                ErrorCategory::Storage
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // タイムアウトや一時的な接続失敗は再試行で回復しうる
            EstatError::HttpError(e) if e.is_timeout() || e.is_connect() => ErrorSeverity::Medium,
            EstatError::HttpError(_) => ErrorSeverity::High,
            EstatError::ApiStatusError { .. } | EstatError::UnexpectedResponseError { .. } => {
                ErrorSeverity::High
            }
            // 入力の誤りは実行失敗として扱う
            EstatError::ValidationError { .. } => ErrorSeverity::Medium,
            EstatError::CsvError(_)
            | EstatError::SerializationError(_)
            | EstatError::ProcessingError { .. } => ErrorSeverity::High,
            EstatError::ConfigError { .. }
            | EstatError::MissingConfigError { .. }
            | EstatError::InvalidConfigValueError { .. }
            | EstatError::ConfigValidationError { .. } => ErrorSeverity::High,
            EstatError::ZipError(_) | EstatError::IoError(_) | EstatError::DatabaseError(_) => {
                ErrorSeverity::Critical
            }
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EstatError::HttpError(_) => {
                "Check network connectivity to api.e-stat.go.jp and retry".to_string()
            }
            EstatError::ApiStatusError { status, .. } if *status == 100 => {
                "The application ID was rejected; check ESTAT_APPID".to_string()
            }
            EstatError::ApiStatusError { .. } => {
                "Check the statsDataId and query parameters against the e-Stat API reference"
                    .to_string()
            }
            EstatError::UnexpectedResponseError { .. } => {
                "The API response format changed or the endpoint is wrong; check --config api settings"
                    .to_string()
            }
            EstatError::MissingConfigError { field } if field == "estat.app_id" => {
                "Set ESTAT_APPID in .env or pass --app-id".to_string()
            }
            EstatError::MissingConfigError { field } => format!("Provide a value for {}", field),
            EstatError::InvalidConfigValueError { field, .. }
            | EstatError::ConfigValidationError { field, .. } => {
                format!("Fix the value of {} in the configuration file", field)
            }
            EstatError::ConfigError { .. } => "Review the configuration file".to_string(),
            EstatError::CsvError(_) => {
                "Regenerate the catalog with `catalog download`".to_string()
            }
            EstatError::DatabaseError(_) => {
                "Remove the cache database under the data directory and rebuild it".to_string()
            }
            EstatError::ZipError(_) | EstatError::IoError(_) => {
                "Check that the output directory exists and is writable".to_string()
            }
            EstatError::SerializationError(_) | EstatError::ProcessingError { .. } => {
                "Run with --verbose to inspect the data being processed".to_string()
            }
            EstatError::ValidationError { .. } => "Adjust the input and retry".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("e-Statへの接続に失敗しました: {}", self),
            ErrorCategory::Api => format!("e-Stat APIがエラーを返しました: {}", self),
            ErrorCategory::Configuration => format!("設定に問題があります: {}", self),
            ErrorCategory::Data => format!("データ処理に失敗しました: {}", self),
            ErrorCategory::Storage => format!("ファイルまたはデータベースの操作に失敗しました: {}", self),
        }
    }
}
