pub mod classify;
pub mod etl;
pub mod knowledge;
pub mod pipeline;
pub mod translator;

pub use crate::domain::model::{StatsFrame, TransformResult};
pub use crate::domain::ports::{Pipeline, Storage};
pub use crate::utils::error::Result;
