pub mod cli;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod preprocess;
pub mod study;
pub mod volume;
pub mod writer;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{
    ConfigurationError, DegenerateInputError, LoadError, PipelineError, Result, WriteError,
};
pub use loader::{LoadedSeries, VolumeLoader};
pub use pipeline::{Pipeline, PipelineConfig, RunSummary};
pub use preprocess::{NormalizeMethod, Transform};
pub use volume::{Volume, VolumeData};
pub use writer::NiftiWriter;
