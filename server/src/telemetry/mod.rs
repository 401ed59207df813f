pub mod recorder;

pub use recorder::{PipelineRecorder, StageHandle};
