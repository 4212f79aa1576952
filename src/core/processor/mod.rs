mod pipeline;
mod provision;
mod runner;
mod runtime;

pub use pipeline::{PipelineOutcome, PipelineState, ProcessorPipeline};
pub use provision::{clean_provisioned, ProvisionSources, ToolConfig, ToolProvisioning};
pub use runner::{ProcessToolRunner, ToolOutput, ToolRunner};
pub use runtime::{
    find_java, install_runtime, runtime_platform, JavaRequirement, JAVA_RUNTIME_INDEX_URL,
};
