use crate::BoxedError;
use async_trait::async_trait;
use codeverse_genai::{JSONSchema, Tool};
use serde_json::Value;
use std::fmt::Debug;

/**
 * A function the model may call while generating. Tools must be idempotent
 * and return plain text that the model reads as additional context.
 */
#[async_trait]
pub trait FlowTool: Send + Sync {
    /// Name of the tool.
    fn name(&self) -> String;
    /// A description of the tool to instruct the model how and when to use it.
    fn description(&self) -> String;
    /// The JSON schema of the parameters that the tool accepts. The type must
    /// be "object".
    fn parameters(&self) -> JSONSchema;
    /// Run the tool with the model-supplied arguments.
    ///
    /// An error does not fail the generation: it is reported back to the
    /// model as an error result so it can recover or explain the failure.
    async fn execute(&self, args: Value) -> Result<String, BoxedError>;
}

impl Debug for dyn FlowTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowTool")
            .field("name", &self.name())
            .field("description", &self.description())
            .field("parameters", &self.parameters())
            .field("execute", &"Function")
            .finish()
    }
}

impl From<&dyn FlowTool> for Tool {
    fn from(flow_tool: &dyn FlowTool) -> Self {
        Self {
            name: flow_tool.name(),
            description: flow_tool.description(),
            parameters: flow_tool.parameters(),
        }
    }
}
