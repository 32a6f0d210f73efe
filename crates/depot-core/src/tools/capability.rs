use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use crate::store::StoreError;
use depot_tools::{InputSchema, ToolError, ToolResult, ToolSchema};

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Execution(String),
}

impl CapabilityError {
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }
}

/// A typed capability: parameters described by a derived JSON schema, output
/// convertible into the shared `ToolResult` enum.
#[async_trait]
pub trait Capability: Send + Sync + 'static {
    type Params: DeserializeOwned + JsonSchema + Send;
    type Output: Into<ToolResult> + Send;

    const NAME: &'static str;
    const DESCRIPTION: &'static str;
    /// Dangerous capabilities pass through the consequence interlock before
    /// dispatch.
    const DANGEROUS: bool;

    async fn run(&self, params: Self::Params) -> Result<Self::Output, CapabilityError>;

    fn schema() -> ToolSchema
    where
        Self: Sized,
    {
        let schema: InputSchema = schemars::schema_for!(Self::Params).into();
        ToolSchema {
            name: Self::NAME.to_string(),
            description: Self::DESCRIPTION.to_string(),
            input_schema: schema,
        }
    }
}

/// Object-safe surface the registry stores and the dispatcher calls.
#[async_trait]
pub trait ErasedCapability: Send + Sync {
    fn name(&self) -> &'static str;

    fn dangerous(&self) -> bool;

    fn schema(&self) -> ToolSchema;

    async fn invoke(&self, parameters: serde_json::Value) -> Result<ToolResult, ToolError>;
}

#[async_trait]
impl<T: Capability> ErasedCapability for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn dangerous(&self) -> bool {
        T::DANGEROUS
    }

    fn schema(&self) -> ToolSchema {
        T::schema()
    }

    async fn invoke(&self, parameters: serde_json::Value) -> Result<ToolResult, ToolError> {
        let params: T::Params = serde_json::from_value(parameters)
            .map_err(|e| ToolError::invalid_params(T::NAME, e.to_string()))?;
        match self.run(params).await {
            Ok(output) => Ok(output.into()),
            Err(e) => Err(ToolError::execution(T::NAME, e.to_string())),
        }
    }
}
