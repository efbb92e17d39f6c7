use std::collections::HashMap;
use std::future::ready;
use std::pin::Pin;
use std::sync::Arc;

use max_model::{ModelTool, ToolCallRequest};

use crate::tool::{Error, ToolKind, ToolObject, ToolResult};

type ToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// An executor that handles tool call requests from the model.
#[derive(Clone, Default)]
pub struct Executor {
    // Kept in registration order, so the model always sees the same list.
    tools: Vec<Arc<dyn ToolObject>>,
    by_name: HashMap<String, usize>,
}

impl Executor {
    pub fn with_tools(tools: Vec<Box<dyn ToolObject>>) -> Self {
        let mut executor = Self::default();
        for tool in tools {
            let name = tool.name().to_owned();
            if let Some(idx) = executor.by_name.get(&name) {
                warn!("tool `{name}` registered twice, keeping the last one");
                executor.tools[*idx] = Arc::from(tool);
                continue;
            }
            executor.by_name.insert(name, executor.tools.len());
            executor.tools.push(Arc::from(tool));
        }
        executor
    }

    #[inline]
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    #[inline]
    pub fn kind_of(&self, name: &str) -> ToolKind {
        self.by_name
            .get(name)
            .map(|idx| self.tools[*idx].kind())
            .unwrap_or_default()
    }

    /// Turns every request into a future and hands it to `spawner`.
    ///
    /// Requests for unknown tools still produce a future, which resolves to
    /// a `NotFound` error, so that each request gets an answer.
    pub fn handle_requests<S>(
        &self,
        requests: Vec<ToolCallRequest>,
        spawner: S,
    ) where
        S: FnMut(ToolCallRequest, ToolFuture),
    {
        let mut spawner = spawner;

        let span = debug_span!("tool executor");
        let _enter = span.enter();
        for req in requests {
            let fut: ToolFuture = match self.by_name.get(&req.name) {
                Some(idx) => {
                    trace!(
                        "spawning a tool ({}) with args: {}",
                        req.id,
                        req.arguments
                    );
                    self.tools[*idx].execute(req.arguments.clone())
                }
                None => {
                    warn!("tool not found: {}", req.name);
                    let reason =
                        format!("`{}` is not an available tool", req.name);
                    let err = Error::not_found().with_reason(reason);
                    Box::pin(ready(Err(err)))
                }
            };
            spawner(req, fut);
        }
    }
}
