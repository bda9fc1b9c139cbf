//! Conversation orchestration: one session owns the history, the tool
//! registry, and the active provider, and decides what action is available
//! or required next. All state queries are computed from the history on
//! demand; nothing is cached.

use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};
use serde_json::{Map, Value};
use tracing::info;

use crate::errors::{ToolError, ToolResult};
use crate::models::message::{MessageHistory, MessagePart, ToolRequestMessage};
use crate::models::tool::Tool;
use crate::providers::base::Provider;

pub const DEFAULT_SYSTEM_PROMPT: &str = "Be straightforward.";
const DENIED_CONTENT: &str = "Tool call denied by user";

/// What a tool does when approved. Receives the resolved arguments
/// (defaults filled in) and returns the text shown to the model.
pub type ToolHandler = Box<dyn Fn(&Map<String, Value>) -> ToolResult<String> + Send + Sync>;

struct RegisteredTool {
    tool: Tool,
    handler: ToolHandler,
}

/// Flat name-to-tool mapping owned by the session. Names are unique;
/// registering a second tool under an existing name fails.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, tool: Tool, handler: F) -> ToolResult<()>
    where
        F: Fn(&Map<String, Value>) -> ToolResult<String> + Send + Sync + 'static,
    {
        if self.tools.contains_key(&tool.name) {
            return Err(ToolError::DuplicateTool(tool.name));
        }
        self.tools.insert(
            tool.name.clone(),
            RegisteredTool {
                tool,
                handler: Box::new(handler),
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name).map(|registered| &registered.tool)
    }

    /// All registered tools, sorted by name for stable display.
    pub fn all(&self) -> Vec<&Tool> {
        let mut tools: Vec<&Tool> = self.tools.values().map(|r| &r.tool).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn enabled(&self) -> Vec<Tool> {
        self.all()
            .into_iter()
            .filter(|tool| tool.enabled)
            .cloned()
            .collect()
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> ToolResult<()> {
        let registered = self
            .tools
            .get_mut(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        registered.tool.enabled = enabled;
        Ok(())
    }

    /// Resolve the arguments against the tool's declaration and run its
    /// handler.
    pub fn run(&self, name: &str, arguments: &Map<String, Value>) -> ToolResult<String> {
        let registered = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        let resolved = registered.tool.resolve_arguments(arguments)?;
        (registered.handler)(&resolved)
    }
}

/// A user action available on one history element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ApproveAndRun,
    Deny,
    Delete,
}

/// One conversation: its history, tools, and active provider. The session
/// is the sole mutator of the history.
pub struct Session {
    system_prompt: String,
    messages: MessageHistory,
    tools: ToolRegistry,
    provider: Box<dyn Provider>,
}

impl Session {
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            messages: MessageHistory::new(),
            tools: ToolRegistry::new(),
            provider,
        }
    }

    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Resume from a previously serialized history.
    pub fn with_history(mut self, messages: MessageHistory) -> Self {
        self.messages = messages;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn messages(&self) -> &MessageHistory {
        &self.messages
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn register_tool<F>(&mut self, tool: Tool, handler: F) -> ToolResult<()>
    where
        F: Fn(&Map<String, Value>) -> ToolResult<String> + Send + Sync + 'static,
    {
        self.tools.register(tool, handler)
    }

    pub fn set_tool_enabled(&mut self, name: &str, enabled: bool) -> ToolResult<()> {
        self.tools.set_enabled(name, enabled)
    }

    fn tool_output_ids(&self) -> HashSet<&str> {
        self.messages
            .iter()
            .filter_map(|part| part.as_tool_output())
            .map(|output| output.id.as_str())
            .collect()
    }

    /// Tool requests that have no corresponding output yet, with their
    /// history index.
    pub fn pending_tool_requests(&self) -> Vec<(usize, &ToolRequestMessage)> {
        let outputs = self.tool_output_ids();
        self.messages
            .iter()
            .enumerate()
            .filter_map(|(index, part)| part.as_tool_request().map(|request| (index, request)))
            .filter(|(_, request)| !outputs.contains(request.id.as_str()))
            .collect()
    }

    /// New user input is not accepted while a tool request awaits its
    /// output.
    pub fn input_blocked(&self) -> bool {
        !self.pending_tool_requests().is_empty()
    }

    pub fn add_user_input<S: Into<String>>(&mut self, text: S) -> Result<()> {
        if self.input_blocked() {
            bail!("Input is blocked while a tool request is pending");
        }
        self.messages.append(MessagePart::user_text(text));
        Ok(())
    }

    pub fn attach_image(&mut self, image: MessagePart) -> Result<()> {
        if !matches!(image, MessagePart::Image(_)) {
            bail!("Only image parts can be attached");
        }
        if self.input_blocked() {
            bail!("Input is blocked while a tool request is pending");
        }
        self.messages.append(image);
        Ok(())
    }

    /// Whether the element at `index` awaits a user decision or a model
    /// reply: a tool request without output, or a trailing user text.
    pub fn needs_processing(&self, index: usize) -> bool {
        match &self.messages[index] {
            MessagePart::ToolRequest(request) => !self
                .messages
                .iter()
                .filter_map(|part| part.as_tool_output())
                .any(|output| output.id == request.id),
            MessagePart::Text(text) => text.is_user && index == self.messages.len() - 1,
            _ => false,
        }
    }

    pub fn actions_for(&self, index: usize) -> Vec<Action> {
        let part = &self.messages[index];
        if matches!(part, MessagePart::ToolRequest(_)) && self.needs_processing(index) {
            vec![Action::ApproveAndRun, Action::Deny, Action::Delete]
        } else {
            vec![Action::Delete]
        }
    }

    /// Apply a user action to the element at `index`. Approve and deny are
    /// only valid on a tool request; a failing tool is recovered into an
    /// error-carrying output so the conversation can continue.
    pub fn apply_action(&mut self, action: Action, index: usize) -> Result<()> {
        match action {
            Action::ApproveAndRun => {
                let request = self.messages[index]
                    .as_tool_request()
                    .ok_or_else(|| anyhow::anyhow!("Element {} is not a tool request", index))?
                    .clone();

                info!(tool = %request.name, id = %request.id, "running approved tool call");
                let (content, canceled) = match self.tools.run(&request.name, &request.parameters)
                {
                    Ok(output) => (output, false),
                    Err(e) => (
                        format!("The tool call returned the following error:\n{}", e),
                        false,
                    ),
                };
                self.messages.append(MessagePart::tool_output(
                    request.id,
                    request.name,
                    content,
                    canceled,
                ));
            }
            Action::Deny => {
                let request = self.messages[index]
                    .as_tool_request()
                    .ok_or_else(|| anyhow::anyhow!("Element {} is not a tool request", index))?
                    .clone();

                info!(tool = %request.name, id = %request.id, "tool call denied");
                self.messages.append(MessagePart::tool_output(
                    request.id,
                    request.name,
                    DENIED_CONTENT,
                    true,
                ));
            }
            Action::Delete => {
                self.messages.remove(index);
            }
        }
        Ok(())
    }

    /// Generation is needed exactly when the last element is a user text
    /// or an image.
    pub fn needs_generation(&self) -> bool {
        match self.messages.last() {
            Some(MessagePart::Text(text)) => text.is_user,
            Some(MessagePart::Image(_)) => true,
            _ => false,
        }
    }

    /// Ask the active provider for the next parts and append them to the
    /// history.
    pub async fn generate(&mut self) -> Result<Vec<MessagePart>> {
        let new_parts = self
            .provider
            .complete(&self.system_prompt, &self.messages, &self.tools.enabled())
            .await?;
        info!(parts = new_parts.len(), "provider reply appended");
        self.messages.extend(new_parts.clone());
        Ok(new_parts)
    }
}
