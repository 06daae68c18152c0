//! Name → implementation lookup for the Tool Scheduler.

use std::collections::HashMap;
use std::sync::Arc;

use review_domain::tool::ToolDefinition;

use crate::contract::Tool;

#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// The schema advertisement sent to the LLM provider for every
    /// registered tool.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    /// The built-in registry: file I/O, search, shell, and web fetch.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register(Arc::new(crate::read_file::ReadFileTool));
        reg.register(Arc::new(crate::write_file::WriteFileTool));
        reg.register(Arc::new(crate::search::SearchTool));
        reg.register(Arc::new(crate::shell::ShellTool));
        reg.register(Arc::new(crate::web_fetch::WebFetchTool::default()));
        reg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::test_support::EchoTool;

    #[test]
    fn register_and_get_round_trips() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        assert!(reg.get("echo").is_some());
        assert!(reg.get("missing").is_none());
    }

    #[test]
    fn tool_definitions_carry_name_and_schema() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        let defs = reg.tool_definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }

    #[test]
    fn builtins_cover_the_expected_tool_names() {
        let reg = ToolRegistry::with_builtins();
        let mut names = reg.names();
        names.sort();
        assert_eq!(
            names,
            vec!["read_file", "search", "shell", "web_fetch", "write_file"]
        );
    }
}
