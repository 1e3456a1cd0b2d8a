//! Tool registry - static catalog of known tool definitions
//!
//! Pure data. Each entry describes an isolated worker: the container image
//! backing it, the configuration fields its worker expects as environment,
//! and the capability tags the planner advertises to the reasoning model.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One field of a tool's configuration schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigField {
    /// Value type (string, number, boolean, array)
    #[serde(rename = "type")]
    pub field_type: String,

    /// Whether the field must be supplied at start
    pub required: bool,

    /// Human-readable description
    pub description: String,
}

impl ConfigField {
    pub fn new(field_type: impl Into<String>, required: bool, description: impl Into<String>) -> Self {
        Self {
            field_type: field_type.into(),
            required,
            description: description.into(),
        }
    }
}

/// Immutable registry entry for a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// What the tool does
    pub description: String,

    /// Container image backing the worker
    pub image: String,

    /// Configuration schema (field name -> definition)
    pub config_schema: HashMap<String, ConfigField>,

    /// Declared capability tags
    pub capabilities: Vec<String>,
}

impl ToolSpec {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            image: image.into(),
            config_schema: HashMap::new(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_config_field(mut self, name: impl Into<String>, field: ConfigField) -> Self {
        self.config_schema.insert(name.into(), field);
        self
    }

    pub fn with_capabilities(mut self, capabilities: Vec<&str>) -> Self {
        self.capabilities = capabilities.into_iter().map(String::from).collect();
        self
    }
}

/// Static catalog of tool definitions
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolSpec>,
}

impl ToolRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in tool catalog
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for spec in builtin_tools() {
            registry.insert(spec);
        }
        registry
    }

    /// Add a tool definition (builder form)
    pub fn with_tool(mut self, spec: ToolSpec) -> Self {
        self.insert(spec);
        self
    }

    /// Add a tool definition
    pub fn insert(&mut self, spec: ToolSpec) {
        self.tools.insert(spec.id.clone(), spec);
    }

    /// Look up a tool by id
    pub fn get(&self, tool_id: &str) -> Option<&ToolSpec> {
        self.tools.get(tool_id)
    }

    /// Check whether a tool id is known
    pub fn contains(&self, tool_id: &str) -> bool {
        self.tools.contains_key(tool_id)
    }

    /// All tool ids
    pub fn ids(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Iterate over all definitions
    pub fn iter(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.values()
    }

    /// Number of known tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// One "id: description" line per tool, for planner prompts
    pub fn capability_summary(&self) -> String {
        let mut lines: Vec<String> = self
            .tools
            .values()
            .map(|t| format!("{}: {}", t.id, t.description))
            .collect();
        lines.sort();
        lines.join("\n")
    }
}

/// The built-in tool catalog
fn builtin_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            "github",
            "GitHub",
            "Repository management, file operations and GitHub API integration",
            "docker.io/mcp/github:latest",
        )
        .with_config_field(
            "github_token",
            ConfigField::new("string", true, "GitHub Personal Access Token"),
        )
        .with_config_field(
            "default_org",
            ConfigField::new("string", false, "Default organization"),
        )
        .with_capabilities(vec!["read_repos", "create_issues", "manage_files", "webhooks"]),
        ToolSpec::new(
            "filesystem",
            "Filesystem",
            "Secure file operations with configurable access controls",
            "docker.io/mcp/filesystem:latest",
        )
        .with_config_field(
            "allowed_paths",
            ConfigField::new("array", true, "Allowed paths"),
        )
        .with_config_field(
            "max_file_size",
            ConfigField::new("number", false, "Maximum file size (MB)"),
        )
        .with_capabilities(vec!["read_files", "write_files", "list_directories", "file_search"]),
        ToolSpec::new(
            "postgresql",
            "PostgreSQL",
            "Read-only database access with schema inspection",
            "docker.io/mcp/postgresql:latest",
        )
        .with_config_field(
            "connection_string",
            ConfigField::new("string", true, "PostgreSQL connection string"),
        )
        .with_config_field(
            "read_only",
            ConfigField::new("boolean", false, "Read-only mode"),
        )
        .with_capabilities(vec!["query_data", "inspect_schema", "explain_queries"]),
        ToolSpec::new(
            "puppeteer",
            "Puppeteer",
            "Browser automation and web scraping",
            "docker.io/mcp/puppeteer:latest",
        )
        .with_config_field(
            "headless",
            ConfigField::new("boolean", false, "Run in headless mode"),
        )
        .with_config_field(
            "timeout",
            ConfigField::new("number", false, "Timeout in seconds"),
        )
        .with_capabilities(vec![
            "navigate_pages",
            "extract_data",
            "take_screenshots",
            "fill_forms",
        ]),
        ToolSpec::new(
            "memory",
            "Memory",
            "Knowledge-graph based persistent memory system",
            "docker.io/mcp/memory:latest",
        )
        .with_config_field(
            "storage_path",
            ConfigField::new("string", true, "Storage path"),
        )
        .with_config_field(
            "max_memories",
            ConfigField::new("number", false, "Maximum number of memories"),
        )
        .with_capabilities(vec![
            "store_memories",
            "retrieve_memories",
            "semantic_search",
            "knowledge_graph",
        ]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let registry = ToolRegistry::builtin();
        assert_eq!(registry.len(), 5);
        assert!(registry.contains("filesystem"));
        assert!(registry.contains("github"));
        assert!(!registry.contains("nonexistent"));
    }

    #[test]
    fn test_config_schema() {
        let registry = ToolRegistry::builtin();
        let github = registry.get("github").unwrap();

        let token = github.config_schema.get("github_token").unwrap();
        assert!(token.required);
        assert_eq!(token.field_type, "string");

        let org = github.config_schema.get("default_org").unwrap();
        assert!(!org.required);
    }

    #[test]
    fn test_capability_summary() {
        let registry = ToolRegistry::builtin();
        let summary = registry.capability_summary();

        assert!(summary.contains("filesystem: Secure file operations"));
        assert_eq!(summary.lines().count(), 5);
    }

    #[test]
    fn test_custom_tool() {
        let registry = ToolRegistry::new().with_tool(
            ToolSpec::new("echo", "Echo", "Echoes input", "docker.io/example/echo:latest")
                .with_capabilities(vec!["echo"]),
        );

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("echo").unwrap().capabilities, vec!["echo"]);
    }
}
