//! Calculus knowledge base embedded into the solver prompt.
//!
//! The built-in base is compiled in from `knowledge/calculus.yaml`. A
//! replacement file can be loaded at runtime; it is validated against the
//! embedded JSON Schema and then checked for duplicate ids.

mod schema;

pub use schema::validate_knowledge_schema;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// The YAML source of the built-in knowledge base.
pub const BUILTIN_KNOWLEDGE_YAML: &str = include_str!("../../knowledge/calculus.yaml");

/// Errors that can occur when loading a knowledge base.
#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("Failed to read knowledge file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to convert document: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Schema validation failed: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Knowledge base validation failed: {0}")]
    ValidationError(String),
}

/// How a section is presented in the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Rules,
    Techniques,
    Traps,
    Shortcuts,
    Substitutions,
}

/// One rule, technique, trap or shortcut.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeEntry {
    /// Unique identifier (e.g., "I2", "T1")
    pub id: String,

    pub statement: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_to_use: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// A titled group of entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSection {
    pub id: String,
    pub title: String,
    pub kind: SectionKind,

    /// Whether this section is rendered into the solver prompt
    #[serde(default = "default_in_prompt")]
    pub in_prompt: bool,

    #[serde(default)]
    pub entries: Vec<KnowledgeEntry>,
}

fn default_in_prompt() -> bool {
    true
}

/// The full knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub version: String,
    pub name: String,
    pub sections: Vec<KnowledgeSection>,
}

impl KnowledgeBase {
    /// Parse the compiled-in knowledge base.
    pub fn builtin() -> Result<Self, KnowledgeError> {
        Self::from_yaml(BUILTIN_KNOWLEDGE_YAML)
    }

    /// Parse and validate a knowledge base from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, KnowledgeError> {
        let document: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let json = serde_json::to_value(&document)?;
        validate_knowledge_schema(&json).map_err(KnowledgeError::SchemaError)?;

        let base: KnowledgeBase = serde_json::from_value(json)?;
        base.validate()?;
        Ok(base)
    }

    /// Parse and validate a knowledge base from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, KnowledgeError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    fn validate(&self) -> Result<(), KnowledgeError> {
        let mut section_ids = HashSet::new();
        for section in &self.sections {
            if !section_ids.insert(section.id.as_str()) {
                return Err(KnowledgeError::ValidationError(format!(
                    "Duplicate section ID: {}",
                    section.id
                )));
            }
        }

        let mut entry_ids = HashSet::new();
        for entry in self.entries() {
            if !entry_ids.insert(entry.id.as_str()) {
                return Err(KnowledgeError::ValidationError(format!(
                    "Duplicate entry ID: {}",
                    entry.id
                )));
            }
        }

        if !self.sections.iter().any(|s| s.in_prompt) {
            return Err(KnowledgeError::ValidationError(
                "At least one section must be included in the prompt".to_string(),
            ));
        }

        Ok(())
    }

    /// All entries across all sections, in file order.
    pub fn entries(&self) -> impl Iterator<Item = &KnowledgeEntry> {
        self.sections.iter().flat_map(|s| s.entries.iter())
    }

    /// Sections rendered into the solver prompt.
    pub fn prompt_sections(&self) -> impl Iterator<Item = &KnowledgeSection> {
        self.sections.iter().filter(|s| s.in_prompt)
    }

    pub fn entry(&self, id: &str) -> Option<&KnowledgeEntry> {
        self.entries().find(|e| e.id == id)
    }

    /// Render the prompt sections as plain text, one bullet per entry.
    pub fn prompt_digest(&self) -> String {
        let mut out = String::new();
        for section in self.prompt_sections() {
            out.push_str(&section.title.to_uppercase());
            out.push_str(":\n");
            for entry in &section.entries {
                out.push_str(&format!("- [{}] {}\n", entry.id, entry.statement));
                if let Some(when) = &entry.when_to_use {
                    out.push_str(&format!("    when: {}\n", when));
                }
                if let Some(example) = &entry.example {
                    out.push_str(&format!("    e.g. {}\n", example));
                }
                for note in &entry.notes {
                    out.push_str(&format!("    note: {}\n", note));
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SMALL: &str = r#"
version: "1.0"
name: "Small"
sections:
  - id: traps
    title: "Traps"
    kind: traps
    entries:
      - id: T1
        statement: "Forgetting +C"
        notes: ["always add it"]
  - id: extra
    title: "Extra"
    kind: rules
    in_prompt: false
    entries:
      - id: A1
        statement: "integral(ln x dx) = x ln x - x + C"
"#;

    #[test]
    fn test_builtin_parses() {
        let base = KnowledgeBase::builtin().unwrap();
        assert!(base.sections.len() >= 5);
        assert!(base.entry("T1").unwrap().statement.contains("+C"));
        assert!(base.entry("I2").unwrap().statement.contains("ln|x|"));
    }

    #[test]
    fn test_builtin_prompt_sections() {
        let base = KnowledgeBase::builtin().unwrap();
        let ids: Vec<_> = base.prompt_sections().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["differentiation", "integration", "traps", "shortcuts", "substitutions"]
        );
    }

    #[test]
    fn test_digest_only_prompt_sections() {
        let base = KnowledgeBase::from_yaml(SMALL).unwrap();
        let digest = base.prompt_digest();
        assert!(digest.starts_with("TRAPS:\n- [T1] Forgetting +C\n"));
        assert!(digest.contains("note: always add it"));
        assert!(!digest.contains("A1"));
    }

    #[test]
    fn test_duplicate_entry_id_rejected() {
        let yaml = SMALL.replace("id: A1", "id: T1");
        let err = KnowledgeBase::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, KnowledgeError::ValidationError(ref m) if m.contains("T1")));
    }

    #[test]
    fn test_duplicate_section_id_rejected() {
        let yaml = SMALL.replace("id: extra", "id: traps");
        assert!(matches!(
            KnowledgeBase::from_yaml(&yaml),
            Err(KnowledgeError::ValidationError(_))
        ));
    }

    #[test]
    fn test_no_prompt_section_rejected() {
        let yaml = SMALL.replace("kind: traps\n", "kind: traps\n    in_prompt: false\n");
        assert!(matches!(
            KnowledgeBase::from_yaml(&yaml),
            Err(KnowledgeError::ValidationError(_))
        ));
    }

    #[test]
    fn test_schema_violation_reported() {
        let yaml = SMALL.replace("version: \"1.0\"", "version: \"one\"");
        assert!(matches!(
            KnowledgeBase::from_yaml(&yaml),
            Err(KnowledgeError::SchemaError(_))
        ));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SMALL.as_bytes()).unwrap();
        let base = KnowledgeBase::from_yaml_file(file.path()).unwrap();
        assert_eq!(base.name, "Small");

        assert!(matches!(
            KnowledgeBase::from_yaml_file("/nonexistent/knowledge.yaml"),
            Err(KnowledgeError::IoError(_))
        ));
    }
}
