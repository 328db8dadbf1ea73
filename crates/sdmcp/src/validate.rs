//! Argument validation.
//!
//! Each tool's schema is compiled once. A call is checked against it and
//! every violation is collected; only then are the arguments deserialized
//! into the tool's typed struct.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use jsonschema::{error::ValidationErrorKind, Draft, JSONSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ToolError, Violation};
use crate::tools_registry::ToolDef;

pub struct Validator {
    schemas: HashMap<&'static str, JSONSchema>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("tools", &self.schemas.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Validator {
    pub fn new(defs: &[ToolDef]) -> Result<Self> {
        let mut schemas = HashMap::new();
        for def in defs {
            let compiled = JSONSchema::options()
                .with_draft(Draft::Draft7)
                .compile(&def.schema)
                .map_err(|e| anyhow!("Invalid schema for {}: {}", def.name, e))?;
            schemas.insert(def.name, compiled);
        }
        Ok(Self { schemas })
    }

    /// All violations of `tool`'s schema, empty if the arguments conform.
    pub fn violations(&self, tool: &str, args: &Value) -> Result<Vec<Violation>, ToolError> {
        let schema = self
            .schemas
            .get(tool)
            .ok_or_else(|| ToolError::UnknownTool(tool.to_string()))?;

        let violations = match schema.validate(args) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| {
                    let mut path = e.instance_path.to_string();
                    if let ValidationErrorKind::Required { property } = &e.kind {
                        let name = property.as_str().map(str::to_string).unwrap_or_else(|| property.to_string());
                        path = format!("{}/{}", path, name);
                    }
                    if path.is_empty() {
                        path.push('/');
                    }
                    Violation {
                        path,
                        message: e.to_string(),
                    }
                })
                .collect(),
        };
        Ok(violations)
    }

    /// Validate and deserialize in one step.
    pub fn parse<T: DeserializeOwned>(&self, tool: &str, args: Value) -> Result<T, ToolError> {
        let violations = self.violations(tool, &args)?;
        if !violations.is_empty() {
            return Err(ToolError::Validation { violations });
        }
        serde_json::from_value(args).map_err(|e| ToolError::validation("/", e.to_string()))
    }
}
