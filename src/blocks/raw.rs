// src/blocks/raw.rs

//! Serde model of a Blockly-style workspace as the editor posts it.
//!
//! Nothing here is validated; [`super::lower`] turns it into typed blocks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::CompileError;

/// A whole visual program.
///
/// Accepts both the flat `{"blocks": [...]}` form and Blockly's own
/// serialization `{"blocks": {"languageVersion": 0, "blocks": [...]}}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockProgram {
    #[serde(default, with = "workspace_blocks")]
    pub blocks: Vec<RawBlock>,
}

impl BlockProgram {
    pub fn new(blocks: Vec<RawBlock>) -> Self {
        Self { blocks }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, RawInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<RawNext>,
}

/// A value or statement input slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<Box<RawBlock>>,
    /// Placeholder block the editor shows when the slot is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<Box<RawBlock>>,
}

impl RawInput {
    /// The block in this slot, falling back to its shadow.
    pub fn effective(&self) -> Option<&RawBlock> {
        self.block.as_deref().or(self.shadow.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNext {
    pub block: Box<RawBlock>,
}

impl RawBlock {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Numeric argument `name`.
    ///
    /// Looked up in `fields` first (number or numeric string), then in a
    /// `math_number` block plugged into the input of the same name.
    pub fn number(&self, name: &str) -> Result<f64, CompileError> {
        if let Some(value) = self.fields.get(name) {
            return match value {
                Value::Number(n) => n.as_f64().ok_or_else(|| self.invalid(name, "not a number")),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| self.invalid(name, format!("'{s}' is not a number"))),
                other => Err(self.invalid(name, format!("expected a number, got {other}"))),
            };
        }

        match self.inputs.get(name).and_then(RawInput::effective) {
            Some(inner) if inner.kind == "math_number" => inner.number("NUM"),
            Some(inner) => Err(self.invalid(
                name,
                format!("expected a number block, got '{}'", inner.kind),
            )),
            None => Err(self.invalid(name, "missing")),
        }
    }

    /// Text argument `name`, trimmed.
    pub fn text(&self, name: &str) -> Result<String, CompileError> {
        let value = match self.fields.get(name) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => return Err(self.invalid(name, format!("expected text, got {other}"))),
            None => return Err(self.invalid(name, "missing")),
        };
        if value.is_empty() {
            return Err(self.invalid(name, "empty"));
        }
        Ok(value)
    }

    /// First block of statement input `name`, if anything is plugged in.
    pub fn statement(&self, name: &str) -> Option<&RawBlock> {
        self.inputs.get(name).and_then(|input| input.block.as_deref())
    }

    pub fn next_block(&self) -> Option<&RawBlock> {
        self.next.as_ref().map(|next| next.block.as_ref())
    }

    pub(crate) fn invalid(&self, field: &str, reason: impl Into<String>) -> CompileError {
        CompileError::InvalidField {
            block_type: self.kind.clone(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

mod workspace_blocks {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::RawBlock;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Blocks {
        Flat(Vec<RawBlock>),
        Workspace {
            #[serde(default)]
            blocks: Vec<RawBlock>,
        },
    }

    pub fn serialize<S: Serializer>(blocks: &[RawBlock], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(blocks)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<RawBlock>, D::Error> {
        Ok(match Blocks::deserialize(deserializer)? {
            Blocks::Flat(blocks) | Blocks::Workspace { blocks } => blocks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_blockly_workspace_envelope() {
        let flat: BlockProgram =
            serde_json::from_value(json!({"blocks": [{"type": "motor_stop"}]})).unwrap();
        let nested: BlockProgram = serde_json::from_value(json!({
            "blocks": {"languageVersion": 0, "blocks": [{"type": "motor_stop", "x": 10, "y": 20}]}
        }))
        .unwrap();
        assert_eq!(flat, nested);
        assert_eq!(flat.blocks[0].kind, "motor_stop");
    }

    #[test]
    fn numbers_come_from_fields_or_math_blocks() {
        let block: RawBlock = serde_json::from_value(json!({
            "type": "wait_seconds",
            "fields": {"SECONDS": "1.5"},
            "inputs": {"TIMES": {"shadow": {"type": "math_number", "fields": {"NUM": 4}}}}
        }))
        .unwrap();

        assert_eq!(block.number("SECONDS").unwrap(), 1.5);
        assert_eq!(block.number("TIMES").unwrap(), 4.0);
        assert!(matches!(
            block.number("ANGLE"),
            Err(CompileError::InvalidField { ref field, .. }) if field == "ANGLE"
        ));
    }
}
