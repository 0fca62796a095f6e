//! Typed, path-aware access to flat blocks

use crate::attr::{AttrValue, Block};
use crate::error::{ModelError, Result};

/// A block together with its dotted path, so every validation error can name
/// the attribute it refers to
#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    block: &'a Block,
    path: String,
}

impl<'a> Reader<'a> {
    pub(crate) fn root(block: &'a Block) -> Self {
        Self {
            block,
            path: String::new(),
        }
    }

    pub(crate) fn new(block: &'a Block, path: String) -> Self {
        Self { block, path }
    }

    pub(crate) fn block(&self) -> &'a Block {
        self.block
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn path_of(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    fn mismatch(&self, key: &str, expected: &str, found: &AttrValue) -> ModelError {
        ModelError::validation(
            self.path_of(key),
            format!("expected {}, found {}", expected, found.kind_name()),
        )
    }

    pub(crate) fn str(&self, key: &str) -> Result<Option<&'a str>> {
        match self.block.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(Some)
                .ok_or_else(|| self.mismatch(key, "string", value)),
        }
    }

    /// String attribute, treating the empty string as unset
    pub(crate) fn non_empty_str(&self, key: &str) -> Result<Option<&'a str>> {
        Ok(self.str(key)?.filter(|s| !s.is_empty()))
    }

    pub(crate) fn int(&self, key: &str) -> Result<Option<i64>> {
        match self.block.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_int()
                .map(Some)
                .ok_or_else(|| self.mismatch(key, "number", value)),
        }
    }

    pub(crate) fn bool(&self, key: &str) -> Result<Option<bool>> {
        match self.block.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_bool()
                .map(Some)
                .ok_or_else(|| self.mismatch(key, "bool", value)),
        }
    }

    pub(crate) fn blocks(&self, key: &str) -> Result<Vec<Reader<'a>>> {
        match self.block.get(key) {
            None => Ok(Vec::new()),
            Some(value) => {
                let blocks = value
                    .as_blocks()
                    .ok_or_else(|| self.mismatch(key, "block list", value))?;
                let base = self.path_of(key);
                Ok(blocks
                    .iter()
                    .enumerate()
                    .map(|(i, block)| Reader::new(block, format!("{}.{}", base, i)))
                    .collect())
            }
        }
    }

    /// Block list holding zero or one block
    pub(crate) fn optional_block(&self, key: &str) -> Result<Option<Reader<'a>>> {
        let mut blocks = self.blocks(key)?;
        if blocks.len() > 1 {
            return Err(ModelError::validation(
                self.path_of(key),
                format!("at most one block allowed, found {}", blocks.len()),
            ));
        }
        Ok(blocks.pop())
    }

    /// String attribute holding a JSON object
    pub(crate) fn json_object(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let Some(raw) = self.non_empty_str(key)? else {
            return Ok(None);
        };
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| ModelError::validation(self.path_of(key), format!("invalid JSON: {}", e)))?;
        if !value.is_object() {
            return Err(ModelError::validation(
                self.path_of(key),
                "expected a JSON object",
            ));
        }
        Ok(Some(value))
    }
}
