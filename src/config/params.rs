//! Typed parameter descriptors.
//!
//! Model and plot parameter blocks publish a static list of descriptors so the
//! wizard can build their forms generically and read or write values by name.

use std::fmt;

use super::error::ConfigError;

/// Value domain of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    /// Integer that may be left empty (unset).
    OptionalInt,
    Float,
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ParamKind,
    /// Derived from the loaded dataset; never shown in forms.
    pub derived: bool,
}

impl ParamDescriptor {
    pub const fn new(name: &'static str, description: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            description,
            kind,
            derived: false,
        }
    }

    pub const fn derived(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            kind: ParamKind::Int,
            derived: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
    Unset,
}

impl ParamValue {
    pub fn as_int(&self, name: &str) -> Result<i64, ConfigError> {
        match self {
            ParamValue::Int(v) => Ok(*v),
            _ => Err(type_error(name, "an integer")),
        }
    }

    pub fn as_unsigned(&self, name: &str) -> Result<u32, ConfigError> {
        let value = self.as_int(name)?;
        u32::try_from(value).map_err(|_| type_error(name, "a non-negative integer"))
    }

    pub fn as_optional(&self, name: &str) -> Result<Option<u32>, ConfigError> {
        match self {
            ParamValue::Unset => Ok(None),
            other => other.as_unsigned(name).map(Some),
        }
    }

    pub fn as_float(&self, name: &str) -> Result<f64, ConfigError> {
        match self {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            _ => Err(type_error(name, "a number")),
        }
    }

    pub fn as_text(&self, name: &str) -> Result<&str, ConfigError> {
        match self {
            ParamValue::Text(v) => Ok(v),
            _ => Err(type_error(name, "a choice")),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(v) => f.write_str(v),
            ParamValue::Unset => Ok(()),
        }
    }
}

impl From<Option<u32>> for ParamValue {
    fn from(value: Option<u32>) -> Self {
        value.map_or(ParamValue::Unset, |v| ParamValue::Int(i64::from(v)))
    }
}

pub(crate) fn type_error(name: &str, expected: &'static str) -> ConfigError {
    ConfigError::ParamType {
        name: name.to_string(),
        expected,
    }
}

/// A block of named parameters with a static schema.
pub trait ParamBlock {
    fn block_name(&self) -> &'static str;

    fn descriptors(&self) -> &'static [ParamDescriptor];

    fn get(&self, name: &str) -> Option<ParamValue>;

    fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ConfigError>;

    /// Descriptors shown to the user, in declaration order.
    fn editable(&self) -> Vec<&'static ParamDescriptor> {
        self.descriptors().iter().filter(|d| !d.derived).collect()
    }

    fn descriptor(&self, name: &str) -> Option<&'static ParamDescriptor> {
        self.descriptors().iter().find(|d| d.name == name)
    }

    fn unknown(&self, name: &str) -> ConfigError {
        ConfigError::UnknownParam {
            block: self.block_name(),
            name: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_accepts_unset() {
        assert_eq!(ParamValue::Unset.as_optional("n_step").unwrap(), None);
        assert_eq!(ParamValue::Int(4).as_optional("n_step").unwrap(), Some(4));
    }

    #[test]
    fn test_unsigned_rejects_negative() {
        assert!(ParamValue::Int(-1).as_unsigned("hidden_dim").is_err());
    }

    #[test]
    fn test_float_accepts_int() {
        assert_eq!(ParamValue::Int(1).as_float("dropout").unwrap(), 1.0);
    }
}
