//! Attack metadata

use crate::ParameterType;
use std::fmt;

/// Attack identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttackId(pub u8);

impl fmt::Display for AttackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attack descriptor (metadata about an attack)
#[derive(Debug, Clone)]
pub struct AttackDescriptor {
    /// Attack ID
    pub id: AttackId,
    /// Short name used on the command line and for capture files
    pub shortname: &'static str,
    /// Human-readable name
    pub name: &'static str,
    /// Description of what the attack does
    pub description: &'static str,
    /// Parameters this attack accepts
    pub parameters: Vec<ParamDescriptor>,
}

impl AttackDescriptor {
    /// Default capture file name for this attack
    pub fn capture_file(&self) -> String {
        format!("{}.pcap", self.shortname)
    }
}

/// Parameter descriptor
#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    /// Parameter name
    pub name: &'static str,
    /// Parameter description
    pub description: &'static str,
    /// Parameter type
    pub param_type: ParameterType,
    /// Default value
    pub default: Option<String>,
}

impl ParamDescriptor {
    pub fn new(name: &'static str, param_type: ParameterType) -> Self {
        Self {
            name,
            description: "",
            param_type,
            default: None,
        }
    }

    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn with_default(mut self, default: String) -> Self {
        self.default = Some(default);
        self
    }
}
