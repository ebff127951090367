//! Attack parameters

use crate::attack::ParamDescriptor;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// Parameter type, used for documentation and validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    /// 16-bit unsigned integer
    U16,
    /// 8-bit unsigned integer
    U8,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterType::U16 => write!(f, "u16"),
            ParameterType::U8 => write!(f, "u8"),
        }
    }
}

/// Parameters for building an attack strategy
#[derive(Debug, Clone, Default)]
pub struct AttackParams {
    params: HashMap<String, ParamValue>,
}

impl AttackParams {
    /// Create a new empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` strings
    ///
    /// Values are read as integers (decimal or `0x` hex), then booleans,
    /// then kept as strings.
    pub fn parse_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<Self> {
        let mut params = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::invalid_parameter(pair, "expected KEY=VALUE"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::invalid_parameter(pair, "empty key"));
            }
            params.params.insert(key.to_string(), ParamValue::parse(value.trim()));
        }
        Ok(params)
    }

    /// Set a parameter value
    pub fn set<K: Into<String>, V: Into<ParamValue>>(mut self, key: K, value: V) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Get a parameter value
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    /// Get a u8 parameter, failing if present but not a u8
    pub fn u8_or(&self, key: &str, default: u8) -> Result<u8> {
        match self.params.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_u8()
                .ok_or_else(|| Error::invalid_parameter(key, format!("'{}' is not a u8", v))),
        }
    }

    /// Get a u16 parameter, failing if present but not a u16
    pub fn u16_or(&self, key: &str, default: u16) -> Result<u16> {
        match self.params.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_u16()
                .ok_or_else(|| Error::invalid_parameter(key, format!("'{}' is not a u16", v))),
        }
    }

    /// Reject keys no descriptor declares
    pub fn check_known(&self, known: &[ParamDescriptor]) -> Result<()> {
        for key in self.params.keys() {
            if !known.iter().any(|d| d.name == key) {
                let names: Vec<&str> = known.iter().map(|d| d.name).collect();
                return Err(Error::invalid_parameter(
                    key.as_str(),
                    format!("unknown parameter (accepted: {})", names.join(", ")),
                ));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Parameter value types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    String(String),
    U64(u64),
    U16(u16),
    U8(u8),
    Bool(bool),
}

impl ParamValue {
    /// Interpret a textual value
    pub fn parse(text: &str) -> Self {
        let number = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => text.parse::<u64>().ok(),
        };
        if let Some(n) = number {
            return ParamValue::U64(n);
        }
        match text {
            "true" | "yes" | "on" => ParamValue::Bool(true),
            "false" | "no" | "off" => ParamValue::Bool(false),
            _ => ParamValue::String(text.to_string()),
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            ParamValue::U8(v) => Some(*v),
            ParamValue::U16(v) if *v <= u8::MAX as u16 => Some(*v as u8),
            ParamValue::U64(v) if *v <= u8::MAX as u64 => Some(*v as u8),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            ParamValue::U16(v) => Some(*v),
            ParamValue::U8(v) => Some(*v as u16),
            ParamValue::U64(v) if *v <= u16::MAX as u64 => Some(*v as u16),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::String(s) => write!(f, "{}", s),
            ParamValue::U64(v) => write!(f, "{}", v),
            ParamValue::U16(v) => write!(f, "{}", v),
            ParamValue::U8(v) => write!(f, "{}", v),
            ParamValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::String(s)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<u8> for ParamValue {
    fn from(v: u8) -> Self {
        ParamValue::U8(v)
    }
}

impl From<u16> for ParamValue {
    fn from(v: u16) -> Self {
        ParamValue::U16(v)
    }
}

impl From<u64> for ParamValue {
    fn from(v: u64) -> Self {
        ParamValue::U64(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let params =
            AttackParams::parse_pairs(&["max_key_size=253", "auth_req=0x05", "label=x"]).unwrap();
        assert_eq!(params.u8_or("max_key_size", 16).unwrap(), 253);
        assert_eq!(params.u8_or("auth_req", 0).unwrap(), 0x05);
        assert_eq!(params.get("label"), Some(&ParamValue::String("x".to_string())));
        assert_eq!(params.u16_or("mtu", 247).unwrap(), 247);
    }

    #[test]
    fn test_parse_pairs_rejects_missing_value() {
        assert!(AttackParams::parse_pairs(&["mtu"]).is_err());
        assert!(AttackParams::parse_pairs(&["=5"]).is_err());
    }

    #[test]
    fn test_out_of_range() {
        let params = AttackParams::new().set("max_key_size", 300u16);
        let err = params.u8_or("max_key_size", 16).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn test_value_parse() {
        assert_eq!(ParamValue::parse("true"), ParamValue::Bool(true));
        assert_eq!(ParamValue::parse("0xFD"), ParamValue::U64(253));
        assert_eq!(ParamValue::parse("abc"), ParamValue::String("abc".into()));
    }

    #[test]
    fn test_check_known() {
        let known = [ParamDescriptor::new("mtu", ParameterType::U16)];
        assert!(AttackParams::new().set("mtu", 23u16).check_known(&known).is_ok());
        assert!(AttackParams::new().set("mut", 23u16).check_known(&known).is_err());
    }
}
