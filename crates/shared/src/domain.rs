use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

pub const DENSITY_PARAM: &str = "RH_IN:density";
pub const RADIUS_PARAM: &str = "RH_IN:radius";
pub const ROTATE_PARAM: &str = "RH_IN:rotate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Density,
    Radius,
    Rotate,
}

impl Parameter {
    pub const ALL: [Parameter; 3] = [Parameter::Density, Parameter::Radius, Parameter::Rotate];

    /// Input name the remote definition expects for this parameter.
    pub fn input_name(self) -> &'static str {
        match self {
            Parameter::Density => DENSITY_PARAM,
            Parameter::Radius => RADIUS_PARAM,
            Parameter::Rotate => ROTATE_PARAM,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "density" => Some(Parameter::Density),
            "radius" => Some(Parameter::Radius),
            "rotate" | "rotation" => Some(Parameter::Rotate),
            _ => None,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Parameter::Density => "density",
            Parameter::Radius => "radius",
            Parameter::Rotate => "rotate",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub density: f64,
    pub radius: f64,
    pub rotate: f64,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            density: 0.5,
            radius: 5.0,
            rotate: 0.0,
        }
    }
}

impl ParameterSet {
    pub fn get(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::Density => self.density,
            Parameter::Radius => self.radius,
            Parameter::Rotate => self.rotate,
        }
    }

    pub fn set(&mut self, parameter: Parameter, value: f64) {
        match parameter {
            Parameter::Density => self.density = value,
            Parameter::Radius => self.radius = value,
            Parameter::Rotate => self.rotate = value,
        }
    }

    /// Named values in the order the definition declares its inputs.
    pub fn named_values(&self) -> [(&'static str, f64); 3] {
        Parameter::ALL.map(|p| (p.input_name(), self.get(p)))
    }
}

/// Opaque algorithm definition, loaded once and shared read-only.
#[derive(Clone, PartialEq, Eq)]
pub struct Definition {
    name: String,
    bytes: Arc<[u8]>,
}

impl Definition {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Compute service access key. Never validated locally.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}
