//! Shader descriptors and the authority-side program registry.

use crate::error::ResourceError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// A value bound to a shader property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShaderValue {
    Number(f64),
    Color(u32),
    Vec(Vec<f64>),
}

impl ShaderValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Color(c) => Some(f64::from(*c)),
            Self::Vec(_) => None,
        }
    }
}

/// Property bag bound alongside a shader program.
pub type ShaderProps = BTreeMap<String, ShaderValue>;

#[derive(Debug)]
struct ShaderSpec {
    shader_type: String,
    props: ShaderProps,
}

/// Immutable, cheaply cloned shader descriptor compared by identity.
#[derive(Clone)]
pub struct ShaderDesc(Arc<ShaderSpec>);

impl ShaderDesc {
    pub fn new(shader_type: impl Into<String>, props: ShaderProps) -> Self {
        Self(Arc::new(ShaderSpec {
            shader_type: shader_type.into(),
            props,
        }))
    }

    pub fn shader_type(&self) -> &str {
        &self.0.shader_type
    }

    pub fn props(&self) -> &ShaderProps {
        &self.0.props
    }

    pub fn same(&self, other: &ShaderDesc) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ShaderDesc {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for ShaderDesc {}

impl fmt::Debug for ShaderDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderDesc")
            .field("type", &self.0.shader_type)
            .field("props", &self.0.props)
            .finish()
    }
}

/// Shader programs the authority knows how to bind.
#[derive(Debug, Clone)]
pub struct ShaderRegistry {
    programs: HashMap<String, Vec<&'static str>>,
}

impl ShaderRegistry {
    /// Empty registry.
    pub fn empty() -> Self {
        Self {
            programs: HashMap::new(),
        }
    }

    /// Register a program and the numeric props it requires.
    pub fn register(&mut self, shader_type: impl Into<String>, required: &[&'static str]) {
        self.programs.insert(shader_type.into(), required.to_vec());
    }

    pub fn contains(&self, shader_type: &str) -> bool {
        self.programs.contains_key(shader_type)
    }

    /// Check that `shader` names a known program with its required props.
    pub fn validate(&self, shader: &ShaderDesc) -> Result<(), ResourceError> {
        let required = self
            .programs
            .get(shader.shader_type())
            .ok_or_else(|| ResourceError::UnknownShader(shader.shader_type().to_string()))?;

        for prop in required {
            let present = shader
                .props()
                .get(*prop)
                .and_then(ShaderValue::as_number)
                .is_some();
            if !present {
                return Err(ResourceError::MissingShaderProp {
                    shader: shader.shader_type().to_string(),
                    prop: (*prop).to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Default for ShaderRegistry {
    /// The built-in programs.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("DefaultShader", &[]);
        registry.register("RoundedRectangle", &["radius"]);
        registry.register("LinearGradient", &["angle"]);
        registry.register("SdfShader", &["size"]);
        registry
    }
}
