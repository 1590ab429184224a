use std::collections::HashMap;

use bitflags::bitflags;

bitflags! {
    /// Hints a shader author attaches to a program.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderHints: u32 {
        /// Fragment output may be transparent; AUTO blending turns on.
        const OUTPUT_IS_TRANSPARENT = 1 << 0;
        /// Vertex shader moves vertices, so the node's bounds cannot be trusted
        /// for frustum culling.
        const MODIFIES_GEOMETRY = 1 << 1;
    }
}

/// A linked GPU program and its reflected vertex attribute locations.
#[derive(Debug, Clone)]
pub struct Program {
    pub name: String,
    pub hints: ShaderHints,
    attribute_locations: HashMap<String, u32>,
}

impl Program {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hints: ShaderHints::empty(),
            attribute_locations: HashMap::new(),
        }
    }

    pub fn with_hints(mut self, hints: ShaderHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, location: u32) -> Self {
        self.attribute_locations.insert(name.into(), location);
        self
    }

    /// Reflection lookup: the location the program expects for `name`.
    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attribute_locations.get(name).copied()
    }

    pub fn hint_enabled(&self, hint: ShaderHints) -> bool {
        self.hints.contains(hint)
    }
}
