//! Parameter descriptions.

use crate::value::ValueType;
use bitflags::bitflags;

bitflags! {
    /// Editing hints attached to a parameter.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ParamFlags: u32 {
        /// May be linked to a time-varying value node.
        const ANIMATABLE = 1 << 0;
        /// A length in world units; scales with the canvas.
        const DISTANCE = 1 << 1;
        /// A position other parameters are relative to.
        const ORIGIN = 1 << 2;
        /// Not shown in editors.
        const HIDDEN = 1 << 3;
        /// Never evaluated from a value node.
        const STATIC = 1 << 4;
    }
}

/// Describes one parameter of a layer type.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamDesc {
    pub name: &'static str,
    pub local_name: &'static str,
    pub value_type: ValueType,
    pub flags: ParamFlags,
    pub description: &'static str,
}

impl ParamDesc {
    pub fn new(name: &'static str, value_type: ValueType) -> Self {
        Self {
            name,
            local_name: name,
            value_type,
            flags: ParamFlags::ANIMATABLE,
            description: "",
        }
    }

    pub fn with_local_name(mut self, local_name: &'static str) -> Self {
        self.local_name = local_name;
        self
    }

    pub fn with_flags(mut self, flags: ParamFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Mark the parameter as static (not animatable).
    pub fn not_animatable(mut self) -> Self {
        self.flags.remove(ParamFlags::ANIMATABLE);
        self.flags.insert(ParamFlags::STATIC);
        self
    }

    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn is_animatable(&self) -> bool {
        self.flags.contains(ParamFlags::ANIMATABLE)
    }
}

/// The parameters a layer type exposes.
pub type ParamVocab = Vec<ParamDesc>;

/// Look up a parameter description by name.
pub fn find_param<'a>(vocab: &'a [ParamDesc], name: &str) -> Option<&'a ParamDesc> {
    vocab.iter().find(|desc| desc.name == name)
}

/// The `amount` and `blend_method` parameters shared by compositing layers.
pub fn blend_params() -> [ParamDesc; 2] {
    [
        ParamDesc::new("amount", ValueType::Real).with_local_name("Opacity"),
        ParamDesc::new("blend_method", ValueType::BlendMethod)
            .with_local_name("Blend Method")
            .not_animatable(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_builder() {
        let desc = ParamDesc::new("radius", ValueType::Real)
            .with_local_name("Radius")
            .with_flags(ParamFlags::DISTANCE);
        assert!(desc.is_animatable());
        assert!(desc.flags.contains(ParamFlags::DISTANCE));
        assert_eq!(desc.local_name, "Radius");

        let fixed = ParamDesc::new("canvas", ValueType::Canvas).not_animatable();
        assert!(!fixed.is_animatable());
        assert!(fixed.flags.contains(ParamFlags::STATIC));
    }

    #[test]
    fn test_find_param() {
        let vocab: ParamVocab = blend_params().to_vec();
        assert_eq!(find_param(&vocab, "amount").map(|d| d.value_type), Some(ValueType::Real));
        assert!(find_param(&vocab, "missing").is_none());
    }
}
