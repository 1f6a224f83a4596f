use core::num::NonZeroU16;

use alloc::{boxed::Box, vec::Vec};

#[derive(Copy, Clone)]
pub enum NameComponentType {
    Generic,
    ImplicitSha256Digest,
    ParameterSha256Digest,
    Other(NonZeroU16),
}

// Components own their bytes: the strategy layer never sees the wire
//  encoding, only names already decoded by the host forwarder.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NameComponent {
    pub typ: NonZeroU16,
    pub bytes: Box<[u8]>,
}

impl NameComponent {
    pub fn new(typ: NameComponentType, bytes: &[u8]) -> Self {
        Self {
            typ: typ.into(),
            bytes: Box::from(bytes),
        }
    }

    pub fn generic(bytes: &[u8]) -> Self {
        Self::new(NameComponentType::Generic, bytes)
    }

    pub fn component_type(&self) -> NameComponentType {
        self.typ.into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    pub fn new() -> Self {
        Self { components: Vec::new() }
    }

    pub fn from_components(components: Vec<NameComponent>) -> Self {
        Self { components }
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn components(&self) -> impl Iterator<Item = &NameComponent> {
        self.components.iter()
    }

    pub fn component(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    pub fn adding_component(&self, component: NameComponent) -> Self {
        let mut components = self.components.clone();
        components.push(component);
        Self { components }
    }

    pub fn dropping_last_component(&self) -> Option<Self> {
        if self.components.is_empty() {
            return None;
        }
        Some(self.prefix(self.components.len() - 1))
    }

    // The first "count" components; the whole name if it is shorter.
    pub fn prefix(&self, count: usize) -> Self {
        let count = count.min(self.components.len());
        Self {
            components: self.components[..count].to_vec(),
        }
    }

    pub fn is_prefix_of(&self, other: &Name) -> bool {
        if self.components.len() > other.components.len() {
            return false;
        }
        self.components == other.components[..self.components.len()]
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::new()
    }
}

impl From<NonZeroU16> for NameComponentType {
    fn from(value: NonZeroU16) -> Self {
        match value.get() {
            NAME_COMPONENT_TYPE_GENERIC => NameComponentType::Generic,
            NAME_COMPONENT_TYPE_IMPLICIT_SHA256 => NameComponentType::ImplicitSha256Digest,
            NAME_COMPONENT_TYPE_PARAMETER_SHA256 => NameComponentType::ParameterSha256Digest,
            v => NameComponentType::Other(v.try_into().unwrap()),
        }
    }
}

impl From<NameComponentType> for NonZeroU16 {
    fn from(value: NameComponentType) -> Self {
        match value {
            NameComponentType::Generic => NAME_COMPONENT_TYPE_GENERIC.try_into().unwrap(),
            NameComponentType::ImplicitSha256Digest => {
                NAME_COMPONENT_TYPE_IMPLICIT_SHA256.try_into().unwrap()
            }
            NameComponentType::ParameterSha256Digest => {
                NAME_COMPONENT_TYPE_PARAMETER_SHA256.try_into().unwrap()
            }
            NameComponentType::Other(v) => v,
        }
    }
}

const NAME_COMPONENT_TYPE_GENERIC: u16 = 8;
const NAME_COMPONENT_TYPE_IMPLICIT_SHA256: u16 = 1;
const NAME_COMPONENT_TYPE_PARAMETER_SHA256: u16 = 2;
