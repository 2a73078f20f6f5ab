/// Element layout - how vertex buffer slots feed the vertex shader inputs

use std::sync::Arc;

use crate::resource::Format;
use super::state_object::{HasStateId, StateId};

/// One vertex shader input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputElement {
    /// Vertex buffer slot the element is read from
    pub input_slot: u32,
    pub format: Format,
    /// Offset in bytes from the start of the vertex
    pub aligned_byte_offset: u32,
}

#[derive(Debug)]
pub struct ElementLayout {
    id: StateId,
    elements: Vec<InputElement>,
}

impl ElementLayout {
    pub fn new(elements: Vec<InputElement>) -> Arc<Self> {
        Arc::new(Self {
            id: StateId::next(),
            elements,
        })
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn elements(&self) -> &[InputElement] {
        &self.elements
    }

    /// Vertex buffer slots that must be bound to draw with this layout, ascending
    pub fn required_slots(&self) -> Vec<u32> {
        let mut slots: Vec<u32> = self.elements.iter().map(|element| element.input_slot).collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    }
}

impl HasStateId for ElementLayout {
    fn state_id(&self) -> StateId {
        self.id
    }
}

#[cfg(test)]
#[path = "element_layout_tests.rs"]
mod tests;
