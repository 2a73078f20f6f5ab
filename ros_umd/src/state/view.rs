/// Resource views bound to the output merger
///
/// Views are plain values naming a resource and one of its subresources.
/// They do not keep the resource alive; destroying the resource unbinds
/// every view that names it.

use crate::resource::ResourceKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetView {
    pub resource: ResourceKey,
    pub subresource: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilView {
    pub resource: ResourceKey,
    pub subresource: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnorderedAccessView {
    pub resource: ResourceKey,
    pub subresource: u32,
}

impl RenderTargetView {
    pub fn new(resource: ResourceKey) -> Self {
        Self { resource, subresource: 0 }
    }
}

impl DepthStencilView {
    pub fn new(resource: ResourceKey) -> Self {
        Self { resource, subresource: 0 }
    }
}

impl UnorderedAccessView {
    pub fn new(resource: ResourceKey) -> Self {
        Self { resource, subresource: 0 }
    }
}
