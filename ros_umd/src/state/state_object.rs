/// Opaque pipeline state objects (blend, rasterizer, depth-stencil, sampler)

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a state object, unique for the life of the process
///
/// Ids are what the command stream records; 0 means "nothing bound".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u64);

static NEXT_STATE_ID: AtomicU64 = AtomicU64::new(1);

impl StateId {
    /// The id recorded for an empty slot
    pub const NONE: StateId = StateId(0);

    pub(crate) fn next() -> Self {
        StateId(NEXT_STATE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    /// Id of an optional binding (`NONE` when unbound)
    pub fn of<T: HasStateId>(binding: Option<&Arc<T>>) -> StateId {
        binding.map_or(StateId::NONE, |object| object.state_id())
    }
}

/// Anything bound by identity in a pipeline slot
pub trait HasStateId {
    fn state_id(&self) -> StateId;
}

// ===== STATE KINDS =====

/// Marker for blend state objects
#[derive(Debug)]
pub enum Blend {}
/// Marker for rasterizer state objects
#[derive(Debug)]
pub enum Rasterizer {}
/// Marker for depth-stencil state objects
#[derive(Debug)]
pub enum DepthStencil {}
/// Marker for sampler state objects
#[derive(Debug)]
pub enum Sampler {}

/// Immutable, externally constructed configuration blob
///
/// The device never interprets `desc`; it only compares identities.
pub struct StateObject<K> {
    id: StateId,
    desc: Box<[u8]>,
    _kind: PhantomData<fn() -> K>,
}

impl<K> StateObject<K> {
    /// Wrap a descriptor blob in a new state object
    pub fn new(desc: impl Into<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            id: StateId::next(),
            desc: desc.into().into_boxed_slice(),
            _kind: PhantomData,
        })
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    /// Descriptor blob this object was created from
    pub fn desc(&self) -> &[u8] {
        &self.desc
    }
}

impl<K> HasStateId for StateObject<K> {
    fn state_id(&self) -> StateId {
        self.id
    }
}

impl<K> fmt::Debug for StateObject<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateObject")
            .field("kind", &std::any::type_name::<K>())
            .field("id", &self.id)
            .field("desc_len", &self.desc.len())
            .finish()
    }
}

pub type BlendState = StateObject<Blend>;
pub type RasterizerState = StateObject<Rasterizer>;
pub type DepthStencilState = StateObject<DepthStencil>;
pub type SamplerState = StateObject<Sampler>;

#[cfg(test)]
#[path = "state_object_tests.rs"]
mod tests;
