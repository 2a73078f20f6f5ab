/// Device module - pipeline binding, draw dispatch, resources and submission
///
/// - `device`: the Device struct, lifecycle, error boundary and kernel wrappers
/// - `pipeline_state`: the binding snapshot and slot capacities
/// - `pipeline_binding`: state setters
/// - `draw`: draw and clear encoding
/// - `resource_ops`: resource create/destroy, map/unmap and copy

pub mod device;
pub mod pipeline_state;
mod pipeline_binding;
mod draw;
mod resource_ops;

pub use device::*;
pub use pipeline_state::*;
pub use pipeline_binding::OutputMergerBindings;

#[cfg(test)]
pub(crate) mod test_support;
