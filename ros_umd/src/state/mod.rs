/// Pipeline state objects and the value types bound alongside them
///
/// State objects are constructed outside the device and are immutable; the
/// device only holds shared references to the instance bound in each slot.

pub mod state_object;
pub mod shader;
pub mod element_layout;
pub mod input_assembly;
pub mod view;

pub use state_object::*;
pub use shader::*;
pub use element_layout::*;
pub use input_assembly::*;
pub use view::*;
