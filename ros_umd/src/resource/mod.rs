/// Resource module - GPU memory objects, their formats and map state

pub mod format;
pub mod resource;

pub use format::*;
pub use resource::*;
