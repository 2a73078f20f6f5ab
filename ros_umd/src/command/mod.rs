/// Command stream - encoded records, their decoder, and the bounded buffer
/// that batches them for the kernel `render` callback

pub mod packet;
pub mod command;
pub mod command_buffer;

pub use packet::*;
pub use command::*;
pub use command_buffer::CommandBuffer;
