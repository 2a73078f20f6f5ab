/// Generic containers used by the device core

mod slot_array;

pub use slot_array::SlotArray;
