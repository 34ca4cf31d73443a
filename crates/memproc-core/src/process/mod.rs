mod entry;
mod registry;

pub use self::{
    entry::{NewProcess, Process, ProcessFlags, ProcessId},
    registry::{Generation, ProcessRegistry},
};
