mod address;
mod info;
pub(crate) mod macros;

pub use self::{
    address::{Gfn, PAGE_MASK, PAGE_SHIFT, PAGE_SIZE, Pa, Va},
    info::DeviceInfo,
};
