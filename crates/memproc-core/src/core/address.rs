use super::macros::impl_address;

impl_address!(Gfn, "Physical Frame Number");
impl_address!(Pa, "Physical Address");
impl_address!(Va, "Virtual Address");

/// The shift value to convert a frame number to a physical address.
pub const PAGE_SHIFT: u64 = 12;

/// The size of a page in bytes.
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

/// Mask that clears the offset-in-page bits of an address.
pub const PAGE_MASK: u64 = !(PAGE_SIZE - 1);

impl Gfn {
    /// Returns the physical address of the first byte of the frame.
    pub const fn pa(self) -> Pa {
        Pa(self.0 << PAGE_SHIFT)
    }
}

impl Pa {
    /// Returns the frame number containing this address.
    pub const fn gfn(self) -> Gfn {
        Gfn(self.0 >> PAGE_SHIFT)
    }

    /// Returns the offset of this address within its page.
    pub const fn page_offset(self) -> u64 {
        self.0 & !PAGE_MASK
    }

    /// Returns the address rounded down to a 4KB boundary.
    pub const fn page_align(self) -> Pa {
        Pa(self.0 & PAGE_MASK)
    }
}

impl Va {
    /// Returns the address rounded down to a 4KB boundary.
    pub const fn page_align(self) -> Va {
        Va(self.0 & PAGE_MASK)
    }
}
