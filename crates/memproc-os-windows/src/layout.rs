use crate::WindowsError;

/// Byte layout of the head of a kernel process object, as seen from its
/// image name.
///
/// The offsets are relative and point backwards: the scanner finds the
/// image name first and then looks for the paging root somewhere within
/// `scan_window` bytes before it. Structure layouts drift between kernel
/// builds, so the constants are kept together and can be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EprocessLayout {
    /// The first 8 bytes of the image name of the system process.
    pub name_signature: u64,

    /// Bits of the following 8 bytes that must be zero.
    pub name_padding_mask: u64,

    /// How far before the image name the paging root may be.
    pub scan_window: usize,

    /// Bits that are never set in a valid paging root.
    pub dtb_reserved_mask: u64,

    /// Distances before the paging root of the fields that must look like
    /// kernel-space pointers.
    pub pointer_offsets: [usize; 4],

    /// Bits that are all set in a canonical kernel-space pointer.
    pub kernel_pointer_mask: u64,

    /// Distance before the paging root of the 32-bit field that must be
    /// zero (the dispatcher signal state).
    pub signal_state_offset: usize,
}

impl EprocessLayout {
    /// 64-bit Windows, from Vista up to Windows 10.
    pub const WIN64: Self = Self {
        // "System\0\0"
        name_signature: 0x0000_6d65_7473_7953,
        name_padding_mask: 0x00ff_ffff_ffff_ffff,
        scan_window: 0x500,
        dtb_reserved_mask: 0xffff_f000_0000_0000,
        pointer_offsets: [0x08, 0x10, 0x18, 0x20],
        kernel_pointer_mask: 0xffff_8000_0000_0000,
        signal_state_offset: 0x24,
    };

    /// Checks that the constants describe a scan that can terminate and
    /// stays 8-byte aligned.
    pub fn validate(&self) -> Result<(), WindowsError> {
        if self.scan_window == 0 || self.scan_window % 8 != 0 {
            return Err(WindowsError::InvalidLayout(
                "scan window must be a non-zero multiple of 8",
            ));
        }

        if self.pointer_offsets.contains(&0) {
            return Err(WindowsError::InvalidLayout(
                "pointer fields cannot overlap the paging root",
            ));
        }

        Ok(())
    }
}

impl Default for EprocessLayout {
    fn default() -> Self {
        Self::WIN64
    }
}
