//! Raw access to the FPGA register fabric.
//!
//! The acquisition peripherals hang off the lightweight HPS-to-FPGA bridge
//! and are reached by mapping a page-aligned span of `/dev/mem` into the
//! process. [`RegisterWindow`] owns exactly one such mapping; [`Mmio`] is a
//! cheap span-checked view handed to the peripheral drivers. Every access is
//! a volatile 32-bit load or store — there is no caching layer, each call is
//! a real bus transaction in program order.

use std::io;
use std::marker::PhantomData;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;

/// Holder of the `/dev/mem` file descriptor.
///
/// Opening requires root. Failure here is fatal for the whole program:
/// without the descriptor no hardware exists to talk to.
pub struct DevMem {
    fd: OwnedFd,
}

impl DevMem {
    pub fn open() -> io::Result<Self> {
        let fd = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open("/dev/mem")?;
        Ok(Self { fd: fd.into() })
    }
}

/// One contiguous mapping of physical register space.
///
/// Unmapped exactly once, on drop. All [`Mmio`] views borrow from the
/// window, so the borrow checker retires them first.
pub struct RegisterWindow {
    base: *mut u8,
    span: usize,
}

impl RegisterWindow {
    /// Map `span` bytes of physical address space starting at `offset`.
    /// `offset` must be page aligned (the bridge base is).
    pub fn map(mem: &DevMem, offset: usize, span: usize) -> io::Result<Self> {
        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                span,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                mem.fd.as_raw_fd(),
                offset as libc::off_t,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            base: base.cast(),
            span,
        })
    }

    /// A named peripheral view of `span` bytes at `offset` into the window.
    ///
    /// Panics if the view does not fit: the address map is a build-time
    /// contract and a mismatch is a bug, not a runtime condition.
    pub fn view(&self, offset: usize, span: usize) -> Mmio<'_> {
        assert!(
            offset % 4 == 0 && offset + span <= self.span,
            "register view {offset:#x}+{span:#x} outside window"
        );
        Mmio {
            base: unsafe { self.base.add(offset) }.cast(),
            span,
            _window: PhantomData,
        }
    }
}

impl Drop for RegisterWindow {
    fn drop(&mut self) {
        let rc = unsafe { libc::munmap(self.base.cast(), self.span) };
        if rc != 0 {
            log::error!("munmap failed: {}", io::Error::last_os_error());
        }
    }
}

/// A peripheral's register span. `Copy` so drivers can hold their own
/// handle; all handles alias the same hardware and every access is volatile.
#[derive(Clone, Copy)]
pub struct Mmio<'a> {
    base: *mut u32,
    span: usize,
    _window: PhantomData<&'a RegisterWindow>,
}

impl Mmio<'_> {
    /// A view over plain memory, for driver logic tests.
    #[cfg(test)]
    pub(crate) fn over(buffer: &mut [u32]) -> Mmio<'_> {
        Mmio {
            base: buffer.as_mut_ptr(),
            span: std::mem::size_of_val(buffer),
            _window: PhantomData,
        }
    }

    /// Read the 32-bit register at `offset` bytes.
    pub fn read(&self, offset: usize) -> u32 {
        debug_assert!(offset % 4 == 0 && offset + 4 <= self.span);
        unsafe { std::ptr::read_volatile(self.base.add(offset / 4)) }
    }

    /// Write the 32-bit register at `offset` bytes.
    pub fn write(&self, offset: usize, value: u32) {
        debug_assert!(offset % 4 == 0 && offset + 4 <= self.span);
        unsafe { std::ptr::write_volatile(self.base.add(offset / 4), value) }
    }
}
