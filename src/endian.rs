//! Byte order handling for Mach-O objects.
//!
//! Every multi-byte field inside a single-architecture object is stored in
//! the byte order announced by its magic. Fat headers are always big-endian.

use nom::{number::complete, IResult};

/// Integers whose byte order can be reversed.
pub trait Swap: Copy {
    fn swap(self) -> Self;
}

impl Swap for u16 {
    fn swap(self) -> Self {
        self.swap_bytes()
    }
}

impl Swap for u32 {
    fn swap(self) -> Self {
        self.swap_bytes()
    }
}

impl Swap for u64 {
    fn swap(self) -> Self {
        self.swap_bytes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub const fn host() -> Endian {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    pub fn is_big(self) -> bool {
        self == Endian::Big
    }

    /// Converts a value read in host order from a file with this byte order.
    /// The transform is its own inverse.
    pub fn to_host<T: Swap>(self, value: T) -> T {
        if self.is_big() != Endian::host().is_big() {
            value.swap()
        } else {
            value
        }
    }

    pub fn to_file<T: Swap>(self, value: T) -> T {
        self.to_host(value)
    }

    pub fn u16_bytes(self, value: u16) -> [u8; 2] {
        self.to_file(value).to_ne_bytes()
    }

    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        self.to_file(value).to_ne_bytes()
    }

    pub fn u64_bytes(self, value: u64) -> [u8; 8] {
        self.to_file(value).to_ne_bytes()
    }

    pub fn u16(self, bytes: &[u8]) -> IResult<&[u8], u16> {
        complete::u16(self.into())(bytes)
    }

    pub fn u32(self, bytes: &[u8]) -> IResult<&[u8], u32> {
        complete::u32(self.into())(bytes)
    }

    pub fn u64(self, bytes: &[u8]) -> IResult<&[u8], u64> {
        complete::u64(self.into())(bytes)
    }
}

impl From<Endian> for nom::number::Endianness {
    fn from(endian: Endian) -> Self {
        match endian {
            Endian::Little => nom::number::Endianness::Little,
            Endian::Big => nom::number::Endianness::Big,
        }
    }
}
