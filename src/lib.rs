pub mod cli;
pub mod command;
pub mod endian;
pub mod fat;
pub mod header;
pub mod helpers;
pub mod introspect;
pub mod loader;
pub mod machine;
pub mod macho;
pub mod segment;

#[cfg(test)]
pub(crate) mod testutil;

pub use command::{CommandCtx, LCLoadCommand, LoadCommand, LoadCommandView};
pub use endian::Endian;
pub use fat::{FatArch, FatHeader, FatObject};
pub use header::{MachHeader, Magic};
pub use introspect::IntrospectObject;
pub use loader::{MachFile, MachOLoader};
pub use machine::CpuType;
pub use macho::{MachOErr, MachOResult, MachObject};
pub use segment::DataSegment;
