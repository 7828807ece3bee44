pub mod byte_scanner;
pub mod decoder;
pub mod source;

pub use byte_scanner::{ByteScanner, SimdLevel};
pub use decoder::{decode, decode_scalar};
pub use source::{open_source, ByteSource, FileSource, InMemorySource, MmapSource, ReadStrategy};
