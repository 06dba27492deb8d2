#![forbid(unsafe_code)]

//! Render layer: the software surface, the byte/pixel cell codec, the
//! integrity trailer, and the self-describing header.

pub mod codec;
pub mod header;
pub mod integrity;
pub mod surface;

pub use codec::CellCodec;
pub use header::{FORMAT_VERSION, HEADER_CELLS, HEADER_MAGIC, HeaderFlags, HeapHeader};
pub use integrity::{TRAILER_LEN, Trailer, fnv1a32, xor_ecc};
pub use surface::{SoftwareFactory, SoftwareSurface};
