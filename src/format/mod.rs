// Container framing: the header byte and the variable-length size fields.

pub mod header;
pub mod varsize;

pub use header::{FORMAT_MATCH_BLOCKS, PatchHeader};
