//! The inscribe pipeline: detach an unsigned engine for external signing and
//! reattach the signed result to the original bundle's attached container.
//!
//! Both operations stage all mutation in a temp file inside the intermediate
//! folder and publish with a single rename, so a process killed mid-copy
//! leaves only a discardable temp file, never a corrupted file at the final
//! path.

mod detach;
mod reattach;

pub use detach::detach_engine;
pub use reattach::reattach_engine;
