//! Streams an HTML entry into a live container and reports when its entry
//! script has initialized.
//!
//! ```text
//! fetch -> utf-8 decode -> [stream transformer] -> <head> marker substitution
//!       -> tree sink (per-node transform, append) -> entry tracker
//! ```

pub mod container;
pub mod deferred;
pub mod pipeline;
pub mod sandbox;
pub mod sink;
pub mod tracker;
pub mod transform;

mod error;
mod loader;
mod source;

pub use crate::container::{Container, MemoryContainer, ScriptEvent, ScriptWatch, Snapshot};
pub use crate::deferred::{Deferred, Promise, Status};
pub use crate::error::{ContainerError, LoadError, TransformError};
pub use crate::loader::{
    DEFAULT_PRIVATE_HEAD_TAG, EntryLoad, LoaderOptions, StreamTransformerFactory, load_entry,
    start_entry_load,
};
pub use crate::sandbox::{EntryValue, MemorySandbox, Sandbox};
pub use crate::source::EntrySource;
pub use crate::tracker::EntryTracker;
pub use crate::transform::{
    AssetRewriter, BaseUrlResolver, ModuleResolver, NodeTransformer, TransformContext,
    transform_fn,
};
