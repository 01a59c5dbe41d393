//! Icon resolution pipeline.
//!
//! Resolves icon URLs to decoded, resized images through a memoizing
//! resolver, and sequences multi-icon batches for cluster badges.
//!
//! ```text
//! URL ──► IconResolver (memoized, coalesced) ──► IconImage
//!
//! [(threshold, URL); N] ──► resolve_batch (strictly sequential)
//!                                │
//!                                ▼
//!                        ClusterIconTable ──► icon_for_count(k)
//! ```
//!
//! Batch resolution is deliberately sequential: URL *N+1* is only requested
//! once URL *N* has succeeded or failed. This bounds concurrent network and
//! disk load and makes completion order equal submission order, which the
//! badge table relies on.

mod pipeline;
mod resolver;

pub use pipeline::{resolve_batch, ClusterIconTable};
pub use resolver::{HttpIconResolver, IconError, IconImage, IconResolver};
