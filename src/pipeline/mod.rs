//! Pipeline stages for CSV-to-PDF conversion.
//!
//! Each submodule implements exactly one transformation step and can be
//! tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ load ──▶ markup ──▶ layout ──▶ render
//! (path/URL) (decode+parse) (escape) (widths, wrap, pages) (lopdf)
//! ```
//!
//! 1. [`input`]  — read a local file or download a URL into a `RawUpload`;
//!    filename and size checks
//! 2. [`load`]   — decode with an encoding fallback ladder, sniff the
//!    delimiter, parse into a [`crate::table::Table`] capped at
//!    [`load::MAX_ROWS`] rows
//! 3. [`markup`] — escape cell text into paragraph markup
//! 4. [`layout`] — column widths, word wrapping and pagination with the
//!    header repeated on each page; uses [`fonts`] metrics
//! 5. [`render`] — draw the layout into PDF bytes; CPU-bound, so async
//!    callers run it in `spawn_blocking`

pub mod fonts;
pub mod input;
pub mod layout;
pub mod load;
pub mod markup;
pub mod render;
