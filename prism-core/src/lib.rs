//! # prism-core: Document virtualization for Prism
//!
//! Presents one generated, monolithic markup document as a small
//! multi-file project and writes edits to any one file back.
//!
//! ```text
//!                     split()
//! ┌──────────────┐ ───────────► ┌──────────────┐
//! │ Monolithic   │              │ index.html   │  whole document
//! │ document     │              │ styles.css   │  first <style> body
//! │ (Project)    │ ◄─────────── │ App.tsx      │  first babel script body
//! └──────────────┘    merge()   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`document`]: Region parser (byte ranges, structural splice)
//! - [`vfs`]: Virtual file split/merge
//! - [`project`]: Project record, chat and version history
//! - [`workspace`]: Ordered project list with a current selection

pub mod document;
pub mod vfs;
pub mod project;
pub mod workspace;

// Re-exports for convenience
pub use document::{Language, ParsedDocument, Region, RegionKind};
pub use vfs::{merge, split, FileTarget, VirtualFile, ROOT_FILE};
pub use project::{
    now_millis, GeneratedApp, Generation, Message, Project, Role, GENERATION_ERROR_MESSAGE,
    UNTITLED_PROJECT,
};
pub use workspace::ProjectList;
