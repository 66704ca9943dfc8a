//! Loader, writer and remote-sheet collaborators around the core.

pub mod loader;
pub mod remote;
pub mod writer;

pub use loader::load_workbook;
pub use writer::{output_path, write_table_xlsx, write_upload_csv, write_upload_xlsx, SheetStyle};
