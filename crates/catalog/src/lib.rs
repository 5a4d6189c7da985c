//! Catalog master data: the category taxonomy, brands and locations.
//!
//! Pure domain logic (no IO, no HTTP, no storage).

pub mod brand;
pub mod category;
pub mod hierarchy;
pub mod location;
pub mod path;

pub use brand::{Brand, BrandInput};
pub use category::Category;
pub use hierarchy::{
    BulkError, BulkOperation, BulkReport, CategoryExportRow, CategoryHierarchy, CategoryImportRow,
    CategoryStatistics, CategoryTreeNode, CategoryUpdate, CheckedOperation, ImportReport, NewCategory,
    OperationCheck, Outcome, RowError,
};
pub use location::{Location, LocationInput, LocationType};
pub use path::CategoryPath;
