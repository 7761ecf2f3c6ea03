mod queries;
pub mod schema;

pub use queries::ManifestDb;
