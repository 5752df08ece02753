pub mod amplicon;
pub mod executor;
pub mod summary;
