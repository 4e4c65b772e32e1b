pub mod error;
pub mod list;
pub mod path_safety;
pub mod plan;
pub mod record;
pub mod restore;
pub mod timestamp;
pub mod volume;
pub mod walker;
