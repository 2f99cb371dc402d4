pub mod marketing;
pub mod task;
