//! Small async file helpers shared by the stores.

pub mod operations;
