pub mod naming;
pub mod path;
pub mod sql;
