pub mod fleet;
pub mod motion;
