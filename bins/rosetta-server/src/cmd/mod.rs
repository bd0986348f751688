pub mod history;
pub mod serve;
pub mod transform;
