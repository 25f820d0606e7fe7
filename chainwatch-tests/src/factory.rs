mod filters;
mod jobs;
mod logs;
mod providers;
mod repos;

pub use filters::*;
pub use jobs::*;
pub use logs::*;
pub use providers::*;
pub use repos::*;
