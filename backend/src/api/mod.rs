pub mod admin;
pub mod auth;
pub mod channel;
pub mod pipeline;
pub mod video;

pub use admin::*;
pub use auth::*;
pub use channel::*;
pub use pipeline::*;
pub use video::*;
