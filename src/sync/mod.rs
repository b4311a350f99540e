pub mod server_mode;

pub use server_mode::{sync_push, PushRequest};
