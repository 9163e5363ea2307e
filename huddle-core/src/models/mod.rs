mod activity;
mod invitation;
mod member;
mod notification;
mod project;
mod task;
mod user;

pub use activity::*;
pub use invitation::*;
pub use member::*;
pub use notification::*;
pub use project::*;
pub use task::*;
pub use user::*;
