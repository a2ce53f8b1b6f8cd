pub mod prelude;

pub mod conversations;
pub mod files;
pub mod messages;
pub mod notes;
pub mod users;
