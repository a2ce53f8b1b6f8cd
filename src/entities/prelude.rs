pub use super::conversations::Entity as Conversations;
pub use super::files::Entity as Files;
pub use super::messages::Entity as Messages;
pub use super::notes::Entity as Notes;
pub use super::users::Entity as Users;
