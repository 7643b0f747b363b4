pub mod edits;
pub mod events;
pub mod messages;
pub mod payload;
