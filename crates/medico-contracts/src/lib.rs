pub mod events;
pub mod forms;
pub mod panels;
pub mod schema;
