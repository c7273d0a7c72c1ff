pub mod notification;
pub mod post;
pub mod push;
