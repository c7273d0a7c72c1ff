pub mod dispatcher;
pub mod health_service;
pub mod notification_builder;
pub mod post_notification_service;
pub mod push_token_service;
