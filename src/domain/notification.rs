use serde::Serialize;

/// What a device shows for a new post. Built once per event, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub click_action: String,
}
