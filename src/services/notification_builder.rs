//! Fixed, unlocalized template for new lost-pet posts.

use crate::domain::notification::NotificationPayload;
use crate::domain::post::Post;

pub const TITLE: &str = "Yeni Kayıp Evcil Hayvan İlanı!";
pub const CLICK_ACTION: &str = "FLUTTER_NOTIFICATION_CLICK";
/// Stands in for the pet name when a post arrives without one.
pub const PLACEHOLDER_PET_NAME: &str = "Bir evcil hayvan";

/// Builds the notification shown for a newly created post. Never fails.
#[must_use]
pub fn build(post: &Post) -> NotificationPayload {
    let pet_name =
        post.pet_name.as_deref().map(str::trim).filter(|name| !name.is_empty()).unwrap_or(PLACEHOLDER_PET_NAME);

    NotificationPayload {
        title: TITLE.to_string(),
        body: format!("{pet_name} kayboldu. Hemen inceleyin!"),
        click_action: CLICK_ACTION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(pet_name: Option<&str>) -> Post {
        Post { id: "p-1".into(), pet_name: pet_name.map(Into::into), created_at: None }
    }

    #[test]
    fn test_body_contains_pet_name() {
        for name in ["Max", "Boncuk", "Mr. Whiskers", "Şeker"] {
            let payload = build(&post(Some(name)));
            assert!(payload.body.contains(name), "body {:?} should mention {name}", payload.body);
        }
    }

    #[test]
    fn test_full_payload_for_named_pet() {
        let payload = build(&post(Some("Max")));
        assert_eq!(payload.title, TITLE);
        assert_eq!(payload.body, "Max kayboldu. Hemen inceleyin!");
        assert_eq!(payload.click_action, CLICK_ACTION);
    }

    #[test]
    fn test_missing_pet_name_uses_placeholder() {
        let payload = build(&post(None));
        assert_eq!(payload.body, "Bir evcil hayvan kayboldu. Hemen inceleyin!");
        assert_eq!(payload.title, TITLE);
    }

    #[test]
    fn test_blank_pet_name_uses_placeholder() {
        assert_eq!(build(&post(Some(""))).body, build(&post(None)).body);
        assert_eq!(build(&post(Some("   "))).body, build(&post(None)).body);
    }
}
