//! Pre-configured test data fixtures.

use lc_protocol::{ChatDraft, Role, UserProfile};

/// An instructor profile named after its id.
#[must_use]
pub fn instructor(id: &str) -> UserProfile {
    UserProfile::new(id, format!("Instructor {id}"), Role::Instructor)
}

/// A student profile named after its id.
#[must_use]
pub fn student(id: &str) -> UserProfile {
    UserProfile::new(id, format!("Student {id}"), Role::Student)
}

/// A chat draft from `user` carrying `content`.
#[must_use]
pub fn chat(user: &UserProfile, content: &str) -> ChatDraft {
    ChatDraft {
        id: None,
        user_id: user.id.clone(),
        user_name: Some(user.name.clone()),
        user_avatar: user.avatar.clone(),
        content: content.to_string(),
    }
}

/// A fresh room id, unique per call.
#[must_use]
pub fn room_id(prefix: &str) -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(1);
    format!("{prefix}-{}", NEXT.fetch_add(1, Ordering::Relaxed))
}
