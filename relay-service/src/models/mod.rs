pub mod notification;
pub mod response;

pub use notification::{
    NotificationRequest, PushMessage, RecipientRecord, PUSH_TOKEN_FIELD,
    RELAYED_NOTIFICATION_TITLE,
};
pub use response::RelayResponse;
