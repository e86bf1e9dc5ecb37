pub mod config;
pub mod dates;
pub mod db;
pub mod model;
pub mod notifications;
pub mod source;
pub mod supabase;

pub use model::{
    Communication, Milestone, Notification, NotificationKey, NotificationKind, Timeline,
};
pub use notifications::{generate_notifications, GeneratorSettings, NotificationGenerator};
pub use source::CommunicationSource;
