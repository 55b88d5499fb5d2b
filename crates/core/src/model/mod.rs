mod ids;
mod material;
mod media;
mod notification;
mod quiz;
mod record;
mod site;
mod user;

pub use ids::{MaterialId, NotificationId, ParseIdError, RecordId, SiteId, UserId};
pub use material::{
    DEFAULT_MONTH, Material, MaterialContent, MaterialDraft, MaterialError, MaterialKind, Slide,
    ValidatedMaterial,
};
pub use media::{MediaError, MediaUrl, VideoSource, extract_embed_id};
pub use notification::Notification;
pub use quiz::{PASS_THRESHOLD, Quiz, QuizError, QuizQuestion, QuizQuestionDraft, QuizScore};
pub use record::{CompletionRecord, NewCompletion};
pub use site::{Company, Site, SiteDraft, SiteError};
pub use user::{
    FALLBACK_GUARD_PASSWORD, Role, User, UserDraft, UserError, default_guard_password,
    normalize_phone,
};
