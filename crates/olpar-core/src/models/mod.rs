//! Data models for Olpar

mod record;
mod user;

pub use record::{
    image_data_uri, sort_newest_first, verification_link, AiValidation, AuditRecord, ClientInfo,
    ClientValidationStatus, Coords, ImageSlot, RecordImages, MAX_IMAGE_BYTES,
};
pub use user::{
    default_admin, ensure_default_admin, Role, UserProfile, AVATAR_PALETTE, DEFAULT_ADMIN_ID,
};
