use std::fmt::{Display, Formatter};
use crate::id;

id! {
    AnnouncementId,
    RecipientId,
    AcknowledgmentId
}

/// Identity of the reminder job of one recipient of one announcement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Constructor)]
pub struct JobKey {
    pub announcement_id: AnnouncementId,
    pub recipient_id: RecipientId,
}

impl Display for JobKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "reminder_{}_{}", self.announcement_id, self.recipient_id)
    }
}
