/// Rejection of user input. Reported back to the requester, nothing is posted or persisted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ValidationError {
    #[display("no recipients")]
    NoRecipients,
    #[display("empty body")]
    EmptyBody,
}

impl ValidationError {
    /// Localization key of the user-facing explanation.
    pub fn translation_key(&self) -> &'static str {
        match self {
            ValidationError::NoRecipients => "commands.announce.errors.no_recipients",
            ValidationError::EmptyBody => "commands.announce.errors.empty_body",
        }
    }
}
