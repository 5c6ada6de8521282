use std::ops::Deref;
use derive_more::{Constructor, From};
use once_cell::sync::Lazy;
use teloxide::types::User;

static DEFAULT: Lazy<LanguageCode> = Lazy::new(|| LanguageCode("en".to_string()));
const SUPPORTED: [&str; 2] = ["en", "ru"];

#[derive(Clone, Debug, Constructor, From, PartialEq, Eq)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn from_user(user: &User) -> Self {
        let maybe_code = Self::get_language_code_or_log_if_missing(user);
        Self::from_maybe_string(maybe_code)
    }

    pub fn from_maybe_user(maybe_user: Option<&User>) -> Self {
        let maybe_code = maybe_user.and_then(Self::get_language_code_or_log_if_missing);
        Self::from_maybe_string(maybe_code)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    fn get_language_code_or_log_if_missing(user: &User) -> Option<&String> {
        user.language_code.as_ref()
            .or_else(|| {
                log::debug!("no language_code for {}, using the default", user.id);
                None
            })
    }

    fn from_maybe_string(maybe_string: Option<&String>) -> Self {
        maybe_string
            .and_then(|tag| tag.split(['-', '_']).next())
            .map(|primary| match primary.to_ascii_lowercase().as_str() {
                "uk" | "be" => "ru".to_owned(),
                tag => tag.to_owned()
            })
            .filter(|code| SUPPORTED.contains(&code.as_str()))
            .map(Self)
            .unwrap_or_else(|| DEFAULT.clone())
    }
}

impl Deref for LanguageCode {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl From<&User> for LanguageCode {
    fn from(value: &User) -> Self {
        Self::from_user(value)
    }
}

impl Default for LanguageCode {
    fn default() -> Self {
        DEFAULT.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_maybe_string() {
        let code = |s: &str| LanguageCode::from_maybe_string(Some(&s.to_owned()));
        assert_eq!(code("ru").as_str(), "ru");
        assert_eq!(code("en-US").as_str(), "en");
        assert_eq!(code("uk").as_str(), "ru");
        assert_eq!(code("de").as_str(), "en");
        assert_eq!(LanguageCode::from_maybe_string(None).as_str(), "en");
    }
}
