use rust_i18n::t;
use serde::Serialize;
use teloxide::utils::html;
use tinytemplate::TinyTemplate;
use crate::domain::LanguageCode;

static EN_HELP: &str = include_str!("en.html");
static RU_HELP: &str = include_str!("ru.html");

#[derive(Clone)]
pub struct HelpContainer {
    en: String,
    ru: String,
}

impl HelpContainer {
    pub fn get_start_message(&self, name: &str, lang_code: &LanguageCode) -> String {
        let greeting = t!("titles.greeting", locale = lang_code);
        format!("{}, <b>{}</b>!\n\n{}", greeting, html::escape(name), self.get_help_message(lang_code))
    }

    pub fn get_help_message(&self, lang_code: &LanguageCode) -> String {
        match lang_code.as_str() {
            "ru" => self.ru.clone(),
            _ => self.en.clone()
        }
    }
}

#[derive(Serialize, Clone)]
pub struct Context {
    pub bot_name: String,
    pub reminder_time: String,
}

pub fn render_help_messages(context: Context) -> Result<HelpContainer, tinytemplate::error::Error> {
    let mut tt = TinyTemplate::new();
    tt.add_template("en", EN_HELP)?;
    tt.add_template("ru", RU_HELP)?;
    Ok(HelpContainer {
        en: tt.render("en", &context)?,
        ru: tt.render("ru", &context)?,
    })
}
