use derive_more::{Display, Error};
use teloxide::types::CallbackQuery;

#[derive(Debug, Display, Error)]
pub enum InvalidCallbackData {
    NoData,
    #[display("WrongPrefix(data={data}, prefix={prefix})")]
    WrongPrefix { data: String, prefix: String },
    #[display("MissingPart(data={data}, part={part})")]
    MissingPart { data: String, part: String },
    #[display("InvalidFormat(data={data}, error={error})")]
    InvalidFormat { data: String, error: Box<dyn std::error::Error + Send + Sync> },
}

pub struct InvalidCallbackDataBuilder<'a, T: ToString>(pub &'a T);

impl <'a, T: ToString> InvalidCallbackDataBuilder<'a, T> {
    pub fn wrong_prefix(&self, prefix: impl ToString) -> InvalidCallbackData {
        InvalidCallbackData::WrongPrefix {
            data: self.0.to_string(),
            prefix: prefix.to_string()
        }
    }

    pub fn missing_part(&self, part: &str) -> InvalidCallbackData {
        InvalidCallbackData::MissingPart {
            data: self.0.to_string(),
            part: part.to_owned()
        }
    }

    pub fn parsing_err(&self, err: impl std::error::Error + Send + Sync + 'static) -> InvalidCallbackData {
        InvalidCallbackData::InvalidFormat {
            data: self.0.to_string(),
            error: Box::new(err)
        }
    }
}

/// Data of inline buttons in the `prefix:payload` format.
pub trait CallbackDataWithPrefix<E = InvalidCallbackData>: TryFrom<String, Error = E> + std::fmt::Display
    where E: std::error::Error + Send + Sync + 'static
{
    fn prefix() -> &'static str;

    fn check_prefix(query: CallbackQuery) -> bool {
        query.data
            .filter(|data| data.split_once(':')
                .map(|(prefix, _)| prefix == Self::prefix())
                .unwrap_or(false))
            .is_some()
    }

    fn parse(query: &CallbackQuery) -> Result<Self, InvalidCallbackData> {
        let data = query.data.as_ref().ok_or(InvalidCallbackData::NoData)?;
        let err = InvalidCallbackDataBuilder(data);
        let value = match data.split_once(':') {
            Some((prefix, rest)) if prefix == Self::prefix() => Ok(rest.to_owned()),
            Some((prefix, _)) => Err(err.wrong_prefix(prefix)),
            None => Err(InvalidCallbackData::NoData)
        }?;
        Self::try_from(value).map_err(|e| err.parsing_err(e))
    }

    fn to_data_string(&self) -> String {
        format!("{}:{}", Self::prefix(), self)
    }
}
