/// Conversion between a setting's typed value and its stored string.
pub trait SettingValue: Clone + Send + Sync + 'static {
    fn encode(&self) -> String;
    fn decode(raw: &str) -> Result<Self, String>;
}

/// Raw strings are stored as-is.
impl SettingValue for String {
    fn encode(&self) -> String {
        self.clone()
    }

    fn decode(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }
}

/// A string setting where the empty string means "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionalString(pub Option<String>);

impl OptionalString {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl SettingValue for OptionalString {
    fn encode(&self) -> String {
        self.0.clone().unwrap_or_default()
    }

    fn decode(raw: &str) -> Result<Self, String> {
        Ok(Self((!raw.is_empty()).then(|| raw.to_string())))
    }
}
