use tandem_protocol::LanguageData;

/// Languages users can declare as native or target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportedLanguage {
    English,
    Spanish,
    Portuguese,
    French,
    German,
    Italian,
    Russian,
    Japanese,
    Chinese,
}

impl SupportedLanguage {
    /// Catalog order, as served to clients
    pub const ALL: [SupportedLanguage; 9] = [
        SupportedLanguage::English,
        SupportedLanguage::Spanish,
        SupportedLanguage::Portuguese,
        SupportedLanguage::French,
        SupportedLanguage::German,
        SupportedLanguage::Italian,
        SupportedLanguage::Russian,
        SupportedLanguage::Japanese,
        SupportedLanguage::Chinese,
    ];

    pub fn code(self) -> &'static str {
        match self {
            SupportedLanguage::English => "en",
            SupportedLanguage::Spanish => "es",
            SupportedLanguage::Portuguese => "pt",
            SupportedLanguage::French => "fr",
            SupportedLanguage::German => "de",
            SupportedLanguage::Italian => "it",
            SupportedLanguage::Russian => "ru",
            SupportedLanguage::Japanese => "ja",
            SupportedLanguage::Chinese => "zh",
        }
    }

    /// Names as the catalog has always served them, in Portuguese
    pub fn display_name(self) -> &'static str {
        match self {
            SupportedLanguage::English => "Inglês",
            SupportedLanguage::Spanish => "Espanhol",
            SupportedLanguage::Portuguese => "Português",
            SupportedLanguage::French => "Francês",
            SupportedLanguage::German => "Alemão",
            SupportedLanguage::Italian => "Italiano",
            SupportedLanguage::Russian => "Russo",
            SupportedLanguage::Japanese => "Japonês",
            SupportedLanguage::Chinese => "Chinês",
        }
    }

    /// Case-insensitive lookup by ISO 639-1 code
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|lang| lang.code().eq_ignore_ascii_case(code))
    }

    pub fn to_data(self) -> LanguageData {
        LanguageData {
            code: self.code().to_string(),
            name: self.display_name().to_string(),
        }
    }

    pub fn catalog() -> Vec<LanguageData> {
        Self::ALL.into_iter().map(Self::to_data).collect()
    }
}
