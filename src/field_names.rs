//! Locale-dependent remote column names.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Locale {
    #[serde(rename = "zh-cn")]
    ZhCn,
    #[serde(rename = "en")]
    En,
    #[serde(rename = "zh-tw")]
    ZhTw,
}

impl Locale {
    /// Map a language tag (`zh-CN`, `en_US.UTF-8`, ...) to a locale, falling back to English.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag
            .split('.')
            .next()
            .unwrap_or_default()
            .replace('_', "-")
            .to_ascii_lowercase();
        match tag.as_str() {
            "zh-cn" | "zh" | "zh-hans" | "zh-sg" => Self::ZhCn,
            "zh-tw" | "zh-hk" | "zh-hant" => Self::ZhTw,
            _ => Self::En,
        }
    }

    /// Locale of the running environment, from `LC_ALL`/`LANG`.
    pub fn from_env() -> Self {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
            .map(|tag| Self::from_tag(&tag))
            .unwrap_or(Self::En)
    }
}

/// Which locale the column names are chosen for. `auto` follows the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Auto,
    Fixed(Locale),
}

impl Serialize for Language {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Auto => serializer.serialize_str("auto"),
            Self::Fixed(locale) => locale.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        match tag.as_str() {
            "auto" => Ok(Self::Auto),
            "zh-cn" => Ok(Self::Fixed(Locale::ZhCn)),
            "en" => Ok(Self::Fixed(Locale::En)),
            "zh-tw" => Ok(Self::Fixed(Locale::ZhTw)),
            other => Err(serde::de::Error::unknown_variant(
                other,
                &["auto", "zh-cn", "en", "zh-tw"],
            )),
        }
    }
}

impl Language {
    pub fn resolve(self) -> Locale {
        match self {
            Self::Auto => Locale::from_env(),
            Self::Fixed(locale) => locale,
        }
    }
}

/// Remote column names for each logical note field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub title: String,
    pub content: String,
    pub sub_folder: String,
    pub extension: String,
}

/// Partial override of a [`FieldMapping`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

impl FieldMapping {
    pub fn for_locale(locale: Locale) -> Self {
        let (title, content, sub_folder) = match locale {
            Locale::ZhCn => ("Title", "MD", "SubFolder"),
            Locale::En => ("TitleEN", "MDEN", "SubFolderEN"),
            Locale::ZhTw => ("TitleTW", "MDTW", "SubFolderTW"),
        };
        Self {
            title: title.into(),
            content: content.into(),
            sub_folder: sub_folder.into(),
            extension: "Extension".into(),
        }
    }

    pub fn with_overrides(mut self, overrides: &FieldOverrides) -> Self {
        if let Some(title) = &overrides.title {
            self.title = title.clone();
        }
        if let Some(content) = &overrides.content {
            self.content = content.clone();
        }
        if let Some(sub_folder) = &overrides.sub_folder {
            self.sub_folder = sub_folder.clone();
        }
        if let Some(extension) = &overrides.extension {
            self.extension = extension.clone();
        }
        self
    }

    /// Column names to request from the remote table.
    pub fn columns(&self) -> [&str; 4] {
        [
            self.title.as_str(),
            self.content.as_str(),
            self.sub_folder.as_str(),
            self.extension.as_str(),
        ]
    }
}
