//! Build-time switches.

use serde::{Deserialize, Serialize};

use crate::error::BuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Edit,
    Read,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    pub mode: Mode,
    /// Active language: new language-tagged values get it, labels use it.
    pub language: String,
    /// Languages offered for translations.
    pub languages: Vec<String>,
    /// Edit per-language variants side by side (edit mode only).
    pub translation: bool,
    /// Read mode: leave out categories without a value.
    pub read_hide_blank: bool,
    /// Read mode: leave out categories the template does not list.
    pub read_hide_unlisted: bool,
    /// Read mode: show a single translation, in the active language when
    /// there is one.
    pub read_only_current_language: bool,
    /// Labels longer than this sit on their own row.
    pub label_length_limit: usize,
    /// Values longer than this get a multi-line field.
    pub value_length_limit: usize,
    /// Row span of multi-line fields when neither template nor schema says.
    pub text_row_span: usize,
    /// Keep the described resource's IRI from the metagraph.
    pub preserve_identifier: bool,
    pub default_tab: String,
    /// Tab receiving data the template does not place.
    pub other_tab: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Edit,
            language: "fr".to_string(),
            languages: vec!["fr".to_string(), "en".to_string()],
            translation: false,
            read_hide_blank: true,
            read_hide_unlisted: true,
            read_only_current_language: true,
            label_length_limit: 25,
            value_length_limit: 65,
            text_row_span: 6,
            preserve_identifier: true,
            default_tab: "General".to_string(),
            other_tab: "Other".to_string(),
        }
    }
}

impl BuildOptions {
    pub fn read() -> Self {
        Self {
            mode: Mode::Read,
            ..Self::default()
        }
    }

    pub fn translation() -> Self {
        Self {
            translation: true,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), BuildError> {
        if self.languages.is_empty() {
            return Err(BuildError::InvalidOptions(
                "the language list is empty".to_string(),
            ));
        }
        if !self.languages.contains(&self.language) {
            return Err(BuildError::InvalidOptions(format!(
                "active language {:?} is not in the language list {:?}",
                self.language, self.languages
            )));
        }
        if self.translation && self.mode == Mode::Read {
            return Err(BuildError::InvalidOptions(
                "translation mode requires edit mode".to_string(),
            ));
        }
        if self.text_row_span == 0 {
            return Err(BuildError::InvalidOptions(
                "text_row_span must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
