use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::config::ConfigError;
use crate::types::SourceLanguage;

const INVALID_FILE_EXT_CHARS: [char; 2] = ['/', '.'];

/// File extension without dot (e.g., "py")
///
/// Case is preserved: R scripts are staged as `.R`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileExtension(String);

impl FileExtension {
    pub fn new(extension: &str) -> Result<Self, ConfigError> {
        let contains_invalid = extension
            .chars()
            .any(|c| INVALID_FILE_EXT_CHARS.contains(&c));
        if contains_invalid {
            return Err(ConfigError::InvalidFileExtChars);
        }
        Ok(Self(extension.to_owned()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for FileExtension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileExtension::new(&s).map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"a file extension without '/' or '.' characters",
            )
        })
    }
}

impl std::fmt::Display for FileExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interpreter used to run scripts of one language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interpreter {
    /// Program and fixed arguments. The staged script path and the artifact
    /// path are appended at run time.
    pub command: Vec<String>,

    /// Extension given to staged scripts
    pub extension: FileExtension,

    /// Environment variables to set for the interpreter
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Interpreter {
    fn new(command: &str, extension: &str) -> Self {
        Self {
            command: vec![command.to_owned()],
            extension: FileExtension(extension.to_owned()),
            env: HashMap::new(),
        }
    }
}

/// Interpreter table, one entry per supported language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Languages {
    #[serde(default = "default_python")]
    pub python: Interpreter,

    #[serde(default = "default_r")]
    pub r: Interpreter,
}

impl Languages {
    /// Get the interpreter for a language
    pub fn get(&self, language: SourceLanguage) -> &Interpreter {
        match language {
            SourceLanguage::Python => &self.python,
            SourceLanguage::R => &self.r,
        }
    }
}

impl Default for Languages {
    fn default() -> Self {
        Self {
            python: default_python(),
            r: default_r(),
        }
    }
}

fn default_python() -> Interpreter {
    let mut python = Interpreter::new("python", "py");
    python.env.insert("MPLBACKEND".to_owned(), "Agg".to_owned());
    python
}

fn default_r() -> Interpreter {
    Interpreter::new("Rscript", "R")
}

/// Artifact extensions by visualization kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputFormats {
    /// Raster image, used for static plots
    #[serde(default = "default_image")]
    pub image: FileExtension,

    /// Document, used for interactive and 3d plots
    #[serde(default = "default_document")]
    pub document: FileExtension,
}

impl Default for OutputFormats {
    fn default() -> Self {
        Self {
            image: default_image(),
            document: default_document(),
        }
    }
}

fn default_image() -> FileExtension {
    FileExtension("png".to_owned())
}

fn default_document() -> FileExtension {
    FileExtension("html".to_owned())
}
