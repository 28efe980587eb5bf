//! Configuration types for TeX-to-PDF rendering.
//!
//! All engine behaviour is controlled through [`EngineConfig`], built via its
//! [`EngineConfigBuilder`] or loaded from JSON. The config is supplied once at
//! engine construction and never mutated afterwards.
//!
//! Compiler flags live in [`CompilerOptions`], an insertion-ordered mapping:
//! the order options were added is the order the flags appear on the
//! compiler's command line, so it is preserved through the builder and
//! through JSON deserialisation alike.

use crate::error::RenderError;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Compiler used when the config does not name one.
pub const DEFAULT_BINARY: &str = "/usr/bin/latexpdf";

/// Option key holding the staging/output directory.
pub const OUTPUT_DIRECTORY_KEY: &str = "output-directory";

/// Default subprocess deadline in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default staging directory: `<system temp>/pdf`.
pub fn default_output_directory() -> PathBuf {
    std::env::temp_dir().join("pdf")
}

/// Configuration for a [`crate::engine::TexToPdfEngine`].
///
/// # Example
/// ```rust
/// use edgequake_texpdf::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .binary("/usr/bin/pdflatex")
///     .option("interaction", "nonstopmode")
///     .switch("halt-on-error")
///     .timeout_secs(60)
///     .build()
///     .unwrap();
/// assert_eq!(config.options.len(), 3); // output-directory is always present
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Compiler binary override. `None` means [`DEFAULT_BINARY`].
    pub binary: Option<PathBuf>,

    /// Ordered compiler flags. Always carries `output-directory` unless a
    /// caller removes it, in which case [`EngineConfigBuilder::build`] fails.
    pub options: CompilerOptions,

    /// Encoding used to measure the length of the compiler's stdout.
    pub encoding: TextEncoding,

    /// Subprocess deadline. `None` waits forever. Default: 120.
    pub timeout_secs: Option<u64>,

    /// Leave `.aux`/`.log`/`.pdf` on disk when classification fails. Default: false.
    pub keep_failed_artifacts: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut options = CompilerOptions::new();
        options.insert(
            OUTPUT_DIRECTORY_KEY,
            OptionValue::Value(default_output_directory().to_string_lossy().into_owned()),
        );
        Self {
            binary: None,
            options,
            encoding: TextEncoding::default(),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            keep_failed_artifacts: false,
        }
    }
}

impl EngineConfig {
    /// Create a new builder for `EngineConfig`.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Reopen this config for changes; `build()` validates again.
    pub fn into_builder(self) -> EngineConfigBuilder {
        EngineConfigBuilder { config: self }
    }

    /// Parse a JSON config document. Keys missing from the document keep
    /// their defaults; `options` entries are merged over the defaults in
    /// document order.
    pub fn from_json_str(json: &str) -> Result<Self, RenderError> {
        let file: EngineConfigFile = serde_json::from_str(json)
            .map_err(|e| RenderError::InvalidConfig(format!("config JSON: {e}")))?;
        file.into_builder().build()
    }

    /// Read and parse a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RenderError::InvalidConfig(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// The staging directory, taken from the `output-directory` option.
    pub fn output_directory(&self) -> Option<PathBuf> {
        match self.options.get(OUTPUT_DIRECTORY_KEY) {
            Some(value @ OptionValue::Value(dir)) if !value.is_empty() => Some(PathBuf::from(dir)),
            _ => None,
        }
    }
}

/// On-disk shape of a JSON config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EngineConfigFile {
    binary: Option<PathBuf>,
    #[serde(default)]
    options: CompilerOptions,
    encoding: Option<TextEncoding>,
    #[serde(default, deserialize_with = "deserialize_timeout")]
    timeout_secs: Option<Option<u64>>,
    keep_failed_artifacts: Option<bool>,
}

/// Distinguishes `"timeout_secs": null` (disable) from an absent key (default).
fn deserialize_timeout<'de, D>(deserializer: D) -> Result<Option<Option<u64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<u64>::deserialize(deserializer).map(Some)
}

impl EngineConfigFile {
    fn into_builder(self) -> EngineConfigBuilder {
        let mut builder = EngineConfig::builder();
        if let Some(binary) = self.binary {
            builder = builder.binary(binary);
        }
        for (key, value) in self.options.into_iter() {
            builder.config.options.insert(key, value);
        }
        if let Some(encoding) = self.encoding {
            builder = builder.encoding(encoding);
        }
        builder = match self.timeout_secs {
            Some(Some(secs)) => builder.timeout_secs(secs),
            Some(None) => builder.no_timeout(),
            None => builder,
        };
        if let Some(keep) = self.keep_failed_artifacts {
            builder = builder.keep_failed_artifacts(keep);
        }
        builder
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.binary = Some(path.into());
        self
    }

    /// Set the staging directory (also passed as `--output-directory`).
    pub fn output_directory(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.options.insert(
            OUTPUT_DIRECTORY_KEY,
            OptionValue::Value(dir.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Add a `--key <value>` flag.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .options
            .insert(key, OptionValue::Value(value.into()));
        self
    }

    /// Add a bare `--key` flag.
    pub fn switch(mut self, key: impl Into<String>) -> Self {
        self.config.options.insert(key, OptionValue::Switch(true));
        self
    }

    /// Add an option with an explicit [`OptionValue`].
    pub fn option_value(mut self, key: impl Into<String>, value: OptionValue) -> Self {
        self.config.options.insert(key, value);
        self
    }

    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = Some(secs.max(1));
        self
    }

    pub fn no_timeout(mut self) -> Self {
        self.config.timeout_secs = None;
        self
    }

    pub fn keep_failed_artifacts(mut self, keep: bool) -> Self {
        self.config.keep_failed_artifacts = keep;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EngineConfig, RenderError> {
        let c = &self.config;
        if c.output_directory().is_none() {
            return Err(RenderError::InvalidConfig(format!(
                "option '{OUTPUT_DIRECTORY_KEY}' must name a directory"
            )));
        }
        if let Some(binary) = &c.binary {
            if binary.as_os_str().is_empty() {
                return Err(RenderError::InvalidConfig(
                    "binary path must not be empty".into(),
                ));
            }
        }
        if let Some(bad) = c.options.keys().find(|k| !is_valid_option_key(k)) {
            return Err(RenderError::InvalidConfig(format!(
                "invalid option name '{bad}': use letters, digits, '-' or '_'"
            )));
        }
        Ok(self.config)
    }
}

fn is_valid_option_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('-')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ── Option values ────────────────────────────────────────────────────────

/// The value of one compiler option.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OptionValue {
    /// Explicitly absent: the flag is omitted.
    #[default]
    Unset,
    /// `true` emits a bare `--key`; `false` omits the flag.
    Switch(bool),
    /// Emits `--key <value>`; `""` and `"0"` omit the flag.
    Value(String),
}

impl OptionValue {
    /// True when the option contributes nothing to the command line.
    pub fn is_empty(&self) -> bool {
        match self {
            OptionValue::Unset | OptionValue::Switch(false) => true,
            OptionValue::Switch(true) => false,
            OptionValue::Value(v) => v.is_empty() || v == "0",
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Switch(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Value(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Value(v)
    }
}

impl Serialize for OptionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OptionValue::Unset => serializer.serialize_none(),
            OptionValue::Switch(b) => serializer.serialize_bool(*b),
            OptionValue::Value(v) => serializer.serialize_str(v),
        }
    }
}

impl<'de> Deserialize<'de> for OptionValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OptionValueVisitor;

        impl<'de> Visitor<'de> for OptionValueVisitor {
            type Value = OptionValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("null, a boolean, a string or a number")
            }

            fn visit_unit<E>(self) -> Result<OptionValue, E> {
                Ok(OptionValue::Unset)
            }

            fn visit_none<E>(self) -> Result<OptionValue, E> {
                Ok(OptionValue::Unset)
            }

            fn visit_bool<E>(self, v: bool) -> Result<OptionValue, E> {
                Ok(OptionValue::Switch(v))
            }

            fn visit_str<E>(self, v: &str) -> Result<OptionValue, E> {
                Ok(OptionValue::Value(v.to_string()))
            }

            fn visit_string<E>(self, v: String) -> Result<OptionValue, E> {
                Ok(OptionValue::Value(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<OptionValue, E> {
                Ok(OptionValue::Value(v.to_string()))
            }

            fn visit_u64<E>(self, v: u64) -> Result<OptionValue, E> {
                Ok(OptionValue::Value(v.to_string()))
            }

            fn visit_f64<E>(self, v: f64) -> Result<OptionValue, E> {
                // -0.0 would print as "-0"
                if v == 0.0 {
                    return Ok(OptionValue::Value("0".to_string()));
                }
                Ok(OptionValue::Value(v.to_string()))
            }
        }

        deserializer.deserialize_any(OptionValueVisitor)
    }
}

// ── Ordered option map ───────────────────────────────────────────────────

/// Insertion-ordered map of option name → [`OptionValue`].
///
/// Re-inserting an existing key replaces its value in place, so overriding a
/// default never moves the flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerOptions {
    entries: Vec<(String, OptionValue)>,
}

impl CompilerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the previous value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<OptionValue>,
    ) -> Option<OptionValue> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl IntoIterator for CompilerOptions {
    type Item = (String, OptionValue);
    type IntoIter = std::vec::IntoIter<(String, OptionValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for CompilerOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = CompilerOptions::new();
        for (k, v) in iter {
            options.insert(k, v);
        }
        options
    }
}

impl Serialize for CompilerOptions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CompilerOptions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = CompilerOptions;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of option names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<CompilerOptions, A::Error> {
                let mut options = CompilerOptions::new();
                while let Some((key, value)) = access.next_entry::<String, OptionValue>()? {
                    options.insert(key, value);
                }
                Ok(options)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

// ── Encoding ─────────────────────────────────────────────────────────────

/// Text encoding used to measure the length of captured compiler output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextEncoding {
    /// Length in Unicode scalar values; invalid sequences count as one each.
    #[default]
    #[serde(rename = "UTF-8", alias = "utf-8", alias = "utf8")]
    Utf8,
    /// Single-byte encoding: length in bytes.
    #[serde(rename = "ISO-8859-1", alias = "latin1", alias = "iso-8859-1")]
    Latin1,
}

impl TextEncoding {
    /// Number of characters `bytes` decodes to in this encoding.
    pub fn char_len(&self, bytes: &[u8]) -> usize {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).chars().count(),
            TextEncoding::Latin1 => bytes.len(),
        }
    }
}

impl FromStr for TextEncoding {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "iso-8859-1" | "latin1" | "latin-1" => Ok(TextEncoding::Latin1),
            other => Err(RenderError::InvalidConfig(format!(
                "unsupported encoding '{other}' (expected UTF-8 or ISO-8859-1)"
            ))),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextEncoding::Utf8 => f.write_str("UTF-8"),
            TextEncoding::Latin1 => f.write_str("ISO-8859-1"),
        }
    }
}
