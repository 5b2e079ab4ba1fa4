//! Allows configuration stuff to be read from settings.json
//!
//! The built-in defaults for the measurement parameters live in the code;
//! a settings.json next to the binary can override them, and command line
//! flags override both.
use json::JsonValue;
use log::{info, warn};
use regex::Regex;
use std::{error::Error, fmt, io::ErrorKind};

#[derive(Debug)]
pub struct MissingConfigError {
    key: String,
}

impl fmt::Display for MissingConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Required configuration value '{}' is missing", self.key)
    }
}

impl Error for MissingConfigError {}

pub struct Config {
    filename: String,
    settings: JsonValue,
    defaults: JsonValue,
}

impl Config {
    pub fn build(filename: String, defaults: JsonValue) -> Result<Config, std::io::Error> {
        // Validate filename only contains valid characters and ends in .json
        let filename_regex = Regex::new(r"^[a-zA-Z0-9_\-\.]+\.json$").unwrap();
        if !filename_regex.is_match(&filename) {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "Invalid filename - must contain only letters, numbers, underscore, dash, dot and end in .json"
            ));
        }

        let mut config = Config {
            filename,
            settings: json::object! {},
            defaults,
        };

        if let Err(err) = config.load_from_file() {
            warn!("Using default settings: {}", err);
        }

        Ok(config)
    }

    fn load_from_file(&mut self) -> std::io::Result<()> {
        match std::fs::read_to_string(&self.filename) {
            Ok(raw_data) => {
                match json::parse(&raw_data) {
                    Ok(parsed) => {
                        self.settings.clone_from(&parsed);
                        info!("Loaded settings from {}", self.filename);
                        Ok(())
                    }
                    Err(err) => {
                        warn!("Failed to parse config file {}: {}", self.filename, err);
                        Ok(())
                    }
                }
            }
            Err(err) => Err(err),
        }
    }

    pub fn get_f32_value(&self, key: &str, default: Option<f32>) -> Result<f32, MissingConfigError> {
        // First check settings
        if let Some(val) = self.settings[key].as_f32() {
            return Ok(val);
        }

        // If explicit default is provided, use it
        if let Some(def) = default {
            return Ok(def);
        }

        // Otherwise check defaults
        if let Some(val) = self.defaults[key].as_f32() {
            return Ok(val);
        }

        // If no value found anywhere, return error
        Err(MissingConfigError {
            key: key.to_string(),
        })
    }

    pub fn get_u32_value(&self, key: &str, default: Option<u32>) -> Result<u32, MissingConfigError> {
        // First check settings
        if let Some(val) = self.settings[key].as_u32() {
            return Ok(val);
        }

        // If explicit default is provided, use it
        if let Some(def) = default {
            return Ok(def);
        }

        // Otherwise check defaults
        if let Some(val) = self.defaults[key].as_u32() {
            return Ok(val);
        }

        // If no value found anywhere, return error
        Err(MissingConfigError {
            key: key.to_string(),
        })
    }
}
