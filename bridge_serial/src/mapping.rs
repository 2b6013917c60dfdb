//! Detection label → servo value lookup.
//!
//! Two JSON objects drive the lookup: labels map to a hand-pose category
//! (`{"cat": "fiveFinger"}`) and categories map to one value per servo
//! (`{"fiveFinger": [0, 0, 0, 0, 0]}`). Unknown labels and categories fall
//! back to a configured category.

use bridge_common::errors::{Error, NOT_FOUND, ResultExt};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::config::MappingConfig;

/// Label and servo tables plus the fallback category.
#[derive(Debug, Clone)]
pub struct ServoMapping {
    labels: HashMap<String, String>,
    servos: HashMap<String, Vec<i32>>,
    fallback_category: String,
}

impl ServoMapping {
    /// Build from in-memory tables.
    pub fn new(
        labels: HashMap<String, String>,
        servos: HashMap<String, Vec<i32>>,
        fallback_category: impl Into<String>,
    ) -> Self {
        Self {
            labels,
            servos,
            fallback_category: fallback_category.into(),
        }
    }

    /// Load both tables from the files named in `config`.
    ///
    /// # Errors
    /// Returns an error if either file is unreadable or not the expected JSON shape.
    pub fn load(config: &MappingConfig) -> Result<Self, Error> {
        let labels: HashMap<String, String> = read_json(&config.label_file)?;
        let servos: HashMap<String, Vec<i32>> = read_json(&config.servo_file)?;

        info!(
            "Loaded {} labels and {} servo categories",
            labels.len(),
            servos.len()
        );
        Ok(Self::new(labels, servos, config.fallback_category.clone()))
    }

    /// Category for a detection label.
    ///
    /// # Errors
    /// Returns an error wrapping `NOT_FOUND` for unknown labels.
    pub fn category_for(&self, label: &str) -> Result<&str, Error> {
        self.labels
            .get(label)
            .map(String::as_str)
            .ok_or(&NOT_FOUND)
            .wrap_err_with(|| format!("label '{label}'"))
    }

    /// Servo values for a category.
    ///
    /// # Errors
    /// Returns an error wrapping `NOT_FOUND` for unknown categories.
    pub fn servos_for(&self, category: &str) -> Result<&[i32], Error> {
        self.servos
            .get(category)
            .map(Vec::as_slice)
            .ok_or(&NOT_FOUND)
            .wrap_err_with(|| format!("category '{category}'"))
    }

    /// Servo values for a label, applying the fallback category on misses.
    pub fn resolve(&self, label: &str) -> &[i32] {
        let category = match self.category_for(label) {
            Ok(category) => category,
            Err(err) => {
                debug!("{}, using '{}'", err.chain_message(), self.fallback_category);
                self.fallback_category.as_str()
            }
        };

        self.servos_for(category)
            .or_else(|_| self.servos_for(&self.fallback_category))
            .unwrap_or_default()
    }

    /// Line written to the servo controller: each value followed by a space,
    /// then a newline.
    pub fn reply_for(&self, label: &str) -> String {
        let mut reply = String::new();
        for servo in self.resolve(label) {
            let _ = write!(reply, "{servo} ");
        }
        reply.push('\n');
        reply
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed on reading {}", path.display()))?;
    serde_json::from_str(&content).wrap_err_with(|| format!("failed on parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_common::errors;

    fn sample() -> ServoMapping {
        let labels = HashMap::from([
            ("cat".to_string(), "fist".to_string()),
            ("person".to_string(), "peace".to_string()),
            ("dog".to_string(), "ghost".to_string()),
        ]);
        let servos = HashMap::from([
            ("fiveFinger".to_string(), vec![0, 0, 0, 0, 0]),
            ("fist".to_string(), vec![180, 180, 180, 180, 180]),
            ("peace".to_string(), vec![180, 0, 0, 180, 180]),
        ]);
        ServoMapping::new(labels, servos, "fiveFinger")
    }

    #[test]
    fn test_direct_hit() {
        let mapping = sample();
        assert_eq!(mapping.category_for("person").unwrap(), "peace");
        assert_eq!(mapping.resolve("person"), &[180, 0, 0, 180, 180]);
    }

    #[test]
    fn test_unknown_label_is_not_found() {
        let mapping = sample();
        let err = mapping.category_for("toaster").unwrap_err();
        assert!(errors::is(&err, &NOT_FOUND));
        assert_eq!(err.chain_message(), "not found -- label 'toaster'");
        assert_eq!(mapping.resolve("toaster"), &[0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_unknown_category_falls_back() {
        let mapping = sample();
        assert!(errors::is(&mapping.servos_for("ghost").unwrap_err(), &NOT_FOUND));
        assert_eq!(mapping.resolve("dog"), &[0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_missing_fallback_gives_empty_reply() {
        let mapping = ServoMapping::new(HashMap::new(), HashMap::new(), "fiveFinger");
        assert!(mapping.resolve("cat").is_empty());
        assert_eq!(mapping.reply_for("cat"), "\n");
    }

    #[test]
    fn test_reply_format() {
        let mapping = sample();
        assert_eq!(mapping.reply_for("cat"), "180 180 180 180 180 \n");
        assert_eq!(mapping.reply_for("unknown"), "0 0 0 0 0 \n");
    }
}
