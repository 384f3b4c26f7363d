//! Output utilities for CLI tools.

use std::{fs::File, io::Write};

use serde::Serialize;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// YAML format (default).
    #[default]
    Yaml,
    /// JSON format.
    Json,
}

/// Output configuration.
pub struct Output {
    pub format: OutputFormat,
    pub file: Option<String>,
}

impl Output {
    pub fn new(format: OutputFormat, file: Option<String>) -> Self {
        Self { format, file }
    }

    /// Builds an output from the usual `--json` and `-o` flags.
    pub fn from_flags(json: bool, file: Option<&str>) -> Self {
        let format = if json {
            OutputFormat::Json
        } else {
            OutputFormat::Yaml
        };
        Self::new(format, file.map(str::to_string))
    }

    /// Renders a value in the configured format.
    pub fn render<T: Serialize>(&self, value: &T) -> anyhow::Result<String> {
        Ok(match self.format {
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
            OutputFormat::Json => serde_json::to_string_pretty(value)?,
        })
    }

    /// Writes a value to the output file, or stdout when none is set.
    pub fn write<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        let output = self.render(value)?;

        match &self.file {
            Some(path) => {
                let mut file = File::create(path)?;
                file.write_all(output.as_bytes())?;
            }
            None => {
                println!("{}", output.trim_end());
            }
        }

        Ok(())
    }
}

/// Prints verbose output if enabled.
pub fn print_verbose(enabled: bool, message: &str) {
    if enabled {
        eprintln!("[verbose] {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Sample {
        action: &'static str,
        matched: bool,
    }

    #[test]
    fn test_render_formats() {
        let sample = Sample {
            action: "save",
            matched: true,
        };

        let yaml = Output::from_flags(false, None).render(&sample).unwrap();
        assert_eq!(yaml, "action: save\nmatched: true\n");

        let json = Output::from_flags(true, None).render(&sample).unwrap();
        assert!(json.contains("\"action\": \"save\""));
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let output = Output::from_flags(true, path.to_str());
        output
            .write(&Sample {
                action: "mute",
                matched: false,
            })
            .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"matched\": false"));
    }
}
