use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Settings describing what a template module is and how to run one.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TemplateConfig {
    /// File extension of template modules, without the leading dot
    pub extension: String,
    /// Page name answering `/` and directory requests
    pub index: String,
    /// Interpreter command. The template path is appended as the last argument.
    pub command: Vec<String>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            extension: "tsx".to_string(),
            index: "index".to_string(),
            command: vec!["deno".to_string(), "run".to_string(), "-A".to_string()],
        }
    }
}

impl TemplateConfig {
    /// File name of the default page, e.g. `index.tsx`
    pub fn index_file(&self) -> String {
        format!("{}.{}", self.index, self.extension)
    }

    pub fn is_template(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy() == self.extension)
            .unwrap_or(false)
    }
}

/// Where a site lives on disk and how its templates are rendered.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct SiteConfig {
    pub source: PathBuf,
    pub output: PathBuf,
    pub template: TemplateConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("./src"),
            output: PathBuf::from("./build"),
            template: TemplateConfig::default(),
        }
    }
}

impl SiteConfig {
    pub fn new<S: AsRef<Path>, O: AsRef<Path>>(source: S, output: O) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            template: TemplateConfig::default(),
        }
    }

    pub fn template(mut self, template: TemplateConfig) -> Self {
        self.template = template;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_file_uses_extension() {
        let template = TemplateConfig {
            extension: "jsx".into(),
            ..TemplateConfig::default()
        };
        assert_eq!(template.index_file(), "index.jsx");
    }

    #[test]
    fn test_is_template() {
        let template = TemplateConfig::default();
        assert!(template.is_template(Path::new("src/about.tsx")));
        assert!(!template.is_template(Path::new("src/logo.png")));
        assert!(!template.is_template(Path::new("src/README")));
    }
}
