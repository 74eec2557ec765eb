use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;
use tokio::fs::try_exists;

use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::languages::{LanguageRegistry, DEFAULT_CODE_LANGUAGE};
use crate::transformers::Transformers;

const DEFAULT_SYNTAX_THEME: &str = "base16-ocean.dark";

/// Callback receiving errors raised inside update scopes.
pub type ErrorHandler = Rc<dyn Fn(&anyhow::Error)>;

/// Settings fixed when an editor is created.
#[derive(Clone)]
pub struct EditorConfig {
    pub namespace: String,
    pub editable: bool,
    pub transformers: Transformers,
    pub languages: Rc<LanguageRegistry>,
    pub history_limit: usize,
    pub markdown_shortcuts: bool,
    pub tab_indentation: bool,
    pub on_error: ErrorHandler,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            namespace: String::from("rubrica"),
            editable: true,
            transformers: Transformers::standard(),
            languages: Rc::new(LanguageRegistry::standard()),
            history_limit: DEFAULT_HISTORY_LIMIT,
            markdown_shortcuts: true,
            tab_indentation: true,
            on_error: Rc::new(|err: &anyhow::Error| log::error!("Editor update failed: {:#}", err)),
        }
    }
}

impl EditorConfig {
    pub fn readonly() -> Self {
        Self {
            editable: false,
            ..Self::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn with_transformers(mut self, transformers: Transformers) -> Self {
        self.transformers = transformers;
        self
    }

    pub fn with_languages(mut self, languages: LanguageRegistry) -> Self {
        self.languages = Rc::new(languages);
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_markdown_shortcuts(mut self, enabled: bool) -> Self {
        self.markdown_shortcuts = enabled;
        self
    }

    pub fn with_tab_indentation(mut self, enabled: bool) -> Self {
        self.tab_indentation = enabled;
        self
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&anyhow::Error) + 'static,
    {
        self.on_error = Rc::new(handler);
        self
    }
}

impl fmt::Debug for EditorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorConfig")
            .field("namespace", &self.namespace)
            .field("editable", &self.editable)
            .field("transformers", &self.transformers)
            .field("languages", &self.languages)
            .field("history_limit", &self.history_limit)
            .field("markdown_shortcuts", &self.markdown_shortcuts)
            .field("tab_indentation", &self.tab_indentation)
            .finish_non_exhaustive()
    }
}

/// User configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub editor: EditorSettings,
    pub theme: Theme,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorSettings {
    #[serde(default)]
    pub readonly: bool,
    pub history_limit: usize,
    pub default_code_language: String,
    pub markdown_shortcuts: bool,
    pub tab_indentation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub syntax_theme: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            editor: EditorSettings {
                readonly: false,
                history_limit: DEFAULT_HISTORY_LIMIT,
                default_code_language: String::from(DEFAULT_CODE_LANGUAGE),
                markdown_shortcuts: true,
                tab_indentation: true,
            },
            theme: Theme {
                syntax_theme: String::from(DEFAULT_SYNTAX_THEME),
            },
        }
    }
}

impl Config {
    pub async fn load() -> Result<Self> {
        if let Some(config_path) = Self::config_path() {
            if try_exists(&config_path).await? {
                match tokio::fs::read_to_string(&config_path).await {
                    Ok(content) => {
                        if content.trim().is_empty() {
                            log::warn!("Config file is empty, creating new one");
                            let default_config = Self::default();
                            let _ = default_config.save().await;
                            return Ok(default_config);
                        }

                        match serde_json::from_str::<Self>(&content) {
                            Ok(mut config) => {
                                config.validate()?;
                                log::info!(
                                    "Successfully loaded config from: {}",
                                    config_path.display()
                                );
                                return Ok(config);
                            }
                            Err(json_err) => {
                                log::error!("Failed to parse config file: {}", json_err);

                                // Backup broken config
                                let backup_path = config_path.with_extension("bak");
                                if let Err(e) = tokio::fs::copy(&config_path, &backup_path).await {
                                    log::warn!("Failed to backup broken config: {}", e);
                                } else {
                                    log::info!(
                                        "Backed up broken config to: {}",
                                        backup_path.display()
                                    );
                                }

                                let default_config = Self::default();
                                let _ = default_config.save().await;
                                return Ok(default_config);
                            }
                        }
                    }
                    Err(io_err) => {
                        log::error!("Failed to read config file: {}", io_err);
                    }
                }
            } else {
                log::info!("Config file does not exist, creating default");
            }
        }

        let default_config = Self::default();
        let _ = default_config.save().await;
        Ok(default_config)
    }

    pub async fn save(&self) -> Result<()> {
        if let Some(config_path) = Self::config_path() {
            let mut config_to_save = self.clone();
            config_to_save.validate()?;

            if let Some(parent) = config_path.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return Err(anyhow::anyhow!(
                        "Failed to create config directory: {} - {}",
                        parent.display(),
                        e
                    ));
                }
                log::debug!("Config directory exists or was created: {}", parent.display());
            }

            let content = serde_json::to_string_pretty(&config_to_save)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            tokio::fs::write(&config_path, content).await.map_err(|e| {
                anyhow::anyhow!(
                    "Failed to write config file: {} - {}",
                    config_path.display(),
                    e
                )
            })?;
            log::info!("Successfully saved config to: {}", config_path.display());
        }
        Ok(())
    }

    /// Validate configuration values and fix invalid ones
    pub fn validate(&mut self) -> Result<()> {
        let mut has_issues = false;

        if self.editor.history_limit == 0 || self.editor.history_limit > 10_000 {
            log::warn!(
                "Invalid history limit: {}, using default",
                self.editor.history_limit
            );
            self.editor.history_limit = DEFAULT_HISTORY_LIMIT;
            has_issues = true;
        }

        if !LanguageRegistry::standard().contains(&self.editor.default_code_language) {
            log::warn!(
                "Unknown default code language: {:?}, using default",
                self.editor.default_code_language
            );
            self.editor.default_code_language = DEFAULT_CODE_LANGUAGE.to_string();
            has_issues = true;
        }

        if self.theme.syntax_theme.is_empty() {
            log::warn!("Empty syntax theme, using default");
            self.theme.syntax_theme = DEFAULT_SYNTAX_THEME.to_string();
            has_issues = true;
        }

        if has_issues {
            log::info!("Configuration validation completed with corrections");
        }

        Ok(())
    }

    /// Editor settings for a new editor instance.
    pub fn editor_config(&self) -> Result<EditorConfig> {
        let languages =
            LanguageRegistry::standard().with_default(&self.editor.default_code_language)?;
        Ok(EditorConfig::default()
            .with_editable(!self.editor.readonly)
            .with_languages(languages)
            .with_history_limit(self.editor.history_limit)
            .with_markdown_shortcuts(self.editor.markdown_shortcuts)
            .with_tab_indentation(self.editor.tab_indentation))
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("RUBRICA_CONFIG_PATH") {
            return Some(PathBuf::from(path));
        }

        if let Ok(dir) = std::env::var("RUBRICA_CONFIG_DIR") {
            return Some(PathBuf::from(dir).join("config.json"));
        }

        ProjectDirs::from("com", "rubrica", "rubrica")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }
}
