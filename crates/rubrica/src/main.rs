use anyhow::{anyhow, bail, Result};
use log::LevelFilter;
use std::env;
use std::path::PathBuf;

use rubrica::{CodeHighlighter, Config, FileManager, MarkdownEditor};

const USAGE: &str = "Usage: rubrica [--readonly] [--html] [--highlight] [--write] <file>";

#[derive(Debug, Default, PartialEq, Eq)]
struct CliOptions {
    readonly: bool,
    html: bool,
    highlight: bool,
    write: bool,
    path: PathBuf,
}

impl CliOptions {
    fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Self::default();
        let mut path = None;
        for arg in args {
            match arg.as_str() {
                "--readonly" => options.readonly = true,
                "--html" => options.html = true,
                "--highlight" => options.highlight = true,
                "--write" => options.write = true,
                "-h" | "--help" => bail!("{}", USAGE),
                flag if flag.starts_with("--") => bail!("Unknown option: {}\n{}", flag, USAGE),
                file => {
                    if path.replace(PathBuf::from(file)).is_some() {
                        bail!("Only one file can be given\n{}", USAGE);
                    }
                }
            }
        }
        options.path = path.ok_or_else(|| anyhow!("No file given\n{}", USAGE))?;
        if options.write && options.readonly {
            bail!("--write cannot be combined with --readonly");
        }
        Ok(options)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut logger = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        logger.filter_level(LevelFilter::Info);
        logger.filter_module("rubrica", LevelFilter::Debug);
    }
    logger.init();

    let options = match CliOptions::parse(env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    if let Err(err) = run(options).await {
        eprintln!("Error: {}", err);
        if let Some(source) = err.source() {
            eprintln!("Cause: {}", source);
        }
        log::error!("Application error: {}", err);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(options: CliOptions) -> Result<()> {
    let config = Config::load().await?;
    let mut editor_config = config.editor_config()?;
    if options.readonly {
        editor_config = editor_config.with_editable(false);
    }

    let mut file_manager = FileManager::new();
    let content = file_manager.open_file(options.path.clone()).await?;
    let editor = MarkdownEditor::new(&content, editor_config)?;
    log::info!("Loaded {} ({} bytes)", options.path.display(), content.len());

    if options.html {
        println!("{}", editor.preview_html());
    } else if options.highlight {
        let highlighter = CodeHighlighter::new(&config.theme.syntax_theme);
        for block in editor.highlight_code_blocks(&highlighter) {
            let body = editor.editor().state().tree().text_content(block.key);
            println!("--- {} ({})", block.language.as_deref().unwrap_or("plain"), block.syntax_name);
            println!("{}", highlighter.to_ansi(&body, block.language.as_deref()));
        }
    } else {
        println!("{}", editor.markdown());
    }

    if options.write {
        if file_manager.is_readonly() {
            bail!("{} is read-only", options.path.display());
        }
        let message = file_manager.save_file(&editor).await?;
        log::info!("{}", message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_flags_and_file() {
        let options = CliOptions::parse(args(&["--html", "notes.md"])).unwrap();
        assert!(options.html);
        assert!(!options.readonly);
        assert_eq!(options.path, PathBuf::from("notes.md"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(CliOptions::parse(args(&[])).is_err());
        assert!(CliOptions::parse(args(&["a.md", "b.md"])).is_err());
        assert!(CliOptions::parse(args(&["--bogus", "a.md"])).is_err());
        assert!(CliOptions::parse(args(&["--readonly", "--write", "a.md"])).is_err());
    }
}
