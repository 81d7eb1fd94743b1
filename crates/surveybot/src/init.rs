//! Interactive initialization for surveybot.
//!
//! Writes a starter config and an example survey into a directory.

use anyhow::Result;
use colored::Colorize;
use dialoguer::Select;
use std::fs;
use std::path::Path;

use crate::config::CONFIG_FILE_NAME;

pub const EXAMPLE_SURVEY_FILE: &str = "survey.toml";

pub const STARTER_CONFIG: &str = r#"# surveybot configuration
# The API key is read from OPENAI_API_KEY.

[server]
host = "127.0.0.1"
port = 8080
# cors_origins = ["https://surveys.example.com"]

[completion]
model = "gpt-4o"
# base_url = "http://localhost:11434/v1"
temperature = 0.7
max_tokens = 500
timeout = "60s"

[database]
# path = "surveybot.db"

[logging]
level = "info"
format = "pretty"
# dir = "logs"

[documents]
root = "."
timeout = "30s"
"#;

pub const EXAMPLE_SURVEY: &str = r#"name = "Coffee Habits"
instructions = "Keep it friendly and brief."

[[questions]]
id = "cups"
question_text = "How many cups of coffee do you drink on a typical day?"
order_number = 1
answer_criteria = "The answer must contain a number."

[[questions]]
id = "roast"
question_text = "Which roast do you prefer?"
question_type = "multiple_choice"
options = ["Light", "Medium", "Dark"]
order_number = 2

[[questions]]
id = "ritual"
question_text = "Describe your favourite coffee moment."
order_number = 3
guidance = "Encourage a short story rather than a single word."
"#;

pub async fn handle_init(dir: &Path) -> Result<()> {
    eprintln!("{}", "Setting up surveybot...".bold());
    eprintln!();

    fs::create_dir_all(dir)?;

    let config_path = dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        eprintln!(
            "{} Config already exists at {}",
            "⚠".bright_yellow(),
            config_path.display()
        );

        let overwrite = Select::new()
            .with_prompt("Overwrite existing config?")
            .items(&["No, keep existing", "Yes, replace it"])
            .default(0)
            .interact()?;

        if overwrite == 0 {
            eprintln!("Keeping existing config.");
        } else {
            write_file(&config_path, STARTER_CONFIG)?;
        }
    } else {
        write_file(&config_path, STARTER_CONFIG)?;
    }

    let survey_path = dir.join(EXAMPLE_SURVEY_FILE);
    if survey_path.exists() {
        eprintln!(
            "  {} {} exists, leaving it alone",
            "✗".dimmed(),
            survey_path.display()
        );
    } else {
        write_file(&survey_path, EXAMPLE_SURVEY)?;
    }

    if std::env::var("OPENAI_API_KEY").is_err() {
        eprintln!();
        eprintln!(
            "{} OPENAI_API_KEY is not set; export it before running surveys.",
            "⚠".bright_yellow()
        );
    }

    print_getting_started();
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)?;
    eprintln!("{} Wrote {}", "✓".bright_green(), path.display());
    Ok(())
}

/// Print the getting started guide
pub fn print_getting_started() {
    eprintln!();
    eprintln!("{}", "Getting started:".bold());
    eprintln!(
        "  {} Edit {} to describe your questions",
        "1.".dimmed(),
        EXAMPLE_SURVEY_FILE.bright_cyan()
    );
    eprintln!(
        "  {} Try it in the terminal: {}",
        "2.".dimmed(),
        "surveybot run --survey survey.toml".bright_cyan()
    );
    eprintln!(
        "  {} Serve the HTTP API: {}",
        "3.".dimmed(),
        "surveybot serve".bright_cyan()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::run::SurveyFile;

    #[test]
    fn test_starter_config_parses() {
        let config: Config = toml::from_str(STARTER_CONFIG).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.completion.model, "gpt-4o");
    }

    #[test]
    fn test_example_survey_parses() {
        let survey = SurveyFile::parse(EXAMPLE_SURVEY, "coffee").unwrap();
        assert_eq!(survey.len(), 3);
        assert!(survey.question(0).unwrap().criteria().is_some());
        assert_eq!(survey.question(1).unwrap().choices().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_init_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        handle_init(dir.path()).await.unwrap();

        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
        let survey = std::fs::read_to_string(dir.path().join(EXAMPLE_SURVEY_FILE)).unwrap();
        assert_eq!(survey, EXAMPLE_SURVEY);
    }
}
