use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "studyforge",
    version,
    about = "Turn notes, documents and recordings into summaries and quizzes"
)]
pub struct Cli {
    /// YAML config file (defaults to ./studyforge.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,
    /// Write a JSON telemetry report for this run
    #[arg(long, global = true)]
    pub telemetry: Option<PathBuf>,
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Normalize a saved model response (stdin when no path is given)
    Normalize { path: Option<PathBuf> },
    #[command(flatten)]
    Remote(RemoteCommand),
}

/// Commands that talk to the model provider.
#[derive(Subcommand, Debug)]
pub enum RemoteCommand {
    /// Build a study artifact from text or a file
    #[command(group(ArgGroup::new("input").required(true).args(["text", "file"])))]
    Generate {
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        /// Override the mime type guessed from the file extension
        #[arg(long, requires = "file")]
        mime: Option<String>,
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
    /// Print the embedding vector for a text
    Embed { text: String },
    /// Ask a free-form question and get JSON back
    Ask { prompt: String },
}
