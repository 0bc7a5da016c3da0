mod config_cmd;
mod section;

use clap::ValueEnum;

pub use config_cmd::ConfigCommand;
pub use section::SectionCommand;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
