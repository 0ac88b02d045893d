//! Command line argument parsing and validation

use clap::{ArgAction, Parser};

use crate::error::{PullError, Result};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "docker-pull",
    about = "Pull images from a Docker registry into docker-save compatible tar archives, no daemon required",
    version
)]
pub struct Args {
    /// Images to pull (e.g. alpine:3.18 or registry.example.com/ns/app:v1)
    #[arg(value_name = "IMAGE", required = true)]
    pub images: Vec<String>,

    /// Do not delete the temp folder
    #[arg(short = 's', long, action = ArgAction::SetTrue)]
    pub save_cache: bool,

    /// Only download layers
    #[arg(short = 'd', long, action = ArgAction::SetTrue)]
    pub only_download: bool,

    /// CPU architecture platform image
    #[arg(short, long, default_value = "amd64")]
    pub arch: String,

    /// OS platform image
    #[arg(short, long, default_value = "linux")]
    pub os: String,

    /// Registry user
    #[arg(short, long, default_value = "")]
    pub user: String,

    /// Registry password
    #[arg(short, long, default_value = "")]
    pub password: String,

    /// Use plain HTTP when talking to the registry
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub insecure: bool,

    /// Enable verbose output
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub verbose: bool,
}

impl Args {
    /// Validate argument consistency beyond what clap enforces.
    pub fn validate(&self) -> Result<()> {
        if self.arch.is_empty() {
            return Err(PullError::Parse("arch cannot be empty".to_string()));
        }
        if self.os.is_empty() {
            return Err(PullError::Parse("os cannot be empty".to_string()));
        }
        if self.user.is_empty() != self.password.is_empty() {
            return Err(PullError::Parse(
                "user and password must be provided together".to_string(),
            ));
        }

        Ok(())
    }
}
