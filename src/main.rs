use clap::Parser;
use clap::error::ErrorKind;

use docker_pull::cli::{Args, Runner};

#[tokio::main]
async fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    std::process::exit(Runner::new(args).run().await);
}
