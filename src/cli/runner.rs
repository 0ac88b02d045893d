//! Application runner that drives the pull for each requested image

use std::path::Path;

use crate::archive;
use crate::cli::args::Args;
use crate::image::ImageReference;
use crate::output::Logger;
use crate::progress::ProgressBar;
use crate::puller::Puller;

const PROGRESS_BAR_WIDTH: usize = 50;

pub struct Runner {
    args: Args,
    logger: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        let logger = Logger::new(args.verbose);
        Self { args, logger }
    }

    /// Pull every requested image in order and return the process exit
    /// code: 0 on success, 1 on invalid arguments, 2 on the first pull or
    /// archive failure.
    pub async fn run(&self) -> i32 {
        if let Err(e) = self.args.validate() {
            self.logger.error(&e.to_string());
            return 1;
        }

        let puller = Puller {
            arch: self.args.arch.clone(),
            os: self.args.os.clone(),
            login: self.args.user.clone(),
            password: self.args.password.clone(),
            insecure: self.args.insecure,
            logger: self.logger.clone(),
        };

        for img in &self.args.images {
            let mut image = match ImageReference::parse(img) {
                Ok(reference) => reference,
                Err(e) => {
                    println!("{}: {}", img, e);
                    return 2;
                }
            };

            let bar = ProgressBar::new(PROGRESS_BAR_WIDTH);
            if let Err(e) = puller.pull(&mut image, &bar).await {
                println!("{}: {}", img, e);
                return 2;
            }

            if self.args.only_download {
                return 0;
            }

            let Some(workspace) = image.temp_dir().map(Path::to_path_buf) else {
                println!("{}: workspace missing after pull", img);
                return 2;
            };
            let output = image.output_file_name();
            if let Err(e) = archive::tar::create_file(&workspace, Path::new(&output)) {
                println!("{}", e);
                return 2;
            }
            self.logger.verbose(&format!("wrote {}", output));

            if !self.args.save_cache {
                if let Err(e) = std::fs::remove_dir_all(&workspace) {
                    println!("{}: {}", workspace.display(), e);
                    return 2;
                }
            }
        }

        0
    }
}
