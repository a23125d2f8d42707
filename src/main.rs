use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    directory_crawler_lib::run(directory_crawler_lib::Cli::parse()).await
}
