use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    civiform_cli::run().await
}
