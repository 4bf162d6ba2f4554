//! Binary entrypoint for the `stockroom` command.

use std::process;

#[tokio::main]
async fn main() {
    let exit_code = stockroom_cli::run().await;
    process::exit(exit_code);
}
