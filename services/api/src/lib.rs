mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use child_screen::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
