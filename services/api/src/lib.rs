mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use pbx_provision::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
