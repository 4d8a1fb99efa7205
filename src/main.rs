use std::process::ExitCode;
use ui_matrix_runner::cli;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    ui_matrix_runner::init();

    let cli_args = cli::parse_args();

    match cli::process_command(cli_args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
