use std::process::ExitCode;

fn main() -> ExitCode {
    match po_automation_lib::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
