use std::process::ExitCode;

fn main() -> ExitCode {
    match vh_fakerates::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
