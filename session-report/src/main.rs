fn main() {
    if let Err(err) = evse_session_log::app::run_report() {
        eprintln!("session report failed: {err}");
        std::process::exit(1);
    }
}
