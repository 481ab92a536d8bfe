fn main() {
    if let Err(err) = evse_session_log::app::run_service() {
        eprintln!("service startup failed: {err}");
        std::process::exit(1);
    }
}
