fn main() {
    if let Err(err) = arpeggio_cli::run_from_env() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
