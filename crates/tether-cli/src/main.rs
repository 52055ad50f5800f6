fn main() {
    if let Err(err) = tether_core::run(std::env::args_os().collect()) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
