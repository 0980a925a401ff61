fn main() {
    if let Err(err) = pivot_builder::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
