fn main() {
    if let Err(err) = phenoetl::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
