fn main() {
    if let Err(err) = data_wrangler::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
