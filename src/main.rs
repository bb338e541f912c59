fn main() {
    if let Err(e) = lungscan_lib::run() {
        eprintln!("lungscan: {e}");
        std::process::exit(1);
    }
}
