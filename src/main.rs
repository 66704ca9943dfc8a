fn main() {
    let args: Vec<String> = std::env::args().collect();
    std::process::exit(delivery_plan::cli::run_with_args(&args));
}
