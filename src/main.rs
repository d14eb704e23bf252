fn main() {
    std::process::exit(ccfront::cli::run());
}
