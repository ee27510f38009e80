fn main() {
    std::process::exit(migctl::app::run_cli(std::env::args_os()));
}
