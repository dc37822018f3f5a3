fn main() -> std::process::ExitCode {
    bridge_cli::run()
}
