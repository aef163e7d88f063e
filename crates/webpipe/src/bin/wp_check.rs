//! wp-check - Validate webpipe files.

fn main() -> std::process::ExitCode {
    webpipe::cmd::check::main()
}
