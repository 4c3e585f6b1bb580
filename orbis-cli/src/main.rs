//! Entry point for the `orbis` command-line interface.
#![forbid(unsafe_code)]

#[expect(
    clippy::print_stderr,
    reason = "the binary reports fatal errors on standard error"
)]
fn main() {
    if let Err(err) = orbis_cli::run() {
        eprintln!("orbis: {err}");
        std::process::exit(1);
    }
}
