//! forkharness CLI binary
//!
//! All logic is in the library; main.rs only maps the result to an exit code.

fn main() {
    std::process::exit(forkharness::cli::run());
}
