//! Binary entrypoint for typdex-cli (made by FontLab https://www.fontlab.com/)

fn main() {
    if let Err(err) = typdex_cli::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
