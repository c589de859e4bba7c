use clap::Parser;

fn main() {
    let cli = metashiftctl::Cli::parse();
    if let Err(err) = metashiftctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
