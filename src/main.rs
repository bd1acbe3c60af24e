use shutterbatch::app;
use shutterbatch::cli;

fn main() -> anyhow::Result<()> {
    let args = cli::parse();
    app::run(args)
}
