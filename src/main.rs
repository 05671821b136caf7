use clap::Parser;

#[derive(Parser)]
#[command(name = "depwatch-lsp")]
#[command(
    version,
    about = "Language server flagging outdated and vulnerable npm dependencies"
)]
struct Cli {}

fn main() -> anyhow::Result<()> {
    let _cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(depwatch_lsp::lsp::server::run_server())
}
