use std::{io::BufReader, path::PathBuf};

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "pageflip", version)]
struct Cli {
    /// Image files or archives of images, in display order.
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Images shown side by side per page.
    #[arg(long, default_value_t = 1)]
    per_page: usize,

    /// Hard cap on a single archive entry's declared size, in bytes.
    #[arg(long, default_value_t = 256 * 1024 * 1024)]
    max_entry_size: u64,

    /// Viewport width placements are computed for.
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Viewport height placements are computed for.
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Name shown as the root of composed titles.
    #[arg(long, default_value = "pageflip")]
    name: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut navigator = pageflip::Navigator::new(
        cli.name,
        cli.sources,
        Box::new(pageflip::ZipSource::new(cli.max_entry_size)),
        Box::new(pageflip::ImageRsDecoder),
        pageflip::NavigatorConfig {
            per_page: cli.per_page,
        },
    )?;

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut presenter = pageflip::LinePresenter::new(
        BufReader::new(stdin.lock()),
        stdout.lock(),
        pageflip::Viewport {
            width: cli.width,
            height: cli.height,
        },
    );

    navigator.run(&mut presenter)?;
    Ok(())
}
