//! qrgen command-line entrypoint

use clap::Parser;
use qrgen::output::render_panel;
use qrgen::{
    BlobRegistry, DirectorySink, Downloader, Error, GeneratorPanel, Key, Modifiers, QrDecoder,
    QrEncoder, QrgenConfig, Result, Session, Status, logging,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{info, warn};

type Panel = GeneratorPanel<QrEncoder, DirectorySink>;

#[derive(Parser, Debug)]
#[command(
    name = "qrgen",
    version,
    about = "Generate QR codes from text or URLs and save them as PNG or SVG"
)]
struct Cli {
    /// Text or URL to encode. Read from stdin when omitted outside --repl.
    text: Option<String>,

    /// Optional configuration file (toml/yaml). Defaults to qrgen.{toml,yaml} in cwd/XDG config.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory exports are written into (overrides config)
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Save the generated image as PNG
    #[arg(long)]
    png: bool,

    /// Save the input as SVG
    #[arg(long)]
    svg: bool,

    /// Output the panel as formatted JSON instead of human-readable text
    #[arg(long)]
    json: bool,

    /// Decode the generated image and check it matches the input
    #[arg(long)]
    verify: bool,

    /// Interactive mode: type lines, end a line with `\` to continue it
    #[arg(long)]
    repl: bool,
}

struct Printer {
    json: bool,
}

impl Printer {
    fn show(&self, session: &Session) -> Result<()> {
        let rendered = render_panel(session);
        if self.json {
            println!("{}", serde_json::to_string_pretty(&rendered.json)?);
        } else {
            for line in &rendered.human {
                println!("{line}");
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = QrgenConfig::load(cli.config.as_deref())?;
    if let Some(ref out) = cli.out {
        config.export.output_dir = out.clone();
    }

    logging::init(&config.logging)?;

    let blobs = BlobRegistry::new();
    let sink = DirectorySink::new(&config.export.output_dir, blobs.clone());
    let mut panel = GeneratorPanel::with_config(QrEncoder::new(), Downloader::new(sink, blobs), &config)?;
    info!(spec = ?panel.render_spec(), "Starting qrgen");

    let printer = Printer { json: cli.json };

    if cli.repl {
        return run_repl(&mut panel, &printer).await;
    }

    let text = match cli.text.clone() {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    run_once(&mut panel, &printer, &cli, text).await
}

async fn run_once(panel: &mut Panel, printer: &Printer, cli: &Cli, text: String) -> Result<()> {
    panel.set_input(text);
    let status = panel.trigger_generate().await?;

    if status == Status::Ready && cli.verify {
        verify(panel)?;
    }
    if cli.png && !panel.export_raster()? {
        warn!("PNG export skipped: no image was generated");
    }
    if cli.svg {
        panel.export_vector().await?;
    }

    printer.show(panel.session())?;

    match panel.session().error_message() {
        Some(message) => Err(Error::Other(message.to_string())),
        None => Ok(()),
    }
}

fn verify(panel: &Panel) -> Result<()> {
    let Some(image) = panel.session().image() else {
        return Ok(());
    };
    let decoded = QrDecoder::new().decode_data_url(image)?;
    if decoded != panel.session().input() {
        return Err(Error::QrDecode(format!(
            "Generated image decodes to {:?}, expected {:?}",
            decoded,
            panel.session().input()
        )));
    }
    info!("Generated image verified");
    Ok(())
}

async fn run_repl(panel: &mut Panel, printer: &Printer) -> Result<()> {
    println!("Enter text or a URL. End a line with \\ for a newline; :png, :svg, :show, :quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut composing = false;

    while let Some(line) = lines.next_line().await? {
        if !composing {
            match line.trim() {
                ":quit" | ":q" => break,
                ":show" => {
                    printer.show(panel.session())?;
                    continue;
                }
                ":png" => {
                    if !panel.export_raster()? {
                        println!("Nothing to save yet");
                    }
                    continue;
                }
                ":svg" => {
                    panel.export_vector().await?;
                    printer.show(panel.session())?;
                    continue;
                }
                _ => panel.set_input(""),
            }
        }

        let (body, continued) = match line.strip_suffix('\\') {
            Some(body) => (body, true),
            None => (line.as_str(), false),
        };

        for c in body.chars() {
            panel.handle_key(Key::Char(c), Modifiers::NONE).await?;
        }

        if continued {
            panel.handle_key(Key::Enter, Modifiers::SHIFT).await?;
            composing = true;
        } else {
            panel.handle_key(Key::Enter, Modifiers::NONE).await?;
            composing = false;
            printer.show(panel.session())?;
        }
    }

    Ok(())
}
