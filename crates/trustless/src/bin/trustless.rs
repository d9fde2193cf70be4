use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;
use trustless::config::GATEWAY_ENV;
use trustless::gateway::DEFAULT_GATEWAY;
use trustless::{
    GatewayStyle, RetrievalConfig, RetrievalReport, parse_cid, shorten_cid, verify_car,
};
use trustless_car::unixfs::builder::DEFAULT_CHUNK_SIZE;
use trustless_car::{DEFAULT_MAX_FILE_SIZE, FileBuilder, write_car_bytes};
use trustless_common::ByteStream;
use url::Url;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Fetch IPFS content from an untrusted gateway and verify every byte"
)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Retrieve a CID from a gateway, verify it and write the file
    Fetch(FetchArgs),
    /// Verify a local CAR file and extract the file it holds
    Verify(VerifyArgs),
    /// Pack a file into a single-file UnixFS CAR
    Pack(PackArgs),
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// CID, /ipfs/<cid> or ipfs://<cid>
    cid: String,

    /// Gateway base URL
    #[arg(long, env = GATEWAY_ENV, default_value = DEFAULT_GATEWAY)]
    gateway: Url,

    /// Address content as {cid}.ipfs.{host} instead of {gateway}/ipfs/{cid}
    #[arg(long)]
    subdomain: bool,

    /// Output path; `-` for stdout [default: <short cid>.<ext>]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Largest file size to accept, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE)]
    max_size: u64,

    /// Give up after this many seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// CAR file to verify
    car: PathBuf,

    /// Root to walk from [default: the CAR's only root]
    #[arg(long)]
    cid: Option<String>,

    /// Write the verified file here; `-` for stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Largest file size to accept, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE)]
    max_size: u64,
}

#[derive(Args, Debug)]
struct PackArgs {
    /// File to pack
    file: PathBuf,

    /// CAR output path [default: <file>.car]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Leaf size in bytes
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Command::Fetch(args) => fetch(args).await,
        Command::Verify(args) => verify(args).await,
        Command::Pack(args) => pack(args).await,
    }
}

async fn fetch(args: FetchArgs) -> Result<()> {
    let cid = parse_cid(&args.cid)?;
    let style = if args.subdomain {
        GatewayStyle::Subdomain
    } else {
        GatewayStyle::Path
    };
    let config = RetrievalConfig::new(args.gateway)
        .style(style)
        .max_file_size(args.max_size)
        .timeout(args.timeout.map(Duration::from_secs));

    let mut retrieval = config.retrieval(config.http_client()?, cid);
    let cancel = retrieval.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let report = retrieval.run().await?;
    let output = args
        .output
        .unwrap_or_else(|| default_output(&cid.to_string(), &report));
    write_output(&output, &report).await?;
    print_report(&report, &output);
    Ok(())
}

async fn verify(args: VerifyArgs) -> Result<()> {
    let root = args.cid.as_deref().map(parse_cid).transpose()?;
    let file = tokio::fs::File::open(&args.car).await.into_diagnostic()?;

    let report = verify_car(ByteStream::from_reader(file), root, args.max_size).await?;
    match &args.output {
        Some(output) => {
            write_output(output, &report).await?;
            print_report(&report, output);
        }
        None => eprintln!(
            "{}: {} bytes, {} blocks verified",
            report.file.cid(),
            report.file.len(),
            report.verified_blocks
        ),
    }
    Ok(())
}

async fn pack(args: PackArgs) -> Result<()> {
    let data = tokio::fs::read(&args.file).await.into_diagnostic()?;
    let packed = FileBuilder::new()
        .chunk_size(args.chunk_size)
        .build(&data)?;
    let car = write_car_bytes(vec![packed.root], packed.blocks.iter().cloned()).await?;

    let output = args.output.unwrap_or_else(|| {
        let mut name = args.file.clone().into_os_string();
        name.push(".car");
        PathBuf::from(name)
    });
    tokio::fs::write(&output, &car).await.into_diagnostic()?;

    eprintln!(
        "packed {} bytes into {} blocks: {}",
        packed.size,
        packed.blocks.len(),
        output.display()
    );
    println!("{}", packed.root);
    Ok(())
}

fn default_output(cid: &str, report: &RetrievalReport) -> PathBuf {
    let short = shorten_cid(cid);
    match report.file.content_type() {
        Some(kind) => PathBuf::from(format!("{short}.{}", kind.extension)),
        None => PathBuf::from(short),
    }
}

async fn write_output(output: &Path, report: &RetrievalReport) -> Result<()> {
    if output == Path::new("-") {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(report.file.bytes())
            .await
            .into_diagnostic()?;
        stdout.flush().await.into_diagnostic()
    } else {
        tokio::fs::write(output, report.file.bytes())
            .await
            .into_diagnostic()
    }
}

fn print_report(report: &RetrievalReport, output: &Path) {
    let kind = report
        .file
        .content_type()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "unknown type".to_string());
    eprintln!(
        "verified {} ({} bytes, {kind}) from {} blocks -> {}",
        shorten_cid(&report.file.cid().to_string()),
        report.file.len(),
        report.verified_blocks,
        output.display()
    );
}
