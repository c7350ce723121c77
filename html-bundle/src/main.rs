use clap::Parser;
use html_bundle_rs::{BundleReport, BundleRequest};
use std::path::PathBuf;

/// html-bundle: A utility for bundling the scripts referenced by an HTML document
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to input HTML document
    #[clap(short, long)]
    pub document: PathBuf,

    /// Output directory. Its previous contents are removed
    #[clap(short = 'o', long)]
    pub dist_dir: PathBuf,

    /// Path to a deno.json style config file with compilerOptions and an import map
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Embed bundled code into the document instead of writing .js files
    #[clap(short, long)]
    pub embed_script: bool,

    /// Log debug output
    #[clap(short, long)]
    pub verbose: bool,
}

fn main() {
    let args: Args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut request = BundleRequest::new(&args.document, &args.dist_dir)
        .with_embed_script(args.embed_script);
    if let Some(config) = &args.config {
        request = request.with_config_path(config);
    }

    match run(&request) {
        Ok(report) => print_summary(&report),
        Err(err) => {
            eprintln!("Error: {:?}", err);
            std::process::exit(1);
        }
    }
}

/// Module loading futures are not `Send`, so the pipeline runs on a
/// current-thread runtime.
fn run(request: &BundleRequest) -> anyhow::Result<BundleReport> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(html_bundle_rs::bundle(request))?;
    Ok(report)
}

fn print_summary(report: &BundleReport) {
    for script in &report.scripts {
        match &script.linked {
            Some(linked) => println!(
                "{} -> {} ({} bytes)",
                script.source,
                linked.path.display(),
                script.code_len
            ),
            None => println!(
                "{} -> embedded ({} bytes)",
                script.source, script.code_len
            ),
        }
    }
    println!("{}", report.document.display());
}
