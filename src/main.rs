use clap::{Parser, Subcommand};
use clickin::caption::{CaptionKind, HttpCaptionService};
use clickin::config::{self, DEFAULT_CONFIG_FILE, EditorConfig};
use clickin::render::FontBook;
use clickin::script::{self, Script};
use clickin::session::Session;
use clickin::output;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "clickin")]
#[command(about = "Layered photo editing: text, stickers, adjustments, crop, and PNG export")]
#[command(long_about = "\
Layered photo editing: text, stickers, adjustments, crop, and PNG export

Edits are described as a script of steps and replayed against a fresh
editing session. Every export step writes a PNG at twice the displayed size
of the base image.

Script structure (edits.toml):

  [[step]]
  action = \"add-image\"          # Paths are relative to the script
  path = \"beach.jpg\"

  [[step]]
  action = \"add-text\"           # Centered, \"Double click to edit\"

  [[step]]
  action = \"edit-text\"          # Applies to the selected text
  content = \"Summer!\"
  fill = \"#ffffff\"

  [[step]]
  action = \"adjust\"             # brightness, contrast, saturation,
  adjustment = \"contrast\"       # hue, exposure, clarity
  value = 25

  [[step]]
  action = \"export\"

Run 'clickin gen-config' to generate a documented editor.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Editor config file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Log more (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay an edit script and write every export
    Run {
        /// Edit script (TOML)
        #[arg(long)]
        script: PathBuf,
        /// Directory for exported PNGs
        #[arg(long, default_value = "exports")]
        output: PathBuf,
        /// Also write the final editing canvas as preview.png
        #[arg(long)]
        preview: bool,
    },
    /// Generate a caption for an image with the AI caption service
    Caption {
        /// Image to caption
        image: PathBuf,
        /// Generate a social media post instead of a caption
        #[arg(long)]
        post: bool,
    },
    /// Print a stock editor.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Run {
            script: script_path,
            output: out_dir,
            preview,
        } => {
            let config = config::load_config(&cli.config)?;
            let mut session = open_session(config, &cli.config)?;
            let script = Script::load(&script_path)?;
            let base_dir = parent_dir(&script_path);
            let report = script::run_script(&mut session, &script, &base_dir)?;

            std::fs::create_dir_all(&out_dir)?;
            for export in &report.exports {
                std::fs::write(out_dir.join(&export.file_name), &export.png)?;
            }
            if preview {
                let path = out_dir.join("preview.png");
                session.render_preview()?.save(&path)?;
                log::info!("wrote {}", path.display());
            }
            output::print_run_output(&report, &session, &out_dir);
        }
        Command::Caption { image, post } => {
            let config = config::load_config(&cli.config)?;
            let service = HttpCaptionService::new(
                &config.caption.base_url,
                Duration::from_secs(config.caption.timeout_secs),
            )?;
            let mut session = open_session(config, &cli.config)?;
            session.add_image(&std::fs::read(&image)?)?;
            let kind = if post {
                CaptionKind::Post
            } else {
                CaptionKind::Caption
            };
            let text = session.generate_caption(&service, kind)?;
            println!("{}", text);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Start a session with the fonts listed in the config. Font paths are
/// relative to the config file.
fn open_session(
    config: EditorConfig,
    config_path: &Path,
) -> Result<Session, Box<dyn std::error::Error>> {
    let fonts = FontBook::load(&config.fonts, &parent_dir(config_path))?;
    Ok(Session::with_fonts(config, fonts)?)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", format_record(record));
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// `[LEVEL] [module] message`, with the crate prefix dropped from the module.
fn format_record(record: &log::Record) -> String {
    let target = record.target();
    let scope = target.strip_prefix("clickin::").unwrap_or(target);
    format!("[{}] [{}] {}", record.level(), scope, record.args())
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
