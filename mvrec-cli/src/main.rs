//! Record encoded video whenever motion vectors indicate movement

use clap::*;
use log::*;
use mvrec::prelude::v1::{Result, *};

fn command() -> Command<'static> {
    Command::new("mvrec")
        .version(crate_version!())
        .author(crate_authors!())
        .about("Records encoded video segments whenever motion vectors indicate movement")
        .arg(
            Arg::new("input")
                .long("input")
                .short('i')
                .help("Capture to read encoder output from (file, tcp://host:port or tcp://@:port)")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("JSON configuration file, command line flags take precedence")
                .takes_value(true),
        )
        .arg(
            Arg::new("bitrate")
                .short('b')
                .long("bitrate")
                .help("Encoder bitrate in Mb/s")
                .takes_value(true),
        )
        .arg(
            Arg::new("continuous")
                .short('c')
                .long("continuous")
                .help("Also stream every frame to this file or tcp:// url")
                .takes_value(true),
        )
        .arg(
            Arg::new("directory")
                .short('d')
                .long("directory")
                .help("Directory to write recorded segments to")
                .takes_value(true),
        )
        .arg(
            Arg::new("exec")
                .short('e')
                .long("exec")
                .help("Command run as `<cmd> start|stop <file>` on recording start and stop")
                .takes_value(true),
        )
        .arg(
            Arg::new("heatmap")
                .short('m')
                .long("heatmap")
                .help("Grayscale image with per-macroblock sensitivities")
                .takes_value(true),
        )
        .arg(
            Arg::new("sensitivity")
                .short('s')
                .long("sensitivity")
                .help("Uniform sensitivity (0-255), ignored with a heatmap")
                .takes_value(true),
        )
        .arg(
            Arg::new("outro")
                .short('o')
                .long("outro")
                .help("Frames of stillness before a recording stops")
                .takes_value(true),
        )
        .arg(
            Arg::new("framerate")
                .short('r')
                .long("framerate")
                .help("Nominal framerate, overrides the one reported by the input")
                .takes_value(true),
        )
        .arg(
            Arg::new("threshold")
                .short('t')
                .long("threshold")
                .help("Number of macroblocks that must move to trigger a recording")
                .takes_value(true),
        )
        .arg(
            Arg::new("debounce")
                .long("debounce")
                .help("Frames movement must persist for before recording")
                .takes_value(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity")
                .multiple_occurrences(true),
        )
        .arg(
            Arg::new("vectors")
                .short('z')
                .long("vectors")
                .help("Dump motion vector images to this printf-style pattern (e.g. mv%05d.png)")
                .takes_value(true),
        )
}

fn log_level(verbosity: u64) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn parse<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    matches
        .value_of(name)
        .map(|v| v.parse().map_err(|e| anyhow!("Invalid --{name} value {v}: {e}")))
        .transpose()
}

/// Combine the configuration file, input properties and command line flags.
fn build_config(
    matches: &ArgMatches,
    dimensions: (usize, usize),
    framerate: Option<u32>,
) -> Result<RecorderConfig> {
    let mut config = match matches.value_of("config") {
        Some(path) => {
            info!("Loading config from {path}");
            serde_json::from_reader(std::io::BufReader::new(std::fs::File::open(path)?))?
        }
        None => RecorderConfig::default(),
    };

    (config.width, config.height) = dimensions;

    if let Some(framerate) = framerate {
        config.framerate = framerate;
    }

    if let Some(v) = parse(matches, "bitrate")? {
        config.bitrate_mbps = v;
    }
    if let Some(v) = matches.value_of("continuous") {
        config.continuous_stream_url = Some(v.into());
    }
    if let Some(v) = matches.value_of("directory") {
        config.output_directory = v.into();
    }
    if let Some(v) = matches.value_of("exec") {
        config.notify_command = Some(v.into());
    }
    if let Some(v) = matches.value_of("heatmap") {
        config.heatmap = Some(v.into());
    }
    if let Some(v) = parse(matches, "sensitivity")? {
        config.sensitivity = v;
    }
    if let Some(v) = parse(matches, "outro")? {
        config.outro_frames = Some(v);
    }
    if let Some(v) = parse(matches, "framerate")? {
        config.framerate = v;
    }
    if let Some(v) = parse(matches, "threshold")? {
        config.threshold = v;
    }
    if let Some(v) = parse(matches, "debounce")? {
        config.debounce_frames = v;
    }
    if let Some(v) = matches.value_of("vectors") {
        config.vector_debug_pattern = Some(v.into());
    }

    config.validate()?;

    Ok(config)
}

fn create_pipeline(config: &RecorderConfig) -> Result<Pipeline> {
    let heatmap = config.build_heatmap()?;

    let notifier: Box<dyn Notifier> = match &config.notify_command {
        Some(cmd) => Box::new(CommandNotifier::new(cmd)),
        None => Box::new(NullNotifier),
    };

    let mut sinks = Sinks::new(Box::new(SegmentFactory::new(&config.output_directory)));

    if let Some(url) = &config.continuous_stream_url {
        sinks.continuous = Some(mvrec::utils::open_continuous(url)?);
    }

    Ok(Pipeline::new(config, heatmap, sinks, notifier)?)
}

fn main() -> Result<()> {
    let matches = command().get_matches();

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .default_filter_or(log_level(matches.occurrences_of("verbose")).as_str()),
    )
    .init();

    let input = matches
        .value_of("input")
        .ok_or_else(|| anyhow!("No input specified"))?;

    let mut source = stream_loader::create_source(input)?;

    let config = build_config(&matches, source.dimensions(), source.framerate())?;

    info!(
        "Recording {}x{} at {} fps, outro of {} frames, {} Mb/s",
        config.width,
        config.height,
        config.framerate,
        config.outro_frames(),
        config.bitrate_mbps
    );

    let mut pipeline = create_pipeline(&config)?;

    let mut buffers = 0usize;

    loop {
        match source.next_buffer() {
            Ok(Some(buffer)) => {
                if let Err(e) = pipeline.push_buffer(buffer) {
                    warn!("Skipping buffer {buffers}: {e}");
                }
                buffers += 1;
            }
            Ok(None) => break,
            Err(e) => {
                error!("Input failed after {buffers} buffers: {e}");
                break;
            }
        }
    }

    info!(
        "Input ended after {buffers} buffers, {} motion samples coalesced",
        pipeline.coalesced()
    );

    pipeline.shutdown();

    Ok(())
}
